use crate::ctx::Context;
use crate::err::Error;
use crate::sym::{sym, Symbol};
use crate::tbl::{codec, collect, EmptyScanner, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Kind, Object, Value};
use once_cell::sync::OnceCell;

/// Derive a column name from a spread key value.
pub(crate) fn column_name(value: &Value) -> Result<Symbol, Error> {
	match value {
		Value::Strand(v) => Ok(sym(v.as_str())),
		Value::Char(v) => Ok(sym(&v.to_string())),
		Value::Int(v) => Ok(sym(&v.to_string())),
		value => Err(Error::TypeMismatch {
			expected: format!("{} or {}", Kind::Strand, Kind::Int),
			found: value.kind().to_string(),
		}),
	}
}

/// The long-to-wide spread operator.
///
/// Adjacent rows agreeing on every field other than `key` and `value`
/// merge into one output row carrying one column per (key, value) pair.
pub struct SpreadTable {
	src: Table,
	key: Symbol,
	value: Symbol,
	digest: OnceCell<Digest>,
}

impl SpreadTable {
	pub fn new(src: Table, key: Symbol, value: Symbol) -> Table {
		Table::new(SpreadTable {
			src,
			key,
			value,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for SpreadTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			Fold::new(b"gql:tbl:spread")
				.digest(&self.src.digest())
				.digest(&self.key.digest())
				.digest(&self.value.digest())
				.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		match mode {
			Len::Approx => self.src.len(ctx, Len::Approx),
			Len::Exact => {
				let mut scanner = self.scanner(0, 1, 1);
				let mut n = 0;
				while scanner.advance(ctx) {
					n += 1;
				}
				match scanner.take_failure() {
					Some(err) => Err(err),
					None => Ok(n),
				}
			}
		}
	}

	fn scanner(&self, start: usize, _limit: usize, _total: usize) -> Box<dyn Scanner> {
		if start > 0 {
			return Box::new(EmptyScanner);
		}
		Box::new(SpreadScanner {
			src: self.src.scan(),
			key: self.key,
			value: self.value,
			lookahead: None,
			done: false,
			current: Value::Null,
			failure: None,
		})
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct SpreadScanner {
	src: Box<dyn Scanner>,
	key: Symbol,
	value: Symbol,
	lookahead: Option<Object>,
	done: bool,
	current: Value,
	failure: Option<Error>,
}

impl SpreadScanner {
	fn base_of(&self, row: &Object) -> Object {
		let mut base = Object::default();
		for (name, value) in row.iter() {
			if *name != self.key && *name != self.value {
				base.set(*name, value.clone());
			}
		}
		base
	}

	fn pull(&mut self, ctx: &Context) -> Result<Option<Object>, Error> {
		if let Some(row) = self.lookahead.take() {
			return Ok(Some(row));
		}
		if self.done {
			return Ok(None);
		}
		if !self.src.advance(ctx) {
			if let Some(err) = self.src.take_failure() {
				return Err(err);
			}
			ctx.check()?;
			self.done = true;
			return Ok(None);
		}
		Ok(Some(self.src.current().to_object()?.clone()))
	}

	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		let Some(first) = self.pull(ctx)? else {
			return Ok(false);
		};
		let mut out = self.base_of(&first);
		let base_digest = out.digest();
		let (key_sym, value_sym) = (self.key, self.value);
		let widen = |row: &Object, out: &mut Object| -> Result<(), Error> {
			let key = row.get(key_sym).ok_or_else(|| Error::UndeclaredField {
				name: key_sym.to_string(),
			})?;
			let value = row.get(value_sym).cloned().unwrap_or(Value::Null);
			out.set(column_name(key)?, value);
			Ok(())
		};
		widen(&first, &mut out)?;
		loop {
			match self.pull(ctx)? {
				Some(row) if self.base_of(&row).digest() == base_digest => {
					widen(&row, &mut out)?;
				}
				Some(row) => {
					self.lookahead = Some(row);
					break;
				}
				None => break,
			}
		}
		self.current = Value::Object(out);
		Ok(true)
	}
}

impl Scanner for SpreadScanner {
	fn advance(&mut self, ctx: &Context) -> bool {
		if self.failure.is_some() {
			return false;
		}
		match self.try_advance(ctx) {
			Ok(more) => more,
			Err(err) => {
				self.failure = Some(err);
				false
			}
		}
	}
	fn current(&self) -> &Value {
		&self.current
	}
	fn take_failure(&mut self) -> Option<Error> {
		self.failure.take()
	}
}
