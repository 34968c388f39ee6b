use crate::ctx::Context;
use crate::err::Error;
use crate::sym::sym;
use crate::tbl::{codec, collect, EmptyScanner, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Kind, Object, Value};
use once_cell::sync::OnceCell;

/// The grouped pivot operator.
///
/// `key` extracts the row identity as a struct; `cell` extracts a struct
/// whose last field is the cell value and whose leading fields name the
/// output column, joined with underscores. Adjacent rows with equal keys
/// become one wide row: the key fields followed by one column per cell.
pub struct TransposeTable {
	src: Table,
	key: Func,
	cell: Func,
	digest: OnceCell<Digest>,
}

impl TransposeTable {
	pub fn new(src: Table, key: Func, cell: Func) -> Table {
		Table::new(TransposeTable {
			src,
			key,
			cell,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for TransposeTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			Fold::new(b"gql:tbl:transpose")
				.digest(&self.src.digest())
				.digest(&self.key.digest())
				.digest(&self.cell.digest())
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
		Box::new(TransposeScanner {
			src: self.src.scan(),
			key: self.key.clone(),
			cell: self.cell.clone(),
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

struct TransposeScanner {
	src: Box<dyn Scanner>,
	key: Func,
	cell: Func,
	/// The next row and its already-computed key struct
	lookahead: Option<(Value, Object)>,
	done: bool,
	current: Value,
	failure: Option<Error>,
}

impl TransposeScanner {
	fn pull(&mut self, ctx: &Context) -> Result<Option<(Value, Object)>, Error> {
		if let Some(pair) = self.lookahead.take() {
			return Ok(Some(pair));
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
		let row = self.src.current().clone();
		let key = self.key.call(ctx, vec![row.clone()])?.to_object()?.clone();
		Ok(Some((row, key)))
	}

	fn widen(&self, ctx: &Context, row: &Value, out: &mut Object) -> Result<(), Error> {
		let cell = self.cell.call(ctx, vec![row.clone()])?;
		let cell = cell.to_object()?;
		if cell.is_empty() {
			return Err(Error::TypeMismatch {
				expected: format!("a non-empty {}", Kind::Struct),
				found: format!("an empty {}", Kind::Struct),
			});
		}
		let mut name = String::new();
		for (i, (_, part)) in cell.iter().take(cell.len() - 1).enumerate() {
			if i > 0 {
				name.push('_');
			}
			match part {
				Value::Strand(v) => name.push_str(v.as_str()),
				part => name.push_str(&part.to_string()),
			}
		}
		let (_, value) = &cell[cell.len() - 1];
		out.set(sym(&name), value.clone());
		Ok(())
	}

	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		let Some((first, key)) = self.pull(ctx)? else {
			return Ok(false);
		};
		let mut out = key.clone();
		self.widen(ctx, &first, &mut out)?;
		loop {
			match self.pull(ctx)? {
				Some((row, next_key)) if next_key.digest() == key.digest() => {
					self.widen(ctx, &row, &mut out)?;
				}
				Some(pair) => {
					self.lookahead = Some(pair);
					break;
				}
				None => break,
			}
		}
		self.current = Value::Object(out);
		Ok(true)
	}
}

impl Scanner for TransposeScanner {
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
