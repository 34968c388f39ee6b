use crate::ctx::Context;
use crate::err::Error;
use crate::sym::Symbol;
use crate::tbl::{codec, collect, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Object, Value};
use once_cell::sync::OnceCell;
use std::collections::VecDeque;

/// The wide-to-long gather operator.
///
/// Each source row emits one row per gathered column: the ungathered
/// fields, then `key` holding the column name and `value` holding that
/// column's value (null when the column is absent). Order-preserving and
/// shardable, since each output row depends on one input row.
pub struct GatherTable {
	src: Table,
	key: Symbol,
	value: Symbol,
	cols: Vec<Symbol>,
	digest: OnceCell<Digest>,
}

impl GatherTable {
	pub fn new(src: Table, key: Symbol, value: Symbol, cols: Vec<Symbol>) -> Table {
		Table::new(GatherTable {
			src,
			key,
			value,
			cols,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for GatherTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:gather")
				.digest(&self.src.digest())
				.digest(&self.key.digest())
				.digest(&self.value.digest());
			for col in &self.cols {
				fold = fold.digest(&col.digest());
			}
			fold.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		Ok(self.src.len(ctx, mode)? * self.cols.len())
	}

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		Box::new(GatherScanner {
			src: self.src.scanner(start, limit, total),
			key: self.key,
			value: self.value,
			cols: self.cols.clone(),
			out: VecDeque::new(),
			current: Value::Null,
			failure: None,
		})
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct GatherScanner {
	src: Box<dyn Scanner>,
	key: Symbol,
	value: Symbol,
	cols: Vec<Symbol>,
	out: VecDeque<Value>,
	current: Value,
	failure: Option<Error>,
}

impl GatherScanner {
	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		loop {
			if let Some(row) = self.out.pop_front() {
				self.current = row;
				return Ok(true);
			}
			if !self.src.advance(ctx) {
				if let Some(err) = self.src.take_failure() {
					return Err(err);
				}
				ctx.check()?;
				return Ok(false);
			}
			let row = self.src.current().to_object()?;
			let mut base = Object::default();
			for (name, value) in row.iter() {
				if !self.cols.contains(name) {
					base.set(*name, value.clone());
				}
			}
			for col in &self.cols {
				let mut out = base.clone();
				out.set(self.key, Value::from(col.name()));
				out.set(self.value, row.get(*col).cloned().unwrap_or(Value::Null));
				self.out.push_back(Value::Object(out));
			}
		}
	}
}

impl Scanner for GatherScanner {
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
