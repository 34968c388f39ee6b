use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, collect, EmptyScanner, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;

/// The flattening operator: each source row is itself a table, and its
/// rows are emitted in order. The usual source is `cogroup` output piped
/// through a per-group transform.
pub struct FlattenTable {
	src: Table,
	digest: OnceCell<Digest>,
}

impl FlattenTable {
	pub fn new(src: Table) -> Table {
		Table::new(FlattenTable {
			src,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for FlattenTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			Fold::new(b"gql:tbl:flatten").digest(&self.src.digest()).finish()
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
		Box::new(FlattenScanner {
			src: self.src.scan(),
			inner: None,
			current: Value::Null,
			failure: None,
		})
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct FlattenScanner {
	src: Box<dyn Scanner>,
	inner: Option<Box<dyn Scanner>>,
	current: Value,
	failure: Option<Error>,
}

impl FlattenScanner {
	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		loop {
			if let Some(inner) = &mut self.inner {
				if inner.advance(ctx) {
					self.current = inner.current().clone();
					return Ok(true);
				}
				if let Some(err) = inner.take_failure() {
					return Err(err);
				}
				self.inner = None;
			}
			if !self.src.advance(ctx) {
				if let Some(err) = self.src.take_failure() {
					return Err(err);
				}
				ctx.check()?;
				return Ok(false);
			}
			let table = self.src.current().to_table()?.clone();
			self.inner = Some(table.scan());
		}
	}
}

impl Scanner for FlattenScanner {
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
