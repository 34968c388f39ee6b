use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, collect, EmptyScanner, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;

/// The prefix operator: the first `limit` rows of the source.
pub struct FirstnTable {
	src: Table,
	limit: usize,
	digest: OnceCell<Digest>,
}

impl FirstnTable {
	pub fn new(src: Table, limit: usize) -> Table {
		Table::new(FirstnTable {
			src,
			limit,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for FirstnTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			Fold::new(b"gql:tbl:firstn")
				.digest(&self.src.digest())
				.bytes(&(self.limit as u64).to_le_bytes())
				.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		Ok(self.src.len(ctx, mode)?.min(self.limit))
	}

	fn scanner(&self, start: usize, _limit: usize, _total: usize) -> Box<dyn Scanner> {
		if start > 0 {
			return Box::new(EmptyScanner);
		}
		Box::new(FirstnScanner {
			src: self.src.scan(),
			remaining: self.limit,
			current: Value::Null,
			failure: None,
		})
	}

	fn prefetch(&self) {
		self.src.prefetch()
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct FirstnScanner {
	src: Box<dyn Scanner>,
	remaining: usize,
	current: Value,
	failure: Option<Error>,
}

impl Scanner for FirstnScanner {
	fn advance(&mut self, ctx: &Context) -> bool {
		if self.failure.is_some() || self.remaining == 0 {
			return false;
		}
		if !self.src.advance(ctx) {
			self.failure = self.src.take_failure();
			return false;
		}
		self.remaining -= 1;
		self.current = self.src.current().clone();
		true
	}
	fn current(&self) -> &Value {
		&self.current
	}
	fn take_failure(&mut self) -> Option<Error> {
		self.failure.take()
	}
}
