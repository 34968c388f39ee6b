use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, collect, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;

/// Sequential concatenation of tables. Sharding delegates the same shard
/// range to every child, so the shard union covers every child row.
pub struct ConcatTable {
	tables: Vec<Table>,
	digest: OnceCell<Digest>,
}

impl ConcatTable {
	pub fn new(tables: Vec<Table>) -> Table {
		Table::new(ConcatTable {
			tables,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for ConcatTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:concat");
			for table in &self.tables {
				fold = fold.digest(&table.digest());
			}
			fold.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		let mut n = 0;
		for table in &self.tables {
			n += table.len(ctx, mode)?;
		}
		Ok(n)
	}

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		Box::new(ConcatScanner {
			scanners: self.tables.iter().map(|t| t.scanner(start, limit, total)).collect(),
			at: 0,
			current: Value::Null,
			failure: None,
		})
	}

	fn prefetch(&self) {
		for table in &self.tables {
			table.prefetch();
		}
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct ConcatScanner {
	scanners: Vec<Box<dyn Scanner>>,
	at: usize,
	current: Value,
	failure: Option<Error>,
}

impl Scanner for ConcatScanner {
	fn advance(&mut self, ctx: &Context) -> bool {
		if self.failure.is_some() {
			return false;
		}
		while self.at < self.scanners.len() {
			if self.scanners[self.at].advance(ctx) {
				self.current = self.scanners[self.at].current().clone();
				return true;
			}
			if let Some(err) = self.scanners[self.at].take_failure() {
				self.failure = Some(err);
				return false;
			}
			if ctx.is_done() {
				self.failure = ctx.check().err();
				return false;
			}
			self.at += 1;
		}
		false
	}
	fn current(&self) -> &Value {
		&self.current
	}
	fn take_failure(&mut self) -> Option<Error> {
		self.failure.take()
	}
}
