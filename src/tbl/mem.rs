use crate::ctx::Context;
use crate::err::Error;
use crate::sym::Symbol;
use crate::tbl::{codec, shard_range, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// An in-memory table over a materialized row vector.
///
/// This is the leaf every table literal, sort target and unmarshalled
/// stream becomes. It shards, preserves order, and marshals.
pub struct MemTable {
	rows: Arc<Vec<Value>>,
	sorted_on: Option<Symbol>,
	digest: OnceCell<Digest>,
}

impl MemTable {
	pub fn from_rows(rows: Vec<Value>) -> MemTable {
		MemTable {
			rows: Arc::new(rows),
			sorted_on: None,
			digest: OnceCell::new(),
		}
	}

	/// Mark the column this table is sorted ascending by
	pub fn with_sorted_on(mut self, col: Option<Symbol>) -> MemTable {
		self.sorted_on = col;
		self
	}

	/// Rebuild a table from a marshalled byte stream
	pub fn unmarshal(bytes: &[u8]) -> Result<MemTable, Error> {
		Ok(MemTable::from_rows(codec::unmarshal_rows(bytes)?))
	}

	pub(crate) fn shared_rows(&self) -> Arc<Vec<Value>> {
		self.rows.clone()
	}
}

impl From<MemTable> for Table {
	fn from(v: MemTable) -> Table {
		Table::new(v)
	}
}

impl Tabular for MemTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:mem");
			for row in self.rows.iter() {
				fold = fold.digest(&row.digest());
			}
			fold.finish()
		})
	}

	fn len(&self, _ctx: &Context, _mode: Len) -> Result<usize, Error> {
		Ok(self.rows.len())
	}

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		let (lo, hi) = shard_range(self.rows.len(), start, limit, total);
		Box::new(MemScanner {
			rows: self.rows.clone(),
			next: lo,
			limit: hi,
			current: Value::Null,
			failure: None,
		})
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		codec::marshal_rows(ctx, &self.rows, buf)
	}

	fn sorted_on(&self) -> Option<Symbol> {
		self.sorted_on
	}
}

struct MemScanner {
	rows: Arc<Vec<Value>>,
	next: usize,
	limit: usize,
	current: Value,
	failure: Option<Error>,
}

impl Scanner for MemScanner {
	fn advance(&mut self, ctx: &Context) -> bool {
		if self.failure.is_some() || self.next >= self.limit {
			return false;
		}
		// A cancelled scan is terminal, not merely truncated
		if let Err(err) = ctx.check() {
			self.failure = Some(err);
			return false;
		}
		self.current = self.rows[self.next].clone();
		self.next += 1;
		true
	}
	fn current(&self) -> &Value {
		&self.current
	}
	fn take_failure(&mut self) -> Option<Error> {
		self.failure.take()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rows() -> Vec<Value> {
		(0..7).map(|i| Value::Object(obj! {"i" => i})).collect()
	}

	#[test]
	fn shards_concatenate_to_a_full_scan() {
		let ctx = Context::background();
		let table: Table = MemTable::from_rows(rows()).into();
		for total in 1..5 {
			let mut collected = Vec::new();
			for shard in 0..total {
				let mut scanner = table.scanner(shard, shard + 1, total);
				while scanner.advance(&ctx) {
					collected.push(scanner.current().clone());
				}
			}
			assert_eq!(collected, rows());
		}
	}

	#[test]
	fn digest_is_deterministic() {
		let a: Table = MemTable::from_rows(rows()).into();
		let b: Table = MemTable::from_rows(rows()).into();
		assert_eq!(a.digest(), b.digest());
		assert_eq!(a, b);
	}

	#[test]
	fn marshal_round_trips() {
		let ctx = Context::background();
		let table: Table = MemTable::from_rows(rows()).into();
		let mut buf = Vec::new();
		table.marshal(&ctx, &mut buf).unwrap();
		let back: Table = MemTable::unmarshal(&buf).unwrap().into();
		assert_eq!(back.rows(&ctx).unwrap(), rows());
	}

	#[test]
	fn cancellation_stops_a_scan() {
		let mut ctx = Context::background();
		let canceller = ctx.add_cancel();
		let table: Table = MemTable::from_rows(rows()).into();
		let mut scanner = table.scan();
		assert!(scanner.advance(&ctx));
		canceller.cancel();
		assert!(!scanner.advance(&ctx));
	}
}
