use crate::cnf::SORT_HEAP_THRESHOLD;
use crate::ctx::Context;
use crate::err::Error;
use crate::sym::Symbol;
use crate::tbl::{codec, collect, LazyScanner, Len, Materialize, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Value};
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// The min-N sort operator backing both `sort` and `minn`.
///
/// The input is materialized into key order ascending, ties broken by
/// source order, and truncated to the limit when one is given. A bounded
/// limit under the heap threshold keeps only the retained rows in memory.
pub struct SortTable {
	inner: Arc<SortInner>,
	digest: OnceCell<Digest>,
}

struct SortInner {
	src: Table,
	key: Func,
	limit: Option<usize>,
	rows: OnceCell<Arc<Vec<Value>>>,
}

struct SortEntry {
	key: Value,
	idx: usize,
	row: Value,
}

impl PartialEq for SortEntry {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for SortEntry {}

impl PartialOrd for SortEntry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for SortEntry {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key.cmp(&other.key).then(self.idx.cmp(&other.idx))
	}
}

impl SortTable {
	pub fn new(src: Table, key: Func, limit: Option<usize>) -> Table {
		Table::new(SortTable {
			inner: Arc::new(SortInner {
				src,
				key,
				limit,
				rows: OnceCell::new(),
			}),
			digest: OnceCell::new(),
		})
	}
}

impl Materialize for SortInner {
	fn materialize(&self, ctx: &Context) -> Result<Arc<Vec<Value>>, Error> {
		self.rows
			.get_or_try_init(|| {
				let mut scanner = self.src.scan();
				match self.limit {
					// A bounded limit keeps the N smallest in a max-heap
					Some(limit) if limit <= *SORT_HEAP_THRESHOLD => {
						let mut heap: BinaryHeap<SortEntry> = BinaryHeap::new();
						let mut idx = 0;
						while scanner.advance(ctx) {
							let row = scanner.current().clone();
							let key = self.key.call(ctx, vec![row.clone()])?;
							heap.push(SortEntry {
								key,
								idx,
								row,
							});
							idx += 1;
							if heap.len() > limit {
								heap.pop();
							}
						}
						if let Some(err) = scanner.take_failure() {
							return Err(err);
						}
						let entries = heap.into_sorted_vec();
						Ok(Arc::new(entries.into_iter().map(|e| e.row).collect()))
					}
					_ => {
						let mut entries = Vec::new();
						let mut idx = 0;
						while scanner.advance(ctx) {
							let row = scanner.current().clone();
							let key = self.key.call(ctx, vec![row.clone()])?;
							entries.push(SortEntry {
								key,
								idx,
								row,
							});
							idx += 1;
						}
						if let Some(err) = scanner.take_failure() {
							return Err(err);
						}
						entries.sort();
						if let Some(limit) = self.limit {
							entries.truncate(limit);
						}
						Ok(Arc::new(entries.into_iter().map(|e| e.row).collect()))
					}
				}
			})
			.cloned()
	}
}

impl Tabular for SortTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:sort")
				.digest(&self.inner.src.digest())
				.digest(&self.inner.key.digest());
			if let Some(limit) = self.inner.limit {
				fold = fold.bytes(&(limit as u64).to_le_bytes());
			}
			fold.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		match mode {
			Len::Approx => {
				let n = self.inner.src.len(ctx, Len::Approx)?;
				Ok(self.inner.limit.map_or(n, |limit| n.min(limit)))
			}
			Len::Exact => Ok(self.inner.materialize(ctx)?.len()),
		}
	}

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		Box::new(LazyScanner::new(self.inner.clone(), start, limit, total))
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}

	fn sorted_on(&self) -> Option<Symbol> {
		self.inner.key.sort_key_column()
	}
}
