pub(crate) mod codec;
pub(crate) mod cogroup;
pub(crate) mod collapse;
pub(crate) mod concat;
pub(crate) mod firstn;
pub(crate) mod flatten;
pub(crate) mod gather;
pub(crate) mod join;
pub(crate) mod map;
pub(crate) mod mem;
pub(crate) mod reduce;
pub(crate) mod sort;
pub(crate) mod spread;
pub(crate) mod transpose;

pub use mem::MemTable;

use crate::ctx::Context;
use crate::err::Error;
use crate::sym::Symbol;
use crate::val::{Digest, Value};
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// How precisely a length query must answer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Len {
	/// Cheap, possibly a heuristic upper bound
	Approx,
	/// Exact, possibly streaming the whole table
	Exact,
}

/// The contract every row-producing operator implements.
pub trait Tabular: Send + Sync {
	/// The deterministic, cached content hash of this table
	fn digest(&self) -> Digest;

	/// The approximate or exact number of rows
	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error>;

	/// Create a scanner over the shard range `[start, limit)` of `total`.
	/// Operators that cannot shard return an empty scanner for any shard
	/// range that does not start at zero.
	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner>;

	/// Best-effort asynchronous warmup; the default does nothing
	fn prefetch(&self) {}

	/// Write a self-describing serialization sufficient to rebuild the
	/// table on another worker
	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error>;

	/// The column this table is known to be sorted ascending by, when the
	/// sort key was a plain column extractor
	fn sorted_on(&self) -> Option<Symbol> {
		None
	}
}

/// A shareable handle on a table.
#[derive(Clone)]
pub struct Table(Arc<dyn Tabular>);

impl Table {
	pub fn new<T: Tabular + 'static>(table: T) -> Table {
		Table(Arc::new(table))
	}
	pub fn digest(&self) -> Digest {
		self.0.digest()
	}
	pub fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		self.0.len(ctx, mode)
	}
	pub fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		self.0.scanner(start, limit, total)
	}
	/// A single-shard scanner over the whole table
	pub fn scan(&self) -> Box<dyn Scanner> {
		self.0.scanner(0, 1, 1)
	}
	pub fn prefetch(&self) {
		self.0.prefetch()
	}
	pub fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		self.0.marshal(ctx, buf)
	}
	pub fn sorted_on(&self) -> Option<Symbol> {
		self.0.sorted_on()
	}
	/// Collect every row into memory
	pub fn rows(&self, ctx: &Context) -> Result<Vec<Value>, Error> {
		let mut scanner = self.scan();
		let mut rows = Vec::new();
		while scanner.advance(ctx) {
			rows.push(scanner.current().clone());
		}
		match scanner.take_failure() {
			Some(err) => Err(err),
			None => Ok(rows),
		}
	}
}

impl PartialEq for Table {
	fn eq(&self, other: &Self) -> bool {
		self.digest() == other.digest()
	}
}

impl Eq for Table {}

impl Debug for Table {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.debug_struct("Table").field("digest", &self.digest().to_hex()).finish()
	}
}

impl Display for Table {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "table({})", &self.digest().to_hex()[..8])
	}
}

/// A single-pass, single-owner pull iterator over a table's rows.
///
/// `advance` returns false at exhaustion and must not be called again
/// thereafter; `current` is valid only immediately after a true return,
/// and the row is owned by the scanner until the next `advance`. A runtime
/// error makes the scanner terminal: `advance` returns false and
/// `take_failure` yields the error.
pub trait Scanner {
	fn advance(&mut self, ctx: &Context) -> bool;
	fn current(&self) -> &Value;
	fn take_failure(&mut self) -> Option<Error>;
}

/// The scanner of shards beyond an unshardable operator's first.
pub struct EmptyScanner;

static NULL: Value = Value::Null;

impl Scanner for EmptyScanner {
	fn advance(&mut self, _ctx: &Context) -> bool {
		false
	}
	fn current(&self) -> &Value {
		&NULL
	}
	fn take_failure(&mut self) -> Option<Error> {
		None
	}
}

/// The default shard scaling: rows `[n*start/total, n*limit/total)`.
pub(crate) fn shard_range(n: usize, start: usize, limit: usize, total: usize) -> (usize, usize) {
	if total == 0 {
		return (0, 0);
	}
	(n * start / total, n * limit / total)
}

/// Drain a scanner into memory, propagating its terminal error.
pub(crate) fn collect(mut scanner: Box<dyn Scanner>, ctx: &Context) -> Result<Vec<Value>, Error> {
	let mut rows = Vec::new();
	while scanner.advance(ctx) {
		rows.push(scanner.current().clone());
	}
	match scanner.take_failure() {
		Some(err) => Err(err),
		None => Ok(rows),
	}
}

/// A buffered operator that builds its full output on first scan.
/// The build is single-shot: concurrent first scans observe one build.
pub(crate) trait Materialize: Send + Sync {
	fn materialize(&self, ctx: &Context) -> Result<Arc<Vec<Value>>, Error>;
}

/// The scanner of a buffered operator. Materialization is deferred to the
/// first `advance`, which is the suspension point that carries the
/// cancellation handle.
pub(crate) struct LazyScanner<T: Materialize> {
	inner: Arc<T>,
	start: usize,
	limit: usize,
	total: usize,
	state: Option<(Arc<Vec<Value>>, usize, usize)>,
	current: Value,
	failure: Option<Error>,
}

impl<T: Materialize> LazyScanner<T> {
	pub(crate) fn new(inner: Arc<T>, start: usize, limit: usize, total: usize) -> LazyScanner<T> {
		LazyScanner {
			inner,
			start,
			limit,
			total,
			state: None,
			current: Value::Null,
			failure: None,
		}
	}

	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		ctx.check()?;
		if self.state.is_none() {
			let rows = self.inner.materialize(ctx)?;
			let (lo, hi) = shard_range(rows.len(), self.start, self.limit, self.total);
			self.state = Some((rows, lo, hi));
		}
		let (rows, next, hi) = self.state.as_mut().expect("state was just filled");
		if next >= hi {
			return Ok(false);
		}
		self.current = rows[*next].clone();
		*next += 1;
		Ok(true)
	}
}

impl<T: Materialize> Scanner for LazyScanner<T> {
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

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn shard_ranges_partition_the_rows() {
		let n = 10;
		let total = 3;
		let mut covered = 0;
		for shard in 0..total {
			let (lo, hi) = shard_range(n, shard, shard + 1, total);
			assert_eq!(lo, covered);
			covered = hi;
		}
		assert_eq!(covered, n);
	}
}
