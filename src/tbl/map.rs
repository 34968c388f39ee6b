use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Value};
use once_cell::sync::OnceCell;

/// The streaming map/filter operator.
///
/// Rows are pulled from the source, gated by the optional predicate, and
/// each surviving row is passed through every mapper in turn, so a call
/// with three mappers emits three rows per source row. With no mappers the
/// source row itself is emitted. Order-preserving and shardable.
pub struct MapTable {
	src: Table,
	pred: Option<Func>,
	mappers: Vec<Func>,
	digest: OnceCell<Digest>,
}

impl MapTable {
	pub fn new(src: Table, pred: Option<Func>, mappers: Vec<Func>) -> Table {
		Table::new(MapTable {
			src,
			pred,
			mappers,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for MapTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:map").digest(&self.src.digest());
			if let Some(pred) = &self.pred {
				fold = fold.digest(&pred.digest());
			}
			for mapper in &self.mappers {
				fold = fold.digest(&mapper.digest());
			}
			fold.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		match mode {
			// A heuristic upper bound: the predicate may drop rows
			Len::Approx => {
				Ok(self.src.len(ctx, Len::Approx)? * self.mappers.len().max(1))
			}
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

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		Box::new(MapScanner {
			src: self.src.scanner(start, limit, total),
			pred: self.pred.clone(),
			mappers: self.mappers.clone(),
			row: None,
			index: 0,
			current: Value::Null,
			failure: None,
		})
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let mut scanner = self.scanner(0, 1, 1);
		let mut rows = Vec::new();
		while scanner.advance(ctx) {
			rows.push(scanner.current().clone());
		}
		if let Some(err) = scanner.take_failure() {
			return Err(err);
		}
		codec::marshal_rows(ctx, &rows, buf)
	}
}

struct MapScanner {
	src: Box<dyn Scanner>,
	pred: Option<Func>,
	mappers: Vec<Func>,
	/// The last row read from the source, while mappers remain for it
	row: Option<Value>,
	/// The index of the next mapper to apply to that row
	index: usize,
	current: Value,
	failure: Option<Error>,
}

impl MapScanner {
	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		loop {
			// Emit the next mapper result for the last-read row
			if let Some(row) = &self.row {
				if self.index < self.mappers.len() {
					let mapper = &self.mappers[self.index];
					self.index += 1;
					self.current = mapper.call(ctx, vec![row.clone()])?;
					return Ok(true);
				}
				self.row = None;
			}
			// Pull the next row satisfying the predicate
			loop {
				if !self.src.advance(ctx) {
					if let Some(err) = self.src.take_failure() {
						return Err(err);
					}
					ctx.check()?;
					return Ok(false);
				}
				let row = self.src.current().clone();
				if let Some(pred) = &self.pred {
					if !pred.call(ctx, vec![row.clone()])?.to_bool()? {
						continue;
					}
				}
				if self.mappers.is_empty() {
					self.current = row;
					return Ok(true);
				}
				self.row = Some(row);
				self.index = 0;
				break;
			}
		}
	}
}

impl Scanner for MapScanner {
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
