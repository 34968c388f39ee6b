use crate::ctx::Context;
use crate::err::Error;
use crate::sym::Symbol;
use crate::tbl::{codec, collect, EmptyScanner, Len, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Object, Value};
use once_cell::sync::OnceCell;
use std::collections::VecDeque;

/// The collapse operator.
///
/// Adjacent rows sharing the named key columns merge field-wise, first
/// non-null value winning. A row whose non-null fields conflict with every
/// candidate so far starts a fresh output row, so duplicates survive
/// deterministically in input order.
pub struct CollapseTable {
	src: Table,
	cols: Vec<Symbol>,
	digest: OnceCell<Digest>,
}

impl CollapseTable {
	pub fn new(src: Table, cols: Vec<Symbol>) -> Table {
		Table::new(CollapseTable {
			src,
			cols,
			digest: OnceCell::new(),
		})
	}
}

impl Tabular for CollapseTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:collapse").digest(&self.src.digest());
			for col in &self.cols {
				fold = fold.digest(&col.digest());
			}
			fold.finish()
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
		Box::new(CollapseScanner {
			src: self.src.scan(),
			cols: self.cols.clone(),
			lookahead: None,
			out: VecDeque::new(),
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

struct CollapseScanner {
	src: Box<dyn Scanner>,
	cols: Vec<Symbol>,
	lookahead: Option<Value>,
	out: VecDeque<Value>,
	done: bool,
	current: Value,
	failure: Option<Error>,
}

impl CollapseScanner {
	fn key_of(&self, row: &Object) -> Vec<Value> {
		self.cols.iter().map(|c| row.get(*c).cloned().unwrap_or(Value::Null)).collect()
	}

	fn pull(&mut self, ctx: &Context) -> Result<Option<Object>, Error> {
		if let Some(row) = self.lookahead.take() {
			return Ok(Some(row.to_object()?.clone()));
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

	/// Whether a row can merge into a candidate: no field present in both
	/// carries differing non-null values
	fn mergeable(candidate: &Object, row: &Object) -> bool {
		row.iter().all(|(name, value)| match candidate.get(*name) {
			Some(existing) => existing.is_null() || value.is_null() || existing == value,
			None => true,
		})
	}

	fn merge(candidate: &mut Object, row: &Object) {
		for (name, value) in row.iter() {
			match candidate.get(*name) {
				Some(existing) if !existing.is_null() => {}
				_ => candidate.set(*name, value.clone()),
			}
		}
	}

	fn try_advance(&mut self, ctx: &Context) -> Result<bool, Error> {
		loop {
			if let Some(row) = self.out.pop_front() {
				self.current = row;
				return Ok(true);
			}
			// Gather the next group of adjacent rows sharing the key
			let Some(first) = self.pull(ctx)? else {
				return Ok(false);
			};
			let key = self.key_of(&first);
			let mut group = vec![first];
			loop {
				match self.pull(ctx)? {
					Some(row) if self.key_of(&row) == key => group.push(row),
					Some(row) => {
						self.lookahead = Some(Value::Object(row));
						break;
					}
					None => break,
				}
			}
			// Merge the group, keeping unmergeable rows separate in order
			let mut candidates: Vec<Object> = Vec::new();
			for row in group {
				match candidates.iter_mut().find(|c| Self::mergeable(c, &row)) {
					Some(candidate) => Self::merge(candidate, &row),
					None => candidates.push(row),
				}
			}
			self.out.extend(candidates.into_iter().map(Value::Object));
		}
	}
}

impl Scanner for CollapseScanner {
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
