use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, collect, LazyScanner, Len, Materialize, MemTable, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Object, Value};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// The cogroup operator.
///
/// Rows are sorted by key and each equal-key run becomes one
/// `{key, group}` row, where `group` is an in-memory table of the run's
/// rows in source order. Keys are emitted ascending.
pub struct CogroupTable {
	inner: Arc<CogroupInner>,
	digest: OnceCell<Digest>,
}

struct CogroupInner {
	src: Table,
	key: Func,
	rows: OnceCell<Arc<Vec<Value>>>,
}

impl CogroupTable {
	pub fn new(src: Table, key: Func) -> Table {
		Table::new(CogroupTable {
			inner: Arc::new(CogroupInner {
				src,
				key,
				rows: OnceCell::new(),
			}),
			digest: OnceCell::new(),
		})
	}
}

impl Materialize for CogroupInner {
	fn materialize(&self, ctx: &Context) -> Result<Arc<Vec<Value>>, Error> {
		self.rows
			.get_or_try_init(|| {
				let mut scanner = self.src.scan();
				let mut entries: Vec<(Value, usize, Value)> = Vec::new();
				let mut idx = 0;
				while scanner.advance(ctx) {
					let row = scanner.current().clone();
					let key = self.key.call(ctx, vec![row.clone()])?;
					entries.push((key, idx, row));
					idx += 1;
				}
				if let Some(err) = scanner.take_failure() {
					return Err(err);
				}
				entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
				let mut out = Vec::new();
				let mut at = 0;
				while at < entries.len() {
					let key = entries[at].0.clone();
					let mut group = Vec::new();
					while at < entries.len() && entries[at].0 == key {
						group.push(entries[at].2.clone());
						at += 1;
					}
					let mut row = Object::with_capacity(2);
					row.set("key".into(), key);
					row.set("group".into(), Value::Table(MemTable::from_rows(group).into()));
					out.push(Value::Object(row));
				}
				Ok(Arc::new(out))
			})
			.cloned()
	}
}

impl Tabular for CogroupTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			Fold::new(b"gql:tbl:cogroup")
				.digest(&self.inner.src.digest())
				.digest(&self.inner.key.digest())
				.finish()
		})
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		match mode {
			Len::Approx => self.inner.src.len(ctx, Len::Approx),
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
}
