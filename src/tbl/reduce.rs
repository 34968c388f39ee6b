use crate::ctx::Context;
use crate::err::Error;
use crate::tbl::{codec, collect, LazyScanner, Len, Materialize, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Object, Value};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

/// The grouping reduction operator.
///
/// Rows are grouped by key value; each group's values (the mapped row when
/// a mapper is given, the row itself otherwise) are combined pairwise with
/// the reducer. One `{key, value}` row is emitted per group, in first-seen
/// key order. Grouping buffers the whole input on first scan.
pub struct ReduceTable {
	inner: Arc<ReduceInner>,
	digest: OnceCell<Digest>,
}

struct ReduceInner {
	src: Table,
	key: Func,
	reducer: Func,
	map: Option<Func>,
	rows: OnceCell<Arc<Vec<Value>>>,
}

impl ReduceTable {
	pub fn new(src: Table, key: Func, reducer: Func, map: Option<Func>) -> Table {
		Table::new(ReduceTable {
			inner: Arc::new(ReduceInner {
				src,
				key,
				reducer,
				map,
				rows: OnceCell::new(),
			}),
			digest: OnceCell::new(),
		})
	}
}

impl Materialize for ReduceInner {
	fn materialize(&self, ctx: &Context) -> Result<Arc<Vec<Value>>, Error> {
		self.rows
			.get_or_try_init(|| {
				let mut scanner = self.src.scan();
				let mut groups: Vec<(Value, Value)> = Vec::new();
				let mut index: HashMap<Digest, usize> = HashMap::new();
				while scanner.advance(ctx) {
					let row = scanner.current().clone();
					let key = self.key.call(ctx, vec![row.clone()])?;
					let value = match &self.map {
						Some(map) => map.call(ctx, vec![row])?,
						None => row,
					};
					match index.get(&key.digest()) {
						Some(at) => {
							let acc = groups[*at].1.clone();
							groups[*at].1 = self.reducer.call(ctx, vec![acc, value])?;
						}
						None => {
							index.insert(key.digest(), groups.len());
							groups.push((key, value));
						}
					}
				}
				if let Some(err) = scanner.take_failure() {
					return Err(err);
				}
				let mut rows = Vec::with_capacity(groups.len());
				for (key, value) in groups {
					let mut out = Object::with_capacity(2);
					out.set("key".into(), key);
					out.set("value".into(), value);
					rows.push(Value::Object(out));
				}
				Ok(Arc::new(rows))
			})
			.cloned()
	}
}

impl Tabular for ReduceTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:tbl:reduce")
				.digest(&self.inner.src.digest())
				.digest(&self.inner.key.digest())
				.digest(&self.inner.reducer.digest());
			if let Some(map) = &self.inner.map {
				fold = fold.digest(&map.digest());
			}
			fold.finish()
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
