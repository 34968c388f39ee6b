pub(crate) mod cartesian;
pub(crate) mod merge;
pub(crate) mod plan;

use crate::ast::Expr;
use crate::cnf::CACHE_DIR;
use crate::ctx::Context;
use crate::err::Error;
use crate::sym::{sym, Symbol};
use crate::tbl::join::plan::PlanNode;
use crate::tbl::{codec, collect, LazyScanner, Len, Materialize, Scanner, Table, Tabular};
use crate::val::digest::Fold;
use crate::val::{Digest, Exec, Func, Object, Value};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// The maximum number of sub-tables in one join.
pub const MAX_JOIN_TABLES: usize = 4;

/// The multi-way join operator.
///
/// Construction extracts the equality constraints from the predicate and
/// builds the merge tree; the first scan executes the tree, applies the
/// predicate as a post-filter and the projection last, and materializes
/// the result under its content-hash path so later scans are cheap.
pub struct JoinTable {
	inner: Arc<JoinInner>,
	digest: OnceCell<Digest>,
}

struct JoinInner {
	tags: Vec<Symbol>,
	tables: Vec<Table>,
	pred: Option<Func>,
	map: Option<Func>,
	plan: PlanNode,
	digest: Digest,
	rows: OnceCell<Arc<Vec<Value>>>,
}

impl JoinTable {
	pub fn new(
		tags: Vec<Symbol>,
		tables: Vec<Table>,
		pred: Option<Func>,
		map: Option<Func>,
	) -> Result<Table, Error> {
		if tags.is_empty() || tags.len() > MAX_JOIN_TABLES {
			return Err(Error::ArityMismatch {
				name: String::from("join"),
				message: format!(
					"expected between 1 and {MAX_JOIN_TABLES} tables, got {}",
					tags.len()
				),
			});
		}
		// Collect equality constraints from the predicate's lambda body
		let mut constraints = Vec::new();
		if let Some(pred) = &pred {
			if let Some(body) = lambda_body(pred) {
				plan::extract(&body, &tags, &mut constraints);
			}
		}
		let plan = plan::plan(tables.len(), &constraints);
		debug!(tables = tags.len(), constraints = constraints.len(), plan = ?plan, "planned join");
		let mut fold = Fold::new(b"gql:tbl:join");
		for (tag, table) in tags.iter().zip(&tables) {
			fold = fold.digest(&tag.digest()).digest(&table.digest());
		}
		if let Some(pred) = &pred {
			fold = fold.digest(&pred.digest());
		}
		if let Some(map) = &map {
			fold = fold.digest(&map.digest());
		}
		let digest = fold.finish();
		Ok(Table::new(JoinTable {
			inner: Arc::new(JoinInner {
				tags,
				tables,
				pred,
				map,
				plan,
				digest,
				rows: OnceCell::new(),
			}),
			digest: OnceCell::new(),
		}))
	}
}

/// The body of a user lambda, when the function has one.
fn lambda_body(func: &Func) -> Option<Arc<Expr>> {
	match &func.inner().exec {
		Exec::Body {
			body,
			..
		} => Some(body.clone()),
		Exec::Builtin(_) => None,
	}
}

impl JoinInner {
	/// One argument per alias, read from a merged row. A missing side
	/// passes null, so outer-join projections read its columns as null.
	fn alias_args(&self, merged: &Value) -> Vec<Value> {
		let empty = Object::default();
		let merged = match merged {
			Value::Object(o) => o,
			_ => &empty,
		};
		self.tags.iter().map(|tag| merged.get(*tag).cloned().unwrap_or(Value::Null)).collect()
	}

	/// Flatten a merged row into `alias_col` fields, alias order first.
	fn flatten(&self, merged: &Value) -> Value {
		let mut out = Object::default();
		if let Value::Object(merged) = merged {
			for tag in &self.tags {
				if let Some(Value::Object(sub)) = merged.get(*tag) {
					for (col, value) in sub.iter() {
						out.set(sym(&format!("{tag}_{col}")), value.clone());
					}
				}
			}
		}
		Value::Object(out)
	}

	fn build(&self, ctx: &Context) -> Result<Vec<Value>, Error> {
		let merged = merge::execute(ctx, &self.plan, &self.tags, &self.tables)?;
		let mut rows = Vec::new();
		for row in merged.rows {
			// The whole predicate is re-applied as the post-filter; it
			// re-enforces dropped constraints and keeps the non-equality
			// conjuncts
			if let Some(pred) = &self.pred {
				if !pred.call(ctx, self.alias_args(&row))?.to_bool()? {
					continue;
				}
			}
			match &self.map {
				Some(map) => rows.push(map.call(ctx, self.alias_args(&row))?),
				None => rows.push(self.flatten(&row)),
			}
		}
		Ok(rows)
	}

	/// The on-disk materialization path for this join's content hash.
	fn cache_path(&self) -> std::path::PathBuf {
		CACHE_DIR.join(format!("{}.rows", self.digest.to_hex()))
	}
}

impl Materialize for JoinInner {
	fn materialize(&self, ctx: &Context) -> Result<Arc<Vec<Value>>, Error> {
		self.rows
			.get_or_try_init(|| {
				let path = self.cache_path();
				if let Ok(bytes) = std::fs::read(&path) {
					match codec::unmarshal_rows(&bytes) {
						Ok(rows) => {
							debug!(path = %path.display(), rows = rows.len(), "join loaded from cache");
							return Ok(Arc::new(rows));
						}
						Err(err) => {
							warn!(path = %path.display(), %err, "ignoring unreadable join cache");
						}
					}
				}
				let rows = self.build(ctx)?;
				debug!(rows = rows.len(), "join materialized");
				// Persisting the result is best-effort; a failed write
				// only loses the cache
				let mut buf = Vec::new();
				match codec::marshal_rows(ctx, &rows, &mut buf) {
					Ok(()) => {
						if let Err(err) = std::fs::create_dir_all(&*CACHE_DIR)
							.and_then(|_| std::fs::write(&path, &buf))
						{
							warn!(path = %path.display(), %err, "could not persist join result");
						}
					}
					Err(err) => {
						trace!(%err, "join result is not marshallable, skipping cache");
					}
				}
				Ok(Arc::new(rows))
			})
			.cloned()
	}
}

impl Tabular for JoinTable {
	fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| self.inner.digest)
	}

	fn len(&self, ctx: &Context, mode: Len) -> Result<usize, Error> {
		match mode {
			Len::Approx => {
				// Heuristic: the largest input, as an equijoin rarely
				// exceeds it and the exact answer requires a build
				let mut n = 0;
				for table in &self.inner.tables {
					n = n.max(table.len(ctx, Len::Approx)?);
				}
				Ok(n)
			}
			Len::Exact => Ok(self.inner.materialize(ctx)?.len()),
		}
	}

	fn scanner(&self, start: usize, limit: usize, total: usize) -> Box<dyn Scanner> {
		Box::new(LazyScanner::new(self.inner.clone(), start, limit, total))
	}

	fn prefetch(&self) {
		for table in &self.inner.tables {
			table.prefetch();
		}
	}

	fn marshal(&self, ctx: &Context, buf: &mut Vec<u8>) -> Result<(), Error> {
		let rows = collect(self.scanner(0, 1, 1), ctx)?;
		codec::marshal_rows(ctx, &rows, buf)
	}
}
