use crate::ast::operator::BinaryOp;
use crate::ctx::Context;
use crate::err::Error;
use crate::fnc::operate;
use crate::sym::Symbol;
use crate::tbl::join::cartesian::Cartesian;
use crate::tbl::join::plan::{PlanNode, Side};
use crate::tbl::Table;
use crate::val::{Object, Value};
use std::cmp::Ordering;

/// The materialized output of one plan node, with the key axis it is
/// known to be sorted on. A merge node reports no sorted axis of its own:
/// sortedness is never claimed transitively across constraints.
pub(crate) struct NodeRows {
	pub rows: Vec<Value>,
	pub sorted: Option<Side>,
}

/// Read the join key of a merged row for one constraint side. A missing
/// or null sub-row reads as a null key.
fn key_of(row: &Value, side: Side, tags: &[Symbol]) -> Value {
	let Value::Object(merged) = row else {
		return Value::Null;
	};
	match merged.get(tags[side.table]) {
		Some(Value::Object(sub)) => sub.get(side.col).cloned().unwrap_or(Value::Null),
		_ => Value::Null,
	}
}

/// Union two merged rows. Alias sets of the two sides are disjoint by
/// construction.
fn union(left: &Value, right: Option<&Value>) -> Value {
	let mut out = Object::default();
	if let Value::Object(l) = left {
		for (k, v) in l.iter() {
			out.set(*k, v.clone());
		}
	}
	if let Some(Value::Object(r)) = right {
		for (k, v) in r.iter() {
			out.set(*k, v.clone());
		}
	}
	Value::Object(out)
}

fn all_null(row: &Value) -> bool {
	match row {
		Value::Object(o) => o.iter().all(|(_, v)| v.is_null()),
		_ => false,
	}
}

/// Execute a plan node, producing its merged rows.
pub(crate) fn execute(
	ctx: &Context,
	node: &PlanNode,
	tags: &[Symbol],
	tables: &[Table],
) -> Result<NodeRows, Error> {
	match node {
		PlanNode::Leaf(i) => {
			let mut rows = Vec::new();
			let mut scanner = tables[*i].scan();
			while scanner.advance(ctx) {
				let mut wrapped = Object::with_capacity(1);
				wrapped.set(tags[*i], scanner.current().clone());
				rows.push(Value::Object(wrapped));
			}
			if let Some(err) = scanner.take_failure() {
				return Err(err);
			}
			let sorted = tables[*i].sorted_on().map(|col| Side {
				table: *i,
				col,
			});
			Ok(NodeRows {
				rows,
				sorted,
			})
		}
		PlanNode::Merge {
			left,
			right,
			op,
			lkey,
			rkey,
		} => {
			let l = execute(ctx, left, tags, tables)?;
			let r = execute(ctx, right, tags, tables)?;
			let l = sorted_rows(l, *lkey, tags);
			let r = sorted_rows(r, *rkey, tags);
			let rows = sort_merge(ctx, l, r, *op, *lkey, *rkey, tags)?;
			Ok(NodeRows {
				rows,
				sorted: None,
			})
		}
		PlanNode::Cross {
			left,
			right,
		} => {
			let l = execute(ctx, left, tags, tables)?;
			let r = execute(ctx, right, tags, tables)?;
			let rows = cross_merge(ctx, l.rows, r.rows)?;
			Ok(NodeRows {
				rows,
				sorted: None,
			})
		}
	}
}

/// Sort a side by its key, unless it is already sorted on that axis.
fn sorted_rows(side: NodeRows, key: Side, tags: &[Symbol]) -> Vec<Value> {
	if side.sorted == Some(key) {
		trace!(col = %key.col, "merge input already sorted, skipping sort");
		return side.rows;
	}
	let mut rows = side.rows;
	rows.sort_by(|a, b| key_of(a, key, tags).cmp(&key_of(b, key, tags)));
	rows
}

/// The sort-merge executor over one equality constraint.
///
/// Each side is consumed as contiguous equal-key groups. Matching groups
/// emit their cartesian product; an unmatched group survives against a
/// single synthetic null row when the operator variant preserves its
/// side. Null keys never match, so null-keyed rows only survive through
/// the outer variants. The constraint is re-applied on every produced
/// pair, guarding against the approximate sorted-key comparison; a pair
/// the sorted order called equal but the operator rejects is skipped.
fn sort_merge(
	ctx: &Context,
	left: Vec<Value>,
	right: Vec<Value>,
	op: BinaryOp,
	lkey: Side,
	rkey: Side,
	tags: &[Symbol],
) -> Result<Vec<Value>, Error> {
	let preserve_left = matches!(op, BinaryOp::EqNullRight | BinaryOp::EqNullBoth);
	let preserve_right = matches!(op, BinaryOp::EqNullLeft | BinaryOp::EqNullBoth);
	let mut out = Vec::new();
	let (mut li, mut ri) = (0, 0);
	while li < left.len() || ri < right.len() {
		ctx.check()?;
		// Delimit the next equal-key group on each side
		let lg = li..group_end(&left, li, lkey, tags);
		let rg = ri..group_end(&right, ri, rkey, tags);
		let order = if lg.is_empty() {
			Ordering::Greater
		} else if rg.is_empty() {
			Ordering::Less
		} else {
			key_of(&left[li], lkey, tags).cmp(&key_of(&right[ri], rkey, tags))
		};
		match order {
			Ordering::Less => {
				if preserve_left {
					for row in &left[lg.clone()] {
						out.push(union(row, None));
					}
				}
				li = lg.end;
			}
			Ordering::Greater => {
				if preserve_right {
					for row in &right[rg.clone()] {
						out.push(union(row, None));
					}
				}
				ri = rg.end;
			}
			Ordering::Equal => {
				let lk = key_of(&left[li], lkey, tags);
				if lk.is_null() {
					// Null keys never match; each side falls back to its
					// outer emission
					if preserve_left {
						for row in &left[lg.clone()] {
							out.push(union(row, None));
						}
					}
					if preserve_right {
						for row in &right[rg.clone()] {
							out.push(union(row, None));
						}
					}
				} else {
					let lrows = &left[lg.clone()];
					let rrows = &right[rg.clone()];
					let mut lmatched = vec![false; lrows.len()];
					let mut rmatched = vec![false; rrows.len()];
					for offsets in Cartesian::new(vec![lrows.len(), rrows.len()])? {
						let lrow = &lrows[offsets[0]];
						let rrow = &rrows[offsets[1]];
						// The inline filter re-applies the constraint on
						// the exact key values, so keys the approximate
						// sorted order merged across kinds do not pair
						let exact = operate::equal_op(
							&key_of(lrow, lkey, tags),
							&key_of(rrow, rkey, tags),
							op,
						);
						if !exact {
							continue;
						}
						lmatched[offsets[0]] = true;
						rmatched[offsets[1]] = true;
						let merged = union(lrow, Some(rrow));
						if all_null(&merged) {
							continue;
						}
						out.push(merged);
					}
					// A row the inline filter left without any partner
					// still survives through its outer variant
					if preserve_left {
						for (i, row) in lrows.iter().enumerate() {
							if !lmatched[i] {
								out.push(union(row, None));
							}
						}
					}
					if preserve_right {
						for (i, row) in rrows.iter().enumerate() {
							if !rmatched[i] {
								out.push(union(row, None));
							}
						}
					}
				}
				li = lg.end;
				ri = rg.end;
			}
		}
	}
	Ok(out)
}

/// The end of the contiguous group sharing row `start`'s key.
fn group_end(rows: &[Value], start: usize, key: Side, tags: &[Symbol]) -> usize {
	if start >= rows.len() {
		return start;
	}
	let k = key_of(&rows[start], key, tags);
	let mut end = start + 1;
	while end < rows.len() && key_of(&rows[end], key, tags).cmp(&k) == Ordering::Equal {
		end += 1;
	}
	end
}

/// The cross-merge executor for sides no equality constraint binds. Both
/// sides are held in memory; for each outer row the inner set is
/// enumerated in full.
fn cross_merge(ctx: &Context, left: Vec<Value>, right: Vec<Value>) -> Result<Vec<Value>, Error> {
	// TODO: spill the inner side when both sides are very large
	debug!(outer = left.len(), inner = right.len(), "cross-merging unconstrained sides");
	let mut out = Vec::new();
	for offsets in Cartesian::new(vec![left.len(), right.len()])? {
		ctx.check()?;
		let merged = union(&left[offsets[0]], Some(&right[offsets[1]]));
		if all_null(&merged) {
			continue;
		}
		out.push(merged);
	}
	Ok(out)
}
