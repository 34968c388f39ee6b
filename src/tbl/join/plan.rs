use crate::ast::{Expr, Node};
use crate::ast::operator::{BinaryOp, LogicalOp};
use crate::sym::Symbol;

/// One side of an equality constraint: a sub-table index and the key
/// column read from that sub-table's rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Side {
	pub table: usize,
	pub col: Symbol,
}

/// One `==`-family leaf of a join predicate.
#[derive(Clone, Debug)]
pub(crate) struct Constraint {
	pub op: BinaryOp,
	pub left: Side,
	pub right: Side,
}

/// The executable join tree.
#[derive(Debug)]
pub(crate) enum PlanNode {
	/// One sub-table, rows wrapped as a one-field struct `{alias: row}`
	Leaf(usize),
	/// A sort-merge node over one equality constraint
	Merge {
		left: Box<PlanNode>,
		right: Box<PlanNode>,
		op: BinaryOp,
		lkey: Side,
		rkey: Side,
	},
	/// A cross-merge node for sides no equality constraint binds
	Cross {
		left: Box<PlanNode>,
		right: Box<PlanNode>,
	},
}

impl PlanNode {
	/// The set of sub-table indices under this node, as a bitmask
	pub fn mask(&self) -> u8 {
		match self {
			PlanNode::Leaf(i) => 1 << i,
			PlanNode::Merge {
				left,
				right,
				..
			}
			| PlanNode::Cross {
				left,
				right,
			} => left.mask() | right.mask(),
		}
	}
}

/// Mirror a constraint operator when its sides are swapped.
fn mirror(op: BinaryOp) -> BinaryOp {
	match op {
		BinaryOp::EqNullRight => BinaryOp::EqNullLeft,
		BinaryOp::EqNullLeft => BinaryOp::EqNullRight,
		op => op,
	}
}

/// Extract the equality-constraint list from a join predicate by
/// descending `&&` nodes and collecting each `tagA.colX == tagB.colY`
/// leaf. Anything else stays in the predicate, which is re-applied as the
/// post-filter.
pub(crate) fn extract(expr: &Expr, aliases: &[Symbol], out: &mut Vec<Constraint>) {
	match &expr.node {
		Node::Logical(logical) if logical.op == LogicalOp::And => {
			extract(&logical.lhs, aliases, out);
			extract(&logical.rhs, aliases, out);
		}
		Node::Binary(binary) if binary.op.is_equality() => {
			if let (Some(left), Some(right)) =
				(side_of(&binary.lhs, aliases), side_of(&binary.rhs, aliases))
			{
				if left.table != right.table {
					out.push(Constraint {
						op: binary.op,
						left,
						right,
					});
				}
			}
		}
		_ => {}
	}
}

/// Recognize a `tag.col` reference over one of the join aliases.
fn side_of(expr: &Expr, aliases: &[Symbol]) -> Option<Side> {
	let Node::Field(field) = &expr.node else {
		return None;
	};
	let Node::Var(var) = &field.expr.node else {
		return None;
	};
	let table = aliases.iter().position(|a| *a == var.name)?;
	Some(Side {
		table,
		col: field.name,
	})
}

/// Build the join tree from the constraint list.
///
/// While constraints remain: a constraint with one side in the current
/// root and the other on an unattached leaf attaches that leaf with a
/// sort-merge node; a constraint with both sides already in the root is
/// dropped, the post-filter re-enforces it. When no constraint touches
/// the root, the first remaining constraint starts a new branch, and the
/// branches are cross-joined. Tables no constraint reaches are
/// cross-joined to the root last.
pub(crate) fn plan(n_tables: usize, constraints: &[Constraint]) -> PlanNode {
	let mut remaining: Vec<Constraint> = constraints.to_vec();
	let mut root: Option<PlanNode> = None;
	while !remaining.is_empty() {
		if let Some(node) = root.take() {
			let mask = node.mask();
			match remaining.iter().position(|c| {
				mask & (1 << c.left.table) != 0 || mask & (1 << c.right.table) != 0
			}) {
				Some(i) => {
					let c = remaining.remove(i);
					let l_in = mask & (1 << c.left.table) != 0;
					let r_in = mask & (1 << c.right.table) != 0;
					root = Some(if l_in && r_in {
						// Both sides already joined: the post-filter
						// re-enforces this constraint
						node
					} else if l_in {
						PlanNode::Merge {
							left: Box::new(node),
							right: Box::new(PlanNode::Leaf(c.right.table)),
							op: c.op,
							lkey: c.left,
							rkey: c.right,
						}
					} else {
						PlanNode::Merge {
							left: Box::new(node),
							right: Box::new(PlanNode::Leaf(c.left.table)),
							op: mirror(c.op),
							lkey: c.right,
							rkey: c.left,
						}
					});
					continue;
				}
				None => {
					// The next constraint references a disjoint table set:
					// start a new branch and cross-join it in
					let c = remaining.remove(0);
					let branch = PlanNode::Merge {
						left: Box::new(PlanNode::Leaf(c.left.table)),
						right: Box::new(PlanNode::Leaf(c.right.table)),
						op: c.op,
						lkey: c.left,
						rkey: c.right,
					};
					root = Some(PlanNode::Cross {
						left: Box::new(node),
						right: Box::new(branch),
					});
					continue;
				}
			}
		}
		let c = remaining.remove(0);
		root = Some(PlanNode::Merge {
			left: Box::new(PlanNode::Leaf(c.left.table)),
			right: Box::new(PlanNode::Leaf(c.right.table)),
			op: c.op,
			lkey: c.left,
			rkey: c.right,
		});
	}
	// Cross-join any table no constraint attached
	let mut root = root.unwrap_or(PlanNode::Leaf(0));
	for table in 0..n_tables {
		if root.mask() & (1 << table) == 0 {
			root = PlanNode::Cross {
				left: Box::new(root),
				right: Box::new(PlanNode::Leaf(table)),
			};
		}
	}
	root
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sym::sym;

	fn side(table: usize, col: &str) -> Side {
		Side {
			table,
			col: sym(col),
		}
	}

	fn eq(l: Side, r: Side) -> Constraint {
		Constraint {
			op: BinaryOp::Eq,
			left: l,
			right: r,
		}
	}

	#[test]
	fn single_constraint_builds_one_merge() {
		let p = plan(2, &[eq(side(0, "k"), side(1, "k"))]);
		assert!(matches!(p, PlanNode::Merge { .. }));
		assert_eq!(p.mask(), 0b11);
	}

	#[test]
	fn chained_constraints_attach_to_the_root() {
		let p = plan(
			3,
			&[eq(side(0, "a"), side(1, "b")), eq(side(1, "c"), side(2, "d"))],
		);
		// The second constraint attaches table 2 under a second merge
		let PlanNode::Merge {
			left,
			right,
			lkey,
			rkey,
			..
		} = p
		else {
			panic!("expected a merge root");
		};
		assert_eq!(left.mask(), 0b011);
		assert_eq!(right.mask(), 0b100);
		assert_eq!(lkey, side(1, "c"));
		assert_eq!(rkey, side(2, "d"));
	}

	#[test]
	fn swapped_constraint_mirrors_the_operator() {
		// The root holds tables 0 and 1; the next constraint is written
		// with the new table on the left
		let constraints = vec![
			eq(side(0, "a"), side(1, "b")),
			Constraint {
				op: BinaryOp::EqNullRight,
				left: side(2, "c"),
				right: side(0, "a"),
			},
		];
		let PlanNode::Merge {
			op,
			lkey,
			rkey,
			..
		} = plan(3, &constraints)
		else {
			panic!("expected a merge root");
		};
		assert_eq!(op, BinaryOp::EqNullLeft);
		assert_eq!(lkey, side(0, "a"));
		assert_eq!(rkey, side(2, "c"));
	}

	#[test]
	fn disjoint_constraints_cross_join_branches() {
		let p = plan(
			4,
			&[eq(side(0, "a"), side(1, "a")), eq(side(2, "b"), side(3, "b"))],
		);
		assert!(matches!(p, PlanNode::Cross { .. }));
		assert_eq!(p.mask(), 0b1111);
	}

	#[test]
	fn unconstrained_tables_are_cross_joined() {
		let p = plan(3, &[eq(side(0, "k"), side(1, "k"))]);
		let PlanNode::Cross {
			left,
			right,
		} = p
		else {
			panic!("expected a cross root");
		};
		assert_eq!(left.mask(), 0b011);
		assert_eq!(right.mask(), 0b100);
	}

	#[test]
	fn no_constraints_is_a_pure_cross_join() {
		let p = plan(2, &[]);
		assert!(matches!(p, PlanNode::Cross { .. }));
		assert_eq!(p.mask(), 0b11);
	}

	#[test]
	fn redundant_constraint_is_dropped() {
		let p = plan(
			2,
			&[eq(side(0, "a"), side(1, "a")), eq(side(0, "b"), side(1, "b"))],
		);
		// The second constraint closes no new table, so the tree stays
		// a single merge and the post-filter enforces it
		let PlanNode::Merge {
			left,
			right,
			..
		} = p
		else {
			panic!("expected a merge root");
		};
		assert!(matches!(*left, PlanNode::Leaf(0)));
		assert!(matches!(*right, PlanNode::Leaf(1)));
	}
}
