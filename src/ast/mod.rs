pub(crate) mod binary;
pub(crate) mod block;
pub(crate) mod call;
pub(crate) mod closure;
pub(crate) mod column;
pub(crate) mod cond;
pub(crate) mod field;
pub(crate) mod literal;
pub(crate) mod logical;
pub(crate) mod object;
pub(crate) mod operator;
pub(crate) mod var;

pub use binary::{Binary, Unary};
pub use block::{Block, Entry};
pub use call::{Call, CallArg, Resolved, ResolvedArg};
pub use closure::Lambda;
pub use column::Column;
pub use cond::Cond;
pub use field::{Field, FieldRegex};
pub use literal::Literal;
pub use logical::Logical;
pub use object::ObjectExpr;
pub use operator::{BinaryOp, LogicalOp, UnaryOp};
pub use var::Var;

use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::val::{Digest, Value};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A byte range within the source text of a statement.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pos {
	pub start: u32,
	pub end: u32,
}

impl Pos {
	pub fn new(start: usize, end: usize) -> Pos {
		Pos {
			start: start as u32,
			end: end as u32,
		}
	}
	/// Merge two positions into their covering range
	pub fn cover(&self, other: Pos) -> Pos {
		Pos {
			start: self.start.min(other.start),
			end: self.end.max(other.end),
		}
	}
}

/// One expression node with its source position.
#[derive(Clone, Debug)]
pub struct Expr {
	pub pos: Pos,
	pub node: Node,
}

/// The syntactic node variants.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum Node {
	/// A literal value, possibly the result of constant folding
	Literal(Literal),
	/// A variable reference
	Var(Var),
	/// A direct column dereference `$col` of the ambient row binding
	Column(Column),
	/// An implicit column reference `&col`, rewritten during analysis
	ImplicitColumn(Column),
	/// A struct field access `parent.field`
	Field(Field),
	/// A struct field regex selection `parent./re/`
	FieldRegex(FieldRegex),
	/// A struct literal `{ fields }`
	Object(ObjectExpr),
	/// A conditional `if c t else e` or `cond(c, t, e)`
	Cond(Cond),
	/// A short-circuiting `&&` or `||`
	Logical(Logical),
	/// A unary `-` or `!`
	Unary(Unary),
	/// An eager infix operator
	Binary(Binary),
	/// A lambda `|params| expr` or `func(params) {body}`
	Lambda(Lambda),
	/// A statement block `{ statements; expr }`
	Block(Block),
	/// A function call
	Call(Call),
}

impl Expr {
	pub fn new(pos: Pos, node: Node) -> Expr {
		Expr {
			pos,
			node,
		}
	}

	/// Build a literal expression with no source counterpart
	pub fn literal(value: Value) -> Expr {
		Expr {
			pos: Pos::default(),
			node: Node::Literal(Literal {
				value,
				original: None,
			}),
		}
	}

	/// Evaluate this expression eagerly, left to right, depth first.
	/// Only `Cond`, `Logical` and lazy call arguments short-circuit.
	pub fn eval(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		match &self.node {
			Node::Literal(v) => v.compute(),
			Node::Var(v) => v.compute(env),
			Node::Column(v) => v.compute(env),
			Node::ImplicitColumn(v) => Err(Error::Internal {
				message: format!("implicit column reference &{} survived analysis", v.name),
			}),
			Node::Field(v) => v.compute(ctx, env),
			Node::FieldRegex(v) => v.compute(ctx, env),
			Node::Object(v) => v.compute(ctx, env),
			Node::Cond(v) => v.compute(ctx, env),
			Node::Logical(v) => v.compute(ctx, env),
			Node::Unary(v) => v.compute(ctx, env),
			Node::Binary(v) => v.compute(ctx, env),
			Node::Lambda(v) => v.compute(env),
			Node::Block(v) => v.compute(ctx, env),
			Node::Call(v) => v.compute(ctx, env),
		}
	}

	/// The variant-tagged content digest of this node.
	///
	/// The digest is order-sensitive in all positional children and merges
	/// the bound value's digest for variable references, so it depends only
	/// on the normalized tree shape and the values of free variables. A
	/// folded literal hashes as the subtree it replaced.
	pub fn digest(&self, env: &Env) -> Digest {
		match &self.node {
			Node::Literal(v) => v.digest(env),
			Node::Var(v) => v.digest(env),
			Node::Column(v) => v.digest(b"gql:ast:column"),
			Node::ImplicitColumn(v) => v.digest(b"gql:ast:implicit-column"),
			Node::Field(v) => v.digest(env),
			Node::FieldRegex(v) => v.digest(env),
			Node::Object(v) => v.digest(env),
			Node::Cond(v) => v.digest(env),
			Node::Logical(v) => v.digest(env),
			Node::Unary(v) => v.digest(env),
			Node::Binary(v) => v.digest(env),
			Node::Lambda(v) => v.digest(env),
			Node::Block(v) => v.digest(env),
			Node::Call(v) => v.digest(env),
		}
	}
}

impl Display for Expr {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match &self.node {
			Node::Literal(v) => Display::fmt(v, f),
			Node::Var(v) => Display::fmt(v, f),
			Node::Column(v) => write!(f, "${}", v.name),
			Node::ImplicitColumn(v) => write!(f, "&{}", v.name),
			Node::Field(v) => Display::fmt(v, f),
			Node::FieldRegex(v) => Display::fmt(v, f),
			Node::Object(v) => Display::fmt(v, f),
			Node::Cond(v) => Display::fmt(v, f),
			Node::Logical(v) => Display::fmt(v, f),
			Node::Unary(v) => Display::fmt(v, f),
			Node::Binary(v) => Display::fmt(v, f),
			Node::Lambda(v) => Display::fmt(v, f),
			Node::Block(v) => Display::fmt(v, f),
			Node::Call(v) => Display::fmt(v, f),
		}
	}
}
