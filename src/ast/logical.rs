use crate::ast::operator::LogicalOp;
use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// A short-circuiting logical expression. The right-hand side is never
/// evaluated when the left-hand side decides the result.
#[derive(Clone, Debug)]
pub struct Logical {
	pub op: LogicalOp,
	pub lhs: Box<Expr>,
	pub rhs: Box<Expr>,
}

impl Logical {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let lhs = self.lhs.eval(ctx, env)?.to_bool()?;
		match self.op {
			LogicalOp::And if !lhs => Ok(Value::Bool(false)),
			LogicalOp::Or if lhs => Ok(Value::Bool(true)),
			_ => Ok(Value::Bool(self.rhs.eval(ctx, env)?.to_bool()?)),
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let tag = match self.op {
			LogicalOp::And => b"gql:ast:and".as_slice(),
			LogicalOp::Or => b"gql:ast:or".as_slice(),
		};
		Fold::new(tag).digest(&self.lhs.digest(env)).digest(&self.rhs.digest(env)).finish()
	}
}

impl Display for Logical {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
	}
}
