use crate::ast::operator::{BinaryOp, UnaryOp};
use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::fnc::operate;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// An eager infix expression.
#[derive(Clone, Debug)]
pub struct Binary {
	pub op: BinaryOp,
	pub lhs: Box<Expr>,
	pub rhs: Box<Expr>,
}

impl Binary {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let lhs = self.lhs.eval(ctx, env)?;
		let rhs = self.rhs.eval(ctx, env)?;
		match self.op {
			BinaryOp::Add => operate::add(lhs, rhs),
			BinaryOp::Sub => operate::sub(lhs, rhs),
			BinaryOp::Mul => operate::mul(lhs, rhs),
			BinaryOp::Div => operate::div(lhs, rhs),
			BinaryOp::Rem => operate::rem(lhs, rhs),
			BinaryOp::Eq | BinaryOp::EqNullRight | BinaryOp::EqNullLeft | BinaryOp::EqNullBoth => {
				Ok(Value::Bool(operate::equal_op(&lhs, &rhs, self.op)))
			}
			BinaryOp::Ne => operate::not_equal(&lhs, &rhs),
			BinaryOp::Lt => operate::less_than(&lhs, &rhs),
			BinaryOp::Le => operate::less_than_or_equal(&lhs, &rhs),
			BinaryOp::Gt => operate::more_than(&lhs, &rhs),
			BinaryOp::Ge => operate::more_than_or_equal(&lhs, &rhs),
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		Fold::new(b"gql:ast:binary")
			.bytes(self.op.to_string().as_bytes())
			.digest(&self.lhs.digest(env))
			.digest(&self.rhs.digest(env))
			.finish()
	}
}

impl Display for Binary {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
	}
}

/// A unary prefix expression.
#[derive(Clone, Debug)]
pub struct Unary {
	pub op: UnaryOp,
	pub expr: Box<Expr>,
}

impl Unary {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let value = self.expr.eval(ctx, env)?;
		match self.op {
			UnaryOp::Neg => operate::neg(value),
			UnaryOp::Not => operate::not(value),
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		Fold::new(b"gql:ast:unary")
			.bytes(self.op.to_string().as_bytes())
			.digest(&self.expr.digest(env))
			.finish()
	}
}

impl Display for Unary {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}{}", self.op, self.expr)
	}
}
