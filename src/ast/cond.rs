use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// A conditional expression. Only the selected branch is evaluated; a
/// missing else branch is an implicit null.
#[derive(Clone, Debug)]
pub struct Cond {
	pub cond: Box<Expr>,
	pub then: Box<Expr>,
	pub otherwise: Option<Box<Expr>>,
}

impl Cond {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		if self.cond.eval(ctx, env)?.to_bool()? {
			self.then.eval(ctx, env)
		} else {
			match &self.otherwise {
				Some(otherwise) => otherwise.eval(ctx, env),
				None => Ok(Value::Null),
			}
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let mut fold = Fold::new(b"gql:ast:cond")
			.digest(&self.cond.digest(env))
			.digest(&self.then.digest(env));
		if let Some(otherwise) = &self.otherwise {
			fold = fold.digest(&otherwise.digest(env));
		}
		fold.finish()
	}
}

impl Display for Cond {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "if {} {}", self.cond, self.then)?;
		if let Some(otherwise) = &self.otherwise {
			write!(f, " else {otherwise}")?;
		}
		Ok(())
	}
}
