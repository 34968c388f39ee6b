use crate::ast::Expr;
use crate::env::Env;
use crate::err::Error;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// A literal value.
///
/// A literal is either written in the source, or produced by the analyzer
/// replacing a constant subtree. In the latter case `original` points back
/// at the replaced subtree so that error messages quote what the
/// programmer wrote, and so that the node's digest is unchanged by folding.
#[derive(Clone, Debug)]
pub struct Literal {
	pub value: Value,
	pub original: Option<Box<Expr>>,
}

impl Literal {
	pub(crate) fn compute(&self) -> Result<Value, Error> {
		Ok(self.value.clone())
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		match &self.original {
			Some(original) => original.digest(env),
			None => self.value.digest(),
		}
	}
}

impl Display for Literal {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match &self.original {
			Some(original) => Display::fmt(original, f),
			None => Display::fmt(&self.value, f),
		}
	}
}
