use crate::ast::Expr;
use crate::env::Env;
use crate::err::Error;
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A lambda literal. Evaluation produces a function value capturing a
/// clone of the current environment, so captures form a DAG: the lambda
/// never holds a live reference into the frame it was created under.
#[derive(Clone, Debug)]
pub struct Lambda {
	pub params: Vec<Symbol>,
	pub body: Arc<Expr>,
}

impl Lambda {
	pub(crate) fn compute(&self, env: &Env) -> Result<Value, Error> {
		Ok(Value::Func(Func::lambda(self.params.clone(), self.body.clone(), env.clone())))
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let mut fold = Fold::new(b"gql:ast:lambda");
		for param in &self.params {
			fold = fold.digest(&param.digest());
		}
		fold.digest(&self.body.digest(env)).finish()
	}
}

impl Display for Lambda {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("|")?;
		for (i, param) in self.params.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{param}")?;
		}
		write!(f, "|{}", self.body)
	}
}
