use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// One entry of a block.
#[derive(Clone, Debug)]
pub enum Entry {
	/// A local binding `name := expr`
	Assign(Symbol, Expr),
	/// A bare expression
	Value(Expr),
}

/// A statement block `{ statements; expr }`.
///
/// A block pushes one frame, binds its assignments there, and returns the
/// value of its last entry. The frame is popped on every exit path, so
/// block-local names never leak into the enclosing scope.
#[derive(Clone, Debug)]
pub struct Block {
	pub entries: Vec<Entry>,
}

impl Block {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		env.push_empty();
		let result = self.compute_inner(ctx, env);
		env.pop();
		result
	}

	fn compute_inner(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let mut last = Value::Null;
		for entry in &self.entries {
			match entry {
				Entry::Assign(name, expr) => {
					let value = expr.eval(ctx, env)?;
					env.set(*name, value);
					last = Value::Null;
				}
				Entry::Value(expr) => {
					last = expr.eval(ctx, env)?;
				}
			}
		}
		Ok(last)
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let mut fold = Fold::new(b"gql:ast:block");
		for entry in &self.entries {
			match entry {
				Entry::Assign(name, expr) => {
					fold = fold.digest(&name.digest()).digest(&expr.digest(env));
				}
				Entry::Value(expr) => {
					fold = fold.digest(&expr.digest(env));
				}
			}
		}
		fold.finish()
	}
}

impl Display for Block {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("{")?;
		for (i, entry) in self.entries.iter().enumerate() {
			if i > 0 {
				f.write_str("; ")?;
			}
			match entry {
				Entry::Assign(name, expr) => write!(f, "{name} := {expr}")?,
				Entry::Value(expr) => write!(f, "{expr}")?,
			}
		}
		f.write_str("}")
	}
}
