use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Object, Value};
use std::fmt::{self, Display, Formatter};

/// A struct literal `{ name: expr, ... }`.
///
/// Field names omitted by the writer are derived by the parser from the
/// expression shape; only regex field selections stay unnamed, because
/// they evaluate to fragments which splice their pairs in place.
#[derive(Clone, Debug)]
pub struct ObjectExpr {
	pub fields: Vec<(Option<Symbol>, Expr)>,
}

impl ObjectExpr {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let mut out = Object::with_capacity(self.fields.len());
		for (name, expr) in &self.fields {
			match (name, expr.eval(ctx, env)?) {
				// A fragment splices its pairs in place
				(_, Value::Fragment(pairs)) => {
					for (k, v) in pairs {
						out.set(k, v);
					}
				}
				(Some(name), value) => out.set(*name, value),
				(None, value) => {
					return Err(Error::Internal {
						message: format!("unnamed struct field evaluated to {}", value.kind()),
					})
				}
			}
		}
		Ok(Value::Object(out))
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let mut fold = Fold::new(b"gql:ast:object");
		for (name, expr) in &self.fields {
			if let Some(name) = name {
				fold = fold.digest(&name.digest());
			}
			fold = fold.digest(&expr.digest(env));
		}
		fold.finish()
	}
}

impl Display for ObjectExpr {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("{")?;
		for (i, (name, expr)) in self.fields.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			match name {
				Some(name) => write!(f, "{name}: {expr}")?,
				None => write!(f, "{expr}")?,
			}
		}
		f.write_str("}")
	}
}
