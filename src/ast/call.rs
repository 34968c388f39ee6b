use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::fnc::args::ArgValue;
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Func, Value};
use std::fmt::{self, Display, Formatter};

/// One actual argument as written at the call site.
#[derive(Clone, Debug)]
pub struct CallArg {
	/// The name for a `name:=expr` actual
	pub name: Option<Symbol>,
	pub expr: Expr,
	/// Whether this actual is the left operand of a pipe, which exempts
	/// it from column-ref closure synthesis
	pub pipe: bool,
}

/// One formal argument slot after analysis. Closure-mode actuals have
/// already been rewritten into lambda expressions, and omitted optional
/// arguments into their default literals.
#[derive(Clone, Debug)]
pub enum ResolvedArg {
	One(Expr),
	Many(Vec<Expr>),
	Symbol(Symbol),
	Symbols(Vec<Symbol>),
}

/// The analyzer's resolution of a call site: the callee and one entry per
/// formal argument.
#[derive(Clone, Debug)]
pub struct Resolved {
	pub func: Func,
	pub args: Vec<ResolvedArg>,
}

/// A function call.
#[derive(Clone, Debug)]
pub struct Call {
	pub func: Box<Expr>,
	pub args: Vec<CallArg>,
	pub resolved: Option<Resolved>,
}

impl Call {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		match &self.resolved {
			Some(resolved) => {
				// Materialize actual values left to right. Lazy arguments
				// were rewritten into lambdas, so "materializing" them
				// builds the function value the callee evaluates.
				let mut actuals = Vec::with_capacity(resolved.args.len());
				for arg in &resolved.args {
					match arg {
						ResolvedArg::One(expr) => {
							actuals.push(ArgValue::One(expr.eval(ctx, env)?));
						}
						ResolvedArg::Many(exprs) => {
							let mut values = Vec::with_capacity(exprs.len());
							for expr in exprs {
								values.push(expr.eval(ctx, env)?);
							}
							actuals.push(ArgValue::Many(values));
						}
						ResolvedArg::Symbol(name) => {
							actuals.push(ArgValue::One(Value::from(name.name())));
						}
						ResolvedArg::Symbols(names) => {
							actuals.push(ArgValue::Many(
								names.iter().map(|n| Value::from(n.name())).collect(),
							));
						}
					}
				}
				resolved.func.invoke(ctx, actuals)
			}
			None => {
				// An unresolved callee is a runtime function value; such
				// calls are positional and eager only
				let func = self.func.eval(ctx, env)?;
				let func = func.to_func()?;
				let mut values = Vec::with_capacity(self.args.len());
				for arg in &self.args {
					if arg.name.is_some() {
						return Err(Error::ArityMismatch {
							name: func.name().to_owned(),
							message: String::from(
								"named arguments require a statically known callee",
							),
						});
					}
					values.push(arg.expr.eval(ctx, env)?);
				}
				func.call(ctx, values)
			}
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		// The digest covers the tree as written; resolution and folding
		// never change it
		let mut fold = Fold::new(b"gql:ast:call").digest(&self.func.digest(env));
		for arg in &self.args {
			if let Some(name) = arg.name {
				fold = fold.digest(&name.digest());
			}
			fold = fold.digest(&arg.expr.digest(env));
		}
		fold.finish()
	}
}

impl Display for Call {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}(", self.func)?;
		for (i, arg) in self.args.iter().enumerate() {
			if i > 0 {
				f.write_str(", ")?;
			}
			match arg.name {
				Some(name) => write!(f, "{name}:={}", arg.expr)?,
				None => write!(f, "{}", arg.expr)?,
			}
		}
		f.write_str(")")
	}
}
