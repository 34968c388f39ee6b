use crate::ana::AnalyzedType;
use crate::ast::{Expr, Node};
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::fnc::args::{ArgValue, FormalArgs};
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// The return-type callback consulted when an allow-list does not decide.
pub type RetFn = fn(&[AnalyzedType]) -> AnalyzedType;

/// How a function executes when called.
pub enum Exec {
	/// A native builtin, receiving one argument value per formal slot
	Builtin(fn(&Context, Vec<ArgValue>) -> Result<Value, Error>),
	/// A user lambda body evaluated over the captured environment
	Body {
		params: Vec<Symbol>,
		body: Arc<Expr>,
	},
}

/// A function value.
#[derive(Clone)]
pub struct Func(Arc<FuncInner>);

pub struct FuncInner {
	/// The function name, used in diagnostics
	pub name: String,
	/// Whether this is a registered builtin
	pub builtin: bool,
	/// The formal argument descriptors
	pub args: FormalArgs,
	/// The return-type callback
	pub ret: RetFn,
	/// The execution callback or lambda body
	pub exec: Exec,
	/// The environment captured at lambda creation
	pub env: Option<Env>,
	/// The cached content digest
	digest: OnceCell<Digest>,
}

impl Func {
	/// Create a builtin function value
	pub fn builtin(
		name: &str,
		args: FormalArgs,
		ret: RetFn,
		exec: fn(&Context, Vec<ArgValue>) -> Result<Value, Error>,
	) -> Result<Func, Error> {
		args.validate(name)?;
		Ok(Func(Arc::new(FuncInner {
			name: name.to_owned(),
			builtin: true,
			args,
			ret,
			exec: Exec::Builtin(exec),
			env: None,
			digest: OnceCell::new(),
		})))
	}

	/// Create a user lambda capturing a clone of the current environment
	pub fn lambda(params: Vec<Symbol>, body: Arc<Expr>, env: Env) -> Func {
		let args = FormalArgs::lambda(&params);
		Func(Arc::new(FuncInner {
			name: String::from("lambda"),
			builtin: false,
			args,
			ret: |_| AnalyzedType::Any,
			exec: Exec::Body {
				params,
				body,
			},
			env: Some(env),
			digest: OnceCell::new(),
		}))
	}

	/// The function name
	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// Whether this is a registered builtin
	pub fn is_builtin(&self) -> bool {
		self.0.builtin
	}

	/// The formal argument descriptors
	pub fn formals(&self) -> &FormalArgs {
		&self.0.args
	}

	/// The shared inner state
	pub fn inner(&self) -> &FuncInner {
		&self.0
	}

	/// The return-type callback
	pub fn ret(&self) -> RetFn {
		self.0.ret
	}

	/// Invoke the function with one materialized argument per formal slot.
	pub fn invoke(&self, ctx: &Context, actuals: Vec<ArgValue>) -> Result<Value, Error> {
		match &self.0.exec {
			Exec::Builtin(f) => {
				ctx.check()?;
				f(ctx, actuals)
			}
			Exec::Body {
				..
			} => {
				let mut values = Vec::with_capacity(actuals.len());
				for actual in actuals {
					match actual {
						ArgValue::One(v) => values.push(v),
						ArgValue::Many(vs) => values.extend(vs),
					}
				}
				self.call(ctx, values)
			}
		}
	}

	/// Call the function with a flat list of materialized argument values.
	pub fn call(&self, ctx: &Context, actuals: Vec<Value>) -> Result<Value, Error> {
		ctx.check()?;
		match &self.0.exec {
			Exec::Builtin(f) => {
				// Align the flat values against the formal list, so a
				// builtin called as a runtime value still receives one
				// argument per formal slot
				let names = vec![None; actuals.len()];
				let slots = self.0.args.match_actuals(&self.0.name, &names)?;
				let mut aligned = Vec::with_capacity(slots.len());
				for slot in slots {
					match slot {
						crate::fnc::args::Slot::Actual(i) => {
							aligned.push(ArgValue::One(actuals[i].clone()));
						}
						crate::fnc::args::Slot::Variadic(indices) => {
							aligned.push(ArgValue::Many(
								indices.into_iter().map(|i| actuals[i].clone()).collect(),
							));
						}
						crate::fnc::args::Slot::Default(value) => {
							aligned.push(ArgValue::One(value));
						}
						crate::fnc::args::Slot::DefaultSymbol(symbol) => {
							aligned.push(ArgValue::One(Value::from(symbol.name())));
						}
					}
				}
				f(ctx, aligned)
			}
			Exec::Body {
				params,
				body,
			} => {
				if actuals.len() != params.len() {
					return Err(Error::ArityMismatch {
						name: self.0.name.clone(),
						message: format!(
							"expected {} arguments, got {}",
							params.len(),
							actuals.len()
						),
					});
				}
				// The captured environment is cloned per call so that
				// concurrent scanners can evaluate the same lambda
				let mut env = match &self.0.env {
					Some(env) => env.clone(),
					None => {
						return Err(Error::Internal {
							message: format!("lambda {} has no captured environment", self.0.name),
						})
					}
				};
				env.push_frame(params.iter().copied().zip(actuals).collect());
				let result = body.eval(ctx, &mut env);
				env.pop();
				result
			}
		}
	}

	/// When the function is a unary lambda of the exact shape `|_| _.col`,
	/// the column it extracts. Sorted tables advertise this column so that
	/// a sort over the same key can be skipped.
	pub fn sort_key_column(&self) -> Option<Symbol> {
		match &self.0.exec {
			Exec::Body {
				params,
				body,
			} if params.len() == 1 => match &body.node {
				Node::Field(field) => match &field.expr.node {
					Node::Var(var) if var.name == params[0] => Some(field.name),
					_ => None,
				},
				_ => None,
			},
			_ => None,
		}
	}

	/// The content digest.
	///
	/// Builtins hash by name. A user lambda folds the body's hash with the
	/// captured environment's hash, so two lambdas built from the same
	/// source text with different captures have distinct identities.
	pub fn digest(&self) -> Digest {
		*self.0.digest.get_or_init(|| match &self.0.exec {
			Exec::Builtin(_) => {
				Fold::new(b"gql:value:func:builtin").bytes(self.0.name.as_bytes()).finish()
			}
			Exec::Body {
				params,
				body,
			} => {
				let env = self.0.env.clone().unwrap_or_default();
				let mut fold = Fold::new(b"gql:value:func:lambda");
				for param in params {
					fold = fold.digest(&param.digest());
				}
				fold.digest(&body.digest(&env)).digest(&env.digest()).finish()
			}
		})
	}
}

impl PartialEq for Func {
	fn eq(&self, other: &Self) -> bool {
		self.digest() == other.digest()
	}
}

impl Eq for Func {}

impl fmt::Debug for Func {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.debug_struct("Func").field("name", &self.0.name).finish()
	}
}

impl Display for Func {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match &self.0.exec {
			Exec::Builtin(_) => write!(f, "{}", self.0.name),
			Exec::Body {
				params,
				body,
			} => {
				f.write_str("|")?;
				for (i, param) in params.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{param}")?;
				}
				write!(f, "|{body}")
			}
		}
	}
}
