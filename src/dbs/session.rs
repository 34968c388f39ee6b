use crate::ana;
use crate::ctx::Context;
use crate::dbs::Response;
use crate::env::Env;
use crate::err::Error;
use crate::fnc;
use crate::syn::{self, Statement};
use crate::val::{Kind, Value};
use std::time::Instant;

/// An interactive evaluation session.
///
/// A session owns the binding environment: the shared builtin constants
/// frame plus the per-session mutable globals frame. Each statement runs
/// the parse, analyze, evaluate pipeline; a failing statement leaves the
/// prior globals intact and the session usable.
pub struct Session {
	env: Env,
	ctx: Context,
}

impl Default for Session {
	fn default() -> Self {
		Session::new()
	}
}

impl Session {
	pub fn new() -> Session {
		Session {
			env: Env::new(fnc::constants()),
			ctx: Context::background(),
		}
	}

	/// Create a session whose statements run under the given context, so
	/// the caller can cancel long scans or impose deadlines.
	pub fn with_context(ctx: Context) -> Session {
		Session {
			env: Env::new(fnc::constants()),
			ctx,
		}
	}

	/// The current binding environment
	pub fn env(&self) -> &Env {
		&self.env
	}

	/// Parse and run a program, producing one response per statement.
	pub fn execute(&mut self, src: &str) -> Vec<Response> {
		let started = Instant::now();
		let statements = match syn::parse(src) {
			Ok(statements) => statements,
			Err(err) => {
				return vec![Response {
					time: started.elapsed(),
					result: Err(err),
				}]
			}
		};
		let mut responses = Vec::with_capacity(statements.len());
		for statement in statements {
			let started = Instant::now();
			let result = self.execute_statement(src, statement);
			if let Err(err) = &result {
				debug!(%err, "statement failed");
			}
			responses.push(Response {
				time: started.elapsed(),
				result,
			});
		}
		responses
	}

	/// Run a program and return the last statement's value, failing on
	/// the first error. Convenient for embedding and tests.
	pub fn run(&mut self, src: &str) -> Result<Value, Error> {
		let mut last = Value::Null;
		for response in self.execute(src) {
			last = response.result?;
		}
		Ok(last)
	}

	fn execute_statement(&mut self, src: &str, statement: Statement) -> Result<Value, Error> {
		match statement {
			Statement::Load {
				path,
				..
			} => {
				debug!(%path, "loading file");
				let text = std::fs::read_to_string(&path)?;
				for response in self.execute(&text) {
					response.result?;
				}
				Ok(Value::Null)
			}
			Statement::Assign {
				name,
				expr,
				..
			} => {
				let mut expr = expr;
				let ctx = Context::new(&self.ctx);
				ana::analyze(&mut expr, &ctx, &self.env, src)?;
				let value = evaluated(expr.eval(&ctx, &mut self.env.clone())?)?;
				self.env.set_global(name, value.clone())?;
				trace!(name = %name, "bound global");
				Ok(value)
			}
			Statement::Expr(expr) => {
				let mut expr = expr;
				let ctx = Context::new(&self.ctx);
				ana::analyze(&mut expr, &ctx, &self.env, src)?;
				evaluated(expr.eval(&ctx, &mut self.env.clone())?)
			}
		}
	}
}

/// Struct-fragments never escape to the user.
fn evaluated(value: Value) -> Result<Value, Error> {
	match value {
		Value::Fragment(_) => Err(Error::TypeMismatch {
			expected: String::from("a value"),
			found: Kind::Fragment.to_string(),
		}),
		value => Ok(value),
	}
}
