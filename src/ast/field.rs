use crate::ast::Expr;
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::sym::{sym, Symbol};
use crate::val::digest::Fold;
use crate::val::{Digest, Kind, Object, Value};
use regex::Regex;
use std::fmt::{self, Display, Formatter};

/// A struct field access `parent.field`.
///
/// A null parent propagates null, so projections over outer-joined rows
/// read the missing side's columns as null.
#[derive(Clone, Debug)]
pub struct Field {
	pub expr: Box<Expr>,
	pub name: Symbol,
}

impl Field {
	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		match self.expr.eval(ctx, env)? {
			Value::Null => Ok(Value::Null),
			Value::Object(parent) => Ok(parent.get(self.name).cloned().unwrap_or(Value::Null)),
			value => Err(Error::TypeMismatch {
				expected: Kind::Struct.to_string(),
				found: value.kind().to_string(),
			}),
		}
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		Fold::new(b"gql:ast:field")
			.digest(&self.expr.digest(env))
			.digest(&self.name.digest())
			.finish()
	}
}

impl Display for Field {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}.{}", self.expr, self.name)
	}
}

/// A struct field regex selection `parent./re/`.
///
/// Produces a struct-fragment of every matching (name, value) pair, which
/// the enclosing struct literal splices in place. Fragments never escape
/// to the user.
#[derive(Clone, Debug)]
pub struct FieldRegex {
	pub expr: Box<Expr>,
	pub pattern: String,
	pub regex: Regex,
}

impl FieldRegex {
	pub fn new(expr: Box<Expr>, pattern: String) -> Result<FieldRegex, Error> {
		let regex = Regex::new(&pattern)?;
		Ok(FieldRegex {
			expr,
			pattern,
			regex,
		})
	}

	pub(crate) fn compute(&self, ctx: &Context, env: &mut Env) -> Result<Value, Error> {
		let parent = self.expr.eval(ctx, env)?;
		let parent = parent.to_object()?;
		let mut fragment = Object::default();
		for (name, value) in parent.iter() {
			if self.regex.is_match(&name.name()) {
				fragment.set(*name, value.clone());
			}
		}
		if fragment.is_empty() {
			return Err(Error::NoRegexMatch {
				regex: self.pattern.clone(),
			});
		}
		Ok(Value::Fragment(fragment))
	}

	pub(crate) fn digest(&self, env: &Env) -> Digest {
		Fold::new(b"gql:ast:field-regex")
			.digest(&self.expr.digest(env))
			.digest(&sym(&self.pattern).digest())
			.finish()
	}
}

impl Display for FieldRegex {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}./{}/", self.expr, self.pattern)
	}
}
