use crate::env::Env;
use crate::err::Error;
use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::fmt::{self, Display, Formatter};

/// A variable reference.
#[derive(Clone, Copy, Debug)]
pub struct Var {
	pub name: Symbol,
}

impl Var {
	pub(crate) fn compute(&self, env: &Env) -> Result<Value, Error> {
		match env.lookup(self.name) {
			Some(value) => Ok(value.clone()),
			None => Err(Error::UnboundVariable {
				name: self.name.to_string(),
			}),
		}
	}

	/// A variable reference merges the currently bound value's digest, so
	/// the same tree hashes differently under different bindings. An
	/// unbound name (a lambda parameter at capture time) hashes by name.
	pub(crate) fn digest(&self, env: &Env) -> Digest {
		let fold = Fold::new(b"gql:ast:var").digest(&self.name.digest());
		match env.lookup(self.name) {
			Some(value) => fold.digest(&value.digest()).finish(),
			None => fold.finish(),
		}
	}
}

impl Display for Var {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}", self.name)
	}
}
