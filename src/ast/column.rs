use crate::env::Env;
use crate::err::Error;
use crate::sym::{Symbol, ROW};
use crate::val::digest::Fold;
use crate::val::{Digest, Kind, Value};

/// A column reference within the ambient row.
///
/// `$col` dereferences the anonymous row binding `_` directly, and is only
/// valid where `_` is already bound. `&col` is never evaluated: the
/// analyzer rewrites the enclosing actual into a lambda `|_| _.col`, which
/// is how `&` introduces the binding that `$` assumes.
#[derive(Clone, Copy, Debug)]
pub struct Column {
	pub name: Symbol,
}

impl Column {
	pub(crate) fn compute(&self, env: &Env) -> Result<Value, Error> {
		let row = match env.lookup(*ROW) {
			Some(value) => value,
			None => {
				return Err(Error::UnboundVariable {
					name: ROW.to_string(),
				})
			}
		};
		match row {
			Value::Object(row) => Ok(row.get(self.name).cloned().unwrap_or(Value::Null)),
			value => Err(Error::TypeMismatch {
				expected: Kind::Struct.to_string(),
				found: value.kind().to_string(),
			}),
		}
	}

	pub(crate) fn digest(&self, tag: &[u8]) -> Digest {
		Fold::new(tag).digest(&self.name.digest()).finish()
	}
}
