use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use once_cell::sync::OnceCell;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

/// A struct value: an ordered sequence of (symbol, value) pairs.
///
/// The same name never appears twice; setting an existing name replaces the
/// value in place so field order stays stable. Field order controls column
/// order when printing and writing. Field access is a linear scan, which is
/// fine as the pair count is bounded by the source schema.
#[derive(Clone, Debug, Default)]
pub struct Object {
	fields: Vec<(Symbol, Value)>,
	digest: OnceCell<Digest>,
}

impl From<Vec<(Symbol, Value)>> for Object {
	fn from(fields: Vec<(Symbol, Value)>) -> Self {
		let mut obj = Object::default();
		for (name, value) in fields {
			obj.set(name, value);
		}
		obj
	}
}

impl Deref for Object {
	type Target = [(Symbol, Value)];
	fn deref(&self) -> &Self::Target {
		&self.fields
	}
}

impl IntoIterator for Object {
	type Item = (Symbol, Value);
	type IntoIter = std::vec::IntoIter<Self::Item>;
	fn into_iter(self) -> Self::IntoIter {
		self.fields.into_iter()
	}
}

impl PartialEq for Object {
	fn eq(&self, other: &Self) -> bool {
		self.digest() == other.digest()
	}
}

impl Eq for Object {}

impl Object {
	/// Create an object with capacity for a known number of fields
	pub fn with_capacity(n: usize) -> Object {
		Object {
			fields: Vec::with_capacity(n),
			digest: OnceCell::new(),
		}
	}
	/// Get a field value by name
	pub fn get(&self, name: Symbol) -> Option<&Value> {
		self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
	}
	/// Set a field, replacing any existing value under the same name
	pub fn set(&mut self, name: Symbol, value: Value) {
		self.digest = OnceCell::new();
		match self.fields.iter_mut().find(|(k, _)| *k == name) {
			Some((_, v)) => *v = value,
			None => self.fields.push((name, value)),
		}
	}
	/// The number of fields
	pub fn len(&self) -> usize {
		self.fields.len()
	}
	/// Whether the object has no fields
	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
	/// Iterate over the fields in declaration order
	pub fn iter(&self) -> std::slice::Iter<'_, (Symbol, Value)> {
		self.fields.iter()
	}
	/// The content digest, computed once and cached
	pub fn digest(&self) -> Digest {
		*self.digest.get_or_init(|| {
			let mut fold = Fold::new(b"gql:value:struct");
			for (name, value) in &self.fields {
				fold = fold.digest(&name.digest()).digest(&value.digest());
			}
			fold.finish()
		})
	}
}

impl Display for Object {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str("{")?;
		for (i, (name, value)) in self.fields.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{name}:{value}")?;
		}
		f.write_str("}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn later_value_wins_in_place() {
		let mut obj = Object::default();
		obj.set("a".into(), Value::from(1));
		obj.set("b".into(), Value::from(2));
		obj.set("a".into(), Value::from(3));
		assert_eq!(obj.len(), 2);
		assert_eq!(obj.get("a".into()), Some(&Value::from(3)));
		assert_eq!(obj.to_string(), "{a:3,b:2}");
	}

	#[test]
	fn digest_depends_on_field_order() {
		let mut ab = Object::default();
		ab.set("a".into(), Value::from(1));
		ab.set("b".into(), Value::from(2));
		let mut ba = Object::default();
		ba.set("b".into(), Value::from(2));
		ba.set("a".into(), Value::from(1));
		assert_ne!(ab.digest(), ba.digest());
	}
}
