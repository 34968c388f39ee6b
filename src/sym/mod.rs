use crate::val::Digest;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// The process-wide symbol interner.
static INTERNER: Lazy<RwLock<Interner>> = Lazy::new(|| RwLock::new(Interner::default()));

/// The interned symbol of the anonymous row binding `_`.
pub static ROW: Lazy<Symbol> = Lazy::new(|| sym("_"));

#[derive(Default)]
struct Interner {
	/// Name and cached content digest of every interned symbol, by id
	names: Vec<(String, Digest)>,
	/// Reverse lookup from name to id
	ids: HashMap<String, u32>,
}

/// An interned identifier with a stable 32-bit id and a cached content hash.
///
/// Interning is process-wide; two symbols with the same name always share
/// one id, so symbol comparison is an integer comparison.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Symbol(u32);

/// Intern a name, returning its stable symbol.
pub fn sym(name: &str) -> Symbol {
	if let Some(id) = INTERNER.read().expect("symbol interner poisoned").ids.get(name) {
		return Symbol(*id);
	}
	let mut interner = INTERNER.write().expect("symbol interner poisoned");
	// A racing writer may have interned the name in the meantime
	if let Some(id) = interner.ids.get(name) {
		return Symbol(*id);
	}
	let id = interner.names.len() as u32;
	let digest = Digest::of(name.as_bytes());
	interner.names.push((name.to_string(), digest));
	interner.ids.insert(name.to_string(), id);
	Symbol(id)
}

impl Symbol {
	/// The stable 32-bit identifier of this symbol
	pub fn id(&self) -> u32 {
		self.0
	}
	/// The name this symbol was interned from
	pub fn name(&self) -> String {
		INTERNER.read().expect("symbol interner poisoned").names[self.0 as usize].0.clone()
	}
	/// The cached content digest of this symbol's name
	pub fn digest(&self) -> Digest {
		INTERNER.read().expect("symbol interner poisoned").names[self.0 as usize].1
	}
}

impl fmt::Display for Symbol {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let interner = INTERNER.read().expect("symbol interner poisoned");
		f.write_str(&interner.names[self.0 as usize].0)
	}
}

impl From<&str> for Symbol {
	fn from(name: &str) -> Symbol {
		sym(name)
	}
}

impl Serialize for Symbol {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.name())
	}
}

impl<'de> Deserialize<'de> for Symbol {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Symbol, D::Error> {
		let name = String::deserialize(deserializer)?;
		Ok(sym(&name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn interning_is_stable() {
		let a = sym("chromosome");
		let b = sym("chromosome");
		assert_eq!(a, b);
		assert_eq!(a.id(), b.id());
		assert_eq!(a.name(), "chromosome");
	}

	#[test]
	fn digest_is_cached_and_deterministic() {
		let a = sym("position");
		assert_eq!(a.digest(), Digest::of(b"position"));
		assert_eq!(a.digest(), sym("position").digest());
	}
}
