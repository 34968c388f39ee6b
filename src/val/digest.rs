use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt::{self, Display, Formatter, Write};

/// A 256-bit content hash.
///
/// Digests are deterministic across runs. `merge` is order-sensitive and is
/// used wherever the source program is order-sensitive; `mix` is commutative
/// and is used for the order-insensitive (name, value) sets of binding
/// frames.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
	/// The all-zero digest, the identity element of `mix`
	pub const ZERO: Digest = Digest([0; 32]);

	/// Hash a byte string
	pub fn of(bytes: &[u8]) -> Digest {
		let mut hasher = Sha256::new();
		hasher.update(bytes);
		Digest(hasher.finalize().into())
	}

	/// Combine two digests, order-sensitively
	pub fn merge(&self, other: &Digest) -> Digest {
		let mut hasher = Sha256::new();
		hasher.update(self.0);
		hasher.update(other.0);
		Digest(hasher.finalize().into())
	}

	/// Combine two digests with a commutative mixing operation
	pub fn mix(&self, other: &Digest) -> Digest {
		let mut out = [0; 32];
		for (i, b) in out.iter_mut().enumerate() {
			*b = self.0[i] ^ other.0[i];
		}
		Digest(out)
	}

	/// Render the digest as lowercase hex
	pub fn to_hex(&self) -> String {
		let mut out = String::with_capacity(64);
		for b in self.0 {
			write!(out, "{b:02x}").expect("writing to a string");
		}
		out
	}
}

impl Display for Digest {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

/// An incremental digest builder folding a sequence of parts in order.
pub(crate) struct Fold(Sha256);

impl Fold {
	pub fn new(tag: &[u8]) -> Fold {
		let mut hasher = Sha256::new();
		hasher.update(tag);
		Fold(hasher)
	}
	pub fn bytes(mut self, bytes: &[u8]) -> Fold {
		self.0.update(bytes);
		self
	}
	pub fn digest(mut self, digest: &Digest) -> Fold {
		self.0.update(digest.0);
		self
	}
	pub fn finish(self) -> Digest {
		Digest(self.0.finalize().into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn merge_is_order_sensitive() {
		let a = Digest::of(b"a");
		let b = Digest::of(b"b");
		assert_ne!(a.merge(&b), b.merge(&a));
	}

	#[test]
	fn mix_is_commutative() {
		let a = Digest::of(b"a");
		let b = Digest::of(b"b");
		let c = Digest::of(b"c");
		assert_eq!(a.mix(&b).mix(&c), c.mix(&b).mix(&a));
		assert_eq!(a.mix(&Digest::ZERO), a);
	}

	#[test]
	fn hex_rendering() {
		assert_eq!(Digest::ZERO.to_hex().len(), 64);
		assert!(Digest::of(b"x").to_hex().chars().all(|c| c.is_ascii_hexdigit()));
	}
}
