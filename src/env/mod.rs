use crate::sym::Symbol;
use crate::val::digest::Fold;
use crate::val::{Digest, Value};
use std::sync::Arc;

/// One level of the binding stack.
///
/// A frame is append-only: binding an already-bound name in the same frame
/// is an invariant violation. The frame digest combines entry digests with
/// a commutative mix, so insertion order is irrelevant to the hash.
#[derive(Clone, Debug, Default)]
pub struct Frame {
	entries: Vec<(Symbol, Value)>,
}

impl Frame {
	/// Create a frame from a list of bindings
	pub fn from_entries(entries: Vec<(Symbol, Value)>) -> Frame {
		Frame {
			entries,
		}
	}
	/// Look up a binding in this frame
	pub fn get(&self, name: Symbol) -> Option<&Value> {
		self.entries.iter().rev().find(|(k, _)| *k == name).map(|(_, v)| v)
	}
	/// Append a binding to this frame
	pub fn set(&mut self, name: Symbol, value: Value) {
		if self.get(name).is_some() {
			panic!("duplicate binding '{name}' in one frame");
		}
		self.entries.push((name, value));
	}
	/// Iterate over the bindings in this frame
	pub fn iter(&self) -> std::slice::Iter<'_, (Symbol, Value)> {
		self.entries.iter()
	}
	/// The number of bindings in this frame
	pub fn len(&self) -> usize {
		self.entries.len()
	}
	/// Whether this frame has no bindings
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
	/// The order-insensitive content digest of this frame
	pub fn digest(&self) -> Digest {
		let mut acc = Digest::ZERO;
		for (name, value) in &self.entries {
			let entry = name.digest().merge(&value.digest());
			acc = acc.mix(&entry);
		}
		acc
	}
}

/// A lexically scoped binding environment.
///
/// Frame 0 holds the immutable builtin constants and is shared by identity
/// across every environment in the process. Frame 1 is the per-session
/// mutable globals frame. Frames 2..k are call frames pushed during
/// evaluation. Lookup scans top-down. Cloning copies the mutable frames
/// lazily (clone-on-write through `Arc::make_mut`), which is what lambda
/// capture and the clone-then-swap mutation discipline rely on.
#[derive(Clone, Debug, Default)]
pub struct Env {
	frames: Vec<Arc<Frame>>,
}

impl Env {
	/// Create an environment over the given constants frame, with an empty
	/// globals frame on top
	pub fn new(constants: Arc<Frame>) -> Env {
		Env {
			frames: vec![constants, Arc::new(Frame::default())],
		}
	}

	/// Push an empty call frame
	pub fn push_empty(&mut self) {
		self.frames.push(Arc::new(Frame::default()));
	}

	/// Push a call frame with a single binding
	pub fn push_one(&mut self, name: Symbol, value: Value) {
		self.frames.push(Arc::new(Frame::from_entries(vec![(name, value)])));
	}

	/// Push a call frame with two bindings
	pub fn push_two(&mut self, n1: Symbol, v1: Value, n2: Symbol, v2: Value) {
		self.frames.push(Arc::new(Frame::from_entries(vec![(n1, v1), (n2, v2)])));
	}

	/// Push a call frame with any number of bindings
	pub fn push_frame(&mut self, entries: Vec<(Symbol, Value)>) {
		self.frames.push(Arc::new(Frame::from_entries(entries)));
	}

	/// Pop the top call frame
	pub fn pop(&mut self) {
		debug_assert!(!self.frames.is_empty(), "popping an empty stack");
		self.frames.pop();
	}

	/// Look up a binding, scanning frames top-down
	pub fn lookup(&self, name: Symbol) -> Option<&Value> {
		self.frames.iter().rev().find_map(|frame| frame.get(name))
	}

	/// Append a binding to the top frame
	pub fn set(&mut self, name: Symbol, value: Value) {
		match self.frames.last_mut() {
			Some(frame) => Arc::make_mut(frame).set(name, value),
			None => panic!("binding '{name}' in an empty environment"),
		}
	}

	/// Write a session global to frame 1. Rebinding an existing global is
	/// allowed; shadowing a builtin constant is not.
	pub fn set_global(&mut self, name: Symbol, value: Value) -> Result<(), crate::err::Error> {
		if self.frames[0].get(name).is_some() {
			return Err(crate::err::Error::TypeMismatch {
				expected: format!("a name other than the builtin '{name}'"),
				found: format!("an assignment to '{name}'"),
			});
		}
		let frame = Arc::make_mut(&mut self.frames[1]);
		if frame.get(name).is_some() {
			// Rebinding replaces the whole frame entry
			let entries = frame
				.iter()
				.map(|(k, v)| {
					if *k == name {
						(*k, value.clone())
					} else {
						(*k, v.clone())
					}
				})
				.collect();
			*frame = Frame::from_entries(entries);
		} else {
			frame.set(name, value);
		}
		Ok(())
	}

	/// The number of frames on the stack
	pub fn depth(&self) -> usize {
		self.frames.len()
	}

	/// List every visible binding, innermost first
	pub fn list(&self) -> Vec<(Symbol, Value)> {
		let mut out = Vec::new();
		for frame in self.frames.iter().rev() {
			for (name, value) in frame.iter() {
				out.push((*name, value.clone()));
			}
		}
		out
	}

	/// The ordered merge of per-frame digests, bottom to top
	pub fn digest(&self) -> Digest {
		let mut fold = Fold::new(b"gql:env");
		for frame in &self.frames {
			fold = fold.digest(&frame.digest());
		}
		fold.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sym::sym;

	fn env() -> Env {
		Env::new(Arc::new(Frame::default()))
	}

	#[test]
	fn lookup_scans_top_down() {
		let mut env = env();
		env.set_global(sym("x"), Value::from(1)).unwrap();
		env.push_one(sym("x"), Value::from(2));
		assert_eq!(env.lookup(sym("x")), Some(&Value::from(2)));
		env.pop();
		assert_eq!(env.lookup(sym("x")), Some(&Value::from(1)));
	}

	#[test]
	fn clone_shares_constants_frame() {
		let constants = Arc::new(Frame::from_entries(vec![(sym("pi"), Value::from(3.14))]));
		let env = Env::new(constants.clone());
		let copy = env.clone();
		assert!(Arc::ptr_eq(&constants, &copy.frames[0]));
	}

	#[test]
	fn frame_digest_is_insertion_order_invariant() {
		let mut a = Frame::default();
		a.set(sym("x"), Value::from(1));
		a.set(sym("y"), Value::from(2));
		a.set(sym("z"), Value::from(3));
		let mut b = Frame::default();
		b.set(sym("z"), Value::from(3));
		b.set(sym("x"), Value::from(1));
		b.set(sym("y"), Value::from(2));
		assert_eq!(a.digest(), b.digest());
	}

	#[test]
	fn stack_digest_is_frame_order_sensitive() {
		let mut a = env();
		a.push_one(sym("x"), Value::from(1));
		a.push_one(sym("y"), Value::from(2));
		let mut b = env();
		b.push_one(sym("y"), Value::from(2));
		b.push_one(sym("x"), Value::from(1));
		assert_ne!(a.digest(), b.digest());
	}

	#[test]
	#[should_panic(expected = "duplicate binding")]
	fn duplicate_binding_in_one_frame_panics() {
		let mut frame = Frame::default();
		frame.set(sym("x"), Value::from(1));
		frame.set(sym("x"), Value::from(2));
	}

	#[test]
	fn globals_cannot_shadow_constants() {
		let constants = Arc::new(Frame::from_entries(vec![(sym("count"), Value::from(0))]));
		let mut env = Env::new(constants);
		assert!(env.set_global(sym("count"), Value::from(1)).is_err());
		assert!(env.set_global(sym("total"), Value::from(1)).is_ok());
		assert!(env.set_global(sym("total"), Value::from(2)).is_ok());
		assert_eq!(env.lookup(sym("total")), Some(&Value::from(2)));
	}
}
