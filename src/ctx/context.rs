use crate::ctx::canceller::Canceller;
use crate::ctx::reason::Reason;
use crate::err::Error;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The execution context passed to every blocking call in the engine.
///
/// Expression evaluation never suspends; scanners, exact length queries,
/// materialization and prefetch check the context at operator boundaries
/// and stop within a bounded number of rows once cancellation is observed.
#[derive(Clone, Default)]
#[non_exhaustive]
pub struct Context {
	/// An optional deadline
	deadline: Option<Instant>,
	/// Whether or not this context is cancelled
	cancelled: Arc<AtomicBool>,
	/// An optional parent context
	parent: Option<Arc<Context>>,
}

impl Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Context").field("deadline", &self.deadline).finish()
	}
}

impl Context {
	/// Create an empty background context
	pub fn background() -> Context {
		Context::default()
	}

	/// Create a new child context
	pub fn new(parent: &Context) -> Context {
		Context {
			deadline: parent.deadline,
			cancelled: Arc::new(AtomicBool::new(false)),
			parent: Some(Arc::new(parent.clone())),
		}
	}

	/// Add cancellation to the context. The returned handle will cancel
	/// this context and its children once called.
	pub fn add_cancel(&mut self) -> Canceller {
		Canceller::new(self.cancelled.clone())
	}

	/// Add a deadline to the context. If the current deadline is sooner
	/// than the provided deadline, this method does nothing.
	pub fn add_deadline(&mut self, deadline: Instant) {
		match self.deadline {
			Some(current) if current < deadline => (),
			_ => self.deadline = Some(deadline),
		}
	}

	/// Add a timeout to the context relative to the current instant.
	pub fn add_timeout(&mut self, timeout: Duration) {
		if let Some(deadline) = Instant::now().checked_add(timeout) {
			self.add_deadline(deadline);
		}
	}

	/// Check if the context is done. If it returns `None` the operation
	/// may proceed, otherwise the operation should be stopped.
	pub fn done(&self) -> Option<Reason> {
		match self.deadline {
			Some(deadline) if deadline <= Instant::now() => Some(Reason::Timedout),
			_ if self.cancelled.load(Ordering::Relaxed) => Some(Reason::Canceled),
			_ => match &self.parent {
				Some(ctx) => ctx.done(),
				_ => None,
			},
		}
	}

	/// Check if the context is ok to continue
	pub fn is_ok(&self) -> bool {
		self.done().is_none()
	}

	/// Check if the context is not ok to continue
	pub fn is_done(&self) -> bool {
		self.done().is_some()
	}

	/// Return an error if the context is no longer valid
	pub fn check(&self) -> Result<(), Error> {
		match self.done() {
			Some(reason) => Err(reason.into()),
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cancel_propagates_to_children() {
		let mut parent = Context::background();
		let canceller = parent.add_cancel();
		let child = Context::new(&parent);
		assert!(child.is_ok());
		canceller.cancel();
		assert_eq!(child.done(), Some(Reason::Canceled));
		assert!(child.check().is_err());
	}

	#[test]
	fn deadline_expires() {
		let mut ctx = Context::background();
		ctx.add_deadline(Instant::now() - Duration::from_secs(1));
		assert_eq!(ctx.done(), Some(Reason::Timedout));
	}
}
