use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A handle which can be used to cancel a context and all of its children.
#[derive(Clone, Default)]
#[non_exhaustive]
pub struct Canceller {
	/// A reference to the shared cancellation flag
	cancelled: Arc<AtomicBool>,
}

impl Canceller {
	/// Create a new canceller over the given flag
	pub(crate) fn new(cancelled: Arc<AtomicBool>) -> Canceller {
		Canceller {
			cancelled,
		}
	}
	/// Cancel the attached context
	pub fn cancel(&self) {
		self.cancelled.store(true, Ordering::Relaxed);
	}
}
