pub(crate) mod canceller;
pub(crate) mod context;
pub(crate) mod reason;

pub use canceller::Canceller;
pub use context::Context;
pub use reason::Reason;
