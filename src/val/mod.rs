pub(crate) mod datetime;
pub(crate) mod digest;
pub(crate) mod duration;
pub(crate) mod func;
pub(crate) mod object;
pub(crate) mod strand;
pub(crate) mod value;

pub use datetime::Datetime;
pub use digest::Digest;
pub use duration::Duration;
pub use func::{Exec, Func, FuncInner};
pub use object::Object;
pub use strand::Strand;
pub use value::{Kind, Value};
