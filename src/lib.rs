#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod ana;
pub mod ast;
pub mod cnf;
pub mod ctx;
pub mod dbs;
pub mod env;
pub mod err;
pub mod fnc;
pub mod sym;
pub mod syn;
pub mod tbl;
pub mod val;

pub use crate::dbs::{Response, Session};
pub use crate::err::Error;
pub use crate::val::Value;
