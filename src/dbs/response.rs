use crate::err::Error;
use crate::val::Value;
use std::time::Duration;

/// The result of processing one statement.
#[derive(Debug)]
#[non_exhaustive]
pub struct Response {
	/// How long the statement took to analyze and evaluate
	pub time: Duration,
	/// The statement result
	pub result: Result<Value, Error>,
}

impl Response {
	/// Consume the response, returning its result
	pub fn output(self) -> Result<Value, Error> {
		self.result
	}

	/// The execution time, rendered for diagnostics
	pub fn speed(&self) -> String {
		format!("{:?}", self.time)
	}
}
