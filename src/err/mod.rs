use crate::ctx::Reason;
use thiserror::Error;

/// An error originating from the GQL engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// A syntax error was encountered when parsing a query
	#[error("Parse error at line {line}, column {column}: {message}")]
	Parse {
		message: String,
		line: usize,
		column: usize,
	},

	/// A variable name could not be found in any binding frame
	#[error("Variable '{name}' is not bound")]
	UnboundVariable {
		name: String,
	},

	/// A struct field was required but not present
	#[error("Field '{name}' is not declared")]
	UndeclaredField {
		name: String,
	},

	/// A value or argument disagrees with its declared type constraint
	#[error("Type mismatch: expected {expected}, found {found}")]
	TypeMismatch {
		expected: String,
		found: String,
	},

	/// A function was called with the wrong number of arguments
	#[error("Incorrect arguments for function {name}(): {message}")]
	ArityMismatch {
		name: String,
		message: String,
	},

	/// A required argument was not supplied at a call site
	#[error("Missing argument '{name}' in call to {func}()")]
	MissingArg {
		name: String,
		func: String,
	},

	/// More actual arguments were supplied than the function declares
	#[error("Too many arguments in call to {func}()")]
	TooManyArgs {
		func: String,
	},

	/// The same argument was supplied twice at a call site
	#[error("Duplicate argument '{name}' in call to {func}()")]
	DuplicateArg {
		name: String,
		func: String,
	},

	/// A non-null-aware operation encountered a null value
	#[error("Null value encountered: {message}")]
	NullDereference {
		message: String,
	},

	/// A scalar value could not be coerced into the requested kind
	#[error("Cannot cast {from} into {into}")]
	InvalidCast {
		from: String,
		into: String,
	},

	/// A struct field regex matched no fields
	#[error("Regex /{regex}/ matched no fields")]
	NoRegexMatch {
		regex: String,
	},

	/// A regex literal failed to compile
	#[error("Invalid regex: {message}")]
	InvalidRegex {
		message: String,
	},

	/// A file could not be read or written
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// A table could not be marshalled or unmarshalled
	#[error("Encoding error: {message}")]
	Encoding {
		message: String,
	},

	/// The operation was cancelled by its consumer
	#[error("The query was cancelled")]
	Cancelled,

	/// The operation exceeded its deadline
	#[error("The query exceeded its deadline")]
	Timedout,

	/// An internal invariant was violated; this should never fire
	#[error("Internal error: {message}")]
	Internal {
		message: String,
	},
}

impl From<Reason> for Error {
	fn from(reason: Reason) -> Self {
		match reason {
			Reason::Canceled => Error::Cancelled,
			Reason::Timedout => Error::Timedout,
		}
	}
}

impl From<bincode::Error> for Error {
	fn from(e: bincode::Error) -> Self {
		Error::Encoding {
			message: e.to_string(),
		}
	}
}

impl From<regex::Error> for Error {
	fn from(e: regex::Error) -> Self {
		Error::InvalidRegex {
			message: e.to_string(),
		}
	}
}
