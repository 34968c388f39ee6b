use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

/// A string value.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Strand(pub String);

impl From<String> for Strand {
	fn from(s: String) -> Self {
		Strand(s)
	}
}

impl From<&str> for Strand {
	fn from(s: &str) -> Self {
		Strand(s.to_owned())
	}
}

impl Deref for Strand {
	type Target = String;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl Strand {
	/// Consume the strand, returning the inner string
	pub fn into_string(self) -> String {
		self.0
	}
	/// Borrow the inner string slice
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Display for Strand {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{:?}", self.0)
	}
}
