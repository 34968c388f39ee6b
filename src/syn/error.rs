use crate::ast::Pos;
use crate::err::Error;
use std::fmt::{self, Display, Formatter};

/// A syntax error at a token position.
#[derive(Clone, Debug)]
pub struct SyntaxError {
	pub message: String,
	pub span: Pos,
}

impl SyntaxError {
	pub fn new(message: impl Into<String>, span: Pos) -> SyntaxError {
		SyntaxError {
			message: message.into(),
			span,
		}
	}

	/// Convert into the crate error, resolving the byte span into a
	/// one-based line and column within the source text.
	pub fn into_error(self, src: &str) -> Error {
		let (line, column) = line_column(src, self.span.start as usize);
		Error::Parse {
			message: self.message,
			line,
			column,
		}
	}
}

impl Display for SyntaxError {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{} at byte {}", self.message, self.span.start)
	}
}

pub(crate) fn line_column(src: &str, offset: usize) -> (usize, usize) {
	let mut line = 1;
	let mut column = 1;
	for (at, ch) in src.char_indices() {
		if at >= offset {
			break;
		}
		if ch == '\n' {
			line += 1;
			column = 1;
		} else {
			column += 1;
		}
	}
	(line, column)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn line_and_column_are_one_based() {
		let src = "ab\ncd\nef";
		assert_eq!(line_column(src, 0), (1, 1));
		assert_eq!(line_column(src, 4), (2, 2));
		assert_eq!(line_column(src, 6), (3, 1));
	}
}
