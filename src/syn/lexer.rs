use crate::ast::Pos;
use crate::sym::sym;
use crate::syn::error::SyntaxError;
use crate::syn::token::{Token, TokenKind};
use crate::val::{Datetime, Duration};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The byte-oriented lexer.
pub struct Lexer<'a> {
	src: &'a [u8],
	pos: usize,
}

impl<'a> Lexer<'a> {
	pub fn new(src: &'a str) -> Lexer<'a> {
		Lexer {
			src: src.as_bytes(),
			pos: 0,
		}
	}

	fn peek_byte(&self) -> Option<u8> {
		self.src.get(self.pos).copied()
	}

	fn peek_at(&self, ahead: usize) -> Option<u8> {
		self.src.get(self.pos + ahead).copied()
	}

	fn bump(&mut self) -> Option<u8> {
		let b = self.peek_byte()?;
		self.pos += 1;
		Some(b)
	}

	fn eat(&mut self, b: u8) -> bool {
		if self.peek_byte() == Some(b) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn skip_trivia(&mut self) {
		loop {
			match self.peek_byte() {
				Some(b' ' | b'\t' | b'\r' | b'\n') => {
					self.pos += 1;
				}
				Some(b'/') if self.peek_at(1) == Some(b'/') => {
					while !matches!(self.peek_byte(), None | Some(b'\n')) {
						self.pos += 1;
					}
				}
				_ => break,
			}
		}
	}

	fn token(&self, start: usize, kind: TokenKind) -> Token {
		Token {
			kind,
			span: Pos::new(start, self.pos),
		}
	}

	fn error(&self, start: usize, message: impl Into<String>) -> SyntaxError {
		SyntaxError::new(message, Pos::new(start, self.pos.max(start + 1)))
	}

	/// Lex the body of a regex literal, after the parser consumed the
	/// opening slash. Backslash escapes the delimiter.
	pub fn lex_regex(&mut self) -> Result<String, SyntaxError> {
		let start = self.pos;
		let mut out = String::new();
		loop {
			match self.bump() {
				Some(b'/') => return Ok(out),
				Some(b'\\') if self.peek_byte() == Some(b'/') => {
					self.pos += 1;
					out.push('/');
				}
				Some(b) => out.push(b as char),
				None => return Err(self.error(start, "unterminated regex literal")),
			}
		}
	}

	pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
		self.skip_trivia();
		let start = self.pos;
		let Some(b) = self.bump() else {
			return Ok(self.token(start, TokenKind::Eof));
		};
		let kind = match b {
			b'(' => TokenKind::LParen,
			b')' => TokenKind::RParen,
			b'{' => TokenKind::LBrace,
			b'}' => TokenKind::RBrace,
			b',' => TokenKind::Comma,
			b';' => TokenKind::Semicolon,
			b'.' => TokenKind::Dot,
			b'+' => TokenKind::Plus,
			b'-' => TokenKind::Minus,
			b'*' => TokenKind::Star,
			b'/' => TokenKind::Slash,
			b'%' => TokenKind::Percent,
			b'$' => TokenKind::Dollar,
			b':' => {
				if self.eat(b'=') {
					TokenKind::Assign
				} else {
					TokenKind::Colon
				}
			}
			b'|' => {
				if self.eat(b'|') {
					TokenKind::OrOr
				} else {
					TokenKind::Pipe
				}
			}
			b'&' => {
				if self.eat(b'&') {
					TokenKind::AndAnd
				} else {
					TokenKind::Amp
				}
			}
			b'=' => {
				if self.eat(b'=') {
					if self.eat(b'?') {
						TokenKind::EqNullRight
					} else {
						TokenKind::Eq
					}
				} else {
					return Err(self.error(start, "expected '==' after '='"));
				}
			}
			b'?' => {
				if self.eat(b'=') && self.eat(b'=') {
					if self.eat(b'?') {
						TokenKind::EqNullBoth
					} else {
						TokenKind::EqNullLeft
					}
				} else {
					return Err(self.error(start, "expected '?==' or '?==?'"));
				}
			}
			b'!' => {
				if self.eat(b'=') {
					TokenKind::Ne
				} else {
					TokenKind::Bang
				}
			}
			b'<' => {
				if self.eat(b'=') {
					TokenKind::Le
				} else {
					TokenKind::Lt
				}
			}
			b'>' => {
				if self.eat(b'=') {
					TokenKind::Ge
				} else {
					TokenKind::Gt
				}
			}
			b'"' => return self.lex_strand(start),
			b'\'' => return self.lex_char(start),
			b'0'..=b'9' => {
				self.pos = start;
				return self.lex_number(start);
			}
			b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
				self.pos = start;
				return Ok(self.lex_ident(start));
			}
			b => return Err(self.error(start, format!("unexpected character {:?}", b as char))),
		};
		Ok(self.token(start, kind))
	}

	fn lex_strand(&mut self, start: usize) -> Result<Token, SyntaxError> {
		let mut out = String::new();
		loop {
			match self.bump() {
				Some(b'"') => return Ok(self.token(start, TokenKind::Strand(out))),
				Some(b'\\') => out.push(self.lex_escape(start)?),
				Some(b) => out.push(b as char),
				None => return Err(self.error(start, "unterminated string literal")),
			}
		}
	}

	fn lex_char(&mut self, start: usize) -> Result<Token, SyntaxError> {
		let c = match self.bump() {
			Some(b'\\') => self.lex_escape(start)?,
			Some(b'\'') => return Err(self.error(start, "empty char literal")),
			Some(b) => b as char,
			None => return Err(self.error(start, "unterminated char literal")),
		};
		if !self.eat(b'\'') {
			return Err(self.error(start, "expected closing quote of char literal"));
		}
		Ok(self.token(start, TokenKind::Char(c)))
	}

	fn lex_escape(&mut self, start: usize) -> Result<char, SyntaxError> {
		match self.bump() {
			Some(b'n') => Ok('\n'),
			Some(b't') => Ok('\t'),
			Some(b'r') => Ok('\r'),
			Some(b'\\') => Ok('\\'),
			Some(b'"') => Ok('"'),
			Some(b'\'') => Ok('\''),
			Some(b'0') => Ok('\0'),
			_ => Err(self.error(start, "unknown escape sequence")),
		}
	}

	fn lex_ident(&mut self, start: usize) -> Token {
		while matches!(self.peek_byte(), Some(b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')) {
			self.pos += 1;
		}
		let name = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
		let kind = match name {
			"true" => TokenKind::True,
			"false" => TokenKind::False,
			"null" => TokenKind::Null,
			"if" => TokenKind::If,
			"else" => TokenKind::Else,
			"func" => TokenKind::Func,
			"load" => TokenKind::Load,
			name => TokenKind::Ident(sym(name)),
		};
		self.token(start, kind)
	}

	fn digits(&mut self) -> usize {
		let start = self.pos;
		while matches!(self.peek_byte(), Some(b'0'..=b'9')) {
			self.pos += 1;
		}
		self.pos - start
	}

	fn lex_number(&mut self, start: usize) -> Result<Token, SyntaxError> {
		// A date-shaped prefix lexes as a datetime literal
		if let Some(token) = self.try_datetime(start)? {
			return Ok(token);
		}
		let int_digits = self.digits();
		debug_assert!(int_digits > 0);
		// A unit suffix makes this a duration literal
		if self.peek_duration_unit().is_some() {
			return self.lex_duration(start);
		}
		let mut float = false;
		if self.peek_byte() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
			self.pos += 1;
			self.digits();
			float = true;
		}
		if matches!(self.peek_byte(), Some(b'e' | b'E')) {
			let mark = self.pos;
			self.pos += 1;
			if matches!(self.peek_byte(), Some(b'+' | b'-')) {
				self.pos += 1;
			}
			if self.digits() == 0 {
				self.pos = mark;
			} else {
				float = true;
			}
		}
		let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
		if float {
			match text.parse::<f64>() {
				Ok(v) => Ok(self.token(start, TokenKind::Float(v))),
				Err(_) => Err(self.error(start, format!("invalid float literal {text}"))),
			}
		} else {
			match text.parse::<i64>() {
				Ok(v) => Ok(self.token(start, TokenKind::Int(v))),
				Err(_) => Err(self.error(start, format!("invalid integer literal {text}"))),
			}
		}
	}

	/// A datetime literal is `YYYY-MM-DD`, optionally followed by
	/// `THH:MM:SS` and a trailing `Z`.
	fn try_datetime(&mut self, start: usize) -> Result<Option<Token>, SyntaxError> {
		let shape = |at: usize, digits: usize| -> bool {
			(0..digits).all(|i| matches!(self.peek_at(at + i), Some(b'0'..=b'9')))
		};
		if !(shape(0, 4) && self.peek_at(4) == Some(b'-') && shape(5, 2)
			&& self.peek_at(7) == Some(b'-')
			&& shape(8, 2))
		{
			return Ok(None);
		}
		self.pos += 10;
		let mut with_time = false;
		if self.peek_byte() == Some(b'T') {
			let t = |at| matches!(self.peek_at(at), Some(b'0'..=b'9'));
			if t(1) && t(2) && self.peek_at(3) == Some(b':') && t(4) && t(5)
				&& self.peek_at(6) == Some(b':')
				&& t(7) && t(8)
			{
				self.pos += 9;
				with_time = true;
			}
		}
		self.eat(b'Z');
		let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
		let text = text.trim_end_matches('Z');
		let naive = if with_time {
			NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
		} else {
			NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| {
				d.and_hms_opt(0, 0, 0).expect("midnight is a valid time")
			})
		};
		match naive {
			Ok(naive) => {
				let utc = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
				Ok(Some(self.token(start, TokenKind::Datetime(Datetime::from(utc)))))
			}
			Err(_) => Err(self.error(start, format!("invalid datetime literal {text}"))),
		}
	}

	/// The duration unit at the cursor, with its byte length and the
	/// nanoseconds it scales by.
	fn peek_duration_unit(&self) -> Option<(usize, u128)> {
		match (self.peek_byte(), self.peek_at(1)) {
			(Some(b'n'), Some(b's')) => Some((2, 1)),
			(Some(b'u'), Some(b's')) => Some((2, 1_000)),
			(Some(b'm'), Some(b's')) => Some((2, 1_000_000)),
			(Some(b's'), _) => Some((1, 1_000_000_000)),
			(Some(b'm'), _) => Some((1, 60 * 1_000_000_000)),
			(Some(b'h'), _) => Some((1, 3_600 * 1_000_000_000)),
			(Some(b'd'), _) => Some((1, 86_400 * 1_000_000_000)),
			(Some(b'w'), _) => Some((1, 7 * 86_400 * 1_000_000_000)),
			(Some(b'y'), _) => Some((1, 365 * 86_400 * 1_000_000_000)),
			_ => None,
		}
	}

	/// A duration literal is one or more number-unit segments, `1h30m`.
	fn lex_duration(&mut self, start: usize) -> Result<Token, SyntaxError> {
		self.pos = start;
		let mut nanos: u128 = 0;
		loop {
			let seg = self.pos;
			if self.digits() == 0 {
				break;
			}
			let Some((len, scale)) = self.peek_duration_unit() else {
				// Digits without a unit belong to the next token
				self.pos = seg;
				break;
			};
			let text = std::str::from_utf8(&self.src[seg..self.pos]).unwrap_or_default();
			let count: u128 = text.parse().map_err(|_| {
				self.error(start, format!("invalid duration segment {text}"))
			})?;
			self.pos += len;
			nanos = nanos.saturating_add(count.saturating_mul(scale));
		}
		let secs = (nanos / 1_000_000_000) as u64;
		let sub = (nanos % 1_000_000_000) as u32;
		Ok(self.token(start, TokenKind::Duration(Duration::new(secs, sub))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn kinds(src: &str) -> Vec<TokenKind> {
		let mut lexer = Lexer::new(src);
		let mut out = Vec::new();
		loop {
			let token = lexer.next_token().unwrap();
			if token.kind == TokenKind::Eof {
				return out;
			}
			out.push(token.kind);
		}
	}

	#[test]
	fn operators() {
		assert_eq!(
			kinds("== ==? ?== ?==? != <= >= := && || | . &x $y"),
			vec![
				TokenKind::Eq,
				TokenKind::EqNullRight,
				TokenKind::EqNullLeft,
				TokenKind::EqNullBoth,
				TokenKind::Ne,
				TokenKind::Le,
				TokenKind::Ge,
				TokenKind::Assign,
				TokenKind::AndAnd,
				TokenKind::OrOr,
				TokenKind::Pipe,
				TokenKind::Dot,
				TokenKind::Amp,
				TokenKind::Ident(sym("x")),
				TokenKind::Dollar,
				TokenKind::Ident(sym("y")),
			]
		);
	}

	#[test]
	fn numbers_and_durations() {
		assert_eq!(kinds("42"), vec![TokenKind::Int(42)]);
		assert_eq!(kinds("2.5"), vec![TokenKind::Float(2.5)]);
		assert_eq!(kinds("1e3"), vec![TokenKind::Float(1000.0)]);
		assert_eq!(
			kinds("1h2m3s"),
			vec![TokenKind::Duration(Duration::from_secs(3723))]
		);
		// A dot not followed by a digit is field access, not a decimal
		assert_eq!(
			kinds("1.x"),
			vec![TokenKind::Int(1), TokenKind::Dot, TokenKind::Ident(sym("x"))]
		);
	}

	#[test]
	fn datetimes() {
		let tokens = kinds("2018-04-16T15:19:35Z");
		assert_eq!(tokens.len(), 1);
		assert!(matches!(tokens[0], TokenKind::Datetime(_)));
		// Integer subtraction is not a datetime
		assert_eq!(
			kinds("1000-3"),
			vec![TokenKind::Int(1000), TokenKind::Minus, TokenKind::Int(3)]
		);
	}

	#[test]
	fn strings_chars_and_comments() {
		assert_eq!(
			kinds("\"a\\nb\" 'c' // trailing\n7"),
			vec![
				TokenKind::Strand(String::from("a\nb")),
				TokenKind::Char('c'),
				TokenKind::Int(7),
			]
		);
	}
}
