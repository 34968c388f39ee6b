//! Implements the unary and infix operators over values.

use crate::ast::operator::BinaryOp;
use crate::err::Error;
use crate::val::{Kind, Value};
use std::cmp::Ordering;

fn null(op: &str) -> Error {
	Error::NullDereference {
		message: format!("operator {op} requires non-null operands"),
	}
}

fn unsupported(op: &str, l: &Value, r: &Value) -> Error {
	Error::TypeMismatch {
		expected: format!("operands supporting {op}"),
		found: format!("{} and {}", l.kind(), r.kind()),
	}
}

pub fn neg(v: Value) -> Result<Value, Error> {
	match v {
		Value::Int(v) => Ok(Value::Int(-v)),
		Value::Float(v) => Ok(Value::Float(-v)),
		Value::Null => Err(null("-")),
		v => Err(Error::TypeMismatch {
			expected: String::from("int or float"),
			found: v.kind().to_string(),
		}),
	}
}

pub fn not(v: Value) -> Result<Value, Error> {
	Ok(Value::Bool(!v.to_bool()?))
}

pub fn add(l: Value, r: Value) -> Result<Value, Error> {
	match (l, r) {
		(Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_add(r))),
		(Value::Int(l), Value::Float(r)) => Ok(Value::Float(l as f64 + r)),
		(Value::Float(l), Value::Int(r)) => Ok(Value::Float(l + r as f64)),
		(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l + r)),
		(Value::Strand(l), Value::Strand(r)) => Ok(Value::from(format!("{}{}", *l, *r))),
		(Value::Datetime(l), Value::Duration(r)) => Ok(Value::Datetime(l.add_duration(&r))),
		(Value::Duration(l), Value::Datetime(r)) => Ok(Value::Datetime(r.add_duration(&l))),
		(Value::Duration(l), Value::Duration(r)) => Ok(Value::Duration(l.checked_add(&r))),
		(Value::Null, _) | (_, Value::Null) => Err(null("+")),
		(l, r) => Err(unsupported("+", &l, &r)),
	}
}

pub fn sub(l: Value, r: Value) -> Result<Value, Error> {
	match (l, r) {
		(Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_sub(r))),
		(Value::Int(l), Value::Float(r)) => Ok(Value::Float(l as f64 - r)),
		(Value::Float(l), Value::Int(r)) => Ok(Value::Float(l - r as f64)),
		(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l - r)),
		(Value::Datetime(l), Value::Duration(r)) => Ok(Value::Datetime(l.sub_duration(&r))),
		(Value::Datetime(l), Value::Datetime(r)) => Ok(Value::Duration(l.diff(&r))),
		(Value::Duration(l), Value::Duration(r)) => Ok(Value::Duration(l.checked_sub(&r))),
		(Value::Null, _) | (_, Value::Null) => Err(null("-")),
		(l, r) => Err(unsupported("-", &l, &r)),
	}
}

pub fn mul(l: Value, r: Value) -> Result<Value, Error> {
	match (l, r) {
		(Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_mul(r))),
		(Value::Int(l), Value::Float(r)) => Ok(Value::Float(l as f64 * r)),
		(Value::Float(l), Value::Int(r)) => Ok(Value::Float(l * r as f64)),
		(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l * r)),
		(Value::Null, _) | (_, Value::Null) => Err(null("*")),
		(l, r) => Err(unsupported("*", &l, &r)),
	}
}

pub fn div(l: Value, r: Value) -> Result<Value, Error> {
	match (l, r) {
		(Value::Int(_), Value::Int(0)) => Err(Error::TypeMismatch {
			expected: String::from("a non-zero divisor"),
			found: String::from("0"),
		}),
		(Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_div(r))),
		(Value::Int(l), Value::Float(r)) => Ok(Value::Float(l as f64 / r)),
		(Value::Float(l), Value::Int(r)) => Ok(Value::Float(l / r as f64)),
		(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l / r)),
		(Value::Null, _) | (_, Value::Null) => Err(null("/")),
		(l, r) => Err(unsupported("/", &l, &r)),
	}
}

pub fn rem(l: Value, r: Value) -> Result<Value, Error> {
	match (l, r) {
		(Value::Int(_), Value::Int(0)) => Err(Error::TypeMismatch {
			expected: String::from("a non-zero divisor"),
			found: String::from("0"),
		}),
		(Value::Int(l), Value::Int(r)) => Ok(Value::Int(l.wrapping_rem(r))),
		(Value::Float(l), Value::Float(r)) => Ok(Value::Float(l % r)),
		(Value::Null, _) | (_, Value::Null) => Err(null("%")),
		(l, r) => Err(unsupported("%", &l, &r)),
	}
}

/// The `==` operator family. Plain equality requires both sides non-null;
/// the null-aware variants additionally match when the nullable side is
/// null.
pub fn equal_op(l: &Value, r: &Value, op: BinaryOp) -> bool {
	match op {
		BinaryOp::Eq => !l.is_null() && !r.is_null() && l == r,
		BinaryOp::EqNullRight => r.is_null() || (!l.is_null() && l == r),
		BinaryOp::EqNullLeft => l.is_null() || (!r.is_null() && l == r),
		BinaryOp::EqNullBoth => l.is_null() || r.is_null() || l == r,
		_ => unreachable!("{op} is not an equality operator"),
	}
}

pub fn not_equal(l: &Value, r: &Value) -> Result<Value, Error> {
	Ok(Value::Bool(!equal_op(l, r, BinaryOp::Eq)))
}

fn compare(op: &str, l: &Value, r: &Value) -> Result<Ordering, Error> {
	if l.is_null() || r.is_null() {
		return Err(null(op));
	}
	Ok(l.cmp(r))
}

pub fn less_than(l: &Value, r: &Value) -> Result<Value, Error> {
	Ok(Value::Bool(compare("<", l, r)? == Ordering::Less))
}

pub fn less_than_or_equal(l: &Value, r: &Value) -> Result<Value, Error> {
	Ok(Value::Bool(compare("<=", l, r)? != Ordering::Greater))
}

pub fn more_than(l: &Value, r: &Value) -> Result<Value, Error> {
	Ok(Value::Bool(compare(">", l, r)? == Ordering::Greater))
}

pub fn more_than_or_equal(l: &Value, r: &Value) -> Result<Value, Error> {
	Ok(Value::Bool(compare(">=", l, r)? != Ordering::Less))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn arithmetic_kinds() {
		assert_eq!(add(Value::from(2), Value::from(3)).unwrap(), Value::from(5));
		assert_eq!(add(Value::from(2), Value::from(0.5)).unwrap(), Value::from(2.5));
		assert_eq!(add(Value::from("a"), Value::from("b")).unwrap(), Value::from("ab"));
		assert!(add(Value::Null, Value::from(1)).is_err());
		assert!(div(Value::from(1), Value::from(0)).is_err());
	}

	#[test]
	fn equality_family() {
		let one = Value::from(1);
		let two = Value::from(2);
		// Plain equality never matches null
		assert!(!equal_op(&Value::Null, &Value::Null, BinaryOp::Eq));
		assert!(equal_op(&one, &one, BinaryOp::Eq));
		assert!(!equal_op(&one, &two, BinaryOp::Eq));
		// A null right side matches under ==?
		assert!(equal_op(&one, &Value::Null, BinaryOp::EqNullRight));
		assert!(!equal_op(&Value::Null, &one, BinaryOp::EqNullRight));
		// A null left side matches under ?==
		assert!(equal_op(&Value::Null, &one, BinaryOp::EqNullLeft));
		assert!(!equal_op(&one, &Value::Null, BinaryOp::EqNullLeft));
		// Either null side matches under ?==?
		assert!(equal_op(&Value::Null, &two, BinaryOp::EqNullBoth));
		assert!(equal_op(&two, &Value::Null, BinaryOp::EqNullBoth));
		assert!(!equal_op(&one, &two, BinaryOp::EqNullBoth));
	}
}
