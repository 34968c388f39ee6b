//! The self-describing wire encoding used by the table `marshal` contract
//! and by join materialization.

use crate::ctx::Context;
use crate::err::Error;
use crate::sym::sym;
use crate::tbl::MemTable;
use crate::val::{Datetime, Duration, Object, Value};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// The serializable mirror of a computed value. Functions do not marshal;
/// nested tables marshal their materialized rows.
#[derive(Serialize, Deserialize)]
pub(crate) enum Wire {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Char(char),
	Str(String),
	Datetime(i64),
	Duration(u64, u32),
	Struct(Vec<(String, Wire)>),
	Table(Vec<Wire>),
}

pub(crate) fn encode(ctx: &Context, value: &Value) -> Result<Wire, Error> {
	Ok(match value {
		Value::Null => Wire::Null,
		Value::Bool(v) => Wire::Bool(*v),
		Value::Int(v) => Wire::Int(*v),
		Value::Float(v) => Wire::Float(*v),
		Value::Char(v) => Wire::Char(*v),
		Value::Strand(v) => Wire::Str(v.as_str().to_owned()),
		Value::Datetime(v) => Wire::Datetime(v.timestamp_nanos()),
		Value::Duration(v) => Wire::Duration(v.as_secs(), v.subsec_nanos()),
		Value::Object(v) => {
			let mut fields = Vec::with_capacity(v.len());
			for (name, value) in v.iter() {
				fields.push((name.name(), encode(ctx, value)?));
			}
			Wire::Struct(fields)
		}
		Value::Table(v) => {
			let mut rows = Vec::new();
			for row in v.rows(ctx)? {
				rows.push(encode(ctx, &row)?);
			}
			Wire::Table(rows)
		}
		Value::Fragment(_) | Value::Func(_) => {
			return Err(Error::Encoding {
				message: format!("a {} value cannot be marshalled", value.kind()),
			})
		}
	})
}

pub(crate) fn decode(wire: Wire) -> Value {
	match wire {
		Wire::Null => Value::Null,
		Wire::Bool(v) => Value::Bool(v),
		Wire::Int(v) => Value::Int(v),
		Wire::Float(v) => Value::Float(v),
		Wire::Char(v) => Value::Char(v),
		Wire::Str(v) => Value::from(v),
		Wire::Datetime(nanos) => Value::Datetime(Datetime::from(Utc.timestamp_nanos(nanos))),
		Wire::Duration(secs, nanos) => Value::Duration(Duration::new(secs, nanos)),
		Wire::Struct(fields) => {
			let mut out = Object::with_capacity(fields.len());
			for (name, value) in fields {
				out.set(sym(&name), decode(value));
			}
			Value::Object(out)
		}
		Wire::Table(rows) => {
			Value::Table(MemTable::from_rows(rows.into_iter().map(decode).collect()).into())
		}
	}
}

/// Marshal a row sequence into a byte stream.
pub(crate) fn marshal_rows(ctx: &Context, rows: &[Value], buf: &mut Vec<u8>) -> Result<(), Error> {
	let mut wires = Vec::with_capacity(rows.len());
	for row in rows {
		wires.push(encode(ctx, row)?);
	}
	bincode::serialize_into(buf, &wires)?;
	Ok(())
}

/// Rebuild a row sequence from a marshalled byte stream.
pub(crate) fn unmarshal_rows(bytes: &[u8]) -> Result<Vec<Value>, Error> {
	let wires: Vec<Wire> = bincode::deserialize(bytes)?;
	Ok(wires.into_iter().map(decode).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rows_round_trip() {
		let ctx = Context::background();
		let rows = vec![
			Value::Object(obj! {"a" => 1, "b" => "hi"}),
			Value::Object(obj! {"a" => 2.5, "b" => Value::Null}),
		];
		let mut buf = Vec::new();
		marshal_rows(&ctx, &rows, &mut buf).unwrap();
		let back = unmarshal_rows(&buf).unwrap();
		assert_eq!(rows, back);
	}

	#[test]
	fn functions_do_not_marshal() {
		let ctx = Context::background();
		let func = crate::val::Func::lambda(
			vec![sym("x")],
			std::sync::Arc::new(crate::ast::Expr::literal(Value::Null)),
			crate::env::Env::default(),
		);
		let mut buf = Vec::new();
		let err = marshal_rows(&ctx, &[Value::Func(func)], &mut buf).unwrap_err();
		assert!(matches!(err, Error::Encoding { .. }));
	}
}
