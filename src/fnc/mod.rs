//! The function registry: formal-argument descriptors, registration
//! validation, and the builtin set. Builtins live in the immutable
//! constants frame, which is built once before the first session.

pub mod args;
pub mod operate;

use crate::ana::AnalyzedType;
use crate::ctx::Context;
use crate::env::Frame;
use crate::err::Error;
use crate::sym::{sym, Symbol};
use crate::tbl::cogroup::CogroupTable;
use crate::tbl::collapse::CollapseTable;
use crate::tbl::concat::ConcatTable;
use crate::tbl::firstn::FirstnTable;
use crate::tbl::flatten::FlattenTable;
use crate::tbl::gather::GatherTable;
use crate::tbl::join::JoinTable;
use crate::tbl::map::MapTable;
use crate::tbl::reduce::ReduceTable;
use crate::tbl::sort::SortTable;
use crate::tbl::spread::SpreadTable;
use crate::tbl::transpose::TransposeTable;
use crate::tbl::{Len, MemTable, Table};
use crate::val::{Func, Kind, Value};
use args::{ArgValue, FormalArg, FormalArgs};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// The immutable global-constants frame holding every builtin.
static CONSTANTS: Lazy<Arc<Frame>> = Lazy::new(|| {
	let mut frame = Frame::default();
	for func in registry() {
		frame.set(sym(func.name()), Value::Func(func));
	}
	Arc::new(frame)
});

/// The shared constants frame. Registration happens once, inside the
/// first access; a session never mutates it.
pub fn constants() -> Arc<Frame> {
	CONSTANTS.clone()
}

fn ret_any(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Any
}

fn ret_table(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Table
}

fn ret_int(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Scalar(Kind::Int)
}

fn ret_float(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Scalar(Kind::Float)
}

fn ret_string(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Scalar(Kind::Strand)
}

fn ret_bool(_: &[AnalyzedType]) -> AnalyzedType {
	AnalyzedType::Scalar(Kind::Bool)
}

fn builtin(
	name: &str,
	args: FormalArgs,
	ret: fn(&[AnalyzedType]) -> AnalyzedType,
	exec: fn(&Context, Vec<ArgValue>) -> Result<Value, Error>,
) -> Func {
	match Func::builtin(name, args, ret, exec) {
		Ok(func) => func,
		Err(err) => panic!("invalid builtin registration for {name}(): {err}"),
	}
}

fn registry() -> Vec<Func> {
	vec![
		builtin(
			"table",
			FormalArgs(vec![FormalArg::eager("row").variadic().allow(&[Kind::Struct])]),
			ret_table,
			exec_table,
		),
		builtin(
			"count",
			FormalArgs(vec![FormalArg::eager("src").allow(&[Kind::Table])]),
			ret_int,
			exec_count,
		),
		builtin(
			"map",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("mapper").variadic().closure(&["_"]),
				FormalArg::eager("filter").named().optional(Value::Null).closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_map,
		),
		builtin(
			"filter",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("pred").closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_filter,
		),
		builtin(
			"minn",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("limit").allow(&[Kind::Int]),
				FormalArg::eager("key").closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_minn,
		),
		builtin(
			"sort",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_sort,
		),
		builtin(
			"firstn",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("limit").allow(&[Kind::Int]),
			]),
			ret_table,
			exec_firstn,
		),
		builtin(
			"reduce",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").closure(&["_"]),
				FormalArg::eager("reducer").allow(&[Kind::Func]),
				FormalArg::eager("map").named().optional(Value::Null).closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_reduce,
		),
		builtin(
			"collapse",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("col").variadic().symbol(),
			]),
			ret_table,
			exec_collapse,
		),
		builtin(
			"gather",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").symbol(),
				FormalArg::eager("value").symbol(),
				FormalArg::eager("col").variadic().symbol(),
			]),
			ret_table,
			exec_gather,
		),
		builtin(
			"spread",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").symbol(),
				FormalArg::eager("value").symbol(),
			]),
			ret_table,
			exec_spread,
		),
		builtin(
			"transpose",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").closure(&["_"]),
				FormalArg::eager("cell").closure(&["_"]),
			]),
			ret_table,
			exec_transpose,
		),
		builtin(
			"cogroup",
			FormalArgs(vec![
				FormalArg::eager("src").allow(&[Kind::Table]),
				FormalArg::eager("key").closure(&["_"]),
				FormalArg::eager("row").named().symbol().default_symbol("_"),
			]),
			ret_table,
			exec_cogroup,
		),
		builtin(
			"concat",
			FormalArgs(vec![FormalArg::eager("src").variadic().allow(&[Kind::Table])]),
			ret_table,
			exec_concat,
		),
		builtin(
			"flatten",
			FormalArgs(vec![FormalArg::eager("src").allow(&[Kind::Table])]),
			ret_table,
			exec_flatten,
		),
		builtin(
			"join",
			FormalArgs(vec![
				FormalArg::eager("tables").allow(&[Kind::Struct]),
				FormalArg::eager("pred").optional(Value::Null).join_closure(),
				FormalArg::eager("map").named().optional(Value::Null).join_closure(),
			]),
			ret_table,
			exec_join,
		),
		builtin(
			"int",
			FormalArgs(vec![FormalArg::eager("value")]),
			ret_int,
			exec_int,
		),
		builtin(
			"float",
			FormalArgs(vec![FormalArg::eager("value")]),
			ret_float,
			exec_float,
		),
		builtin(
			"string",
			FormalArgs(vec![FormalArg::eager("value")]),
			ret_string,
			exec_string,
		),
		builtin(
			"isnull",
			FormalArgs(vec![FormalArg::eager("value")]),
			ret_bool,
			exec_isnull,
		),
	]
}

fn table_of(value: Value) -> Result<Table, Error> {
	Ok(value.to_table()?.clone())
}

fn func_of(value: Value) -> Result<Func, Error> {
	Ok(value.to_func()?.clone())
}

fn opt_func(value: Value) -> Result<Option<Func>, Error> {
	match value {
		Value::Null => Ok(None),
		value => Ok(Some(func_of(value)?)),
	}
}

fn symbol_of(value: Value) -> Result<Symbol, Error> {
	match value {
		Value::Strand(name) => Ok(sym(name.as_str())),
		value => Err(Error::TypeMismatch {
			expected: String::from("a symbol"),
			found: value.kind().to_string(),
		}),
	}
}

fn int_of(value: Value) -> Result<i64, Error> {
	match value {
		Value::Int(v) => Ok(v),
		value => Err(Error::TypeMismatch {
			expected: Kind::Int.to_string(),
			found: value.kind().to_string(),
		}),
	}
}

fn exec_table(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let rows = args.next().map(ArgValue::many).unwrap_or_default();
	for row in &rows {
		row.to_object()?;
	}
	Ok(Value::Table(MemTable::from_rows(rows).into()))
}

fn exec_count(ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("count() arity").one()?)?;
	Ok(Value::Int(src.len(ctx, Len::Exact)? as i64))
}

fn exec_map(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("map() arity").one()?)?;
	let mappers = args
		.next()
		.expect("map() arity")
		.many()
		.into_iter()
		.map(func_of)
		.collect::<Result<Vec<_>, _>>()?;
	let pred = opt_func(args.next().expect("map() arity").one()?)?;
	Ok(Value::Table(MapTable::new(src, pred, mappers)))
}

fn exec_filter(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("filter() arity").one()?)?;
	let pred = func_of(args.next().expect("filter() arity").one()?)?;
	Ok(Value::Table(MapTable::new(src, Some(pred), Vec::new())))
}

fn exec_minn(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("minn() arity").one()?)?;
	let limit = int_of(args.next().expect("minn() arity").one()?)?;
	let key = func_of(args.next().expect("minn() arity").one()?)?;
	// A negative limit keeps every row, which is a full sort
	let limit = usize::try_from(limit).ok();
	Ok(Value::Table(SortTable::new(src, key, limit)))
}

fn exec_sort(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("sort() arity").one()?)?;
	let key = func_of(args.next().expect("sort() arity").one()?)?;
	Ok(Value::Table(SortTable::new(src, key, None)))
}

fn exec_firstn(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("firstn() arity").one()?)?;
	let limit = int_of(args.next().expect("firstn() arity").one()?)?;
	let limit = usize::try_from(limit).unwrap_or(0);
	Ok(Value::Table(FirstnTable::new(src, limit)))
}

fn exec_reduce(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("reduce() arity").one()?)?;
	let key = func_of(args.next().expect("reduce() arity").one()?)?;
	let reducer = func_of(args.next().expect("reduce() arity").one()?)?;
	let map = opt_func(args.next().expect("reduce() arity").one()?)?;
	Ok(Value::Table(ReduceTable::new(src, key, reducer, map)))
}

fn exec_collapse(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("collapse() arity").one()?)?;
	let cols = args
		.next()
		.expect("collapse() arity")
		.many()
		.into_iter()
		.map(symbol_of)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(Value::Table(CollapseTable::new(src, cols)))
}

fn exec_gather(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("gather() arity").one()?)?;
	let key = symbol_of(args.next().expect("gather() arity").one()?)?;
	let value = symbol_of(args.next().expect("gather() arity").one()?)?;
	let cols = args
		.next()
		.expect("gather() arity")
		.many()
		.into_iter()
		.map(symbol_of)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(Value::Table(GatherTable::new(src, key, value, cols)))
}

fn exec_spread(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("spread() arity").one()?)?;
	let key = symbol_of(args.next().expect("spread() arity").one()?)?;
	let value = symbol_of(args.next().expect("spread() arity").one()?)?;
	Ok(Value::Table(SpreadTable::new(src, key, value)))
}

fn exec_transpose(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("transpose() arity").one()?)?;
	let key = func_of(args.next().expect("transpose() arity").one()?)?;
	let cell = func_of(args.next().expect("transpose() arity").one()?)?;
	Ok(Value::Table(TransposeTable::new(src, key, cell)))
}

fn exec_cogroup(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("cogroup() arity").one()?)?;
	let key = func_of(args.next().expect("cogroup() arity").one()?)?;
	Ok(Value::Table(CogroupTable::new(src, key)))
}

fn exec_concat(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let tables = args
		.next()
		.map(ArgValue::many)
		.unwrap_or_default()
		.into_iter()
		.map(table_of)
		.collect::<Result<Vec<_>, _>>()?;
	Ok(Value::Table(ConcatTable::new(tables)))
}

fn exec_flatten(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let src = table_of(args.next().expect("flatten() arity").one()?)?;
	Ok(Value::Table(FlattenTable::new(src)))
}

fn exec_join(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let tables = args.next().expect("join() arity").one()?;
	let tables = tables.to_object()?;
	let mut tags = Vec::with_capacity(tables.len());
	let mut srcs = Vec::with_capacity(tables.len());
	for (tag, table) in tables.iter() {
		tags.push(*tag);
		srcs.push(table.to_table()?.clone());
	}
	let pred = opt_func(args.next().expect("join() arity").one()?)?;
	let map = opt_func(args.next().expect("join() arity").one()?)?;
	Ok(Value::Table(JoinTable::new(tags, srcs, pred, map)?))
}

fn exec_int(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let value = args.next().expect("int() arity").one()?;
	match &value {
		Value::Int(v) => Ok(Value::Int(*v)),
		Value::Float(v) => Ok(Value::Int(*v as i64)),
		Value::Strand(v) => v.as_str().parse::<i64>().map(Value::Int).map_err(|_| {
			Error::InvalidCast {
				from: format!("{value}"),
				into: Kind::Int.to_string(),
			}
		}),
		_ => Err(Error::InvalidCast {
			from: value.kind().to_string(),
			into: Kind::Int.to_string(),
		}),
	}
}

fn exec_float(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let value = args.next().expect("float() arity").one()?;
	match &value {
		Value::Int(v) => Ok(Value::Float(*v as f64)),
		Value::Float(v) => Ok(Value::Float(*v)),
		Value::Strand(v) => v.as_str().parse::<f64>().map(Value::Float).map_err(|_| {
			Error::InvalidCast {
				from: format!("{value}"),
				into: Kind::Float.to_string(),
			}
		}),
		_ => Err(Error::InvalidCast {
			from: value.kind().to_string(),
			into: Kind::Float.to_string(),
		}),
	}
}

fn exec_string(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let value = args.next().expect("string() arity").one()?;
	match &value {
		Value::Strand(v) => Ok(Value::from(v.as_str())),
		Value::Char(v) => Ok(Value::from(v.to_string())),
		Value::Null | Value::Object(_) | Value::Fragment(_) | Value::Table(_) | Value::Func(_) => {
			Err(Error::InvalidCast {
				from: value.kind().to_string(),
				into: Kind::Strand.to_string(),
			})
		}
		value => Ok(Value::from(value.to_string())),
	}
}

fn exec_isnull(_ctx: &Context, args: Vec<ArgValue>) -> Result<Value, Error> {
	let mut args = args.into_iter();
	let value = args.next().expect("isnull() arity").one()?;
	Ok(Value::Bool(value.is_null()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn constants_frame_holds_every_builtin() {
		let frame = constants();
		for name in ["table", "map", "filter", "join", "reduce", "sort", "count"] {
			assert!(frame.get(sym(name)).is_some(), "missing builtin {name}");
		}
	}

	#[test]
	fn registration_survives_validation() {
		// Building the registry validates every formal list
		assert!(!registry().is_empty());
	}

	#[test]
	fn casts() {
		let ctx = Context::background();
		assert_eq!(
			exec_int(&ctx, vec![ArgValue::One(Value::from("42"))]).unwrap(),
			Value::from(42)
		);
		assert_eq!(
			exec_float(&ctx, vec![ArgValue::One(Value::from(2))]).unwrap(),
			Value::from(2.0)
		);
		assert!(matches!(
			exec_int(&ctx, vec![ArgValue::One(Value::from("x"))]),
			Err(Error::InvalidCast { .. })
		));
		assert_eq!(
			exec_string(&ctx, vec![ArgValue::One(Value::from(1.5))]).unwrap(),
			Value::from("1.5")
		);
	}
}
