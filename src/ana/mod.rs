//! The static analyzer. Runs once per statement before evaluation: infers
//! a type for every node, resolves call sites against formal-argument
//! descriptors, synthesizes closures for lazy and column-referencing
//! actuals, and replaces constant subtrees with literals.

use crate::ast::{CallArg, Expr, Lambda, Literal, Node, Resolved, ResolvedArg};
use crate::ctx::Context;
use crate::env::Env;
use crate::err::Error;
use crate::fnc::args::{ArgMode, FormalArgs, Slot};
use crate::sym::{Symbol, ROW};
use crate::val::{Func, Kind, Value};
use std::sync::Arc;

/// The type the analyzer assigns to an expression.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum AnalyzedType {
	/// Statically unknown; every check defers to the runtime
	Any,
	Scalar(Kind),
	Struct,
	Table,
	Func(FuncType),
}

/// The callable shape of a function-typed expression.
#[derive(Clone, Debug)]
pub struct FuncType {
	pub args: FormalArgs,
	pub ret: fn(&[AnalyzedType]) -> AnalyzedType,
}

impl std::fmt::Display for AnalyzedType {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			AnalyzedType::Any => write!(f, "any"),
			AnalyzedType::Scalar(kind) => write!(f, "{kind}"),
			AnalyzedType::Struct => write!(f, "struct"),
			AnalyzedType::Table => write!(f, "table"),
			AnalyzedType::Func(_) => write!(f, "func"),
		}
	}
}

impl AnalyzedType {
	/// The analyzed type of a known value
	pub fn of_value(value: &Value) -> AnalyzedType {
		match value {
			Value::Object(_) => AnalyzedType::Struct,
			Value::Table(_) => AnalyzedType::Table,
			Value::Func(func) => AnalyzedType::Func(FuncType {
				args: func.formals().clone(),
				ret: func.ret(),
			}),
			value => AnalyzedType::Scalar(value.kind()),
		}
	}

	/// Whether this type satisfies one of the allowed kinds. String-like
	/// and date-like kind groups are treated as equivalent; a statically
	/// unknown type always passes and is enforced at runtime.
	fn allowed(&self, allow: &[Kind]) -> bool {
		let kind = match self {
			AnalyzedType::Any => return true,
			AnalyzedType::Scalar(kind) => *kind,
			AnalyzedType::Struct => Kind::Struct,
			AnalyzedType::Table => Kind::Table,
			AnalyzedType::Func(_) => Kind::Func,
		};
		if kind == Kind::Null {
			// Null satisfies any constraint; the null-aware operators
			// decide what it means
			return true;
		}
		allow.iter().any(|a| *a == kind || group(*a) == group(kind) && group(kind) != 0)
	}
}

/// Kind groups: values of one group share a merged sort order and are
/// interchangeable in allow-lists.
fn group(kind: Kind) -> u8 {
	match kind {
		Kind::Strand => 1,
		Kind::Datetime => 2,
		_ => 0,
	}
}

/// Analyze one statement expression in place. Constant folding evaluates
/// under the given context, so cancellation and deadlines govern
/// analysis-time execution as well.
pub fn analyze(
	expr: &mut Expr,
	ctx: &Context,
	env: &Env,
	src: &str,
) -> Result<AnalyzedType, Error> {
	let mut analyzer = Analyzer {
		ctx,
		env,
		src,
		scopes: Vec::new(),
	};
	analyzer.visit(expr)
}

struct Analyzer<'a> {
	ctx: &'a Context,
	env: &'a Env,
	#[allow(dead_code)]
	src: &'a str,
	/// Local lambda-parameter and block-binding scopes
	scopes: Vec<Vec<(Symbol, AnalyzedType)>>,
}

impl<'a> Analyzer<'a> {
	fn local(&self, name: Symbol) -> Option<&AnalyzedType> {
		self.scopes.iter().rev().find_map(|scope| {
			scope.iter().rev().find(|(n, _)| *n == name).map(|(_, t)| t)
		})
	}

	fn visit(&mut self, expr: &mut Expr) -> Result<AnalyzedType, Error> {
		if matches!(expr.node, Node::Call(_)) {
			let typ = self.visit_call(expr)?;
			self.fold(expr);
			return Ok(typ);
		}
		let typ = match &mut expr.node {
			Node::Literal(literal) => AnalyzedType::of_value(&literal.value),
			Node::Var(var) => match self.local(var.name) {
				Some(typ) => typ.clone(),
				None => match self.env.lookup(var.name) {
					Some(value) => AnalyzedType::of_value(value),
					None => {
						return Err(Error::UnboundVariable {
							name: var.name.to_string(),
						})
					}
				},
			},
			Node::Column(_) => AnalyzedType::Any,
			Node::ImplicitColumn(column) => {
				// Reachable only when no enclosing call wrapped the
				// actual; the reference has nothing to bind to
				return Err(Error::UnboundVariable {
					name: format!("&{}", column.name),
				});
			}
			Node::Field(field) => {
				self.visit(&mut field.expr)?;
				AnalyzedType::Any
			}
			Node::FieldRegex(regex) => {
				self.visit(&mut regex.expr)?;
				AnalyzedType::Scalar(Kind::Fragment)
			}
			Node::Object(object) => {
				for (_, field) in &mut object.fields {
					self.visit(field)?;
				}
				AnalyzedType::Struct
			}
			Node::Cond(cond) => {
				self.visit(&mut cond.cond)?;
				self.visit(&mut cond.then)?;
				if let Some(otherwise) = &mut cond.otherwise {
					self.visit(otherwise)?;
				}
				AnalyzedType::Any
			}
			Node::Logical(logical) => {
				self.visit(&mut logical.lhs)?;
				self.visit(&mut logical.rhs)?;
				AnalyzedType::Scalar(Kind::Bool)
			}
			Node::Unary(unary) => {
				self.visit(&mut unary.expr)?;
				AnalyzedType::Any
			}
			Node::Binary(binary) => {
				self.visit(&mut binary.lhs)?;
				self.visit(&mut binary.rhs)?;
				if binary.op.is_equality() {
					AnalyzedType::Scalar(Kind::Bool)
				} else {
					AnalyzedType::Any
				}
			}
			Node::Lambda(lambda) => {
				self.scopes.push(
					lambda.params.iter().map(|p| (*p, AnalyzedType::Any)).collect(),
				);
				let result = self.visit(Arc::make_mut(&mut lambda.body));
				self.scopes.pop();
				result?;
				AnalyzedType::Func(FuncType {
					args: FormalArgs::lambda(&lambda.params),
					ret: |_| AnalyzedType::Any,
				})
			}
			Node::Block(block) => {
				self.scopes.push(Vec::new());
				let result = self.visit_block(block);
				self.scopes.pop();
				result?
			}
			Node::Call(_) => {
				return Err(Error::Internal {
					message: String::from("call nodes are dispatched before the match"),
				})
			}
		};
		self.fold(expr);
		Ok(typ)
	}

	/// Replace a constant subtree with its literal, keeping the original
	/// for diagnostics. A subtree whose evaluation fails is left in place
	/// so short-circuited branches stay unevaluated.
	fn fold(&self, expr: &mut Expr) {
		if !self.foldable(expr) {
			return;
		}
		let mut env = self.env.clone();
		if let Ok(value) = expr.eval(self.ctx, &mut env) {
			let original = std::mem::replace(expr, Expr::literal(Value::Null));
			expr.pos = original.pos;
			expr.node = Node::Literal(Literal {
				value,
				original: Some(Box::new(original)),
			});
		}
	}

	fn visit_block(&mut self, block: &mut crate::ast::Block) -> Result<AnalyzedType, Error> {
		let mut last = AnalyzedType::Scalar(Kind::Null);
		for entry in &mut block.entries {
			match entry {
				crate::ast::Entry::Assign(name, expr) => {
					let typ = self.visit(expr)?;
					let scope = self.scopes.last_mut().expect("block scope was pushed");
					if scope.iter().any(|(n, _)| n == name) {
						return Err(Error::DuplicateArg {
							name: name.to_string(),
							func: String::from("block"),
						});
					}
					scope.push((*name, typ));
					last = AnalyzedType::Scalar(Kind::Null);
				}
				crate::ast::Entry::Value(expr) => {
					last = self.visit(expr)?;
				}
			}
		}
		Ok(last)
	}

	/// Resolve a call site: match actuals to formals, synthesize closures,
	/// check eager types, and record the resolution on the node.
	fn visit_call(&mut self, expr: &mut Expr) -> Result<AnalyzedType, Error> {
		let Node::Call(call) = &mut expr.node else {
			return Err(Error::Internal {
				message: String::from("visit_call on a non-call node"),
			});
		};
		let ftype = self.visit(&mut call.func)?;
		// Only a statically known function literal resolves formals;
		// anything else is a runtime call with eager positional actuals
		let func = match &call.func.node {
			Node::Literal(Literal {
				value: Value::Func(func),
				..
			}) => func.clone(),
			_ => {
				for arg in &mut call.args {
					let contains = contains_implicit(&arg.expr);
					if contains && !arg.pipe {
						wrap_actual(&mut arg.expr, vec![*ROW]);
					}
					self.visit(&mut arg.expr)?;
				}
				return Ok(match ftype {
					AnalyzedType::Func(_) | AnalyzedType::Any => AnalyzedType::Any,
					typ => {
						return Err(Error::TypeMismatch {
							expected: Kind::Func.to_string(),
							found: typ.to_string(),
						})
					}
				});
			}
		};
		let name = func.name().to_owned();
		let actual_names: Vec<Option<Symbol>> = call.args.iter().map(|a| a.name).collect();
		let slots = func.formals().match_actuals(&name, &actual_names)?;
		// A `row:=name` actual renames the synthesized row parameter
		let row_override = row_override(&func, &slots, &call.args);
		let mut resolved = Vec::with_capacity(slots.len());
		let mut types = Vec::with_capacity(slots.len());
		for (formal, slot) in func.formals().0.iter().zip(slots) {
			match slot {
				Slot::Actual(i) => {
					let mut arg = call.args[i].clone();
					let (typ, arg) = self.resolve_actual(&name, formal, &mut arg, &call.args, row_override)?;
					types.push(typ);
					resolved.push(arg);
				}
				Slot::Variadic(indices) => {
					let mut exprs = Vec::with_capacity(indices.len());
					let mut symbols = Vec::with_capacity(indices.len());
					for i in indices {
						let mut arg = call.args[i].clone();
						let (_, one) = self.resolve_actual(&name, formal, &mut arg, &call.args, row_override)?;
						match one {
							ResolvedArg::One(e) => exprs.push(e),
							ResolvedArg::Symbol(s) => symbols.push(s),
							_ => {}
						}
					}
					if matches!(formal.mode, ArgMode::Symbol) {
						resolved.push(ResolvedArg::Symbols(symbols));
					} else {
						resolved.push(ResolvedArg::Many(exprs));
					}
					types.push(AnalyzedType::Any);
				}
				Slot::Default(value) => {
					types.push(AnalyzedType::of_value(&value));
					resolved.push(ResolvedArg::One(Expr::literal(value)));
				}
				Slot::DefaultSymbol(symbol) => {
					types.push(AnalyzedType::Scalar(Kind::Strand));
					resolved.push(ResolvedArg::Symbol(symbol));
				}
			}
		}
		let ret = (func.ret())(&types);
		call.resolved = Some(Resolved {
			func,
			args: resolved,
		});
		Ok(ret)
	}

	/// Resolve one matched actual against its formal descriptor.
	fn resolve_actual(
		&mut self,
		func: &str,
		formal: &crate::fnc::args::FormalArg,
		arg: &mut CallArg,
		all_args: &[CallArg],
		row_override: Option<Symbol>,
	) -> Result<(AnalyzedType, ResolvedArg), Error> {
		match &formal.mode {
			ArgMode::Symbol => match &arg.expr.node {
				Node::Var(var) => Ok((AnalyzedType::Scalar(Kind::Strand), ResolvedArg::Symbol(var.name))),
				_ => Err(Error::TypeMismatch {
					expected: format!("a bare identifier for {}() argument", func),
					found: arg.expr.to_string(),
				}),
			},
			ArgMode::Eager => {
				// An implicit column reference turns the whole actual
				// into a synthesized unary closure; the pipe source is
				// exempt since the call provides the row side itself
				if contains_implicit(&arg.expr) && !arg.pipe {
					let param = row_override.unwrap_or(*ROW);
					wrap_actual(&mut arg.expr, vec![param]);
				}
				let typ = self.visit(&mut arg.expr)?;
				if !formal.allow.is_empty() && !typ.allowed(&formal.allow) {
					return Err(Error::TypeMismatch {
						expected: format!(
							"one of {:?} for {}() argument '{}'",
							formal.allow,
							func,
							formal.name.map(|n| n.to_string()).unwrap_or_default()
						),
						found: format!("{typ} in `{}`", arg.expr),
					});
				}
				Ok((typ, ResolvedArg::One(arg.expr.clone())))
			}
			ArgMode::Closure(inner) => {
				if !matches!(arg.expr.node, Node::Lambda(_)) {
					let mut params = inner.clone();
					if let Some(over) = row_override {
						if params.as_slice() == [*ROW] {
							params = vec![over];
						}
					}
					wrap_actual(&mut arg.expr, params);
				}
				let typ = self.visit(&mut arg.expr)?;
				Ok((typ, ResolvedArg::One(arg.expr.clone())))
			}
			ArgMode::JoinClosure => {
				// Inner parameters are the member names of the first
				// (struct-of-tables) actual of the call
				let aliases = join_aliases(all_args).ok_or_else(|| Error::TypeMismatch {
					expected: String::from("a struct of tables as the first join() argument"),
					found: all_args
						.first()
						.map(|a| a.expr.to_string())
						.unwrap_or_default(),
				})?;
				if !matches!(arg.expr.node, Node::Lambda(_)) {
					wrap_actual(&mut arg.expr, aliases);
				}
				let typ = self.visit(&mut arg.expr)?;
				Ok((typ, ResolvedArg::One(arg.expr.clone())))
			}
		}
	}

	/// Whether a node may be replaced by its value. Children fold first,
	/// so constancy of composites reduces to literal children; a variable
	/// is constant when it resolves outside any local scope, i.e. to the
	/// builtin constants or the session globals known at analysis time.
	fn foldable(&self, expr: &Expr) -> bool {
		let lit = |e: &Expr| matches!(e.node, Node::Literal(_));
		match &expr.node {
			Node::Literal(_) => false,
			Node::Var(var) => self.local(var.name).is_none() && self.env.lookup(var.name).is_some(),
			Node::Column(_) | Node::ImplicitColumn(_) => false,
			Node::Field(field) => lit(&field.expr),
			Node::FieldRegex(regex) => lit(&regex.expr),
			Node::Object(object) => object.fields.iter().all(|(_, e)| lit(e)),
			Node::Cond(cond) => {
				lit(&cond.cond)
					&& lit(&cond.then)
					&& cond.otherwise.as_ref().map_or(true, |e| lit(e))
			}
			Node::Logical(logical) => lit(&logical.lhs) && lit(&logical.rhs),
			Node::Unary(unary) => lit(&unary.expr),
			Node::Binary(binary) => lit(&binary.lhs) && lit(&binary.rhs),
			Node::Lambda(_) | Node::Block(_) => false,
			Node::Call(call) => match &call.resolved {
				Some(resolved) => resolved.args.iter().all(|arg| match arg {
					ResolvedArg::One(e) => lit(e),
					ResolvedArg::Many(es) => es.iter().all(lit),
					ResolvedArg::Symbol(_) | ResolvedArg::Symbols(_) => true,
				}),
				None => false,
			},
		}
	}
}

/// The row parameter name from a resolved `row:=name` symbol actual.
fn row_override(func: &Func, slots: &[Slot], args: &[CallArg]) -> Option<Symbol> {
	let row = crate::sym::sym("row");
	let at = func
		.formals()
		.0
		.iter()
		.position(|f| f.name == Some(row) && matches!(f.mode, ArgMode::Symbol))?;
	match slots.get(at)? {
		Slot::Actual(i) => match &args[*i].expr.node {
			Node::Var(var) => Some(var.name),
			_ => None,
		},
		_ => None,
	}
}

/// The alias list of a join call: the field names of its first actual,
/// which must be a struct literal of tables.
fn join_aliases(args: &[CallArg]) -> Option<Vec<Symbol>> {
	let first = args.iter().find(|a| a.name.is_none())?;
	match &first.expr.node {
		Node::Object(object) => {
			let mut aliases = Vec::with_capacity(object.fields.len());
			for (name, _) in &object.fields {
				aliases.push((*name)?);
			}
			Some(aliases)
		}
		_ => None,
	}
}

/// Whether the tree contains an implicit column reference `&col`.
/// A nested lambda keeps its own references; the wrap binds only the
/// references that have no closer binder.
fn contains_implicit(expr: &Expr) -> bool {
	match &expr.node {
		Node::ImplicitColumn(_) => true,
		Node::Literal(_) | Node::Var(_) | Node::Column(_) => false,
		Node::Field(field) => contains_implicit(&field.expr),
		Node::FieldRegex(regex) => contains_implicit(&regex.expr),
		Node::Object(object) => object.fields.iter().any(|(_, e)| contains_implicit(e)),
		Node::Cond(cond) => {
			contains_implicit(&cond.cond)
				|| contains_implicit(&cond.then)
				|| cond.otherwise.as_ref().is_some_and(|e| contains_implicit(e))
		}
		Node::Logical(logical) => {
			contains_implicit(&logical.lhs) || contains_implicit(&logical.rhs)
		}
		Node::Unary(unary) => contains_implicit(&unary.expr),
		Node::Binary(binary) => contains_implicit(&binary.lhs) || contains_implicit(&binary.rhs),
		Node::Lambda(_) => false,
		Node::Block(block) => block.entries.iter().any(|entry| match entry {
			crate::ast::Entry::Assign(_, e) | crate::ast::Entry::Value(e) => contains_implicit(e),
		}),
		Node::Call(call) => {
			contains_implicit(&call.func) || call.args.iter().any(|a| contains_implicit(&a.expr))
		}
	}
}

/// Rewrite `&col` into `param.col` throughout the tree.
fn rewrite_implicit(expr: &mut Expr, param: Symbol) {
	match &mut expr.node {
		Node::ImplicitColumn(column) => {
			let name = column.name;
			let pos = expr.pos;
			expr.node = Node::Field(crate::ast::Field {
				expr: Box::new(Expr::new(pos, Node::Var(crate::ast::Var {
					name: param,
				}))),
				name,
			});
		}
		Node::Literal(_) | Node::Var(_) | Node::Column(_) => {}
		Node::Field(field) => rewrite_implicit(&mut field.expr, param),
		Node::FieldRegex(regex) => rewrite_implicit(&mut regex.expr, param),
		Node::Object(object) => {
			for (_, e) in &mut object.fields {
				rewrite_implicit(e, param);
			}
		}
		Node::Cond(cond) => {
			rewrite_implicit(&mut cond.cond, param);
			rewrite_implicit(&mut cond.then, param);
			if let Some(otherwise) = &mut cond.otherwise {
				rewrite_implicit(otherwise, param);
			}
		}
		Node::Logical(logical) => {
			rewrite_implicit(&mut logical.lhs, param);
			rewrite_implicit(&mut logical.rhs, param);
		}
		Node::Unary(unary) => rewrite_implicit(&mut unary.expr, param),
		Node::Binary(binary) => {
			rewrite_implicit(&mut binary.lhs, param);
			rewrite_implicit(&mut binary.rhs, param);
		}
		Node::Lambda(_) => {}
		Node::Block(block) => {
			for entry in &mut block.entries {
				match entry {
					crate::ast::Entry::Assign(_, e) | crate::ast::Entry::Value(e) => {
						rewrite_implicit(e, param)
					}
				}
			}
		}
		Node::Call(call) => {
			rewrite_implicit(&mut call.func, param);
			for arg in &mut call.args {
				rewrite_implicit(&mut arg.expr, param);
			}
		}
	}
}

/// Wrap an actual into a lambda over the given parameters, rewriting any
/// implicit column references to read the first parameter.
fn wrap_actual(expr: &mut Expr, params: Vec<Symbol>) {
	if let Some(first) = params.first() {
		rewrite_implicit(expr, *first);
	}
	let pos = expr.pos;
	let body = std::mem::replace(expr, Expr::literal(Value::Null));
	*expr = Expr::new(pos, Node::Lambda(Lambda {
		params,
		body: Arc::new(body),
	}));
}
