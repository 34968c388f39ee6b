use crate::err::Error;
use crate::sym::Symbol;
use crate::val::{Kind, Value};

/// The four mutually-exclusive ways an actual argument reaches its callee.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgMode {
	/// Evaluated before the callee runs
	Eager,
	/// The actual must be a bare identifier; only its name is passed
	Symbol,
	/// The actual expression is wrapped by the analyzer into a lambda
	/// whose parameters are the declared inner arguments
	Closure(Vec<Symbol>),
	/// Like `Closure`, but the inner parameters are the member names of
	/// the struct-of-tables first actual of the enclosing join
	JoinClosure,
}

/// One formal argument descriptor of a builtin function.
#[derive(Clone, Debug)]
pub struct FormalArg {
	/// The argument name, used for `name:=expr` actuals and diagnostics
	pub name: Option<Symbol>,
	/// Whether the argument may be matched by position
	pub positional: bool,
	/// Whether the argument must be supplied at every call site
	pub required: bool,
	/// Whether the argument collects all leftover positional actuals
	pub variadic: bool,
	/// The kinds an eager actual may have; empty defers to the callee's
	/// type callback
	pub allow: Vec<Kind>,
	/// The value used when an optional eager argument is omitted
	pub default: Option<Value>,
	/// The symbol used when an optional symbol argument is omitted
	pub default_symbol: Option<Symbol>,
	/// How the actual reaches the callee
	pub mode: ArgMode,
}

impl FormalArg {
	/// A required positional eager argument
	pub fn eager(name: &str) -> FormalArg {
		FormalArg {
			name: Some(name.into()),
			positional: true,
			required: true,
			variadic: false,
			allow: Vec::new(),
			default: None,
			default_symbol: None,
			mode: ArgMode::Eager,
		}
	}
	/// Restrict the kinds this argument accepts
	pub fn allow(mut self, kinds: &[Kind]) -> FormalArg {
		self.allow = kinds.to_vec();
		self
	}
	/// Make the argument optional with the given default value
	pub fn optional(mut self, default: Value) -> FormalArg {
		self.required = false;
		self.default = Some(default);
		self
	}
	/// Make the argument named-only
	pub fn named(mut self) -> FormalArg {
		self.positional = false;
		self
	}
	/// Make the argument variadic
	pub fn variadic(mut self) -> FormalArg {
		self.variadic = true;
		self.required = false;
		self
	}
	/// Pass the actual as a bare symbol
	pub fn symbol(mut self) -> FormalArg {
		self.mode = ArgMode::Symbol;
		self
	}
	/// Default symbol for an optional symbol argument
	pub fn default_symbol(mut self, name: &str) -> FormalArg {
		self.required = false;
		self.default_symbol = Some(name.into());
		self
	}
	/// Wrap the actual into a lambda over the given inner parameters
	pub fn closure(mut self, inner: &[&str]) -> FormalArg {
		self.mode = ArgMode::Closure(inner.iter().map(|s| Symbol::from(*s)).collect());
		self
	}
	/// Wrap the actual into a lambda over the enclosing join's aliases
	pub fn join_closure(mut self) -> FormalArg {
		self.mode = ArgMode::JoinClosure;
		self
	}
}

/// The formal argument descriptor list of a function.
#[derive(Clone, Debug, Default)]
pub struct FormalArgs(pub Vec<FormalArg>);

/// One materialized argument handed to a callee: a single value for a
/// plain formal, or the collected values of a variadic formal.
#[derive(Clone, Debug)]
pub enum ArgValue {
	One(Value),
	Many(Vec<Value>),
}

impl ArgValue {
	/// Unwrap a single-valued argument
	pub fn one(self) -> Result<Value, Error> {
		match self {
			ArgValue::One(v) => Ok(v),
			ArgValue::Many(_) => Err(Error::Internal {
				message: String::from("variadic values where one was expected"),
			}),
		}
	}
	/// Unwrap the values of a variadic argument
	pub fn many(self) -> Vec<Value> {
		match self {
			ArgValue::One(v) => vec![v],
			ArgValue::Many(vs) => vs,
		}
	}
}

/// How one formal argument is satisfied at a resolved call site.
#[derive(Clone, Debug)]
pub enum Slot {
	/// The actual at this index
	Actual(usize),
	/// All leftover positional actuals, in order
	Variadic(Vec<usize>),
	/// The formal's default value
	Default(Value),
	/// The formal's default symbol
	DefaultSymbol(Symbol),
}

impl FormalArgs {
	/// The descriptor list of a user lambda: each parameter is a required
	/// positional eager argument with no kind restriction
	pub fn lambda(params: &[Symbol]) -> FormalArgs {
		FormalArgs(
			params
				.iter()
				.map(|p| FormalArg {
					name: Some(*p),
					positional: true,
					required: true,
					variadic: false,
					allow: Vec::new(),
					default: None,
					default_symbol: None,
					mode: ArgMode::Eager,
				})
				.collect(),
		)
	}

	/// Validate the descriptor list at registration time.
	pub fn validate(&self, func: &str) -> Result<(), Error> {
		let mut seen_variadic = false;
		let mut seen_non_positional = false;
		for arg in &self.0 {
			if !arg.positional && arg.name.is_none() {
				return Err(Error::Internal {
					message: format!("{func}(): non-positional argument without a name"),
				});
			}
			if arg.variadic && !arg.positional {
				return Err(Error::Internal {
					message: format!("{func}(): variadic argument must be positional"),
				});
			}
			// Only positional arguments may precede a variadic, and no
			// positional argument may follow one
			if arg.variadic && seen_non_positional {
				return Err(Error::Internal {
					message: format!("{func}(): named argument precedes a variadic"),
				});
			}
			if arg.positional && seen_variadic {
				return Err(Error::Internal {
					message: format!("{func}(): positional argument follows a variadic"),
				});
			}
			if arg.variadic {
				seen_variadic = true;
			}
			if !arg.positional {
				seen_non_positional = true;
			}
			if !arg.required {
				match arg.mode {
					ArgMode::Symbol if arg.default_symbol.is_none() && !arg.variadic => {
						return Err(Error::Internal {
							message: format!(
								"{func}(): optional symbol argument without a default symbol"
							),
						});
					}
					ArgMode::Eager if arg.default.is_none() && !arg.variadic => {
						return Err(Error::Internal {
							message: format!(
								"{func}(): optional eager argument without a default value"
							),
						});
					}
					_ => {}
				}
			}
		}
		Ok(())
	}

	/// Match actual arguments against this descriptor list.
	///
	/// Positional actuals are matched by position, named actuals by name.
	/// Each matched actual sets a bit in a bitmap used to detect duplicate
	/// and leftover actuals.
	pub fn match_actuals(
		&self,
		func: &str,
		actuals: &[Option<Symbol>],
	) -> Result<Vec<Slot>, Error> {
		if actuals.len() > 64 {
			return Err(Error::TooManyArgs {
				func: func.to_owned(),
			});
		}
		let mut matched: u64 = 0;
		let mut slots: Vec<Option<Slot>> = vec![None; self.0.len()];
		// Match named actuals against formal names first
		for (i, actual) in actuals.iter().enumerate() {
			let Some(name) = actual else {
				continue;
			};
			let Some(f) = self.0.iter().position(|a| a.name == Some(*name)) else {
				return Err(Error::TooManyArgs {
					func: func.to_owned(),
				});
			};
			if slots[f].is_some() {
				return Err(Error::DuplicateArg {
					name: name.to_string(),
					func: func.to_owned(),
				});
			}
			slots[f] = Some(Slot::Actual(i));
			matched |= 1 << i;
		}
		// Feed unnamed actuals to the remaining positional formals in order
		let mut next = 0;
		for (f, formal) in self.0.iter().enumerate() {
			if slots[f].is_some() || !formal.positional {
				continue;
			}
			if formal.variadic {
				let mut rest = Vec::new();
				for (i, actual) in actuals.iter().enumerate().skip(next) {
					if actual.is_none() && matched & (1 << i) == 0 {
						rest.push(i);
						matched |= 1 << i;
					}
				}
				slots[f] = Some(Slot::Variadic(rest));
				continue;
			}
			while next < actuals.len()
				&& (actuals[next].is_some() || matched & (1 << next) != 0)
			{
				next += 1;
			}
			if next < actuals.len() {
				slots[f] = Some(Slot::Actual(next));
				matched |= 1 << next;
				next += 1;
			}
		}
		// Any unmatched actual is a leftover
		for i in 0..actuals.len() {
			if matched & (1 << i) == 0 {
				return Err(Error::TooManyArgs {
					func: func.to_owned(),
				});
			}
		}
		// Fill defaults, failing on missing required arguments
		let mut out = Vec::with_capacity(self.0.len());
		for (f, formal) in self.0.iter().enumerate() {
			match slots[f].take() {
				Some(slot) => out.push(slot),
				None if formal.required => {
					return Err(Error::MissingArg {
						name: formal.name.map(|n| n.to_string()).unwrap_or_else(|| f.to_string()),
						func: func.to_owned(),
					});
				}
				None => match (&formal.default, formal.default_symbol) {
					(_, Some(sym)) => out.push(Slot::DefaultSymbol(sym)),
					(Some(value), _) => out.push(Slot::Default(value.clone())),
					(None, None) => out.push(Slot::Default(Value::Null)),
				},
			}
		}
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sym::sym;

	fn formals() -> FormalArgs {
		FormalArgs(vec![
			FormalArg::eager("src").allow(&[Kind::Table]),
			FormalArg::eager("limit").optional(Value::from(-1)),
			FormalArg::eager("row").named().symbol().default_symbol("_"),
		])
	}

	#[test]
	fn positional_and_named_matching() {
		let plan = formals()
			.match_actuals("minn", &[None, None, Some(sym("row"))])
			.unwrap();
		assert!(matches!(plan[0], Slot::Actual(0)));
		assert!(matches!(plan[1], Slot::Actual(1)));
		assert!(matches!(plan[2], Slot::Actual(2)));
	}

	#[test]
	fn defaults_fill_omitted_arguments() {
		let plan = formals().match_actuals("minn", &[None]).unwrap();
		assert!(matches!(plan[0], Slot::Actual(0)));
		assert!(matches!(plan[1], Slot::Default(Value::Int(-1))));
		assert!(matches!(plan[2], Slot::DefaultSymbol(s) if s == sym("_")));
	}

	#[test]
	fn duplicate_and_leftover_actuals_fail() {
		let err = formals()
			.match_actuals("minn", &[None, Some(sym("limit")), Some(sym("limit"))])
			.unwrap_err();
		assert!(matches!(err, Error::DuplicateArg { .. }));
		let err = formals().match_actuals("minn", &[None, None, None, None]).unwrap_err();
		assert!(matches!(err, Error::TooManyArgs { .. }));
	}

	#[test]
	fn missing_required_actual_fails() {
		let err = formals().match_actuals("minn", &[]).unwrap_err();
		assert!(matches!(err, Error::MissingArg { .. }));
	}

	#[test]
	fn variadic_collects_leftovers() {
		let formals = FormalArgs(vec![
			FormalArg::eager("src").allow(&[Kind::Table]),
			FormalArg::eager("mapper").variadic().closure(&["_"]),
		]);
		let plan = formals.match_actuals("map", &[None, None, None]).unwrap();
		assert!(matches!(plan[0], Slot::Actual(0)));
		assert!(matches!(&plan[1], Slot::Variadic(v) if v == &[1, 2]));
	}

	#[test]
	fn registration_validation() {
		// A positional argument may not follow a variadic one
		let bad = FormalArgs(vec![
			FormalArg::eager("rest").variadic(),
			FormalArg::eager("after"),
		]);
		assert!(bad.validate("bad").is_err());
		// Non-positional arguments require a name
		let bad = FormalArgs(vec![FormalArg {
			name: None,
			positional: false,
			required: true,
			variadic: false,
			allow: Vec::new(),
			default: None,
			default_symbol: None,
			mode: ArgMode::Eager,
		}]);
		assert!(bad.validate("bad").is_err());
		// Optional eager arguments require a default
		let bad = FormalArgs(vec![FormalArg {
			name: Some(sym("x")),
			positional: true,
			required: false,
			variadic: false,
			allow: Vec::new(),
			default: None,
			default_symbol: None,
			mode: ArgMode::Eager,
		}]);
		assert!(bad.validate("bad").is_err());
		assert!(formals().validate("minn").is_ok());
	}
}
