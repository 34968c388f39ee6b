//! The lexer and parser for the GQL expression language.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

use crate::ast::{Expr, Pos};
use crate::err::Error;
use crate::sym::Symbol;

/// One top-level statement of a program.
#[derive(Clone, Debug)]
pub enum Statement {
	/// `name := expr`
	Assign {
		name: Symbol,
		pos: Pos,
		expr: Expr,
	},
	/// A bare expression
	Expr(Expr),
	/// `load "path"`, valid only before all other statements of a file
	Load {
		path: String,
		pos: Pos,
	},
}

/// Parse a whole program.
pub fn parse(src: &str) -> Result<Vec<Statement>, Error> {
	parser::Parser::new(src).parse_program().map_err(|err| err.into_error(src))
}

/// Parse a single expression, requiring the whole input to be consumed.
pub fn expr(src: &str) -> Result<Expr, Error> {
	let mut statements = parse(src)?;
	match (statements.len(), statements.pop()) {
		(1, Some(Statement::Expr(expr))) => Ok(expr),
		_ => Err(Error::Parse {
			message: String::from("expected a single expression"),
			line: 1,
			column: 1,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::Node;
	use crate::sym::sym;

	#[test]
	fn statements_split_on_semicolons() {
		let program = parse("x := 5; x + 3").unwrap();
		assert_eq!(program.len(), 2);
		assert!(matches!(&program[0], Statement::Assign { name, .. } if *name == sym("x")));
		assert!(matches!(&program[1], Statement::Expr(_)));
	}

	#[test]
	fn loads_must_come_first() {
		assert!(parse("load \"a.gql\"; x := 1").is_ok());
		let err = parse("x := 1; load \"a.gql\"").unwrap_err();
		assert!(matches!(err, Error::Parse { .. }));
	}

	#[test]
	fn pipe_rewrites_into_a_call() {
		let e = expr("t | filter($x == 10)").unwrap();
		let Node::Call(call) = &e.node else {
			panic!("expected a call");
		};
		assert_eq!(call.args.len(), 2);
		assert!(call.args[0].pipe);
		assert!(!call.args[1].pipe);
	}

	#[test]
	fn brace_disambiguation() {
		assert!(matches!(expr("{a: 1, b: 2}").unwrap().node, Node::Object(_)));
		assert!(matches!(expr("{a := 1; a + 1}").unwrap().node, Node::Block(_)));
		assert!(matches!(expr("{}").unwrap().node, Node::Object(_)));
		assert!(matches!(expr("{$a, $b}").unwrap().node, Node::Object(_)));
	}

	#[test]
	fn derived_field_names() {
		let e = expr("{$chrom, x.pos, 1 + 2}").unwrap();
		let Node::Object(object) = &e.node else {
			panic!("expected a struct literal");
		};
		assert_eq!(object.fields[0].0, Some(sym("chrom")));
		assert_eq!(object.fields[1].0, Some(sym("pos")));
		assert_eq!(object.fields[2].0, Some(sym("f2")));
	}

	#[test]
	fn field_regex_lexes_raw() {
		let e = expr("row./^e_[0-9]+$/").unwrap();
		let Node::FieldRegex(regex) = &e.node else {
			panic!("expected a field regex");
		};
		assert_eq!(regex.pattern, "^e_[0-9]+$");
	}

	#[test]
	fn conditional_forms() {
		assert!(matches!(expr("if $a > 1 $b else $c").unwrap().node, Node::Cond(_)));
		assert!(matches!(expr("cond($a > 1, $b, $c)").unwrap().node, Node::Cond(_)));
		assert!(matches!(expr("cond(true, 1)").unwrap().node, Node::Cond(_)));
	}

	#[test]
	fn lambda_forms() {
		assert!(matches!(expr("|x, y| x + y").unwrap().node, Node::Lambda(_)));
		assert!(matches!(expr("func(x) {x}").unwrap().node, Node::Lambda(_)));
		let Node::Lambda(lambda) = expr("|| 42").unwrap().node else {
			panic!("expected a lambda");
		};
		assert!(lambda.params.is_empty());
	}

	#[test]
	fn operator_precedence() {
		// `a + b * c == d && e` parses as `((a + (b*c)) == d) && e`
		let e = expr("1 + 2 * 3 == 7 && true").unwrap();
		let Node::Logical(and) = &e.node else {
			panic!("expected '&&' at the root");
		};
		assert!(matches!(and.lhs.node, Node::Binary(_)));
	}

	#[test]
	fn deep_nesting_is_rejected() {
		let mut src = String::new();
		for _ in 0..300 {
			src.push('(');
		}
		src.push('1');
		for _ in 0..300 {
			src.push(')');
		}
		assert!(matches!(expr(&src), Err(Error::Parse { .. })));
	}
}
