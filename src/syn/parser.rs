use crate::ast::{
	Binary, Block, Call, CallArg, Column, Cond, Entry, Expr, Field, FieldRegex, Lambda, Literal,
	Logical, Node, ObjectExpr, Pos, Unary, Var,
};
use crate::ast::operator::{BinaryOp, LogicalOp, UnaryOp};
use crate::cnf::{MAX_OBJECT_PARSING_DEPTH, MAX_QUERY_PARSING_DEPTH};
use crate::sym::{sym, Symbol};
use crate::syn::error::SyntaxError;
use crate::syn::lexer::Lexer;
use crate::syn::token::{Token, TokenKind};
use crate::syn::Statement;
use crate::val::Value;
use std::collections::VecDeque;
use std::sync::Arc;

pub type ParseResult<T> = Result<T, SyntaxError>;

/// The recursive-descent parser. Expressions are parsed with operator
/// binding powers; nesting is bounded by the configured depth limits.
pub struct Parser<'a> {
	lexer: Lexer<'a>,
	buffer: VecDeque<Token>,
	last_span: Pos,
	object_depth: usize,
	query_depth: usize,
}

impl<'a> Parser<'a> {
	pub fn new(src: &'a str) -> Parser<'a> {
		Parser {
			lexer: Lexer::new(src),
			buffer: VecDeque::new(),
			last_span: Pos::default(),
			object_depth: *MAX_OBJECT_PARSING_DEPTH,
			query_depth: *MAX_QUERY_PARSING_DEPTH,
		}
	}

	fn fill(&mut self, n: usize) -> ParseResult<()> {
		while self.buffer.len() < n {
			let token = self.lexer.next_token()?;
			self.buffer.push_back(token);
		}
		Ok(())
	}

	fn peek(&mut self) -> ParseResult<&Token> {
		self.fill(1)?;
		Ok(&self.buffer[0])
	}

	fn peek2(&mut self) -> ParseResult<&Token> {
		self.fill(2)?;
		Ok(&self.buffer[1])
	}

	fn next(&mut self) -> ParseResult<Token> {
		self.fill(1)?;
		let token = self.buffer.pop_front().expect("buffer was filled");
		self.last_span = token.span;
		Ok(token)
	}

	fn eat(&mut self, kind: &TokenKind) -> ParseResult<bool> {
		if std::mem::discriminant(&self.peek()?.kind) == std::mem::discriminant(kind) {
			self.next()?;
			Ok(true)
		} else {
			Ok(false)
		}
	}

	fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
		let token = self.next()?;
		if std::mem::discriminant(&token.kind) == std::mem::discriminant(kind) {
			Ok(token)
		} else {
			Err(SyntaxError::new(
				format!("expected {kind}, found {}", token.kind),
				token.span,
			))
		}
	}

	fn expect_ident(&mut self) -> ParseResult<(Symbol, Pos)> {
		let token = self.next()?;
		match token.kind {
			TokenKind::Ident(name) => Ok((name, token.span)),
			kind => Err(SyntaxError::new(
				format!("expected an identifier, found {kind}"),
				token.span,
			)),
		}
	}

	/// Parse a whole program: statements separated by semicolons, with
	/// `load` statements preceding all others.
	pub fn parse_program(&mut self) -> ParseResult<Vec<Statement>> {
		let mut statements = Vec::new();
		let mut seen_other = false;
		loop {
			while self.eat(&TokenKind::Semicolon)? {}
			if self.peek()?.kind == TokenKind::Eof {
				return Ok(statements);
			}
			let statement = self.parse_statement()?;
			match &statement {
				Statement::Load {
					pos,
					..
				} if seen_other => {
					return Err(SyntaxError::new(
						"load statements must precede all other statements",
						*pos,
					));
				}
				Statement::Load {
					..
				} => {}
				_ => seen_other = true,
			}
			statements.push(statement);
			let token = self.peek()?;
			match token.kind {
				TokenKind::Semicolon | TokenKind::Eof => {}
				ref kind => {
					return Err(SyntaxError::new(
						format!("expected ';' between statements, found {kind}"),
						token.span,
					))
				}
			}
		}
	}

	fn parse_statement(&mut self) -> ParseResult<Statement> {
		if self.peek()?.kind == TokenKind::Load {
			let load = self.next()?;
			let token = self.next()?;
			return match token.kind {
				TokenKind::Strand(path) => Ok(Statement::Load {
					path,
					pos: load.span.cover(token.span),
				}),
				kind => Err(SyntaxError::new(
					format!("expected a file path string after 'load', found {kind}"),
					token.span,
				)),
			};
		}
		if matches!(self.peek()?.kind, TokenKind::Ident(_))
			&& self.peek2()?.kind == TokenKind::Assign
		{
			let (name, pos) = self.expect_ident()?;
			self.expect(&TokenKind::Assign)?;
			let expr = self.parse_expr(0)?;
			return Ok(Statement::Assign {
				name,
				pos,
				expr,
			});
		}
		Ok(Statement::Expr(self.parse_expr(0)?))
	}

	pub(crate) fn parse_expr(&mut self, min_bp: u8) -> ParseResult<Expr> {
		if self.query_depth == 0 {
			return Err(SyntaxError::new("expression too deeply nested", self.last_span));
		}
		self.query_depth -= 1;
		let result = self.parse_expr_inner(min_bp);
		self.query_depth += 1;
		result
	}

	fn parse_expr_inner(&mut self, min_bp: u8) -> ParseResult<Expr> {
		let mut lhs = self.parse_prefix()?;
		loop {
			let token = self.peek()?;
			let span = token.span;
			let (bp, op) = match token.kind {
				TokenKind::Dot | TokenKind::LParen => (8, None),
				TokenKind::Star => (6, Some(BinaryOp::Mul)),
				TokenKind::Slash => (6, Some(BinaryOp::Div)),
				TokenKind::Percent => (6, Some(BinaryOp::Rem)),
				TokenKind::Plus => (5, Some(BinaryOp::Add)),
				TokenKind::Minus => (5, Some(BinaryOp::Sub)),
				TokenKind::Eq => (4, Some(BinaryOp::Eq)),
				TokenKind::EqNullRight => (4, Some(BinaryOp::EqNullRight)),
				TokenKind::EqNullLeft => (4, Some(BinaryOp::EqNullLeft)),
				TokenKind::EqNullBoth => (4, Some(BinaryOp::EqNullBoth)),
				TokenKind::Ne => (4, Some(BinaryOp::Ne)),
				TokenKind::Lt => (4, Some(BinaryOp::Lt)),
				TokenKind::Le => (4, Some(BinaryOp::Le)),
				TokenKind::Gt => (4, Some(BinaryOp::Gt)),
				TokenKind::Ge => (4, Some(BinaryOp::Ge)),
				TokenKind::AndAnd => (3, None),
				TokenKind::OrOr => (2, None),
				TokenKind::Pipe => (1, None),
				_ => break,
			};
			if bp < min_bp {
				break;
			}
			let token = self.next()?;
			lhs = match token.kind {
				TokenKind::Dot => self.parse_postfix_dot(lhs)?,
				TokenKind::LParen => self.parse_call(lhs)?,
				TokenKind::AndAnd | TokenKind::OrOr => {
					let op = if token.kind == TokenKind::AndAnd {
						LogicalOp::And
					} else {
						LogicalOp::Or
					};
					let rhs = self.parse_expr(bp + 1)?;
					let pos = lhs.pos.cover(rhs.pos);
					Expr::new(pos, Node::Logical(Logical {
						op,
						lhs: Box::new(lhs),
						rhs: Box::new(rhs),
					}))
				}
				TokenKind::Pipe => {
					let rhs = self.parse_expr(bp + 1)?;
					self.pipe_into(lhs, rhs, span)?
				}
				_ => {
					let op = op.expect("binary operator was matched");
					let rhs = self.parse_expr(bp + 1)?;
					let pos = lhs.pos.cover(rhs.pos);
					Expr::new(pos, Node::Binary(Binary {
						op,
						lhs: Box::new(lhs),
						rhs: Box::new(rhs),
					}))
				}
			};
		}
		Ok(lhs)
	}

	/// Rewrite `A | f(B)` into `f(A, B)` with A flagged pipe-source.
	fn pipe_into(&mut self, lhs: Expr, rhs: Expr, span: Pos) -> ParseResult<Expr> {
		let pos = lhs.pos.cover(rhs.pos);
		let source = CallArg {
			name: None,
			expr: lhs,
			pipe: true,
		};
		match rhs.node {
			Node::Call(mut call) => {
				call.args.insert(0, source);
				Ok(Expr::new(pos, Node::Call(call)))
			}
			// A bare callee pipes into a single-argument call
			Node::Var(_) | Node::Field(_) | Node::Lambda(_) => Ok(Expr::new(
				pos,
				Node::Call(Call {
					func: Box::new(rhs),
					args: vec![source],
					resolved: None,
				}),
			)),
			_ => Err(SyntaxError::new("the pipe target must be a function call", span)),
		}
	}

	fn parse_postfix_dot(&mut self, parent: Expr) -> ParseResult<Expr> {
		// A slash directly after the dot starts a field-regex selection;
		// its body is lexed raw, so nothing may be peeked past the slash
		if self.peek()?.kind == TokenKind::Slash {
			let slash = self.next()?;
			debug_assert!(self.buffer.is_empty(), "regex body was tokenized");
			let pattern = self.lexer.lex_regex()?;
			let end = slash.span.end as usize + pattern.len() + 1;
			let pos = parent.pos.cover(Pos::new(slash.span.start as usize, end));
			let node = FieldRegex::new(Box::new(parent), pattern)
				.map_err(|err| SyntaxError::new(err.to_string(), pos))?;
			return Ok(Expr::new(pos, Node::FieldRegex(node)));
		}
		let (name, span) = self.expect_ident()?;
		let pos = parent.pos.cover(span);
		Ok(Expr::new(pos, Node::Field(Field {
			expr: Box::new(parent),
			name,
		})))
	}

	fn parse_call(&mut self, func: Expr) -> ParseResult<Expr> {
		let mut args = Vec::new();
		if self.peek()?.kind != TokenKind::RParen {
			loop {
				let name = if matches!(self.peek()?.kind, TokenKind::Ident(_))
					&& self.peek2()?.kind == TokenKind::Assign
				{
					let (name, _) = self.expect_ident()?;
					self.expect(&TokenKind::Assign)?;
					Some(name)
				} else {
					None
				};
				let expr = self.parse_expr(0)?;
				args.push(CallArg {
					name,
					expr,
					pipe: false,
				});
				if !self.eat(&TokenKind::Comma)? {
					break;
				}
			}
		}
		let close = self.expect(&TokenKind::RParen)?;
		let pos = func.pos.cover(close.span);
		// `cond(c, t, e)` is the conditional special form, not a call
		if let Node::Var(var) = &func.node {
			if var.name == sym("cond") {
				return cond_from_args(args, pos);
			}
		}
		Ok(Expr::new(pos, Node::Call(Call {
			func: Box::new(func),
			args,
			resolved: None,
		})))
	}

	fn parse_prefix(&mut self) -> ParseResult<Expr> {
		let token = self.next()?;
		let span = token.span;
		let expr = match token.kind {
			TokenKind::Int(v) => literal(span, Value::Int(v)),
			TokenKind::Float(v) => literal(span, Value::Float(v)),
			TokenKind::Strand(v) => literal(span, Value::from(v)),
			TokenKind::Char(v) => literal(span, Value::Char(v)),
			TokenKind::Datetime(v) => literal(span, Value::Datetime(v)),
			TokenKind::Duration(v) => literal(span, Value::Duration(v)),
			TokenKind::True => literal(span, Value::Bool(true)),
			TokenKind::False => literal(span, Value::Bool(false)),
			TokenKind::Null => literal(span, Value::Null),
			TokenKind::Ident(name) => Expr::new(span, Node::Var(Var {
				name,
			})),
			TokenKind::Dollar => {
				let (name, end) = self.expect_ident()?;
				Expr::new(span.cover(end), Node::Column(Column {
					name,
				}))
			}
			TokenKind::Amp => {
				let (name, end) = self.expect_ident()?;
				Expr::new(span.cover(end), Node::ImplicitColumn(Column {
					name,
				}))
			}
			TokenKind::LParen => {
				let expr = self.parse_expr(0)?;
				self.expect(&TokenKind::RParen)?;
				expr
			}
			TokenKind::LBrace => self.parse_brace(span)?,
			TokenKind::Pipe => self.parse_lambda(span, false)?,
			TokenKind::OrOr => self.parse_lambda(span, true)?,
			TokenKind::Func => {
				self.expect(&TokenKind::LParen)?;
				let mut params = Vec::new();
				if self.peek()?.kind != TokenKind::RParen {
					loop {
						let (name, _) = self.expect_ident()?;
						params.push(name);
						if !self.eat(&TokenKind::Comma)? {
							break;
						}
					}
				}
				self.expect(&TokenKind::RParen)?;
				let open = self.expect(&TokenKind::LBrace)?;
				let body = self.parse_brace(open.span)?;
				let pos = span.cover(body.pos);
				Expr::new(pos, Node::Lambda(Lambda {
					params,
					body: Arc::new(body),
				}))
			}
			TokenKind::If => {
				let cond = self.parse_expr(0)?;
				let then = self.parse_expr(0)?;
				let otherwise = if self.eat(&TokenKind::Else)? {
					Some(Box::new(self.parse_expr(0)?))
				} else {
					None
				};
				let pos = span
					.cover(otherwise.as_ref().map(|e| e.pos).unwrap_or(then.pos));
				Expr::new(pos, Node::Cond(Cond {
					cond: Box::new(cond),
					then: Box::new(then),
					otherwise,
				}))
			}
			TokenKind::Minus => {
				let expr = self.parse_expr(7)?;
				let pos = span.cover(expr.pos);
				Expr::new(pos, Node::Unary(Unary {
					op: UnaryOp::Neg,
					expr: Box::new(expr),
				}))
			}
			TokenKind::Bang => {
				let expr = self.parse_expr(7)?;
				let pos = span.cover(expr.pos);
				Expr::new(pos, Node::Unary(Unary {
					op: UnaryOp::Not,
					expr: Box::new(expr),
				}))
			}
			kind => {
				return Err(SyntaxError::new(
					format!("expected an expression, found {kind}"),
					span,
				))
			}
		};
		Ok(expr)
	}

	fn parse_lambda(&mut self, span: Pos, empty_params: bool) -> ParseResult<Expr> {
		let mut params = Vec::new();
		if !empty_params {
			if self.peek()?.kind != TokenKind::Pipe {
				loop {
					let (name, _) = self.expect_ident()?;
					params.push(name);
					if !self.eat(&TokenKind::Comma)? {
						break;
					}
				}
			}
			self.expect(&TokenKind::Pipe)?;
		}
		let body = self.parse_expr(0)?;
		let pos = span.cover(body.pos);
		Ok(Expr::new(pos, Node::Lambda(Lambda {
			params,
			body: Arc::new(body),
		})))
	}

	/// Disambiguate `{ ... }`: a struct literal or a statement block.
	fn parse_brace(&mut self, span: Pos) -> ParseResult<Expr> {
		if self.object_depth == 0 {
			return Err(SyntaxError::new("braces too deeply nested", span));
		}
		self.object_depth -= 1;
		let result = self.parse_brace_inner(span);
		self.object_depth += 1;
		result
	}

	fn parse_brace_inner(&mut self, span: Pos) -> ParseResult<Expr> {
		if self.peek()?.kind == TokenKind::RBrace {
			let close = self.next()?;
			return Ok(Expr::new(span.cover(close.span), Node::Object(ObjectExpr {
				fields: Vec::new(),
			})));
		}
		// `name:` opens a struct, `name :=` opens a block
		if matches!(self.peek()?.kind, TokenKind::Ident(_)) {
			match self.peek2()?.kind {
				TokenKind::Colon => return self.parse_struct(span, None),
				TokenKind::Assign => return self.parse_block(span, None),
				_ => {}
			}
		}
		// Otherwise the separator after the first expression decides
		let first = self.parse_expr(0)?;
		match self.peek()?.kind {
			TokenKind::Semicolon => self.parse_block(span, Some(first)),
			_ => self.parse_struct(span, Some(first)),
		}
	}

	fn parse_struct(&mut self, span: Pos, first: Option<Expr>) -> ParseResult<Expr> {
		let mut fields: Vec<(Option<Symbol>, Expr)> = Vec::new();
		if let Some(first) = first {
			fields.push((derive_field_name(&first, 0), first));
			if !self.eat(&TokenKind::Comma)? {
				let close = self.expect(&TokenKind::RBrace)?;
				return Ok(Expr::new(span.cover(close.span), Node::Object(ObjectExpr {
					fields,
				})));
			}
		}
		loop {
			if self.peek()?.kind == TokenKind::RBrace {
				break;
			}
			let name = if matches!(self.peek()?.kind, TokenKind::Ident(_))
				&& self.peek2()?.kind == TokenKind::Colon
			{
				let (name, _) = self.expect_ident()?;
				self.expect(&TokenKind::Colon)?;
				Some(name)
			} else {
				None
			};
			let expr = self.parse_expr(0)?;
			let name = name.or_else(|| derive_field_name(&expr, fields.len()));
			fields.push((name, expr));
			if !self.eat(&TokenKind::Comma)? {
				break;
			}
		}
		let close = self.expect(&TokenKind::RBrace)?;
		Ok(Expr::new(span.cover(close.span), Node::Object(ObjectExpr {
			fields,
		})))
	}

	fn parse_block(&mut self, span: Pos, first: Option<Expr>) -> ParseResult<Expr> {
		let mut entries = Vec::new();
		if let Some(first) = first {
			entries.push(Entry::Value(first));
			if !self.eat(&TokenKind::Semicolon)? {
				let close = self.expect(&TokenKind::RBrace)?;
				return Ok(Expr::new(span.cover(close.span), Node::Block(Block {
					entries,
				})));
			}
		}
		loop {
			while self.eat(&TokenKind::Semicolon)? {}
			if self.peek()?.kind == TokenKind::RBrace {
				break;
			}
			if matches!(self.peek()?.kind, TokenKind::Ident(_))
				&& self.peek2()?.kind == TokenKind::Assign
			{
				let (name, _) = self.expect_ident()?;
				self.expect(&TokenKind::Assign)?;
				let expr = self.parse_expr(0)?;
				entries.push(Entry::Assign(name, expr));
			} else {
				entries.push(Entry::Value(self.parse_expr(0)?));
			}
			if !self.eat(&TokenKind::Semicolon)? {
				break;
			}
		}
		let close = self.expect(&TokenKind::RBrace)?;
		Ok(Expr::new(span.cover(close.span), Node::Block(Block {
			entries,
		})))
	}
}

fn literal(span: Pos, value: Value) -> Expr {
	Expr::new(span, Node::Literal(Literal {
		value,
		original: None,
	}))
}

/// Derive the field name of an unnamed struct-literal entry from the
/// expression shape: a column ref uses the column name, a var ref the
/// variable name, a field ref its last field, and anything else `fK` for
/// position K. A regex selection stays unnamed and splices its fragment.
fn derive_field_name(expr: &Expr, position: usize) -> Option<Symbol> {
	match &expr.node {
		Node::Column(column) | Node::ImplicitColumn(column) => Some(column.name),
		Node::Var(var) => Some(var.name),
		Node::Field(field) => Some(field.name),
		Node::FieldRegex(_) => None,
		_ => Some(sym(&format!("f{position}"))),
	}
}

fn cond_from_args(args: Vec<CallArg>, pos: Pos) -> ParseResult<Expr> {
	if args.iter().any(|a| a.name.is_some()) || args.len() < 2 || args.len() > 3 {
		return Err(SyntaxError::new(
			"cond() takes two or three positional arguments",
			pos,
		));
	}
	let mut args = args.into_iter();
	let cond = args.next().expect("cond() arity was checked").expr;
	let then = args.next().expect("cond() arity was checked").expr;
	let otherwise = args.next().map(|a| Box::new(a.expr));
	Ok(Expr::new(pos, Node::Cond(Cond {
		cond: Box::new(cond),
		then: Box::new(then),
		otherwise,
	})))
}
