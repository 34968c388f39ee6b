use gql_core::ast::Node;
use gql_core::ctx::Context;
use gql_core::err::Error;
use gql_core::val::Value;
use gql_core::{ana, syn, Session};

fn run(src: &str) -> Value {
	Session::new().run(src).expect("program should evaluate")
}

fn rows(value: &Value) -> Vec<Value> {
	let Value::Table(table) = value else {
		panic!("expected a table, got {value}");
	};
	table.rows(&Context::background()).expect("table should scan")
}

#[test]
fn arithmetic_over_globals() {
	assert_eq!(run("x := 5; x + 3"), Value::from(8));
}

#[test]
fn filter_and_map_pipeline() {
	let out = run("table({a:1,b:2},{a:3,b:4}) | filter($a > 1) | map({a:$a, b:$b + 1})");
	assert_eq!(rows(&out), vec![Value::Object(gql_core::obj! {"a" => 3, "b" => 5})]);
}

#[test]
fn blocks_scope_their_bindings() {
	assert_eq!(run("{ a := 1; b := a + 1; a + b }"), Value::from(3));
	let mut session = Session::new();
	session.run("{ a := 1; a }").unwrap();
	assert!(matches!(
		session.run("a"),
		Err(Error::UnboundVariable { .. })
	));
}

#[test]
fn short_circuits_never_evaluate_the_skipped_branch() {
	// The skipped operand divides by zero, which would error if reached
	assert_eq!(run("false && (1 / 0 == 1)"), Value::from(false));
	assert_eq!(run("true || (1 / 0 == 1)"), Value::from(true));
	assert_eq!(run("cond(true, 1, 1 / 0)"), Value::from(1));
	assert_eq!(run("if false 1 / 0 else 7"), Value::from(7));
	// The taken branch still errors
	assert!(Session::new().run("cond(false, 1, 1 / 0)").is_err());
}

#[test]
fn conditional_with_implicit_else_is_null() {
	assert_eq!(run("if false 1"), Value::Null);
}

#[test]
fn equality_variants_on_scalars() {
	assert_eq!(run("1 == 1"), Value::from(true));
	assert_eq!(run("null == null"), Value::from(false));
	assert_eq!(run("1 ==? null"), Value::from(true));
	assert_eq!(run("null ==? 1"), Value::from(false));
	assert_eq!(run("null ?== 1"), Value::from(true));
	assert_eq!(run("null ?==? null"), Value::from(true));
}

#[test]
fn lambdas_capture_their_environment() {
	let mut session = Session::new();
	session.run("x := 5; f := |y| x + y").unwrap();
	// Rebinding the global does not affect the captured environment
	session.run("x := 100").unwrap();
	assert_eq!(session.run("f(1)").unwrap(), Value::from(6));
}

#[test]
fn named_arguments_and_row_rename() {
	let out = run("t := table({a:1},{a:2}); t | filter(r.a == 2, row:=r)");
	assert_eq!(rows(&out).len(), 1);
}

#[test]
fn dollar_requires_a_bound_row() {
	// `$col` is a direct dereference of `_`, valid only where `_` is
	// already bound; at the top level it is not
	assert!(matches!(
		Session::new().run("$a"),
		Err(Error::UnboundVariable { .. })
	));
	// `&col` introduces the binding through closure synthesis instead,
	// so a bare `&` has nothing to attach to
	assert!(Session::new().run("&a").is_err());
}

#[test]
fn struct_field_access_and_collision() {
	assert_eq!(run("s := {a: 1, b: 2}; s.a + s.b"), Value::from(3));
	// An absent field reads as null
	assert_eq!(run("s := {a: 1}; s.missing"), Value::Null);
	// A colliding field name takes the later value
	assert_eq!(run("s := {a: 1, a: 2}; s.a"), Value::from(2));
}

#[test]
fn struct_regex_selection_splices() {
	let out = run("s := {e_1: 1, e_2: 2, other: 9}; {s./^e_/, total: s.other}");
	let Value::Object(obj) = out else {
		panic!("expected a struct");
	};
	assert_eq!(obj.len(), 3);
	// A regex with no matching field is an error
	assert!(matches!(
		Session::new().run("s := {a: 1}; {s./^zz/}"),
		Err(Error::NoRegexMatch { .. })
	));
}

#[test]
fn call_site_errors() {
	assert!(matches!(
		Session::new().run("filter(table({a:1}))"),
		Err(Error::MissingArg { .. })
	));
	assert!(matches!(
		Session::new().run("count(table({a:1}), 2)"),
		Err(Error::TooManyArgs { .. })
	));
	assert!(matches!(
		Session::new().run("sort(table({a:1}), key:=|r|r.a, key:=|r|r.a)"),
		Err(Error::DuplicateArg { .. })
	));
	assert!(matches!(
		Session::new().run("nosuchfn(1)"),
		Err(Error::UnboundVariable { .. })
	));
	assert!(matches!(
		Session::new().run("count(1)"),
		Err(Error::TypeMismatch { .. })
	));
}

#[test]
fn casts_and_cast_failures() {
	assert_eq!(run("int(\"42\")"), Value::from(42));
	assert_eq!(run("float(2)"), Value::from(2.0));
	assert_eq!(run("string(1.5)"), Value::from("1.5"));
	assert!(matches!(
		Session::new().run("int(\"not a number\")"),
		Err(Error::InvalidCast { .. })
	));
}

#[test]
fn a_failed_statement_leaves_the_session_usable() {
	let mut session = Session::new();
	session.run("x := 10").unwrap();
	let responses = session.execute("y := nosuch + 1; x + 1");
	assert!(responses[0].result.is_err());
	assert_eq!(responses[1].result.as_ref().unwrap(), &Value::from(11));
	assert!(matches!(session.run("y"), Err(Error::UnboundVariable { .. })));
}

#[test]
fn scalar_print_parse_hash_round_trip() {
	let values = vec![
		Value::from(42),
		Value::from(-7),
		Value::from(2.5),
		Value::from(3.0),
		Value::from(true),
		Value::from("hello\nworld"),
		Value::Char('q'),
		run("1h2m3s"),
		run("2018-04-16T15:19:35Z"),
	];
	for value in values {
		let printed = value.to_string();
		let reparsed = Session::new().run(&printed).unwrap();
		assert_eq!(value.digest(), reparsed.digest(), "round-trip of {printed}");
	}
}

#[test]
fn constant_folding_preserves_node_digests() {
	let mut session = Session::new();
	session.run("x := 5").unwrap();
	let env = session.env().clone();
	let src = "x + 3 * 2";
	let mut expr = syn::expr(src).unwrap();
	let before = expr.digest(&env);
	ana::analyze(&mut expr, &Context::background(), &env, src).unwrap();
	// The whole statement folded to a literal retaining the original
	assert!(matches!(&expr.node, Node::Literal(lit) if lit.original.is_some()));
	assert_eq!(expr.digest(&env), before);
	let mut env = env.clone();
	assert_eq!(
		expr.eval(&Context::background(), &mut env).unwrap(),
		Value::from(11)
	);
}

#[test]
fn var_digest_tracks_the_bound_value() {
	let mut session = Session::new();
	session.run("x := 1").unwrap();
	let env1 = session.env().clone();
	session.run("x := 2").unwrap();
	let env2 = session.env().clone();
	let expr = syn::expr("x + 0").unwrap();
	assert_ne!(expr.digest(&env1), expr.digest(&env2));
}

#[test]
fn durations_and_datetimes_combine() {
	assert_eq!(run("2018-04-16 + 1d == 2018-04-17"), Value::from(true));
	assert_eq!(run("1h + 30m"), run("90m"));
	assert_eq!(run("2018-04-17 - 2018-04-16"), run("1d"));
}

#[test]
fn null_arithmetic_is_a_null_dereference() {
	assert!(matches!(
		Session::new().run("s := {a: 1}; s.missing + 1"),
		Err(Error::NullDereference { .. })
	));
}
