use gql_core::ctx::Context;
use gql_core::obj;
use gql_core::val::Value;
use gql_core::Session;

fn rows(value: &Value) -> Vec<Value> {
	let Value::Table(table) = value else {
		panic!("expected a table, got {value}");
	};
	table.rows(&Context::background()).expect("table should scan")
}

fn run(src: &str) -> Vec<Value> {
	rows(&Session::new().run(src).expect("program should evaluate"))
}

const T0: &str = "t0 := table({k:1,v:\"a\"},{k:2,v:\"b\"})";
const T1: &str = "t1 := table({k:2,w:10},{k:3,w:20})";

#[test]
fn inner_equijoin_with_projection() {
	let out = run(&format!(
		"{T0}; {T1}; join({{t0: t0, t1: t1}}, t0.k == t1.k, map:={{k: t0.k, v: t0.v, w: t1.w}})"
	));
	assert_eq!(out, vec![Value::Object(obj! {"k" => 2, "v" => "b", "w" => 10})]);
}

#[test]
fn left_outer_join_keeps_unmatched_left_rows() {
	let out = run(&format!(
		"{T0}; {T1}; join({{t0: t0, t1: t1}}, t0.k ==? t1.k, map:={{k: t0.k, w: t1.w}})"
	));
	assert_eq!(
		out,
		vec![
			Value::Object(obj! {"k" => 1, "w" => Value::Null}),
			Value::Object(obj! {"k" => 2, "w" => 10}),
		]
	);
}

#[test]
fn right_outer_join_keeps_unmatched_right_rows() {
	let out = run(&format!(
		"{T0}; {T1}; join({{t0: t0, t1: t1}}, t0.k ?== t1.k, map:={{k: t1.k, v: t0.v}})"
	));
	assert_eq!(
		out,
		vec![
			Value::Object(obj! {"k" => 2, "v" => "b"}),
			Value::Object(obj! {"k" => 3, "v" => Value::Null}),
		]
	);
}

#[test]
fn full_outer_join_keeps_both_sides() {
	let out = run(&format!(
		"{T0}; {T1}; join({{t0: t0, t1: t1}}, t0.k ?==? t1.k, map:={{a: t0.k, b: t1.k}})"
	));
	assert_eq!(
		out,
		vec![
			Value::Object(obj! {"a" => 1, "b" => Value::Null}),
			Value::Object(obj! {"a" => 2, "b" => 2}),
			Value::Object(obj! {"a" => Value::Null, "b" => 3}),
		]
	);
}

#[test]
fn self_join_over_different_columns() {
	let out = run(
		"t := table({i:0,j:2,s:\"a\"},{i:2,j:3,s:\"b\"},{i:3,j:4,s:\"c\"}); \
		 join({x: t, y: t}, x.i == y.j, map:={i: x.i, sx: x.s, sy: y.s})",
	);
	assert_eq!(
		out,
		vec![
			Value::Object(obj! {"i" => 2, "sx" => "b", "sy" => "a"}),
			Value::Object(obj! {"i" => 3, "sx" => "c", "sy" => "b"}),
		]
	);
}

#[test]
fn unmapped_join_flattens_with_alias_prefixes() {
	let out = run(&format!("{T0}; {T1}; join({{t0: t0, t1: t1}}, t0.k == t1.k)"));
	assert_eq!(
		out,
		vec![Value::Object(
			obj! {"t0_k" => 2, "t0_v" => "b", "t1_k" => 2, "t1_w" => 10}
		)]
	);
}

#[test]
fn duplicate_keys_produce_cartesian_groups() {
	let out = run(
		"a := table({k:1,x:1},{k:1,x:2}); b := table({k:1,y:10},{k:1,y:20},{k:2,y:30}); \
		 join({a: a, b: b}, a.k == b.k, map:={x: a.x, y: b.y})",
	);
	assert_eq!(out.len(), 4);
	// The outer side's source order breaks ties
	assert_eq!(out[0], Value::Object(obj! {"x" => 1, "y" => 10}));
	assert_eq!(out[1], Value::Object(obj! {"x" => 1, "y" => 20}));
	assert_eq!(out[2], Value::Object(obj! {"x" => 2, "y" => 10}));
	assert_eq!(out[3], Value::Object(obj! {"x" => 2, "y" => 20}));
}

#[test]
fn null_keys_never_match_under_plain_equality() {
	let out = run(
		"a := table({k:null,x:1},{k:1,x:2}); b := table({k:null,y:1},{k:1,y:2}); \
		 join({a: a, b: b}, a.k == b.k, map:={x: a.x, y: b.y})",
	);
	assert_eq!(out, vec![Value::Object(obj! {"x" => 2, "y" => 2})]);
}

#[test]
fn null_keys_survive_through_outer_variants() {
	let out = run(
		"a := table({k:null,x:1},{k:1,x:2}); b := table({k:1,y:2}); \
		 join({a: a, b: b}, a.k ==? b.k, map:={x: a.x, y: b.y})",
	);
	assert_eq!(
		out,
		vec![
			Value::Object(obj! {"x" => 2, "y" => 2}),
			Value::Object(obj! {"x" => 1, "y" => Value::Null}),
		]
	);
}

#[test]
fn unconstrained_join_is_a_cross_product() {
	let out = run(
		"a := table({x:1},{x:2}); b := table({y:10},{y:20}); \
		 join({a: a, b: b}, true, map:={x: a.x, y: b.y})",
	);
	assert_eq!(out.len(), 4);
}

#[test]
fn non_equality_conjuncts_post_filter() {
	let out = run(
		"a := table({k:1,x:1},{k:2,x:5}); b := table({k:1,y:1},{k:2,y:2}); \
		 join({a: a, b: b}, a.k == b.k && a.x > 2, map:={x: a.x, y: b.y})",
	);
	assert_eq!(out, vec![Value::Object(obj! {"x" => 5, "y" => 2})]);
}

#[test]
fn three_way_join_chains_constraints() {
	let out = run(
		"a := table({i:1},{i:2}); b := table({i:1,j:10},{i:2,j:20}); c := table({j:20,z:\"z\"}); \
		 join({a: a, b: b, c: c}, a.i == b.i && b.j == c.j, map:={i: a.i, z: c.z})",
	);
	assert_eq!(out, vec![Value::Object(obj! {"i" => 2, "z" => "z"})]);
}

#[test]
fn join_against_reference_nested_loop() {
	// Property: for `A.x == B.y`, the join equals the nested-loop
	// equijoin; outer variants add the unmatched rows of their side
	let mut session = Session::new();
	session
		.run("a := table({x:1},{x:2},{x:2},{x:5}); b := table({y:2},{y:2},{y:3},{y:5})")
		.unwrap();
	let joined = rows(
		&session
			.run("join({a: a, b: b}, a.x == b.y, map:={x: a.x, y: b.y})")
			.unwrap(),
	);
	let reference: Vec<Value> = [(2, 2), (2, 2), (2, 2), (2, 2), (5, 5)]
		.iter()
		.map(|(x, y)| Value::Object(obj! {"x" => *x, "y" => *y}))
		.collect();
	assert_eq!(joined, reference);
	let full = rows(
		&session
			.run("join({a: a, b: b}, a.x ?==? b.y, map:={x: a.x, y: b.y})")
			.unwrap(),
	);
	// Full outer adds the unmatched 1 on the left and 3 on the right
	assert_eq!(full.len(), reference.len() + 2);
}

#[test]
fn too_many_tables_is_an_arity_error() {
	let err = Session::new()
		.run(
			"t := table({k:1}); \
			 join({a: t, b: t, c: t, d: t, e: t}, a.k == b.k)",
		)
		.unwrap_err();
	assert!(matches!(err, gql_core::Error::ArityMismatch { .. }));
}

#[test]
fn empty_and_single_row_tables() {
	let out = run(
		"a := table(); b := table({k:1}); join({a: a, b: b}, a.k == b.k, map:={k: b.k})",
	);
	assert!(out.is_empty());
	let out = run(
		"a := table(); b := table({k:1}); join({a: a, b: b}, a.k ?== b.k, map:={k: b.k})",
	);
	assert_eq!(out, vec![Value::Object(obj! {"k" => 1})]);
}
