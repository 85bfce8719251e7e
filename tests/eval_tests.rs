// tests/eval_tests.rs

use std::collections::HashMap;

use bagql::env::Environment;
use bagql::evaluator::{EvalError, Evaluator};
use bagql::parser::Parser;
use bagql::value::{Bag, ExprValue};
use serde_json::json;

/// Parses and evaluates a query against bindings built from JSON.
fn eval_with(source: &str, bindings: &[(&str, serde_json::Value)]) -> Result<ExprValue, EvalError> {
    let expr = Parser::parse_str(source).expect("query should parse");
    let mut map = HashMap::new();
    for (name, json) in bindings {
        map.insert(name.to_string(), ExprValue::from_json(json.clone()));
    }
    Evaluator::new().evaluate(&expr, &Environment::new(map))
}

fn eval(source: &str) -> Result<ExprValue, EvalError> {
    eval_with(source, &[])
}

fn bag(items: Vec<ExprValue>) -> ExprValue {
    ExprValue::Bag(Bag::Eager(items))
}

fn row(fields: &[(&str, ExprValue)]) -> ExprValue {
    ExprValue::Struct(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

// ============================================================================
// Scalars and operators
// ============================================================================

#[test]
fn test_arithmetic() {
    assert_eq!(eval("1 + 2 * 3").unwrap(), ExprValue::Int(7));
    assert_eq!(eval("7 / 2").unwrap(), ExprValue::Int(3));
    assert_eq!(eval("7 % 2").unwrap(), ExprValue::Int(1));
    assert_eq!(eval("-5 + 3").unwrap(), ExprValue::Int(-2));
}

#[test]
fn test_comparison_with_numeric_coercion() {
    assert_eq!(eval("1 = 1.0").unwrap(), ExprValue::Boolean(true));
    assert_eq!(eval("2 < 10").unwrap(), ExprValue::Boolean(true));
    assert_eq!(eval("'a' < 'b'").unwrap(), ExprValue::Boolean(true));
    assert_eq!(eval("3 <> 4").unwrap(), ExprValue::Boolean(true));
    assert_eq!(eval("3 != 3").unwrap(), ExprValue::Boolean(false));
}

#[test]
fn test_incomparable_types_error() {
    assert!(matches!(eval("1 < 'a'"), Err(EvalError::Type(_))));
}

#[test]
fn test_concat() {
    assert_eq!(
        eval("'foo' || 'bar'").unwrap(),
        ExprValue::String("foobar".to_string())
    );
    assert!(matches!(eval("'foo' || 1"), Err(EvalError::Type(_))));
}

#[test]
fn test_unary_minus_overflow_is_an_error() {
    // i64::MIN has no i64 negation; this must surface as the same
    // overflow error the binary operators raise, never a panic or a
    // silent wrap.
    assert!(matches!(
        eval_with("-n", &[("n", json!(i64::MIN))]),
        Err(EvalError::Type(_))
    ));
    // Unary plus leaves the value untouched.
    assert_eq!(
        eval_with("+n", &[("n", json!(i64::MIN))]).unwrap(),
        ExprValue::Int(i64::MIN)
    );
}

#[test]
fn test_unary_on_absent_values() {
    assert_eq!(eval("-null").unwrap(), ExprValue::Null);
    assert_eq!(eval("+missing").unwrap(), ExprValue::Missing);
}

// ============================================================================
// Built-in functions
// ============================================================================

#[test]
fn test_coalesce() {
    assert_eq!(
        eval("coalesce(null, missing, 5, 6)").unwrap(),
        ExprValue::Int(5)
    );
    assert_eq!(eval("coalesce(null, missing)").unwrap(), ExprValue::Null);
    assert_eq!(eval("coalesce(1)").unwrap(), ExprValue::Int(1));
    assert!(matches!(eval("coalesce()"), Err(EvalError::Arity { .. })));
}

#[test]
fn test_string_functions() {
    assert_eq!(
        eval("upper('abc')").unwrap(),
        ExprValue::String("ABC".to_string())
    );
    assert_eq!(
        eval("lower('ABC')").unwrap(),
        ExprValue::String("abc".to_string())
    );
    assert_eq!(eval("char_length('héllo')").unwrap(), ExprValue::Int(5));
    assert_eq!(
        eval("matches('foobar', 'o+b')").unwrap(),
        ExprValue::Boolean(true)
    );
    assert_eq!(
        eval("matches('foobar', '^z')").unwrap(),
        ExprValue::Boolean(false)
    );
}

#[test]
fn test_string_functions_propagate_absent_arguments() {
    assert_eq!(eval("upper(null)").unwrap(), ExprValue::Null);
    assert_eq!(eval("upper(missing)").unwrap(), ExprValue::Missing);
    assert_eq!(
        eval("matches('abc', missing)").unwrap(),
        ExprValue::Missing
    );
}

#[test]
fn test_exists() {
    assert_eq!(
        eval_with("exists(xs)", &[("xs", json!([1]))]).unwrap(),
        ExprValue::Boolean(true)
    );
    assert_eq!(
        eval_with("exists(xs)", &[("xs", json!([]))]).unwrap(),
        ExprValue::Boolean(false)
    );
    assert_eq!(eval("exists(null)").unwrap(), ExprValue::Boolean(false));
    // A scalar iterates as a singleton of itself.
    assert_eq!(eval("exists(5)").unwrap(), ExprValue::Boolean(true));
}

#[test]
fn test_call_errors() {
    assert!(matches!(
        eval("no_such_function()"),
        Err(EvalError::UndefinedFunction(_))
    ));
    assert!(matches!(eval("upper()"), Err(EvalError::Arity { .. })));
    assert!(matches!(eval("upper(1)"), Err(EvalError::Type(_))));
}

#[test]
fn test_undefined_variable() {
    assert!(matches!(
        eval("nope"),
        Err(EvalError::UndefinedVariable(name)) if name == "nope"
    ));
}

// ============================================================================
// Path navigation
// ============================================================================

#[test]
fn test_field_path() {
    let doc = json!({"a": {"b": 42}});
    assert_eq!(
        eval_with("doc.a.b", &[("doc", doc.clone())]).unwrap(),
        ExprValue::Int(42)
    );
    // An absent field is MISSING, not an error.
    assert_eq!(
        eval_with("doc.a.zzz", &[("doc", doc)]).unwrap(),
        ExprValue::Missing
    );
}

#[test]
fn test_wildcard_path() {
    let doc = json!({"items": [{"v": 1}, {"v": 2}, {"other": 3}]});
    assert_eq!(
        eval_with("doc.items.*.v", &[("doc", doc)]).unwrap(),
        bag(vec![ExprValue::Int(1), ExprValue::Int(2)])
    );
}

#[test]
fn test_deep_wildcard_path() {
    let doc = json!({"a": {"name": "x"}, "rest": [{"name": "y"}]});
    assert_eq!(
        eval_with("doc..name", &[("doc", doc)]).unwrap(),
        bag(vec![
            ExprValue::String("x".to_string()),
            ExprValue::String("y".to_string())
        ])
    );
}

// ============================================================================
// SELECT
// ============================================================================

#[test]
fn test_select_cross_product_is_row_major() {
    let result = eval_with(
        "SELECT x, y FROM xs AS x, ys AS y",
        &[("xs", json!([1, 2])), ("ys", json!(["a", "b"]))],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![
            row(&[
                ("x", ExprValue::Int(1)),
                ("y", ExprValue::String("a".to_string()))
            ]),
            row(&[
                ("x", ExprValue::Int(1)),
                ("y", ExprValue::String("b".to_string()))
            ]),
            row(&[
                ("x", ExprValue::Int(2)),
                ("y", ExprValue::String("a".to_string()))
            ]),
            row(&[
                ("x", ExprValue::Int(2)),
                ("y", ExprValue::String("b".to_string()))
            ]),
        ])
    );
}

#[test]
fn test_where_filters_with_three_valued_logic() {
    let people = json!([
        {"name": "bob", "age": 40},
        {"name": "sue"},
        {"name": "kim", "age": 20}
    ]);

    // sue has no age: p.age is MISSING, MISSING > 30 is MISSING, and the
    // row is dropped without an error.
    let result = eval_with(
        "SELECT p.name AS name FROM people AS p WHERE p.age > 30",
        &[("people", people)],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![row(&[("name", ExprValue::String("bob".to_string()))])])
    );
}

#[test]
fn test_where_rejects_non_boolean_predicate() {
    assert!(matches!(
        eval_with("SELECT x FROM xs AS x WHERE 1", &[("xs", json!([1]))]),
        Err(EvalError::Type(_))
    ));
}

#[test]
fn test_missing_projection_leaves_no_field() {
    let people = json!([{"name": "bob", "age": 40}, {"name": "sue"}]);
    let result = eval_with(
        "SELECT p.name AS name, p.age AS age FROM people AS p",
        &[("people", people)],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![
            row(&[
                ("name", ExprValue::String("bob".to_string())),
                ("age", ExprValue::Int(40))
            ]),
            row(&[("name", ExprValue::String("sue".to_string()))]),
        ])
    );
}

#[test]
fn test_derived_and_positional_field_names() {
    let people = json!([{"name": "bob"}]);
    // Unaliased path projections take their last field step's name;
    // everything else falls back to the positional `_n`.
    let result = eval_with(
        "SELECT p.name, 1 + 2 FROM people AS p",
        &[("people", people)],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![row(&[
            ("name", ExprValue::String("bob".to_string())),
            ("_2", ExprValue::Int(3)),
        ])])
    );
}

#[test]
fn test_element_fields_resolve_as_bare_names() {
    let people = json!([{"name": "bob", "age": 40}]);
    let result = eval_with("SELECT name FROM people", &[("people", people)]).unwrap();
    assert_eq!(
        result,
        bag(vec![row(&[("name", ExprValue::String("bob".to_string()))])])
    );
}

#[test]
fn test_nested_select() {
    let result = eval_with(
        "SELECT v FROM (SELECT x AS v FROM xs AS x)",
        &[("xs", json!([1, 2]))],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![
            row(&[("v", ExprValue::Int(1))]),
            row(&[("v", ExprValue::Int(2))]),
        ])
    );
}

#[test]
fn test_select_from_scalar_source() {
    // A scalar FROM source iterates as a one-element bag.
    let result = eval_with("SELECT n FROM num AS n", &[("num", json!(7))]).unwrap();
    assert_eq!(result, bag(vec![row(&[("n", ExprValue::Int(7))])]));
}

#[test]
fn test_select_from_path_source() {
    let doc = json!({"order": {"lines": [{"sku": "a"}, {"sku": "b"}]}});
    let result = eval_with(
        "SELECT l.sku AS sku FROM doc.order.lines AS l",
        &[("doc", doc)],
    )
    .unwrap();

    assert_eq!(
        result,
        bag(vec![
            row(&[("sku", ExprValue::String("a".to_string()))]),
            row(&[("sku", ExprValue::String("b".to_string()))]),
        ])
    );
}

#[test]
fn test_alias_shadows_outer_binding() {
    let result = eval_with(
        "SELECT x FROM xs AS x",
        &[("xs", json!([10])), ("x", json!(99))],
    )
    .unwrap();
    assert_eq!(result, bag(vec![row(&[("x", ExprValue::Int(10))])]));
}
