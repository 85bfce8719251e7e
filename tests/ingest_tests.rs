// tests/ingest_tests.rs

use std::collections::HashMap;
use std::io::Write;

use bagql::env::Environment;
use bagql::evaluator::{EvalError, Evaluator};
use bagql::functions::FunctionRegistry;
use bagql::parser::Parser;
use bagql::value::ExprValue;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn options(pairs: Vec<(&str, ExprValue)>) -> ExprValue {
    ExprValue::Struct(
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn string(s: &str) -> ExprValue {
    ExprValue::String(s.to_string())
}

/// Calls `read_file` through the registry, the way the evaluator does.
/// The query language has no struct literal syntax, so option structs
/// are constructed directly.
fn read_file(path: &str, opts: Option<ExprValue>) -> Result<ExprValue, EvalError> {
    let registry = FunctionRegistry::with_builtins();
    let function = registry.lookup("read_file").unwrap();
    let mut args = vec![string(path)];
    if let Some(opts) = opts {
        args.push(opts);
    }
    function.call(&Environment::empty(), &args)
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
// Container (JSON stream) format
// ============================================================================

#[test]
fn test_json_stream_is_the_default_format() {
    let file = write_temp("{\"a\": 1}\n{\"a\": 2}\n");
    let bag = read_file(file.path().to_str().unwrap(), None).unwrap();

    let elements = bag.materialize_elements().unwrap();
    assert_eq!(
        elements,
        vec![
            row(&[("a", ExprValue::Int(1))]),
            row(&[("a", ExprValue::Int(2))]),
        ]
    );
}

#[test]
fn test_reiteration_reopens_and_yields_the_same_sequence() {
    let file = write_temp("1 2 3");
    let bag = read_file(file.path().to_str().unwrap(), None).unwrap();

    let first = bag.materialize_elements().unwrap();
    let second = bag.materialize_elements().unwrap();
    assert_eq!(
        first,
        vec![ExprValue::Int(1), ExprValue::Int(2), ExprValue::Int(3)]
    );
    assert_eq!(first, second);
}

#[test]
fn test_malformed_record_surfaces_as_resource_error() {
    let file = write_temp("{\"a\": 1}\n{oops");
    let bag = read_file(file.path().to_str().unwrap(), None).unwrap();

    let mut elements = bag.elements().unwrap();
    assert!(elements.next().unwrap().is_ok());
    assert!(matches!(
        elements.next().unwrap(),
        Err(EvalError::Resource(_))
    ));
}

// ============================================================================
// Delimited-text formats
// ============================================================================

#[test]
fn test_csv_with_header_and_auto_conversion() {
    let file = write_temp("name,age\nbob,40\nsue,19\n");
    let bag = read_file(
        file.path().to_str().unwrap(),
        Some(options(vec![
            ("type", string("csv")),
            ("header", ExprValue::Boolean(true)),
            ("conversion", string("auto")),
        ])),
    )
    .unwrap();

    let elements = bag.materialize_elements().unwrap();
    assert_eq!(
        elements,
        vec![
            row(&[("name", string("bob")), ("age", ExprValue::Int(40))]),
            row(&[("name", string("sue")), ("age", ExprValue::Int(19))]),
        ]
    );
}

#[test]
fn test_headerless_fields_are_named_positionally() {
    let file = write_temp("a\tb\nc\td\n");
    let bag = read_file(
        file.path().to_str().unwrap(),
        Some(options(vec![("type", string("tsv"))])),
    )
    .unwrap();

    let elements = bag.materialize_elements().unwrap();
    assert_eq!(
        elements,
        vec![
            row(&[("_1", string("a")), ("_2", string("b"))]),
            row(&[("_1", string("c")), ("_2", string("d"))]),
        ]
    );
}

#[test]
fn test_custom_delimiter() {
    let file = write_temp("a;b\nc;d\n");
    let bag = read_file(
        file.path().to_str().unwrap(),
        Some(options(vec![
            ("type", string("customized")),
            ("delimiter", string(";")),
        ])),
    )
    .unwrap();

    let elements = bag.materialize_elements().unwrap();
    assert_eq!(
        elements,
        vec![
            row(&[("_1", string("a")), ("_2", string("b"))]),
            row(&[("_1", string("c")), ("_2", string("d"))]),
        ]
    );
}

#[test]
fn test_empty_lines_are_skipped_by_default() {
    let file = write_temp("a,b\n\nc,d\n");
    let bag = read_file(
        file.path().to_str().unwrap(),
        Some(options(vec![("type", string("csv"))])),
    )
    .unwrap();

    let elements = bag.materialize_elements().unwrap();
    assert_eq!(elements.len(), 2);
}

#[test]
fn test_trim_flags_apply_independently() {
    let file = write_temp(" a , b \n");
    let path = file.path().to_str().unwrap();

    // Defaults trim surrounding whitespace.
    let trimmed = read_file(path, Some(options(vec![("type", string("csv"))])))
        .unwrap()
        .materialize_elements()
        .unwrap();
    assert_eq!(
        trimmed,
        vec![row(&[("_1", string("a")), ("_2", string("b"))])]
    );

    // With both flags off the raw field text survives.
    let raw = read_file(
        path,
        Some(options(vec![
            ("type", string("csv")),
            ("trim", ExprValue::Boolean(false)),
            ("ignore_surrounding_space", ExprValue::Boolean(false)),
        ])),
    )
    .unwrap()
    .materialize_elements()
    .unwrap();
    assert_eq!(
        raw,
        vec![row(&[("_1", string(" a ")), ("_2", string(" b "))])]
    );
}

#[test]
fn test_delimited_reiteration_rereads_past_the_header() {
    let file = write_temp("name\nbob\nsue\n");
    let bag = read_file(
        file.path().to_str().unwrap(),
        Some(options(vec![
            ("type", string("csv")),
            ("header", ExprValue::Boolean(true)),
        ])),
    )
    .unwrap();

    let first = bag.materialize_elements().unwrap();
    let second = bag.materialize_elements().unwrap();
    assert_eq!(
        first,
        vec![
            row(&[("name", string("bob"))]),
            row(&[("name", string("sue"))]),
        ]
    );
    assert_eq!(first, second);
}

// ============================================================================
// Validation and failure ordering
// ============================================================================

#[test]
fn test_bad_options_fail_before_the_file_is_touched() {
    // The path does not exist; a Configuration error (not Resource)
    // proves options are validated before any read is attempted.
    let err = read_file(
        "/no/such/file",
        Some(options(vec![("type", string("parquet"))])),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Configuration(_)));

    let err = read_file(
        "/no/such/file",
        Some(options(vec![("frobnicate", ExprValue::Boolean(true))])),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Configuration(_)));
}

#[test]
fn test_missing_file_fails_at_iteration_not_at_call() {
    let bag = read_file("/no/such/file", None).unwrap();
    assert!(matches!(
        bag.materialize_elements(),
        Err(EvalError::Resource(_))
    ));
}

#[test]
fn test_unsupported_encoding_rejected() {
    let err = read_file(
        "/no/such/file",
        Some(options(vec![("encoding", string("latin-1"))])),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::Configuration(_)));
}

// ============================================================================
// End to end through the evaluator
// ============================================================================

#[test]
fn test_read_file_feeds_select() {
    let file = write_temp("{\"name\": \"bob\", \"age\": 40}\n{\"name\": \"sue\", \"age\": 19}\n");
    let query = format!(
        "SELECT r.name AS name FROM read_file('{}') AS r WHERE r.age > 21",
        file.path().display()
    );

    let expr = Parser::parse_str(&query).unwrap();
    let result = Evaluator::new()
        .evaluate(&expr, &Environment::new(HashMap::new()))
        .unwrap();

    assert_eq!(
        result.materialize_elements().unwrap(),
        vec![row(&[("name", string("bob"))])]
    );
}
