//! JSON text output for query results.
//!
//! Materializes an [`ExprValue`] - forcing lazy bags - and renders it as
//! compact or pretty-printed JSON. Output is deterministic: struct field
//! order is preserved as produced, and the mapping for types JSON lacks
//! is documented on [`ExprValue::to_json`].

use crate::evaluator::EvalError;
use crate::value::ExprValue;

/// Compact JSON rendering, forcing lazy collections.
///
/// # Examples
///
/// ```
/// use bagql::{output::to_json, ExprValue};
///
/// let value = ExprValue::Int(42);
/// assert_eq!(to_json(&value).unwrap(), "42");
/// ```
pub fn to_json(value: &ExprValue) -> Result<String, EvalError> {
    let json = value.to_json()?;
    serde_json::to_string(&json).map_err(|e| EvalError::Resource(format!("cannot render: {}", e)))
}

/// Pretty-printed JSON rendering with 2-space indentation.
pub fn to_json_pretty(value: &ExprValue) -> Result<String, EvalError> {
    let json = value.to_json()?;
    serde_json::to_string_pretty(&json)
        .map_err(|e| EvalError::Resource(format!("cannot render: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Bag;

    #[test]
    fn structs_render_with_field_order_preserved() {
        let value = ExprValue::Struct(vec![
            ("b".to_string(), ExprValue::Int(2)),
            ("a".to_string(), ExprValue::Int(1)),
        ]);
        assert_eq!(to_json(&value).unwrap(), r#"{"b":2,"a":1}"#);
    }

    #[test]
    fn missing_renders_as_null() {
        assert_eq!(to_json(&ExprValue::Missing).unwrap(), "null");
    }

    #[test]
    fn bags_render_as_arrays() {
        let bag = ExprValue::Bag(Bag::Eager(vec![ExprValue::Int(1), ExprValue::Int(2)]));
        assert_eq!(to_json(&bag).unwrap(), "[1,2]");
    }
}
