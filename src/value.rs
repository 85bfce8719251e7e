//! The runtime value model.
//!
//! [`ExprValue`] unifies scalars and collections under one interface: every
//! value carries a type tag, supports the aggregate iteration view (scalars
//! yield themselves exactly once, absent values yield nothing), and can be
//! materialized into JSON. Bags may be eager or lazily backed by an external
//! producer that is re-opened on every iteration.

use std::rc::Rc;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::evaluator::EvalError;

/// The type tag of an [`ExprValue`], independent of its representation.
///
/// NULL and MISSING are distinct tags: NULL is a known-but-null value,
/// MISSING marks the absence of a value (e.g. a struct field that is not
/// there). Neither is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprType {
    Null,
    Missing,
    Boolean,
    Int,
    Decimal,
    Float,
    Timestamp,
    String,
    Symbol,
    Blob,
    Clob,
    List,
    Bag,
    Struct,
    Sexp,
}

impl ExprType {
    /// Human-readable tag name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ExprType::Null => "null",
            ExprType::Missing => "missing",
            ExprType::Boolean => "boolean",
            ExprType::Int => "int",
            ExprType::Decimal => "decimal",
            ExprType::Float => "float",
            ExprType::Timestamp => "timestamp",
            ExprType::String => "string",
            ExprType::Symbol => "symbol",
            ExprType::Blob => "blob",
            ExprType::Clob => "clob",
            ExprType::List => "list",
            ExprType::Bag => "bag",
            ExprType::Struct => "struct",
            ExprType::Sexp => "sexp",
        }
    }

    /// True for the two absent-value tags.
    pub fn is_absent(self) -> bool {
        matches!(self, ExprType::Null | ExprType::Missing)
    }

    /// True for tags whose aggregate view delegates to member values.
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            ExprType::List | ExprType::Bag | ExprType::Struct | ExprType::Sexp
        )
    }
}

impl std::fmt::Display for ExprType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A restartable producer behind a lazy bag.
///
/// `open` acquires whatever resource backs the bag and returns a fresh
/// iterator over its elements; it is called once per iteration, so
/// re-iterating the bag re-reads the underlying source from the beginning.
/// The returned iterator owns the resource and releases it on drop, even
/// when consumption stops early.
pub trait BagSource {
    fn open(&self) -> Result<ValueIter, EvalError>;
}

/// The element stream of one iteration of a value.
///
/// Elements of lazily-produced bags may individually fail to decode, so
/// the stream yields `Result`s.
pub struct ValueIter(Box<dyn Iterator<Item = Result<ExprValue, EvalError>>>);

impl ValueIter {
    pub fn new(inner: Box<dyn Iterator<Item = Result<ExprValue, EvalError>>>) -> Self {
        ValueIter(inner)
    }

    pub fn empty() -> Self {
        ValueIter(Box::new(std::iter::empty()))
    }

    fn singleton(value: ExprValue) -> Self {
        ValueIter(Box::new(std::iter::once(Ok(value))))
    }

    fn eager(values: Vec<ExprValue>) -> Self {
        ValueIter(Box::new(values.into_iter().map(Ok)))
    }
}

impl Iterator for ValueIter {
    type Item = Result<ExprValue, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

/// The contents of a BAG value: fully materialized, or a lazy producer.
#[derive(Clone)]
pub enum Bag {
    /// Elements held in memory
    Eager(Vec<ExprValue>),

    /// Elements produced on demand; re-iterable via [`BagSource::open`]
    Lazy(Rc<dyn BagSource>),
}

impl std::fmt::Debug for Bag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bag::Eager(items) => f.debug_tuple("Eager").field(items).finish(),
            Bag::Lazy(_) => f.write_str("Lazy(<source>)"),
        }
    }
}

/// A value within the context of an expression.
///
/// Scalars and collections share this one type; consumption sites match
/// exhaustively on the variants so the compiler enforces completeness
/// whenever a tag is added. The type tag is immutable once a value is
/// constructed.
#[derive(Debug, Clone)]
pub enum ExprValue {
    /// Known null
    Null,

    /// Absent value (no binding, no field)
    Missing,

    Boolean(bool),
    Int(i64),
    Decimal(Decimal),
    Float(f64),
    Timestamp(DateTime<FixedOffset>),
    String(String),

    /// Interned-name scalar, distinct from String in tag only
    Symbol(String),

    /// Binary data
    Blob(Vec<u8>),

    /// Character data of unspecified encoding
    Clob(Vec<u8>),

    /// Ordered sequence
    List(Vec<ExprValue>),

    /// Unordered collection (iteration order is producer order)
    Bag(Bag),

    /// Named fields; order preserved for deterministic output
    Struct(Vec<(String, ExprValue)>),

    /// Symbolic form (ordered, like a list, distinct in tag)
    Sexp(Vec<ExprValue>),
}

impl ExprValue {
    pub fn type_tag(&self) -> ExprType {
        match self {
            ExprValue::Null => ExprType::Null,
            ExprValue::Missing => ExprType::Missing,
            ExprValue::Boolean(_) => ExprType::Boolean,
            ExprValue::Int(_) => ExprType::Int,
            ExprValue::Decimal(_) => ExprType::Decimal,
            ExprValue::Float(_) => ExprType::Float,
            ExprValue::Timestamp(_) => ExprType::Timestamp,
            ExprValue::String(_) => ExprType::String,
            ExprValue::Symbol(_) => ExprType::Symbol,
            ExprValue::Blob(_) => ExprType::Blob,
            ExprValue::Clob(_) => ExprType::Clob,
            ExprValue::List(_) => ExprType::List,
            ExprValue::Bag(_) => ExprType::Bag,
            ExprValue::Struct(_) => ExprType::Struct,
            ExprValue::Sexp(_) => ExprType::Sexp,
        }
    }

    /// True for NULL and MISSING.
    pub fn is_absent(&self) -> bool {
        self.type_tag().is_absent()
    }

    /// The aggregate iteration view.
    ///
    /// Aggregates delegate to their members (struct iteration yields field
    /// values), scalars yield exactly one element - themselves - and the
    /// absent values yield nothing. This uniformity lets every expression
    /// be evaluated as "iterate over the source's elements" without
    /// special-casing scalars.
    ///
    /// Opening a lazy bag may fail (the backing resource cannot be opened)
    /// and individual elements of a lazy bag may fail to decode.
    pub fn elements(&self) -> Result<ValueIter, EvalError> {
        match self {
            ExprValue::Null | ExprValue::Missing => Ok(ValueIter::empty()),
            ExprValue::List(items) | ExprValue::Sexp(items) => {
                Ok(ValueIter::eager(items.clone()))
            }
            ExprValue::Bag(Bag::Eager(items)) => Ok(ValueIter::eager(items.clone())),
            ExprValue::Bag(Bag::Lazy(source)) => source.open(),
            ExprValue::Struct(fields) => Ok(ValueIter::eager(
                fields.iter().map(|(_, v)| v.clone()).collect(),
            )),
            scalar => Ok(ValueIter::singleton(scalar.clone())),
        }
    }

    /// Collects the aggregate view into a vector, forcing lazy producers.
    pub fn materialize_elements(&self) -> Result<Vec<ExprValue>, EvalError> {
        self.elements()?.collect()
    }

    /// Field lookup by name; `None` for absent fields and non-structs.
    pub fn field(&self, name: &str) -> Option<&ExprValue> {
        match self {
            ExprValue::Struct(fields) => {
                fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match self {
            ExprValue::String(s) | ExprValue::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn boolean_value(&self) -> Option<bool> {
        match self {
            ExprValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Builds an [`ExprValue`] from a JSON value.
    ///
    /// Numbers become Int when they fit in `i64`, Float otherwise; objects
    /// become structs with field order as deserialized.
    pub fn from_json(value: serde_json::Value) -> ExprValue {
        match value {
            serde_json::Value::Null => ExprValue::Null,
            serde_json::Value::Bool(b) => ExprValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ExprValue::Int(i),
                None => ExprValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ExprValue::String(s),
            serde_json::Value::Array(items) => {
                ExprValue::List(items.into_iter().map(ExprValue::from_json).collect())
            }
            serde_json::Value::Object(fields) => ExprValue::Struct(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, ExprValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Materializes this value as JSON, forcing lazy bags.
    ///
    /// The mapping is lossy where JSON has no counterpart: MISSING becomes
    /// null, symbols become strings, timestamps become RFC3339 strings,
    /// decimals become numbers (or digit strings when they do not fit a
    /// float exactly), blobs become byte arrays, clobs become lossy
    /// strings, and bags and sexps become arrays.
    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        use serde_json::Value as Json;

        Ok(match self {
            ExprValue::Null | ExprValue::Missing => Json::Null,
            ExprValue::Boolean(b) => Json::Bool(*b),
            ExprValue::Int(n) => Json::Number((*n).into()),
            ExprValue::Decimal(d) => match decimal_to_json_number(d) {
                Some(n) => Json::Number(n),
                None => Json::String(d.to_string()),
            },
            ExprValue::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Json::Number(n),
                None => Json::Null,
            },
            ExprValue::Timestamp(ts) => {
                Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            ExprValue::String(s) | ExprValue::Symbol(s) => Json::String(s.clone()),
            ExprValue::Blob(bytes) => Json::Array(
                bytes.iter().map(|b| Json::Number((*b).into())).collect(),
            ),
            ExprValue::Clob(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
            ExprValue::List(items) | ExprValue::Sexp(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Json::Array(out)
            }
            ExprValue::Bag(_) => {
                let mut out = Vec::new();
                for item in self.elements()? {
                    out.push(item?.to_json()?);
                }
                Json::Array(out)
            }
            ExprValue::Struct(fields) => {
                let mut map = serde_json::Map::new();
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_json()?);
                }
                Json::Object(map)
            }
        })
    }
}

fn decimal_to_json_number(d: &Decimal) -> Option<serde_json::Number> {
    if d.is_integer() {
        d.to_i64().map(serde_json::Number::from)
    } else {
        d.to_f64().and_then(serde_json::Number::from_f64)
    }
}

/// Structural equality.
///
/// Eager collections compare element-wise in producer order; lazy bags
/// compare by producer identity (two handles to the same source are equal,
/// everything else is not, since comparing contents would force external
/// resources).
impl PartialEq for ExprValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExprValue::Null, ExprValue::Null) => true,
            (ExprValue::Missing, ExprValue::Missing) => true,
            (ExprValue::Boolean(a), ExprValue::Boolean(b)) => a == b,
            (ExprValue::Int(a), ExprValue::Int(b)) => a == b,
            (ExprValue::Decimal(a), ExprValue::Decimal(b)) => a == b,
            (ExprValue::Float(a), ExprValue::Float(b)) => a == b,
            (ExprValue::Timestamp(a), ExprValue::Timestamp(b)) => a == b,
            (ExprValue::String(a), ExprValue::String(b)) => a == b,
            (ExprValue::Symbol(a), ExprValue::Symbol(b)) => a == b,
            (ExprValue::Blob(a), ExprValue::Blob(b)) => a == b,
            (ExprValue::Clob(a), ExprValue::Clob(b)) => a == b,
            (ExprValue::List(a), ExprValue::List(b)) => a == b,
            (ExprValue::Sexp(a), ExprValue::Sexp(b)) => a == b,
            (ExprValue::Struct(a), ExprValue::Struct(b)) => a == b,
            (ExprValue::Bag(Bag::Eager(a)), ExprValue::Bag(Bag::Eager(b))) => a == b,
            (ExprValue::Bag(Bag::Lazy(a)), ExprValue::Bag(Bag::Lazy(b))) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_iterates_to_singleton() {
        let five = ExprValue::Int(5);
        let elements: Vec<_> = five.materialize_elements().unwrap();
        assert_eq!(elements, vec![ExprValue::Int(5)]);
    }

    #[test]
    fn absent_values_iterate_empty() {
        assert!(ExprValue::Null.materialize_elements().unwrap().is_empty());
        assert!(ExprValue::Missing.materialize_elements().unwrap().is_empty());
    }

    #[test]
    fn struct_iterates_field_values() {
        let s = ExprValue::Struct(vec![
            ("a".to_string(), ExprValue::Int(1)),
            ("b".to_string(), ExprValue::Int(2)),
        ]);
        let elements = s.materialize_elements().unwrap();
        assert_eq!(elements, vec![ExprValue::Int(1), ExprValue::Int(2)]);
        assert_eq!(s.field("b"), Some(&ExprValue::Int(2)));
        assert_eq!(s.field("c"), None);
    }
}
