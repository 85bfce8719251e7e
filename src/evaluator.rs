//! Recursive evaluation of syntax trees against an [`Environment`].
//!
//! Evaluation is single-threaded and synchronous. NULL and MISSING are
//! values, not errors: scalar operators absorb them (MISSING wins over
//! NULL) and the logical operators follow three-valued Kleene logic.
//! Iteration order is fully deterministic - FROM sources combine in
//! row-major order with the leftmost source varying slowest.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::ast::{BinOp, Expr, FromSource, PathStep, ProjectionItem, UnOp};
use crate::env::Environment;
use crate::functions::FunctionRegistry;
use crate::value::{Bag, ExprValue};

/// Errors that can occur during query evaluation.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// Function called with the wrong number of arguments
    Arity {
        name: String,
        min: usize,
        /// `None` means unbounded
        max: Option<usize>,
        actual: usize,
    },

    /// Operand or argument fails a type constraint
    Type(String),

    /// Reference to a name with no binding in scope
    UndefinedVariable(String),

    /// Call to a name absent from the function registry
    UndefinedFunction(String),

    /// Unknown ingestion format or unrecognized option key
    Configuration(String),

    /// Underlying stream cannot be opened or read
    Resource(String),

    /// Division or modulo by zero on exact numeric types
    DivisionByZero,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Arity {
                name,
                min,
                max,
                actual,
            } => match max {
                Some(max) => write!(
                    f,
                    "Arity error: {} expects between {} and {} arguments, got {}",
                    name, min, max, actual
                ),
                None => write!(
                    f,
                    "Arity error: {} expects at least {} argument(s), got {}",
                    name, min, actual
                ),
            },
            EvalError::Type(msg) => write!(f, "Type error: {}", msg),
            EvalError::UndefinedVariable(name) => {
                write!(f, "Undefined variable: no binding for '{}'", name)
            }
            EvalError::UndefinedFunction(name) => {
                write!(f, "Undefined function: '{}'", name)
            }
            EvalError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            EvalError::Resource(msg) => write!(f, "Resource error: {}", msg),
            EvalError::DivisionByZero => write!(f, "Division by zero"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Numeric tower used by arithmetic and comparison: any float operand
/// promotes to float, otherwise any decimal operand promotes to decimal.
enum NumericPair {
    Ints(i64, i64),
    Decimals(Decimal, Decimal),
    Floats(f64, f64),
}

fn numeric_pair(left: &ExprValue, right: &ExprValue) -> Option<NumericPair> {
    use ExprValue::*;
    match (left, right) {
        (Int(a), Int(b)) => Some(NumericPair::Ints(*a, *b)),
        (Int(a), Decimal(b)) => Some(NumericPair::Decimals(rust_decimal::Decimal::from(*a), *b)),
        (Decimal(a), Int(b)) => Some(NumericPair::Decimals(*a, rust_decimal::Decimal::from(*b))),
        (Decimal(a), Decimal(b)) => Some(NumericPair::Decimals(*a, *b)),
        (Float(a), Float(b)) => Some(NumericPair::Floats(*a, *b)),
        (Float(a), Int(b)) => Some(NumericPair::Floats(*a, *b as f64)),
        (Int(a), Float(b)) => Some(NumericPair::Floats(*a as f64, *b)),
        (Float(a), Decimal(b)) => Some(NumericPair::Floats(*a, b.to_f64()?)),
        (Decimal(a), Float(b)) => Some(NumericPair::Floats(a.to_f64()?, *b)),
        _ => None,
    }
}

/// Three-valued truth of a value: `Some(bool)` for booleans, `None`
/// (unknown) for NULL/MISSING, error for anything else.
fn truth(value: &ExprValue, context: &str) -> Result<Option<bool>, EvalError> {
    match value {
        ExprValue::Boolean(b) => Ok(Some(*b)),
        ExprValue::Null | ExprValue::Missing => Ok(None),
        other => Err(EvalError::Type(format!(
            "{} requires a boolean operand, got {}",
            context,
            other.type_tag()
        ))),
    }
}

/// Intermediate state while walking a path: a single value, or the
/// fanned-out element list produced by a wildcard step.
enum PathCursor {
    One(ExprValue),
    Many(Vec<ExprValue>),
}

/// The query evaluator.
///
/// Holds the function registry, which is immutable after construction;
/// all other state lives in the [`Environment`] passed to each call.
pub struct Evaluator {
    registry: FunctionRegistry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

impl Evaluator {
    /// An evaluator over the standard built-in functions.
    pub fn new() -> Self {
        Evaluator {
            registry: FunctionRegistry::with_builtins(),
        }
    }

    /// An evaluator over an explicitly constructed registry.
    pub fn with_registry(registry: FunctionRegistry) -> Self {
        Evaluator { registry }
    }

    /// Evaluates a syntax tree against an environment.
    pub fn evaluate(&self, expr: &Expr, env: &Environment) -> Result<ExprValue, EvalError> {
        match expr {
            Expr::Integer(n) => Ok(ExprValue::Int(*n)),
            Expr::Decimal(d) => Ok(ExprValue::Decimal(*d)),
            Expr::Float(f) => Ok(ExprValue::Float(*f)),
            Expr::String(s) => Ok(ExprValue::String(s.clone())),
            Expr::Boolean(b) => Ok(ExprValue::Boolean(*b)),
            Expr::Null => Ok(ExprValue::Null),
            Expr::Missing => Ok(ExprValue::Missing),
            Expr::Identifier(name) => env
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, env)?;
                self.apply_unary(*op, value)
            }
            Expr::Binary { op, left, right } => {
                // Both operands evaluate eagerly, left to right.
                let left_val = self.evaluate(left, env)?;
                let right_val = self.evaluate(right, env)?;
                self.apply_binary(*op, &left_val, &right_val)
            }
            Expr::Call { name, args } => {
                let function = self
                    .registry
                    .lookup(name)
                    .ok_or_else(|| EvalError::UndefinedFunction(name.clone()))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg, env)?);
                }
                function.call(env, &values)
            }
            Expr::Path { base, steps } => {
                let base_val = self.evaluate(base, env)?;
                self.apply_path(base_val, steps)
            }
            Expr::Select {
                projection,
                from,
                where_clause,
            } => self.eval_select(projection, from, where_clause.as_deref(), env),
        }
    }

    fn apply_unary(&self, op: UnOp, value: ExprValue) -> Result<ExprValue, EvalError> {
        match op {
            UnOp::Not => {
                let result = truth(&value, "NOT")?.map(|b| !b);
                Ok(match result {
                    Some(b) => ExprValue::Boolean(b),
                    None => ExprValue::Null,
                })
            }
            UnOp::Plus | UnOp::Minus => {
                if let Some(absent) = absorb_one(&value) {
                    return Ok(absent);
                }
                let negate = op == UnOp::Minus;
                match value {
                    ExprValue::Int(n) => {
                        let result = if negate { n.checked_neg() } else { Some(n) };
                        result
                            .map(ExprValue::Int)
                            .ok_or_else(|| EvalError::Type("integer overflow".to_string()))
                    }
                    ExprValue::Decimal(d) => Ok(ExprValue::Decimal(if negate { -d } else { d })),
                    ExprValue::Float(f) => Ok(ExprValue::Float(if negate { -f } else { f })),
                    other => Err(EvalError::Type(format!(
                        "unary {} requires a numeric operand, got {}",
                        if negate { "-" } else { "+" },
                        other.type_tag()
                    ))),
                }
            }
        }
    }

    fn apply_binary(
        &self,
        op: BinOp,
        left: &ExprValue,
        right: &ExprValue,
    ) -> Result<ExprValue, EvalError> {
        match op {
            BinOp::And => {
                let (l, r) = (truth(left, "AND")?, truth(right, "AND")?);
                Ok(kleene(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                }))
            }
            BinOp::Or => {
                let (l, r) = (truth(left, "OR")?, truth(right, "OR")?);
                Ok(kleene(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }))
            }
            _ => {
                // Every other operator is scalar: absent operands absorb,
                // MISSING winning over NULL.
                if let Some(absent) = absorb_two(left, right) {
                    return Ok(absent);
                }
                self.apply_scalar_binary(op, left, right)
            }
        }
    }

    fn apply_scalar_binary(
        &self,
        op: BinOp,
        left: &ExprValue,
        right: &ExprValue,
    ) -> Result<ExprValue, EvalError> {
        match op {
            BinOp::Add | BinOp::Subtract | BinOp::Multiply | BinOp::Divide | BinOp::Modulo => {
                match numeric_pair(left, right) {
                    Some(pair) => arithmetic(op, pair),
                    None => Err(EvalError::Type(format!(
                        "cannot apply {} to {} and {}",
                        op.symbol(),
                        left.type_tag(),
                        right.type_tag()
                    ))),
                }
            }
            BinOp::Concat => match (left.string_value(), right.string_value()) {
                (Some(a), Some(b)) => Ok(ExprValue::String(format!("{}{}", a, b))),
                _ => Err(EvalError::Type(format!(
                    "|| requires text operands, got {} and {}",
                    left.type_tag(),
                    right.type_tag()
                ))),
            },
            BinOp::Equal => Ok(ExprValue::Boolean(values_equal(left, right))),
            BinOp::NotEqual => Ok(ExprValue::Boolean(!values_equal(left, right))),
            BinOp::LessThan | BinOp::LessEqual | BinOp::GreaterThan | BinOp::GreaterEqual => {
                let ordering = compare(left, right).ok_or_else(|| {
                    EvalError::Type(format!(
                        "cannot compare {} {} {}",
                        left.type_tag(),
                        op.symbol(),
                        right.type_tag()
                    ))
                })?;
                let keep = match op {
                    BinOp::LessThan => ordering.is_lt(),
                    BinOp::LessEqual => ordering.is_le(),
                    BinOp::GreaterThan => ordering.is_gt(),
                    BinOp::GreaterEqual => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(ExprValue::Boolean(keep))
            }
            BinOp::And | BinOp::Or => unreachable!("logical operators handled in apply_binary"),
        }
    }

    /// Applies a chain of path steps to a base value.
    ///
    /// A field step on a struct yields the field value or MISSING; a
    /// wildcard fans out over the aggregate view; a deep wildcard fans
    /// out over every nested value in document order. Once a step has
    /// fanned out, later steps map element-wise and drop MISSING results.
    fn apply_path(&self, base: ExprValue, steps: &[PathStep]) -> Result<ExprValue, EvalError> {
        let mut cursor = PathCursor::One(base);

        for step in steps {
            cursor = match (cursor, step) {
                (PathCursor::One(value), PathStep::Field(name)) => {
                    PathCursor::One(value.field(name).cloned().unwrap_or(ExprValue::Missing))
                }
                (PathCursor::Many(values), PathStep::Field(name)) => PathCursor::Many(
                    values
                        .iter()
                        .filter_map(|v| v.field(name).cloned())
                        .collect(),
                ),
                (PathCursor::One(value), PathStep::Wildcard) => {
                    PathCursor::Many(value.materialize_elements()?)
                }
                (PathCursor::Many(values), PathStep::Wildcard) => {
                    let mut out = Vec::new();
                    for value in &values {
                        out.extend(value.materialize_elements()?);
                    }
                    PathCursor::Many(out)
                }
                (PathCursor::One(value), PathStep::WildcardDeep) => {
                    let mut out = Vec::new();
                    collect_deep(&value, &mut out)?;
                    PathCursor::Many(out)
                }
                (PathCursor::Many(values), PathStep::WildcardDeep) => {
                    let mut out = Vec::new();
                    for value in &values {
                        collect_deep(value, &mut out)?;
                    }
                    PathCursor::Many(out)
                }
            };
        }

        Ok(match cursor {
            PathCursor::One(value) => value,
            PathCursor::Many(values) => ExprValue::Bag(Bag::Eager(values)),
        })
    }

    /// SELECT evaluation: cross product over FROM sources, WHERE filter,
    /// then one result struct per surviving row.
    fn eval_select(
        &self,
        projection: &[ProjectionItem],
        from: &[FromSource],
        where_clause: Option<&Expr>,
        env: &Environment,
    ) -> Result<ExprValue, EvalError> {
        // Build the cross product left to right; appending each source's
        // elements to every existing row makes the leftmost source vary
        // slowest (row-major order).
        let mut rows = vec![env.clone()];

        for (index, source) in from.iter().enumerate() {
            let name = source
                .alias
                .clone()
                .or_else(|| derived_name(&source.expr))
                .unwrap_or_else(|| format!("_{}", index + 1));

            let mut next = Vec::new();
            for row in &rows {
                let value = self.evaluate(&source.expr, row)?;
                for element in value.elements()? {
                    let element = element?;
                    // Bind the source name and expose the element's own
                    // fields so bare column names resolve.
                    let scoped = row.bind_value(&element);
                    next.push(scoped.nest_one(name.clone(), element));
                }
            }
            rows = next;
        }

        let mut results = Vec::new();
        for row in &rows {
            if let Some(predicate) = where_clause {
                let keep = self.evaluate(predicate, row)?;
                match keep {
                    ExprValue::Boolean(true) => {}
                    ExprValue::Boolean(false) | ExprValue::Null | ExprValue::Missing => continue,
                    other => {
                        return Err(EvalError::Type(format!(
                            "WHERE predicate must be boolean, got {}",
                            other.type_tag()
                        )));
                    }
                }
            }

            let mut fields = Vec::with_capacity(projection.len());
            for (index, item) in projection.iter().enumerate() {
                let name = item
                    .alias
                    .clone()
                    .or_else(|| derived_name(&item.expr))
                    .unwrap_or_else(|| format!("_{}", index + 1));
                let value = self.evaluate(&item.expr, row)?;
                // MISSING projections leave no field behind.
                if value.type_tag() != crate::value::ExprType::Missing {
                    fields.push((name, value));
                }
            }
            results.push(ExprValue::Struct(fields));
        }

        Ok(ExprValue::Bag(Bag::Eager(results)))
    }
}

fn kleene(truth: Option<bool>) -> ExprValue {
    match truth {
        Some(b) => ExprValue::Boolean(b),
        None => ExprValue::Null,
    }
}

fn absorb_one(value: &ExprValue) -> Option<ExprValue> {
    match value {
        ExprValue::Missing => Some(ExprValue::Missing),
        ExprValue::Null => Some(ExprValue::Null),
        _ => None,
    }
}

fn absorb_two(left: &ExprValue, right: &ExprValue) -> Option<ExprValue> {
    if matches!(left, ExprValue::Missing) || matches!(right, ExprValue::Missing) {
        return Some(ExprValue::Missing);
    }
    if matches!(left, ExprValue::Null) || matches!(right, ExprValue::Null) {
        return Some(ExprValue::Null);
    }
    None
}

fn arithmetic(op: BinOp, pair: NumericPair) -> Result<ExprValue, EvalError> {
    match pair {
        NumericPair::Ints(a, b) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Subtract => a.checked_sub(b),
                BinOp::Multiply => a.checked_mul(b),
                BinOp::Divide => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.checked_div(b)
                }
                BinOp::Modulo => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!(),
            };
            result
                .map(ExprValue::Int)
                .ok_or_else(|| EvalError::Type("integer overflow".to_string()))
        }
        NumericPair::Decimals(a, b) => {
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Subtract => a.checked_sub(b),
                BinOp::Multiply => a.checked_mul(b),
                BinOp::Divide => {
                    if b.is_zero() {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.checked_div(b)
                }
                BinOp::Modulo => {
                    if b.is_zero() {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!(),
            };
            result
                .map(ExprValue::Decimal)
                .ok_or_else(|| EvalError::Type("decimal overflow".to_string()))
        }
        NumericPair::Floats(a, b) => {
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Subtract => a - b,
                BinOp::Multiply => a * b,
                BinOp::Divide => a / b,
                BinOp::Modulo => a % b,
                _ => unreachable!(),
            };
            Ok(ExprValue::Float(result))
        }
    }
}

/// Equality with numeric coercion across Int/Decimal/Float; everything
/// else compares structurally.
fn values_equal(left: &ExprValue, right: &ExprValue) -> bool {
    match numeric_pair(left, right) {
        Some(NumericPair::Ints(a, b)) => a == b,
        Some(NumericPair::Decimals(a, b)) => a == b,
        Some(NumericPair::Floats(a, b)) => a == b,
        None => left == right,
    }
}

fn compare(left: &ExprValue, right: &ExprValue) -> Option<std::cmp::Ordering> {
    if let Some(pair) = numeric_pair(left, right) {
        return match pair {
            NumericPair::Ints(a, b) => Some(a.cmp(&b)),
            NumericPair::Decimals(a, b) => Some(a.cmp(&b)),
            NumericPair::Floats(a, b) => a.partial_cmp(&b),
        };
    }
    match (left, right) {
        (ExprValue::String(a), ExprValue::String(b)) => Some(a.cmp(b)),
        (ExprValue::Symbol(a), ExprValue::Symbol(b)) => Some(a.cmp(b)),
        (ExprValue::Timestamp(a), ExprValue::Timestamp(b)) => Some(a.cmp(b)),
        (ExprValue::Boolean(a), ExprValue::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Recursive descent for the deep wildcard: every member of every nested
/// aggregate, preorder, in producer order. Scalars contribute no
/// children (their aggregate view wraps themselves, which would recurse
/// forever).
fn collect_deep(value: &ExprValue, out: &mut Vec<ExprValue>) -> Result<(), EvalError> {
    if !value.type_tag().is_aggregate() {
        return Ok(());
    }
    for element in value.elements()? {
        let element = element?;
        out.push(element.clone());
        collect_deep(&element, out)?;
    }
    Ok(())
}

/// The name a FROM source or projection item gets when it has no alias:
/// the identifier itself, or the last field step of a path.
fn derived_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(name) => Some(name.clone()),
        Expr::Path { steps, .. } => steps.iter().rev().find_map(|step| match step {
            PathStep::Field(name) => Some(name.clone()),
            _ => None,
        }),
        _ => None,
    }
}
