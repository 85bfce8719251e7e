//! Function signatures, the dispatch contract, and the built-in registry.
//!
//! Every callable declares a [`FunctionSignature`] up front. Dispatch
//! validates the call arity against the signature (and fails before the
//! body runs), then applies the function's declared absent-value
//! [`Absorption`] policy, then checks argument type constraints, and only
//! then invokes the body with the already-evaluated arguments.
//!
//! The registry is constructed once, rejects duplicate names at build
//! time, and is never mutated afterwards; the evaluator receives it at
//! construction instead of consulting global state.

use std::collections::HashMap;

use regex::Regex;

use crate::env::Environment;
use crate::evaluator::EvalError;
use crate::ingest;
use crate::value::{ExprType, ExprValue};

/// A constraint on one parameter or return position.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeConstraint {
    /// Any value
    Any,
    /// Exactly one type tag
    Exactly(ExprType),
    /// Any of the listed type tags
    OneOf(&'static [ExprType]),
}

impl TypeConstraint {
    pub fn admits(&self, tag: ExprType) -> bool {
        match self {
            TypeConstraint::Any => true,
            TypeConstraint::Exactly(t) => *t == tag,
            TypeConstraint::OneOf(tags) => tags.contains(&tag),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TypeConstraint::Any => "any".to_string(),
            TypeConstraint::Exactly(t) => t.name().to_string(),
            TypeConstraint::OneOf(tags) => tags
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(" or "),
        }
    }
}

/// How a function reacts to NULL/MISSING arguments.
///
/// This is a declared property of each signature, not something inferred
/// at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorption {
    /// Any absent argument short-circuits the call: MISSING wins over
    /// NULL, and the body never runs. The default for scalar functions.
    Propagate,

    /// Absent arguments are ordinary values; the body decides.
    /// `coalesce` is the canonical example.
    None,
}

/// Declared shape of a callable: name, required parameters, an optional
/// trailing parameter, an optional variadic tail, and a return constraint.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Lowercase name used for registry lookup
    pub name: String,
    pub required: Vec<TypeConstraint>,
    /// Zero or one extra argument after the required ones
    pub optional: Option<TypeConstraint>,
    /// Zero or more extra arguments after the required ones
    pub variadic: Option<TypeConstraint>,
    pub returns: TypeConstraint,
}

impl FunctionSignature {
    pub fn arity_min(&self) -> usize {
        self.required.len()
    }

    /// `None` means unbounded (variadic).
    pub fn arity_max(&self) -> Option<usize> {
        if self.variadic.is_some() {
            None
        } else {
            Some(self.required.len() + usize::from(self.optional.is_some()))
        }
    }

    /// The constraint governing the argument at `index`, if the position
    /// is admissible at all.
    fn constraint_at(&self, index: usize) -> Option<&TypeConstraint> {
        if index < self.required.len() {
            return Some(&self.required[index]);
        }
        if index == self.required.len() {
            if let Some(opt) = &self.optional {
                return Some(opt);
            }
        }
        self.variadic.as_ref()
    }
}

/// The body receives the environment and the already-evaluated argument
/// values; arguments are evaluated eagerly, left to right, by the caller.
pub type FunctionBody = fn(&Environment, &[ExprValue]) -> Result<ExprValue, EvalError>;

/// A callable: signature, absorption policy, and a pure evaluation body.
#[derive(Clone)]
pub struct ExprFunction {
    pub signature: FunctionSignature,
    pub absorption: Absorption,
    pub body: FunctionBody,
}

impl ExprFunction {
    /// Runs the full dispatch discipline: arity, absorption, type
    /// constraints, body - in that order.
    pub fn call(&self, env: &Environment, args: &[ExprValue]) -> Result<ExprValue, EvalError> {
        let min = self.signature.arity_min();
        let max = self.signature.arity_max();
        if args.len() < min || max.is_some_and(|m| args.len() > m) {
            return Err(EvalError::Arity {
                name: self.signature.name.clone(),
                min,
                max,
                actual: args.len(),
            });
        }

        if self.absorption == Absorption::Propagate {
            if args.iter().any(|a| a.type_tag() == ExprType::Missing) {
                return Ok(ExprValue::Missing);
            }
            if args.iter().any(|a| a.type_tag() == ExprType::Null) {
                return Ok(ExprValue::Null);
            }
        }

        for (index, arg) in args.iter().enumerate() {
            // Arity was checked above, so every index has a constraint.
            if let Some(constraint) = self.signature.constraint_at(index) {
                if !constraint.admits(arg.type_tag()) {
                    return Err(EvalError::Type(format!(
                        "{}: argument {} must be {}, got {}",
                        self.signature.name,
                        index + 1,
                        constraint.describe(),
                        arg.type_tag()
                    )));
                }
            }
        }

        (self.body)(env, args)
    }
}

impl std::fmt::Debug for ExprFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExprFunction")
            .field("signature", &self.signature)
            .field("absorption", &self.absorption)
            .finish()
    }
}

/// Immutable-after-build mapping from lowercase name to callable.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, ExprFunction>,
}

impl FunctionRegistry {
    /// Builds a registry; duplicate names are a construction-time error.
    pub fn build(functions: Vec<ExprFunction>) -> Result<Self, EvalError> {
        let mut map = HashMap::new();
        for function in functions {
            let name = function.signature.name.to_ascii_lowercase();
            if map.insert(name.clone(), function).is_some() {
                return Err(EvalError::Configuration(format!(
                    "duplicate function name '{}'",
                    name
                )));
            }
        }
        Ok(FunctionRegistry { functions: map })
    }

    /// The standard built-in set.
    pub fn with_builtins() -> Self {
        match Self::build(builtins()) {
            Ok(registry) => registry,
            // Built-in names are distinct by construction.
            Err(_) => unreachable!("built-in function names collide"),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&ExprFunction> {
        self.functions.get(&name.to_ascii_lowercase())
    }
}

fn builtins() -> Vec<ExprFunction> {
    vec![
        coalesce_function(),
        exists_function(),
        char_length_function(),
        upper_function(),
        lower_function(),
        matches_function(),
        utcnow_function(),
        ingest::read_file_function(),
    ]
}

/// `COALESCE(expr, ...)` - the first argument whose tag is neither NULL
/// nor MISSING, or NULL when every argument is absent.
fn coalesce_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "coalesce".to_string(),
            required: vec![TypeConstraint::Any],
            optional: None,
            variadic: Some(TypeConstraint::Any),
            returns: TypeConstraint::Any,
        },
        absorption: Absorption::None,
        body: |_env, args| {
            Ok(args
                .iter()
                .find(|a| !a.is_absent())
                .cloned()
                .unwrap_or(ExprValue::Null))
        },
    }
}

/// `EXISTS(value)` - true when the aggregate view is non-empty. NULL and
/// MISSING iterate as empty, so both yield false.
fn exists_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "exists".to_string(),
            required: vec![TypeConstraint::Any],
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::Boolean),
        },
        absorption: Absorption::None,
        body: |_env, args| {
            let mut elements = args[0].elements()?;
            match elements.next() {
                Some(Err(e)) => Err(e),
                Some(Ok(_)) => Ok(ExprValue::Boolean(true)),
                None => Ok(ExprValue::Boolean(false)),
            }
        },
    }
}

const TEXT_TAGS: &[ExprType] = &[ExprType::String, ExprType::Symbol];

fn char_length_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "char_length".to_string(),
            required: vec![TypeConstraint::OneOf(TEXT_TAGS)],
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::Int),
        },
        absorption: Absorption::Propagate,
        body: |_env, args| {
            let text = expect_text(&args[0], "char_length")?;
            Ok(ExprValue::Int(text.chars().count() as i64))
        },
    }
}

fn upper_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "upper".to_string(),
            required: vec![TypeConstraint::OneOf(TEXT_TAGS)],
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::String),
        },
        absorption: Absorption::Propagate,
        body: |_env, args| {
            let text = expect_text(&args[0], "upper")?;
            Ok(ExprValue::String(text.to_uppercase()))
        },
    }
}

fn lower_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "lower".to_string(),
            required: vec![TypeConstraint::OneOf(TEXT_TAGS)],
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::String),
        },
        absorption: Absorption::Propagate,
        body: |_env, args| {
            let text = expect_text(&args[0], "lower")?;
            Ok(ExprValue::String(text.to_lowercase()))
        },
    }
}

/// `MATCHES(text, pattern)` - regular-expression match over the whole
/// haystack (unanchored).
fn matches_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "matches".to_string(),
            required: vec![
                TypeConstraint::OneOf(TEXT_TAGS),
                TypeConstraint::OneOf(TEXT_TAGS),
            ],
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::Boolean),
        },
        absorption: Absorption::Propagate,
        body: |_env, args| {
            let text = expect_text(&args[0], "matches")?;
            let pattern = expect_text(&args[1], "matches")?;
            let re = Regex::new(pattern)
                .map_err(|e| EvalError::Type(format!("matches: invalid pattern: {}", e)))?;
            Ok(ExprValue::Boolean(re.is_match(text)))
        },
    }
}

fn utcnow_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "utcnow".to_string(),
            required: Vec::new(),
            optional: None,
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::Timestamp),
        },
        absorption: Absorption::None,
        body: |_env, _args| Ok(ExprValue::Timestamp(chrono::Utc::now().fixed_offset())),
    }
}

fn expect_text<'a>(value: &'a ExprValue, name: &str) -> Result<&'a str, EvalError> {
    value
        .string_value()
        .ok_or_else(|| EvalError::Type(format!("{}: expected text, got {}", name, value.type_tag())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_requires_one_argument() {
        let registry = FunctionRegistry::with_builtins();
        let coalesce = registry.lookup("coalesce").unwrap();
        let err = coalesce.call(&Environment::empty(), &[]).unwrap_err();
        match err {
            EvalError::Arity { min, max, actual, .. } => {
                assert_eq!(min, 1);
                assert_eq!(max, None);
                assert_eq!(actual, 0);
            }
            other => panic!("expected arity error, got {:?}", other),
        }
    }

    #[test]
    fn coalesce_skips_null_and_missing() {
        let registry = FunctionRegistry::with_builtins();
        let coalesce = registry.lookup("coalesce").unwrap();
        let env = Environment::empty();

        let result = coalesce
            .call(
                &env,
                &[
                    ExprValue::Null,
                    ExprValue::Missing,
                    ExprValue::Int(5),
                    ExprValue::Int(6),
                ],
            )
            .unwrap();
        assert_eq!(result, ExprValue::Int(5));

        let all_absent = coalesce
            .call(&env, &[ExprValue::Null, ExprValue::Missing])
            .unwrap();
        assert_eq!(all_absent, ExprValue::Null);
    }

    #[test]
    fn duplicate_names_rejected_at_build_time() {
        let err = FunctionRegistry::build(vec![coalesce_function(), coalesce_function()]);
        assert!(matches!(err, Err(EvalError::Configuration(_))));
    }

    #[test]
    fn propagation_short_circuits_before_type_check() {
        let registry = FunctionRegistry::with_builtins();
        let upper = registry.lookup("upper").unwrap();
        let env = Environment::empty();

        // NULL never reaches the string constraint.
        assert_eq!(upper.call(&env, &[ExprValue::Null]).unwrap(), ExprValue::Null);
        // MISSING wins over NULL ordering elsewhere; here it simply propagates.
        assert_eq!(
            upper.call(&env, &[ExprValue::Missing]).unwrap(),
            ExprValue::Missing
        );
        // A present non-text argument is a type error.
        assert!(matches!(
            upper.call(&env, &[ExprValue::Int(3)]),
            Err(EvalError::Type(_))
        ));
    }
}
