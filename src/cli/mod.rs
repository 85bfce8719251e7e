//! CLI support for bagql
//!
//! Provides programmatic access to the bagql CLI functionality for
//! embedding in other tools.

use std::io;

use crate::env::Environment;
use crate::evaluator::Evaluator;
use crate::output::{to_json, to_json_pretty};
use crate::parser::Parser;
use crate::value::ExprValue;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Parser error (includes lexical errors)
    Parse(crate::ParseError),
    /// Evaluation error
    Eval(crate::EvalError),
    /// JSON parsing error for the input document
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::Eval(e) => write!(f, "Evaluation error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON input: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Parse(e) => Some(e),
            CliError::Eval(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
        }
    }
}

impl From<crate::ParseError> for CliError {
    fn from(e: crate::ParseError) -> Self {
        CliError::Parse(e)
    }
}

impl From<crate::EvalError> for CliError {
    fn from(e: crate::EvalError) -> Self {
        CliError::Eval(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

pub struct QueryOptions {
    pub query: String,
    pub input: Option<String>,
    pub pretty: bool,
    pub syntax_only: bool,
}

pub enum QueryResult {
    SyntaxValid,
    Success(String),
}

/// Parses and (unless `syntax_only`) evaluates a query.
///
/// The optional JSON input document is bound under the name `it`, and
/// its top-level fields (when it is an object) are exposed as bindings
/// of their own, so `SELECT x FROM it` and `SELECT v FROM items` both
/// work against `{"items": [...]}`.
pub fn execute_query(options: &QueryOptions) -> Result<QueryResult, CliError> {
    let expr = Parser::parse_str(&options.query)?;

    if options.syntax_only {
        return Ok(QueryResult::SyntaxValid);
    }

    let env = match &options.input {
        Some(text) => {
            let json: serde_json::Value = serde_json::from_str(text)?;
            let document = ExprValue::from_json(json);
            Environment::empty()
                .bind_value(&document)
                .nest_one("it".to_string(), document)
        }
        None => Environment::empty(),
    };

    let evaluator = Evaluator::new();
    let result = evaluator.evaluate(&expr, &env)?;

    let rendered = if options.pretty {
        to_json_pretty(&result)?
    } else {
        to_json(&result)?
    };
    Ok(QueryResult::Success(rendered))
}
