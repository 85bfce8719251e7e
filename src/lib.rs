pub mod ast;
pub mod env;
pub mod evaluator;
pub mod functions;
pub mod ingest;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{BinOp, Expr, FromSource, PathStep, ProjectionItem, Token, TokenKind, UnOp};
pub use env::Environment;
pub use evaluator::{EvalError, Evaluator};
pub use functions::{Absorption, ExprFunction, FunctionRegistry, FunctionSignature, TypeConstraint};
pub use lexer::{LexError, Lexer};
pub use output::{to_json, to_json_pretty};
pub use parser::{ParseError, Parser};
pub use value::{Bag, BagSource, ExprType, ExprValue, ValueIter};
