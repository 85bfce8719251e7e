//! # bagql - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for the bagql query
//! language, a SQL-derived language for querying semi-structured data
//! (scalars, lists, bags, structs) with explicit NULL and MISSING values.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[expressions]** - Expression nodes (literals, paths, calls, SELECT)
//! - **[operators]** - Unary and binary operators with binding powers
//!
//! ## Core Concepts
//!
//! ### Expressions
//!
//! Every query is a single expression. The interesting shapes are:
//!
//! ```text
//! SELECT a, b FROM table1 AS t1, table2 WHERE f(t1)
//! foo(x, y).a.*.b
//! x....a
//! ```
//!
//! ### Path Navigation
//!
//! Paths are left-associative chains of steps applied to a base expression:
//! `.name` selects a struct field, `.*` fans out over the elements of a
//! value, and a bare `.` followed by more dots is a deep wildcard that
//! descends through every nesting level.
//!
//! ### Normalization
//!
//! The tree is ambiguity-free: redundant parentheses disappear during
//! parsing, so `+(-(baz()))` and `+-baz()` produce identical trees. Nodes
//! are immutable once constructed and owned exclusively by their parent.
pub mod tokens;
pub mod expressions;
pub mod operators;

pub use tokens::{Token, TokenKind};
pub use expressions::{Expr, FromSource, PathStep, ProjectionItem};
pub use operators::{BinOp, UnOp};
