use rust_decimal::Decimal;

use crate::ast::{BinOp, UnOp};

/// Abstract Syntax Tree node representing a parsed expression.
///
/// The tree is the canonical, ambiguity-free representation of a query:
/// parentheses are resolved away, operator nesting is explicit, and every
/// node is immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal integer
    Integer(i64),

    /// Literal exact decimal
    Decimal(Decimal),

    /// Literal float (exponent form in source)
    Float(f64),

    /// String literal
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// `NULL` literal
    Null,

    /// `MISSING` literal
    Missing,

    // References
    /// Reference to a name bound in the evaluation environment
    ///
    /// # Examples
    /// ```text
    /// kumo
    /// "CaseSensitive"
    /// ```
    Identifier(String),

    // Operations
    /// Unary prefix operation
    ///
    /// Chains nest right-associatively: `+-baz()` is `+(-(baz()))`.
    Unary { op: UnOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison, logical, concat)
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Named function call
    ///
    /// # Examples
    /// ```text
    /// foobar()
    /// coalesce(a, b, 5)
    /// ```
    Call { name: String, args: Vec<Expr> },

    /// Path navigation: a base expression followed by an ordered chain of
    /// steps.
    ///
    /// # Examples
    /// ```text
    /// a.b                  // one field step
    /// foo(x, y).a.*.b      // field, wildcard, field on a call result
    /// x....a               // three deep-wildcard steps, then a field
    /// ```
    Path {
        base: Box<Expr>,
        steps: Vec<PathStep>,
    },

    /// `SELECT` expression
    ///
    /// Multiple FROM sources denote an implicit cross product over their
    /// element streams, in row-major order (leftmost source varies
    /// slowest).
    Select {
        projection: Vec<ProjectionItem>,
        from: Vec<FromSource>,
        where_clause: Option<Box<Expr>>,
    },
}

/// One step of a path-navigation chain.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `.name` - struct field access by name
    Field(String),

    /// `.*` - fan out over the elements of the current value
    Wildcard,

    /// `..` - deep wildcard descending through every nesting level
    WildcardDeep,
}

/// One item of a SELECT projection list, optionally aliased with `AS`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// One FROM source, optionally aliased with `AS`.
///
/// The source may be any expression, including nested paths:
/// `FROM t1, t2.x.*.b`.
#[derive(Debug, Clone, PartialEq)]
pub struct FromSource {
    pub expr: Expr,
    pub alias: Option<String>,
}
