/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Unary plus (identity on numbers)
    Plus,
    /// Unary minus (numeric negation)
    Minus,
    /// Logical NOT (three-valued)
    Not,
}

/// Binary infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    /// String concatenation (`||`)
    Concat,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Logical (three-valued)
    And,
    Or,
}

impl BinOp {
    /// Left binding power used by the precedence-climbing parser.
    ///
    /// Higher binds tighter. All binary operators are left-associative, so
    /// the parser recurses with `binding_power() + 1` on the right.
    pub fn binding_power(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Equal
            | BinOp::NotEqual
            | BinOp::LessThan
            | BinOp::LessEqual
            | BinOp::GreaterThan
            | BinOp::GreaterEqual => 4,
            BinOp::Concat => 5,
            BinOp::Add | BinOp::Subtract => 6,
            BinOp::Multiply | BinOp::Divide | BinOp::Modulo => 7,
        }
    }

    /// The operator's spelling in query text.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::Concat => "||",
            BinOp::Equal => "=",
            BinOp::NotEqual => "<>",
            BinOp::LessThan => "<",
            BinOp::LessEqual => "<=",
            BinOp::GreaterThan => ">",
            BinOp::GreaterEqual => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }
}
