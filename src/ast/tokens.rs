use rust_decimal::Decimal;

/// A lexical token together with its byte offset in the source text.
///
/// Tokens are produced one at a time by the lexer, are immutable, and are
/// consumed exactly once by the parser. The offset points at the first
/// character of the token and is carried into every diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Token { kind, offset }
    }

    /// Short human-readable rendering used in parse errors.
    pub fn describe(&self) -> String {
        self.kind.describe()
    }
}

/// The tag of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 314
    /// ```
    Integer(i64),

    /// Exact decimal literal (digits with a fractional part, no exponent)
    ///
    /// # Examples
    /// ```text
    /// 3.14
    /// 0.5
    /// ```
    Decimal(Decimal),

    /// Floating-point literal (exponent form)
    ///
    /// # Examples
    /// ```text
    /// 1e0
    /// 2.5e-3
    /// ```
    Float(f64),

    /// String literal enclosed in single quotes
    ///
    /// # Examples
    /// ```text
    /// 'hello'
    /// 'it''s here'
    /// ```
    String(String),

    /// Boolean literal (`TRUE` / `FALSE`, case-insensitive)
    Boolean(bool),

    /// `NULL` literal
    Null,

    /// `MISSING` literal
    ///
    /// Distinct from `NULL`: it marks the absence of a binding rather than
    /// a known-but-null value.
    Missing,

    // Identifiers
    /// Bare identifier (case preserved, keywords matched case-insensitively)
    Identifier(String),

    /// Double-quoted identifier (case-sensitive, never a keyword)
    ///
    /// # Examples
    /// ```text
    /// "Select"
    /// "weird name"
    /// ```
    QuotedIdentifier(String),

    // Keywords
    /// `SELECT`
    Select,
    /// `FROM`
    From,
    /// `WHERE`
    Where,
    /// `AS`
    As,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,

    // Operators
    /// Addition or unary plus
    Plus,
    /// Subtraction or unary minus
    Minus,
    /// Multiplication, or the wildcard path step after a dot
    Star,
    /// Division
    Slash,
    /// Modulo
    Percent,
    /// String concatenation (`||`)
    Concat,
    /// Equality (`=`)
    Eq,
    /// Inequality (`<>` or `!=`)
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    LtEq,
    /// Greater than
    Gt,
    /// Greater than or equal
    GtEq,

    // Path navigation
    /// Single dot introducing a path step
    Dot,
    /// Double dot (greedy-matched; never split into two `Dot`s)
    ///
    /// Contributes two dots to a path-step run; runs of dots encode deep
    /// wildcard steps (see the parser).
    DotDot,

    // Punctuation
    /// Comma separating arguments, projection items, or FROM sources
    Comma,
    /// Left parenthesis
    LParen,
    /// Right parenthesis
    RParen,

    /// End of input
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(n) => format!("integer `{}`", n),
            TokenKind::Decimal(d) => format!("decimal `{}`", d),
            TokenKind::Float(f) => format!("float `{}`", f),
            TokenKind::String(s) => format!("string '{}'", s),
            TokenKind::Boolean(b) => format!("`{}`", b),
            TokenKind::Null => "`NULL`".to_string(),
            TokenKind::Missing => "`MISSING`".to_string(),
            TokenKind::Identifier(s) => format!("identifier `{}`", s),
            TokenKind::QuotedIdentifier(s) => format!("identifier \"{}\"", s),
            TokenKind::Select => "`SELECT`".to_string(),
            TokenKind::From => "`FROM`".to_string(),
            TokenKind::Where => "`WHERE`".to_string(),
            TokenKind::As => "`AS`".to_string(),
            TokenKind::And => "`AND`".to_string(),
            TokenKind::Or => "`OR`".to_string(),
            TokenKind::Not => "`NOT`".to_string(),
            TokenKind::Plus => "`+`".to_string(),
            TokenKind::Minus => "`-`".to_string(),
            TokenKind::Star => "`*`".to_string(),
            TokenKind::Slash => "`/`".to_string(),
            TokenKind::Percent => "`%`".to_string(),
            TokenKind::Concat => "`||`".to_string(),
            TokenKind::Eq => "`=`".to_string(),
            TokenKind::NotEq => "`<>`".to_string(),
            TokenKind::Lt => "`<`".to_string(),
            TokenKind::LtEq => "`<=`".to_string(),
            TokenKind::Gt => "`>`".to_string(),
            TokenKind::GtEq => "`>=`".to_string(),
            TokenKind::Dot => "`.`".to_string(),
            TokenKind::DotDot => "`..`".to_string(),
            TokenKind::Comma => "`,`".to_string(),
            TokenKind::LParen => "`(`".to_string(),
            TokenKind::RParen => "`)`".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}
