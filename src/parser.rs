use std::mem;

use crate::{
    ast::{BinOp, Expr, FromSource, PathStep, ProjectionItem, Token, TokenKind, UnOp},
    lexer::{LexError, Lexer},
};

/// Binding power of prefix `NOT`: looser than comparisons, tighter than
/// `AND`, so `NOT a = b` parses as `NOT (a = b)`.
const NOT_BINDING_POWER: u8 = 3;

/// Errors produced while parsing a token sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The token stream was empty (or whitespace-only input)
    EmptyInput,

    /// A token that does not fit the expected construct
    UnexpectedToken {
        expected: String,
        found: String,
        offset: usize,
    },

    /// Tokens left over after a complete expression was parsed
    TrailingTokens { found: String, offset: usize },

    /// The input failed to tokenize
    Lex(LexError),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::EmptyInput => write!(f, "Empty input: expected an expression"),
            ParseError::UnexpectedToken {
                expected,
                found,
                offset,
            } => write!(
                f,
                "Expected {} but found {} at offset {}",
                expected, found, offset
            ),
            ParseError::TrailingTokens { found, offset } => write!(
                f,
                "Unexpected {} at offset {} after a complete expression",
                found, offset
            ),
            ParseError::Lex(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Lex(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

/// Precedence-climbing (Pratt) parser over a token sequence.
///
/// Produces exactly one root [`Expr`] per input: empty input and trailing
/// unconsumed tokens are both rejected. The resulting tree is fully
/// normalized - redundant parentheses leave no trace.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Builds a parser over a token sequence.
    ///
    /// The parser relies on the sequence ending with `Eof` (which
    /// [`Lexer::tokenize`] guarantees); an empty sequence is padded so
    /// hand-built token vectors are safe too.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, 0));
        }
        Parser {
            tokens,
            position: 0,
        }
    }

    /// Tokenizes and parses `source` in one step.
    pub fn parse_str(source: &str) -> Result<Expr, ParseError> {
        let tokens = Lexer::tokenize(source)?;
        Parser::new(tokens).parse()
    }

    /// Parses the whole token sequence into a single expression.
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        if self.current_kind() == &TokenKind::Eof {
            return Err(ParseError::EmptyInput);
        }

        let expr = self.parse_expr(0)?;

        match self.current_kind() {
            TokenKind::Eof => Ok(expr),
            _ => Err(ParseError::TrailingTokens {
                found: self.current().describe(),
                offset: self.current().offset,
            }),
        }
    }

    fn current(&self) -> &Token {
        // The token vector always ends with Eof, so position stays in range.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Takes the current token's kind by value and advances.
    fn take_kind(&mut self) -> TokenKind {
        let kind = mem::replace(&mut self.tokens[self.position].kind, TokenKind::Eof);
        self.advance();
        kind
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), ParseError> {
        if mem::discriminant(self.current_kind()) != mem::discriminant(expected) {
            return Err(self.unexpected(&expected.describe()));
        }
        self.advance();
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().describe(),
            offset: self.current().offset,
        }
    }

    fn binary_op(kind: &TokenKind) -> Option<BinOp> {
        match kind {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Subtract),
            TokenKind::Star => Some(BinOp::Multiply),
            TokenKind::Slash => Some(BinOp::Divide),
            TokenKind::Percent => Some(BinOp::Modulo),
            TokenKind::Concat => Some(BinOp::Concat),
            TokenKind::Eq => Some(BinOp::Equal),
            TokenKind::NotEq => Some(BinOp::NotEqual),
            TokenKind::Lt => Some(BinOp::LessThan),
            TokenKind::LtEq => Some(BinOp::LessEqual),
            TokenKind::Gt => Some(BinOp::GreaterThan),
            TokenKind::GtEq => Some(BinOp::GreaterEqual),
            TokenKind::And => Some(BinOp::And),
            TokenKind::Or => Some(BinOp::Or),
            _ => None,
        }
    }

    /// Precedence climbing: consume infix operators whose binding power is
    /// at least `min_bp`. All binary operators are left-associative.
    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut left = if self.current_kind() == &TokenKind::Not {
            self.advance();
            let operand = self.parse_expr(NOT_BINDING_POWER + 1)?;
            Expr::Unary {
                op: UnOp::Not,
                operand: Box::new(operand),
            }
        } else {
            self.parse_unary()?
        };

        while let Some(op) = Self::binary_op(self.current_kind()) {
            let bp = op.binding_power();
            if bp < min_bp {
                break;
            }
            self.advance();
            let right = self.parse_expr(bp + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Unary prefix `+` and `-` recurse into their operand before
    /// wrapping, so chains nest right-associatively: `+-baz()` is
    /// `+(-(baz()))`.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current_kind() {
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Minus => Some(UnOp::Minus),
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.parse_postfix(),
        }
    }

    /// Parses a primary expression followed by a left-associative chain of
    /// path steps.
    ///
    /// Each step costs exactly one dot: `.name` is a field step, `.*` a
    /// wildcard step, and every surplus dot before the terminal is a deep
    /// wildcard step. Runs of `Dot`/`DotDot` tokens are counted by their
    /// dot contribution, so `x....a` (two `DotDot`s) yields three deep
    /// steps and a field step.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        let mut steps = Vec::new();

        while matches!(self.current_kind(), TokenKind::Dot | TokenKind::DotDot) {
            let mut dots = 0usize;
            loop {
                match self.current_kind() {
                    TokenKind::Dot => dots += 1,
                    TokenKind::DotDot => dots += 2,
                    _ => break,
                }
                self.advance();
            }

            for _ in 0..dots - 1 {
                steps.push(PathStep::WildcardDeep);
            }

            match self.take_kind() {
                TokenKind::Star => steps.push(PathStep::Wildcard),
                TokenKind::Identifier(name) | TokenKind::QuotedIdentifier(name) => {
                    steps.push(PathStep::Field(name));
                }
                kind => {
                    // take_kind already advanced; report the consumed token
                    return Err(ParseError::UnexpectedToken {
                        expected: "path step (field name or `*`)".to_string(),
                        found: kind.describe(),
                        offset: self.tokens[self.position.saturating_sub(1)].offset,
                    });
                }
            }
        }

        if steps.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Path {
                base: Box::new(base),
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current_kind() {
            TokenKind::Select => {
                self.advance();
                self.parse_select()
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr(0)?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            _ => match self.take_kind() {
                TokenKind::Integer(n) => Ok(Expr::Integer(n)),
                TokenKind::Decimal(d) => Ok(Expr::Decimal(d)),
                TokenKind::Float(f) => Ok(Expr::Float(f)),
                TokenKind::String(s) => Ok(Expr::String(s)),
                TokenKind::Boolean(b) => Ok(Expr::Boolean(b)),
                TokenKind::Null => Ok(Expr::Null),
                TokenKind::Missing => Ok(Expr::Missing),
                TokenKind::QuotedIdentifier(name) => Ok(Expr::Identifier(name)),
                TokenKind::Identifier(name) => {
                    if self.current_kind() == &TokenKind::LParen {
                        self.advance();
                        let args = self.parse_call_args()?;
                        Ok(Expr::Call { name, args })
                    } else {
                        Ok(Expr::Identifier(name))
                    }
                }
                kind => Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: kind.describe(),
                    offset: self.tokens[self.position.saturating_sub(1)].offset,
                }),
            },
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if self.current_kind() != &TokenKind::RParen {
            loop {
                args.push(self.parse_expr(0)?);
                if self.current_kind() == &TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    /// Parses the clause shape after the `SELECT` keyword: a projection
    /// list, one or more FROM sources, and an optional WHERE predicate.
    /// Source order and aliasing are preserved exactly as written.
    fn parse_select(&mut self) -> Result<Expr, ParseError> {
        let mut projection = Vec::new();
        loop {
            let expr = self.parse_expr(0)?;
            let alias = self.parse_alias()?;
            projection.push(ProjectionItem { expr, alias });
            if self.current_kind() == &TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(&TokenKind::From)?;

        let mut from = Vec::new();
        loop {
            let expr = self.parse_expr(0)?;
            let alias = self.parse_alias()?;
            from.push(FromSource { expr, alias });
            if self.current_kind() == &TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }

        let where_clause = if self.current_kind() == &TokenKind::Where {
            self.advance();
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };

        Ok(Expr::Select {
            projection,
            from,
            where_clause,
        })
    }

    fn parse_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.current_kind() != &TokenKind::As {
            return Ok(None);
        }
        self.advance();

        match self.take_kind() {
            TokenKind::Identifier(name) | TokenKind::QuotedIdentifier(name) => Ok(Some(name)),
            kind => Err(ParseError::UnexpectedToken {
                expected: "alias after `AS`".to_string(),
                found: kind.describe(),
                offset: self.tokens[self.position.saturating_sub(1)].offset,
            }),
        }
    }
}
