use rust_decimal::Decimal;

use crate::ast::{Token, TokenKind};

/// Errors produced while tokenizing query text.
///
/// Every variant carries the byte offset of the offending character so a
/// caller can render a diagnostic without re-scanning the input.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    /// A character that cannot start any token
    UnexpectedChar { ch: char, offset: usize },

    /// A string literal without a closing quote
    UnterminatedString { offset: usize },

    /// A quoted identifier without a closing quote
    UnterminatedIdentifier { offset: usize },

    /// An unknown escape sequence inside a string literal
    InvalidEscape { ch: char, offset: usize },

    /// A numeric literal that does not fit its type
    InvalidNumber { text: String, offset: usize },

    /// A character that begins a multi-character operator but does not
    /// complete one (e.g. a lone `|`)
    IncompleteOperator { ch: char, offset: usize },
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, offset } => {
                write!(f, "Unexpected character '{}' at offset {}", ch, offset)
            }
            LexError::UnterminatedString { offset } => {
                write!(f, "Unterminated string literal starting at offset {}", offset)
            }
            LexError::UnterminatedIdentifier { offset } => {
                write!(
                    f,
                    "Unterminated quoted identifier starting at offset {}",
                    offset
                )
            }
            LexError::InvalidEscape { ch, offset } => {
                write!(f, "Invalid escape sequence '\\{}' at offset {}", ch, offset)
            }
            LexError::InvalidNumber { text, offset } => {
                write!(f, "Invalid numeric literal '{}' at offset {}", text, offset)
            }
            LexError::IncompleteOperator { ch, offset } => {
                write!(
                    f,
                    "Unexpected '{}' at offset {} (did you mean '{}{}'?)",
                    ch, offset, ch, ch
                )
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Converts query text into a stream of [`Token`]s.
///
/// The lexer is a pure function of its input: it holds no external state
/// and can always be restarted from scratch by constructing a new one.
/// Multi-character operators are matched greedily, so `..` is always one
/// `DotDot` token and never two `Dot`s.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenizes the whole input, including the trailing `Eof` token.
    pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a quoted run, handling doubled-quote and backslash escapes.
    ///
    /// Used for both string literals (`'...'`) and quoted identifiers
    /// (`"..."`); the two differ only in their delimiter.
    fn read_quoted(&mut self, quote: char, start: usize) -> Result<String, LexError> {
        let mut result = String::new();
        self.advance(); // consume opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    // A doubled quote is an escaped quote, not a close.
                    if self.peek_char(1) == Some(quote) {
                        result.push(quote);
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        return Ok(result);
                    }
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('\\') => result.push('\\'),
                        Some(c) if c == quote => result.push(quote),
                        Some(c) => {
                            return Err(LexError::InvalidEscape {
                                ch: c,
                                offset: self.position,
                            });
                        }
                        None => break,
                    }
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        if quote == '\'' {
            Err(LexError::UnterminatedString { offset: start })
        } else {
            Err(LexError::UnterminatedIdentifier { offset: start })
        }
    }

    /// Reads a numeric literal: `5` (integer), `3.14` (exact decimal),
    /// `1e0` / `2.5e-3` (float).
    fn read_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        let mut is_decimal = false;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else if ch == '.'
                && !is_decimal
                && !is_float
                && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_decimal = true;
                text.push(ch);
                self.advance();
            } else if (ch == 'e' || ch == 'E') && !is_float && self.exponent_follows() {
                is_float = true;
                text.push(ch);
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current_char() {
                    text.push(sign);
                    self.advance();
                }
            } else {
                break;
            }
        }

        let invalid = || LexError::InvalidNumber {
            text: text.clone(),
            offset: start,
        };

        if is_float {
            Ok(TokenKind::Float(text.parse::<f64>().map_err(|_| invalid())?))
        } else if is_decimal {
            Ok(TokenKind::Decimal(
                text.parse::<Decimal>().map_err(|_| invalid())?,
            ))
        } else {
            Ok(TokenKind::Integer(text.parse::<i64>().map_err(|_| invalid())?))
        }
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_char(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+') | Some('-') => self.peek_char(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let start = self.position;

        let kind = match self.current_char() {
            None => TokenKind::Eof,
            Some('+') => {
                self.advance();
                TokenKind::Plus
            }
            Some('-') => {
                self.advance();
                TokenKind::Minus
            }
            Some('*') => {
                self.advance();
                TokenKind::Star
            }
            Some('/') => {
                self.advance();
                TokenKind::Slash
            }
            Some('%') => {
                self.advance();
                TokenKind::Percent
            }
            Some(',') => {
                self.advance();
                TokenKind::Comma
            }
            Some('(') => {
                self.advance();
                TokenKind::LParen
            }
            Some(')') => {
                self.advance();
                TokenKind::RParen
            }
            Some('.') => {
                // Greedy: the deep-wildcard marker `..` must never be
                // mis-split into two single dots.
                if self.peek_char(1) == Some('.') {
                    self.advance();
                    self.advance();
                    TokenKind::DotDot
                } else {
                    self.advance();
                    TokenKind::Dot
                }
            }
            Some('=') => {
                self.advance();
                TokenKind::Eq
            }
            Some('<') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::LtEq
                } else if self.peek_char(1) == Some('>') {
                    self.advance();
                    self.advance();
                    TokenKind::NotEq
                } else {
                    self.advance();
                    TokenKind::Lt
                }
            }
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::GtEq
                } else {
                    self.advance();
                    TokenKind::Gt
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::NotEq
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch: '!',
                        offset: start,
                    });
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.advance();
                    self.advance();
                    TokenKind::Concat
                } else {
                    return Err(LexError::IncompleteOperator {
                        ch: '|',
                        offset: start,
                    });
                }
            }
            Some('\'') => TokenKind::String(self.read_quoted('\'', start)?),
            Some('"') => TokenKind::QuotedIdentifier(self.read_quoted('"', start)?),
            Some(ch) if ch.is_ascii_digit() => self.read_number(start)?,
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();

                // Keywords match case-insensitively; quoted identifiers
                // never reach this branch.
                match ident.to_ascii_lowercase().as_str() {
                    "select" => TokenKind::Select,
                    "from" => TokenKind::From,
                    "where" => TokenKind::Where,
                    "as" => TokenKind::As,
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    "true" => TokenKind::Boolean(true),
                    "false" => TokenKind::Boolean(false),
                    "null" => TokenKind::Null,
                    "missing" => TokenKind::Missing,
                    _ => TokenKind::Identifier(ident),
                }
            }
            Some(ch) => {
                return Err(LexError::UnexpectedChar { ch, offset: start });
            }
        };

        Ok(Token::new(kind, start))
    }
}

#[test]
fn test_keywords_case_insensitive() {
    let tokens = Lexer::tokenize("SELECT from Where AS and OR not NULL missing TRUE false").unwrap();
    let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Select,
            TokenKind::From,
            TokenKind::Where,
            TokenKind::As,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Not,
            TokenKind::Null,
            TokenKind::Missing,
            TokenKind::Boolean(true),
            TokenKind::Boolean(false),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_dotdot_is_greedy() {
    let tokens = Lexer::tokenize("x....a").unwrap();
    let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Identifier("x".to_string()),
            TokenKind::DotDot,
            TokenKind::DotDot,
            TokenKind::Identifier("a".to_string()),
            TokenKind::Eof,
        ]
    );
}
