//! Lexer (tokenizer) for the scheme description language.

use crate::error::{KineticError, Result};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Species or parameter name
    Identifier,
    /// Integer or floating point literal
    Number,
    /// A directive (starts with '.')
    Directive,
    /// Reaction marker '~'
    Tilde,
    /// Reversible arrow '<->'
    Reversible,
    /// Irreversible arrow '->'
    Forward,
    /// '+'
    Plus,
    /// ','
    Comma,
    /// Open parenthesis '('
    OpenParen,
    /// Close parenthesis ')'
    CloseParen,
    /// Equals sign '='
    Equals,
    /// Newline
    Newline,
    /// End of file
    Eof,
}

/// Lexer for tokenizing scheme files.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let token = |kind: TokenKind, text: &str| Token {
            kind,
            text: text.to_string(),
            line,
            column,
        };

        let Some(&ch) = self.chars.peek() else {
            return Ok(token(TokenKind::Eof, ""));
        };

        let single = match ch {
            '\n' => Some(TokenKind::Newline),
            '~' => Some(TokenKind::Tilde),
            '+' => Some(TokenKind::Plus),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '=' => Some(TokenKind::Equals),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(token(kind, &ch.to_string()));
        }

        match ch {
            '.' => {
                self.advance();
                if self.chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                    let digits = self.read_number();
                    return Ok(token(TokenKind::Number, &format!(".{}", digits)));
                }
                let name = self.read_identifier();
                if name.is_empty() {
                    return Err(KineticError::lexer(line, column, "expected directive name after '.'"));
                }
                Ok(token(TokenKind::Directive, &format!(".{}", name)))
            }
            '<' => {
                self.advance();
                self.expect_char('-', line, column)?;
                self.expect_char('>', line, column)?;
                Ok(token(TokenKind::Reversible, "<->"))
            }
            '-' => {
                self.advance();
                match self.chars.peek() {
                    Some('>') => {
                        self.advance();
                        Ok(token(TokenKind::Forward, "->"))
                    }
                    Some(c) if c.is_ascii_digit() || *c == '.' => {
                        let digits = self.read_number();
                        Ok(token(TokenKind::Number, &format!("-{}", digits)))
                    }
                    _ => Err(KineticError::lexer(line, column, "expected '->' or a number after '-'")),
                }
            }
            '0'..='9' => {
                let text = self.read_number();
                Ok(token(TokenKind::Number, &text))
            }
            _ if ch.is_alphabetic() || ch == '_' => {
                let text = self.read_identifier();
                Ok(token(TokenKind::Identifier, &text))
            }
            _ => Err(KineticError::lexer(
                line,
                column,
                format!("unexpected character '{}'", ch),
            )),
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn expect_char(&mut self, expected: char, line: usize, column: usize) -> Result<()> {
        match self.advance() {
            Some(c) if c == expected => Ok(()),
            _ => Err(KineticError::lexer(line, column, "expected '<->'")),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&ch) = self.chars.peek() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else if ch == '#' || ch == ';' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(&ch) = self.chars.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> String {
        let mut text = String::new();
        self.read_digits(&mut text);

        if let Some(&'.') = self.chars.peek() {
            text.push('.');
            self.advance();
            self.read_digits(&mut text);
        }

        if let Some(&ch) = self.chars.peek() {
            if ch == 'e' || ch == 'E' {
                text.push(ch);
                self.advance();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '-' || sign == '+' {
                        text.push(sign);
                        self.advance();
                    }
                }
                self.read_digits(&mut text);
            }
        }

        text
    }
}

/// Parse a numeric literal.
pub fn parse_value(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
