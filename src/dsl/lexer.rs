//! Lexer for the Synthtax DSL.
//!
//! Produces tokens on demand so that the parser sees errors in line order:
//! a malformed literal on line 9 is never reported ahead of a bad reference
//! on line 2.

use super::error::CompileError;
use super::token::{Token, TokenKind, Unit};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Lex the whole input. Mostly useful in tests; the parser pulls
    /// tokens one at a time with [`Lexer::next_token`].
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_whitespace();
        if !self.is_at_end() && self.peek() == '#' {
            self.skip_comment();
        }

        if self.is_at_end() {
            return Ok(Token {
                kind: TokenKind::Eof,
                line: self.line,
                col: self.col,
            });
        }

        let ch = self.peek();
        match ch {
            '\n' => {
                let token = self.single_char(TokenKind::Newline);
                self.line += 1;
                self.col = 1;
                Ok(token)
            }
            '(' => Ok(self.single_char(TokenKind::LParen)),
            ')' => Ok(self.single_char(TokenKind::RParen)),
            ',' => Ok(self.single_char(TokenKind::Comma)),
            '=' => Ok(self.single_char(TokenKind::Eq)),
            ';' => Ok(self.single_char(TokenKind::Semicolon)),
            '"' => self.lex_string(),
            '0'..='9' => self.lex_number(),
            '.' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(),
            '-' if self
                .peek_next()
                .is_some_and(|c| c.is_ascii_digit() || c == '.') =>
            {
                self.lex_number()
            }
            c if c.is_alphabetic() || c == '_' => Ok(self.lex_ident()),
            _ => Err(CompileError::syntax(
                format!("unexpected character '{ch}'"),
                self.line,
                self.col,
            )),
        }
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        self.col += 1;
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && matches!(self.peek(), ' ' | '\t' | '\r') {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let token = Token {
            kind,
            line: self.line,
            col: self.col,
        };
        self.advance();
        token
    }

    fn lex_string(&mut self) -> Result<Token, CompileError> {
        let line = self.line;
        let col = self.col;
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            if self.is_at_end() || self.peek() == '\n' {
                return Err(CompileError::syntax("unclosed string literal", line, col));
            }
            match self.advance() {
                '"' => break,
                '\\' if !self.is_at_end() && matches!(self.peek(), '"' | '\\' | 'n' | 'r' | 't') => {
                    s.push(match self.advance() {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        c => c,
                    });
                }
                c => s.push(c),
            }
        }
        Ok(Token {
            kind: TokenKind::Str(s),
            line,
            col,
        })
    }

    fn lex_number(&mut self) -> Result<Token, CompileError> {
        let line = self.line;
        let col = self.col;
        let start = self.pos;

        if self.peek() == '-' {
            self.advance();
        }
        self.eat_digits();
        if !self.is_at_end() && self.peek() == '.' {
            self.advance();
            self.eat_digits();
        }

        // Anything glued on that is not a unit or a fraction makes the whole
        // word malformed: `1.2.3`, `4x`, `1/`.
        if !self.is_at_end() && self.peek() == '.' {
            self.eat_word();
            return Err(self.bad_literal(start, line, col));
        }

        let number_text: String = self.chars[start..self.pos].iter().collect();
        let value: f64 = number_text
            .parse()
            .map_err(|_| self.bad_literal(start, line, col))?;

        if !self.is_at_end() && self.peek() == '/' {
            self.advance();
            let den_start = self.pos;
            self.eat_digits();
            let den_text: String = self.chars[den_start..self.pos].iter().collect();
            if den_text.is_empty() || self.peek_is_word_char() {
                self.eat_word();
                return Err(self.bad_literal(start, line, col));
            }
            let den: f64 = den_text
                .parse()
                .map_err(|_| self.bad_literal(start, line, col))?;
            if den == 0.0 {
                return Err(CompileError::literal(
                    format!("fraction '{}' divides by zero", self.text_from(start)),
                    line,
                    col,
                ));
            }
            return Ok(Token {
                kind: TokenKind::Fraction(value / den),
                line,
                col,
            });
        }

        if self.peek_is_word_char() {
            let suffix_start = self.pos;
            self.eat_word();
            let suffix: String = self.chars[suffix_start..self.pos].iter().collect();
            return match Unit::from_suffix(&suffix) {
                Some(unit) => Ok(Token {
                    kind: TokenKind::Quantity(value, unit),
                    line,
                    col,
                }),
                None => Err(CompileError::literal(
                    format!(
                        "unknown unit '{suffix}' in '{}' (expected dB, s, ms, semis, Hz or kHz)",
                        self.text_from(start)
                    ),
                    line,
                    col,
                )),
            };
        }

        Ok(Token {
            kind: TokenKind::Number(value),
            line,
            col,
        })
    }

    fn lex_ident(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let start = self.pos;
        self.eat_word();
        Token {
            kind: TokenKind::Ident(self.text_from(start)),
            line,
            col,
        }
    }

    fn eat_digits(&mut self) {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
    }

    fn eat_word(&mut self) {
        while self.peek_is_word_char() || (!self.is_at_end() && self.peek() == '.') {
            self.advance();
        }
    }

    fn peek_is_word_char(&self) -> bool {
        !self.is_at_end() && (self.peek().is_alphanumeric() || self.peek() == '_')
    }

    fn text_from(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn bad_literal(&self, start: usize, line: usize, col: usize) -> CompileError {
        CompileError::literal(
            format!("malformed number '{}'", self.text_from(start)),
            line,
            col,
        )
    }
}
