//! Parser for the Synthtax DSL.
//!
//! Line-oriented: each statement is one of
//!
//! ```text
//! name(args)                        # call form
//! load NAME from "path"             # load form
//! region NAME = slice(args)         # region form
//! ```
//!
//! separated by newlines or `;`. Every statement is resolved to a typed
//! [`Operation`] as soon as it is parsed, so references are checked
//! against the names declared *above* it. The first error aborts the pass.

use super::args::{resolve_call, resolve_slice, Arg, ArgValue, Scope};
use super::ast::{OpKind, Operation, Recipe, SourcePos, TimeValue};
use super::error::{CompileError, ErrorKind};
use super::lexer::Lexer;
use super::suggest::nearest;
use super::token::{Token, TokenKind};
use crate::time::TimeUnit;

pub struct Parser {
    lexer: Lexer,
    current: Token,
    scope: Scope,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
            // Primed with a separator; the first `advance` pulls real input.
            current: Token {
                kind: TokenKind::Newline,
                line: 1,
                col: 1,
            },
            scope: Scope::default(),
        }
    }

    pub fn parse(mut self) -> Result<Recipe, CompileError> {
        let mut operations = Vec::new();

        loop {
            self.skip_separators()?;
            if self.current.kind == TokenKind::Eof {
                break;
            }
            operations.push(self.parse_statement()?);
            self.expect_statement_end()?;
        }

        Ok(Recipe {
            operations,
            tracks: self.scope.tracks(),
        })
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        CompileError::syntax(
            format!("expected {expected}, got {}", self.current.kind.describe()),
            self.current.line,
            self.current.col,
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, CompileError> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn skip_separators(&mut self) -> Result<(), CompileError> {
        while matches!(self.current.kind, TokenKind::Newline | TokenKind::Semicolon) {
            self.advance()?;
        }
        Ok(())
    }

    fn skip_newlines(&mut self) -> Result<(), CompileError> {
        while self.check(&TokenKind::Newline) {
            self.advance()?;
        }
        Ok(())
    }

    fn expect_statement_end(&mut self) -> Result<(), CompileError> {
        match self.current.kind {
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn parse_statement(&mut self) -> Result<Operation, CompileError> {
        let token = self.advance()?;
        let pos = SourcePos::new(token.line, token.col);
        let name = match token.kind {
            TokenKind::Ident(name) => name,
            other => {
                return Err(CompileError::syntax(
                    format!("expected a statement, got {}", other.describe()),
                    pos.line,
                    pos.col,
                ));
            }
        };

        match (name.as_str(), &self.current.kind) {
            ("load", TokenKind::Ident(_)) => self.parse_load(pos),
            ("region", TokenKind::Ident(_)) => self.parse_region(pos),
            _ => {
                if OpKind::from_name(&name).is_none() {
                    return Err(unknown_operation(&name, pos));
                }
                if !self.check(&TokenKind::LParen) {
                    return Err(self.unexpected(&format!("'(' after '{name}'")));
                }
                let args = self.parse_args()?;
                resolve_call(&name, pos, args, &mut self.scope)
            }
        }
    }

    /// `load NAME from "path"`
    fn parse_load(&mut self, pos: SourcePos) -> Result<Operation, CompileError> {
        let name = self.parse_value_arg(Some("name"))?;
        match &self.current.kind {
            TokenKind::Ident(kw) if kw == "from" => {
                self.advance()?;
            }
            _ => return Err(self.unexpected("'from'")),
        }
        if !matches!(self.current.kind, TokenKind::Str(_)) {
            return Err(self.unexpected("a quoted file path"));
        }
        let path = self.parse_value_arg(Some("path"))?;
        resolve_call("load", pos, vec![name, path], &mut self.scope)
    }

    /// `region NAME = slice(of, start=..., end=...)`
    fn parse_region(&mut self, pos: SourcePos) -> Result<Operation, CompileError> {
        let name = self.parse_value_arg(Some("name"))?;
        self.expect(TokenKind::Eq, "'=' after the region name")?;

        let func = self.advance()?;
        match &func.kind {
            TokenKind::Ident(f) if f == "slice" => {}
            TokenKind::Ident(f) => {
                return Err(CompileError::unknown_operation(f, func.line, func.col)
                    .with_suggestion(nearest(f, ["slice"])));
            }
            other => {
                return Err(CompileError::syntax(
                    format!("expected 'slice(...)', got {}", other.describe()),
                    func.line,
                    func.col,
                ));
            }
        }
        if !self.check(&TokenKind::LParen) {
            return Err(self.unexpected("'(' after 'slice'"));
        }
        let args = self.parse_args()?;
        resolve_slice(name, pos, args, &mut self.scope)
    }

    /// `( arg, name=value, ... )`; newlines are allowed inside the parentheses.
    fn parse_args(&mut self) -> Result<Vec<Arg>, CompileError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();

        self.skip_newlines()?;
        if self.check(&TokenKind::RParen) {
            self.advance()?;
            return Ok(args);
        }

        loop {
            self.skip_newlines()?;
            args.push(self.parse_arg()?);
            self.skip_newlines()?;
            match self.current.kind {
                TokenKind::Comma => {
                    self.advance()?;
                    self.skip_newlines()?;
                    if self.check(&TokenKind::RParen) {
                        self.advance()?;
                        return Ok(args);
                    }
                }
                TokenKind::RParen => {
                    self.advance()?;
                    return Ok(args);
                }
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }
    }

    fn parse_arg(&mut self) -> Result<Arg, CompileError> {
        if let TokenKind::Ident(id) = &self.current.kind {
            let id = id.clone();
            let token = self.advance()?;
            let pos = SourcePos::new(token.line, token.col);
            if self.check(&TokenKind::Eq) {
                self.advance()?;
                let value = self.parse_value()?;
                return Ok(Arg {
                    name: Some(id),
                    value,
                    pos,
                });
            }
            let value = self.finish_ident(id, pos)?;
            return Ok(Arg {
                name: None,
                value,
                pos,
            });
        }
        self.parse_value_arg(None)
    }

    fn parse_value_arg(&mut self, name: Option<&str>) -> Result<Arg, CompileError> {
        let pos = SourcePos::new(self.current.line, self.current.col);
        let value = self.parse_value()?;
        Ok(Arg {
            name: name.map(str::to_string),
            value,
            pos,
        })
    }

    fn parse_value(&mut self) -> Result<ArgValue, CompileError> {
        let pos = SourcePos::new(self.current.line, self.current.col);
        let value = match &self.current.kind {
            TokenKind::Ident(id) => {
                let id = id.clone();
                self.advance()?;
                return self.finish_ident(id, pos);
            }
            TokenKind::Str(s) => ArgValue::Str(s.clone()),
            TokenKind::Number(n) => ArgValue::Number(*n),
            TokenKind::Quantity(n, u) => ArgValue::Quantity(*n, *u),
            TokenKind::Fraction(n) => ArgValue::Fraction(*n),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance()?;
        Ok(value)
    }

    /// An identifier in value position: a plain name, or `bar(n)` / `beat(n)`.
    fn finish_ident(&mut self, id: String, pos: SourcePos) -> Result<ArgValue, CompileError> {
        if !self.check(&TokenKind::LParen) {
            return Ok(ArgValue::Ident(id));
        }
        let unit = match id.as_str() {
            "bar" => TimeUnit::Bars,
            "beat" => TimeUnit::Beats,
            _ => {
                return Err(CompileError::literal(
                    format!("'{id}(...)' is not a value (expected bar(n) or beat(n))"),
                    pos.line,
                    pos.col,
                )
                .with_suggestion(nearest(&id, ["bar", "beat"])));
            }
        };
        self.advance()?;
        let n = match self.current.kind {
            TokenKind::Number(n) => n,
            _ => {
                return Err(CompileError::literal(
                    format!("{id}() takes a plain number, got {}", self.current.kind.describe()),
                    self.current.line,
                    self.current.col,
                ));
            }
        };
        if n < 0.0 {
            return Err(CompileError::new(
                ErrorKind::InvalidTimeValue,
                format!("{id} index must not be negative, got {n}"),
                self.current.line,
                self.current.col,
            ));
        }
        self.advance()?;
        self.expect(TokenKind::RParen, &format!("')' to close {id}("))?;
        Ok(ArgValue::Time(TimeValue::new(n, unit)))
    }
}

fn unknown_operation(name: &str, pos: SourcePos) -> CompileError {
    CompileError::unknown_operation(name, pos.line, pos.col)
        .with_suggestion(nearest(name, OpKind::ALL.iter().map(|k| k.name())))
}

/// Read a single DSL value from a string (used for YAML field values).
/// Errors are reported at `pos`.
pub(crate) fn parse_literal(text: &str, pos: SourcePos) -> Result<ArgValue, CompileError> {
    let relocate = |e: CompileError| CompileError {
        line: pos.line,
        col: pos.col,
        ..e
    };
    let mut parser = Parser::new(text);
    parser.advance().map_err(relocate)?;
    let value = parser.parse_value().map_err(relocate)?;
    if parser.current.kind != TokenKind::Eof {
        return Err(CompileError::literal(
            format!("'{text}' is not a single value"),
            pos.line,
            pos.col,
        ));
    }
    Ok(value)
}
