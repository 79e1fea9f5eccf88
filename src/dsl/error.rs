//! Error types for the recipe compiler.

use thiserror::Error;

use crate::time::TimeError;

/// What went wrong while compiling a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownOperation,
    UnknownReference,
    DuplicateTrack,
    InvalidLiteral,
    InvalidTimeValue,
    InvalidRegion,
    InvalidArgument,
    Syntax,
    Yaml,
}

/// A compile error, positioned at the statement (or token) that caused it.
///
/// `suggestion` holds the nearest known name when the error is about a
/// misspelled identifier. It is informational only.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{line}:{col}] {kind:?}: {message}{}", hint_suffix(.suggestion))]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub suggestion: Option<String>,
}

fn hint_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            col,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn syntax(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::new(ErrorKind::Syntax, message, line, col)
    }

    pub fn literal(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::new(ErrorKind::InvalidLiteral, message, line, col)
    }

    pub fn argument(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::new(ErrorKind::InvalidArgument, message, line, col)
    }

    pub fn unknown_operation(name: &str, line: usize, col: usize) -> Self {
        Self::new(
            ErrorKind::UnknownOperation,
            format!("unknown operation '{name}'"),
            line,
            col,
        )
    }

    pub fn unknown_reference(name: &str, line: usize, col: usize) -> Self {
        Self::new(
            ErrorKind::UnknownReference,
            format!("'{name}' is not a declared track or region"),
            line,
            col,
        )
    }

    pub fn duplicate_track(name: &str, line: usize, col: usize) -> Self {
        Self::new(
            ErrorKind::DuplicateTrack,
            format!("'{name}' is already declared"),
            line,
            col,
        )
    }

    pub fn time(err: &TimeError, line: usize, col: usize) -> Self {
        Self::new(ErrorKind::InvalidTimeValue, err.to_string(), line, col)
    }

    pub fn yaml(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self::new(ErrorKind::Yaml, message, line, col)
    }
}
