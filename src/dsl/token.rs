//! Token types for the Synthtax lexer.

/// A token with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    /// A number with a unit suffix, e.g. `-2dB` or `250ms`.
    Quantity(f64, Unit),
    /// `1/4`, already divided out.
    Fraction(f64),

    LParen,
    RParen,
    Comma,
    Eq,
    Semicolon,

    Newline,
    Eof,
}

impl TokenKind {
    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{s}'"),
            TokenKind::Str(s) => format!("string \"{s}\""),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Quantity(n, u) => format!("'{n}{}'", u.suffix()),
            TokenKind::Fraction(n) => format!("fraction {n}"),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// Unit suffix attached to a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Db,
    Seconds,
    Millis,
    Semis,
    Hz,
    KHz,
}

impl Unit {
    pub fn from_suffix(s: &str) -> Option<Unit> {
        match s {
            "dB" | "db" => Some(Unit::Db),
            "s" => Some(Unit::Seconds),
            "ms" => Some(Unit::Millis),
            "semis" | "semi" => Some(Unit::Semis),
            "Hz" | "hz" => Some(Unit::Hz),
            "kHz" | "khz" => Some(Unit::KHz),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Db => "dB",
            Unit::Seconds => "s",
            Unit::Millis => "ms",
            Unit::Semis => "semis",
            Unit::Hz => "Hz",
            Unit::KHz => "kHz",
        }
    }
}
