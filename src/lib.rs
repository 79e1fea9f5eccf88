//! Synthtax: a code-first audio mixing tool with bar-quantized live reload.

pub mod config;
pub mod dsl;
pub mod graph;
pub mod render;
pub mod session;
pub mod time;
