//! Recipe compiler: DSL or YAML text → typed operations → Graph.

pub(crate) mod args;
pub mod ast;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod prompt;
pub mod suggest;
pub mod token;
pub mod yaml;

use std::path::Path;

pub use ast::*;
pub use emit::to_source;
pub use error::{CompileError, ErrorKind};
pub use prompt::prompt_to_recipe;
pub use yaml::{parse_yaml, to_yaml};

use crate::graph::{build, Graph};
use parser::Parser;

/// Which surface syntax a recipe is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecipeFormat {
    #[default]
    Dsl,
    Yaml,
}

impl RecipeFormat {
    /// `.yaml` / `.yml` files are YAML; everything else is DSL.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                RecipeFormat::Yaml
            }
            _ => RecipeFormat::Dsl,
        }
    }
}

/// The recipe compiler.
///
/// Parsing resolves every statement to a typed [`Operation`]; compiling
/// additionally builds the [`Graph`]. Both stop at the first error.
pub struct Compiler;

impl Compiler {
    /// Parse DSL source into a Recipe.
    pub fn parse(source: &str) -> Result<Recipe, CompileError> {
        Parser::new(source).parse()
    }

    /// Parse a YAML recipe.
    pub fn parse_yaml(source: &str) -> Result<Recipe, CompileError> {
        yaml::parse_yaml(source)
    }

    pub fn parse_as(source: &str, format: RecipeFormat) -> Result<Recipe, CompileError> {
        match format {
            RecipeFormat::Dsl => Self::parse(source),
            RecipeFormat::Yaml => Self::parse_yaml(source),
        }
    }

    /// Parse and build DSL source into a Graph.
    pub fn compile(source: &str) -> Result<Graph, CompileError> {
        Self::compile_as(source, RecipeFormat::Dsl)
    }

    pub fn compile_as(source: &str, format: RecipeFormat) -> Result<Graph, CompileError> {
        let result = Self::parse_as(source, format).and_then(|recipe| build(&recipe.operations));
        match &result {
            Ok(graph) => tracing::debug!(
                nodes = graph.nodes.len(),
                exports = graph.exports.len(),
                bpm = graph.globals.bpm,
                "compiled recipe"
            ),
            Err(e) => tracing::debug!(error = %e, "recipe rejected"),
        }
        result
    }
}
