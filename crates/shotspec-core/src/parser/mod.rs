// Parser module - spec-file parsing front end
use std::path::Path;

use anyhow::Context;

use crate::ast::SpecFile;
use crate::config::Vocabulary;

mod grammar;
pub mod lexer;


pub use grammar::SpecParser;

/// Syntax error with its position in the source
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl ParseError {
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self {
            message: message.into(),
            offset,
            line,
            column,
        }
    }
}

/// Trait for spec-file parsers
pub trait Parser: Send + Sync {
    /// Parse source text into a spec file
    fn parse(&mut self, source: &str) -> Result<SpecFile, ParseError>;

    /// Parse a file from disk
    fn parse_file(&mut self, path: &Path) -> anyhow::Result<SpecFile> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.parse(&source)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Get parser name for debugging
    fn name(&self) -> &'static str;
}

/// Create a parser using the given call vocabulary
pub fn create_parser(vocabulary: Vocabulary) -> Box<dyn Parser> {
    Box::new(SpecParser::new(vocabulary))
}

/// Parse a spec file with the given vocabulary
pub fn parse_spec_file(source: &str, vocabulary: &Vocabulary) -> Result<SpecFile, ParseError> {
    grammar::parse_program(source, vocabulary)
}
