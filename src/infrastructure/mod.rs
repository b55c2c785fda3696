// Infrastructure implementations for Glassbox: the syntax front end, the
// interpreter, and the supporting plumbing (config, cache, thread pool).

pub mod concurrency;
pub mod config;
pub mod graph_cache;
pub mod interpreter;
pub mod lexer;
pub mod parser;

use crate::domain::ast::{Module, ParseError};
use crate::ports::SourceParser;

/// The default parser implementation behind the [`SourceParser`] port.
pub struct IndentParser;

impl SourceParser for IndentParser {
    fn parse_source(&self, source: &str) -> Result<Module, ParseError> {
        parser::parse_module(source)
    }
}
