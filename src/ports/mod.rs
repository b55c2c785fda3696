use crate::domain::ast::{Module, ParseError};
use crate::domain::graph::StructureGraph;
use crate::domain::value::Value;

pub mod dot_exporter;
pub mod json_exporter;

/// Parses source text into the language AST.
pub trait SourceParser {
    fn parse_source(&self, source: &str) -> Result<Module, ParseError>;
}

/// Receives one callback per executed step of a traced run, with the line
/// just executed and the local bindings of the active scope in insertion
/// order. Installed for exactly one run; the runtime clears it on every
/// exit path.
pub trait StepHook {
    fn on_step(&mut self, line: u32, locals: &[(String, Value)]);
}

/// Writes a compiled structure graph to a file.
pub trait GraphExporter {
    fn export(&self, graph: &StructureGraph, path: &str) -> std::io::Result<()>;
}
