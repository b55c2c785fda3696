//! Application boundary for the two engines.
//!
//! Everything here upholds the external contract: callers always get a
//! well-formed result, never a fault. The structure compiler returns an
//! all-or-nothing graph; the tracer preserves partial snapshots and ends a
//! failed run with one terminal error entry.

use std::collections::HashMap;

use dashmap::DashMap;
use rayon::prelude::*;

use crate::domain::graph::StructureGraph;
use crate::domain::snapshot::TraceResult;
use crate::domain::structure::StructureCompiler;
use crate::domain::tracer::MemoryTracer;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::interpreter::Interpreter;
use crate::infrastructure::IndentParser;
use crate::ports::SourceParser;

/// Compiles source text into a structure graph.
pub struct StructureUsecase<'a> {
    pub parser: &'a dyn SourceParser,
    pub config: &'a EngineConfig,
}

impl StructureUsecase<'_> {
    pub fn run(&self, source: &str) -> StructureGraph {
        if source.trim().is_empty() {
            return StructureGraph::failure("Code input is empty.");
        }
        match self.parser.parse_source(source) {
            Ok(module) => {
                StructureCompiler::new(self.config.condition_label_cap).compile(&module)
            }
            Err(e) => StructureGraph::failure(format!(
                "Syntax Error: {} at line {}",
                e.message, e.line
            )),
        }
    }
}

/// Traces execution of source text into a snapshot sequence.
pub struct TraceUsecase<'a> {
    pub parser: &'a dyn SourceParser,
    pub config: &'a EngineConfig,
}

impl TraceUsecase<'_> {
    pub fn run(&self, source: &str) -> TraceResult {
        let mut tracer = MemoryTracer::new(
            self.config.value_repr_cap,
            self.config.max_serialize_depth,
        );
        match self.parser.parse_source(source) {
            Err(e) => tracer.record_error(e.to_string()),
            Ok(module) => {
                let mut interpreter =
                    Interpreter::new(self.config.max_call_depth, self.config.max_steps);
                if let Err(e) = interpreter.run(&module, &mut tracer) {
                    tracer.record_error(e.to_string());
                }
            }
        }
        tracer.finish()
    }
}

/// Compile with the default parser.
pub fn compile_structure(source: &str, config: &EngineConfig) -> StructureGraph {
    StructureUsecase { parser: &IndentParser, config }.run(source)
}

/// Trace with the default parser.
pub fn trace_execution(source: &str, config: &EngineConfig) -> TraceResult {
    TraceUsecase { parser: &IndentParser, config }.run(source)
}

/// Compile many sources in parallel. Invocations share nothing, so this is
/// a plain data-parallel fan-out over the rayon pool.
pub fn compile_structure_batch(
    sources: &[(String, String)],
    config: &EngineConfig,
) -> HashMap<String, StructureGraph> {
    let results: DashMap<String, StructureGraph> = DashMap::new();
    sources.par_iter().for_each(|(name, source)| {
        results.insert(name.clone(), compile_structure(source, config));
    });
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_empty_input_is_error_without_parse() {
        let graph = compile_structure("   \n\t  ", &config());
        assert_eq!(graph.error.as_deref(), Some("Code input is empty."));
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_syntax_error_carries_line() {
        let graph = compile_structure("x = 1\nif y\n    pass", &config());
        let message = graph.error.unwrap();
        assert!(message.starts_with("Syntax Error:"), "got: {}", message);
        assert!(message.ends_with("at line 2"), "got: {}", message);
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_simple_assignment_graph() {
        let graph = compile_structure("x = 10", &config());
        assert!(graph.error.is_none());
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].label, "Assign: x");
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_trace_of_failing_program_keeps_prior_steps() {
        let result = trace_execution("a = 1\nb = 2\nc = a / 0", &config());
        let steps = result.steps().count();
        assert_eq!(steps, 2);
        let error = result.terminal_error().unwrap();
        assert_eq!(error.error, "division by zero");
        assert!(result.entries.last().unwrap().is_error());
    }

    #[test]
    fn test_trace_of_unparsable_source_is_single_error() {
        let result = trace_execution("def broken(:", &config());
        assert_eq!(result.entries.len(), 1);
        assert!(result.terminal_error().is_some());
    }

    #[test]
    fn test_batch_compiles_every_source() {
        let sources = vec![
            ("a.py".to_string(), "x = 1".to_string()),
            ("b.py".to_string(), "y = 2".to_string()),
            ("bad.py".to_string(), "".to_string()),
        ];
        let results = compile_structure_batch(&sources, &config());
        assert_eq!(results.len(), 3);
        assert!(results["a.py"].error.is_none());
        assert!(results["bad.py"].error.is_some());
    }
}
