//! Structure Graph JSON Exporter
//!
//! Writes the graph in the exact wire shape the renderer consumes.

use crate::domain::graph::StructureGraph;
use crate::ports::GraphExporter;
use std::io::Result;

pub struct JsonExporter;

impl GraphExporter for JsonExporter {
    fn export(&self, graph: &StructureGraph, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(graph)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
