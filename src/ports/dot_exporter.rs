//! Structure Graph DOT Exporter
//!
//! Exports a compiled structure graph as Graphviz DOT for quick visual
//! inspection outside the 3D renderer.

use crate::domain::graph::{NodeType, StructureGraph};
use crate::ports::GraphExporter;
use std::io::Result;

pub struct DotExporter;

impl GraphExporter for DotExporter {
    fn export(&self, graph: &StructureGraph, path: &str) -> Result<()> {
        std::fs::write(path, Self::to_dot(graph))
    }
}

impl DotExporter {
    /// Convert a structure graph to a DOT string.
    pub fn to_dot(graph: &StructureGraph) -> String {
        let mut lines = Vec::new();

        lines.push("digraph Structure {".to_string());
        lines.push("    rankdir=TB;".to_string());
        lines.push("    nodesep=0.6;".to_string());
        lines.push("    ranksep=0.9;".to_string());
        lines.push("    node [fontname=\"Helvetica\", fontsize=12];".to_string());
        lines.push(String::new());

        for node in &graph.nodes {
            let (shape, color, style) = Self::node_style(&node.node_type);
            let label = Self::escape_label(&node.label);
            lines.push(format!(
                "    {} [label=\"{}\", shape={}, style=\"{}\", fillcolor=\"{}\"];",
                node.id, label, shape, style, color
            ));
        }

        lines.push(String::new());

        for link in &graph.links {
            lines.push(format!("    {} -> {};", link.source, link.target));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn node_style(node_type: &NodeType) -> (&'static str, &'static str, &'static str) {
        match node_type {
            NodeType::Function => ("box", "#a6e3a1", "filled,rounded"), // Green
            NodeType::Loop => ("hexagon", "#cba6f7", "filled"),         // Purple
            NodeType::Decision => ("diamond", "#f9e2af", "filled"),     // Yellow
            NodeType::Statement => ("box", "#89b4fa", "filled"),        // Blue
            NodeType::Operation => ("ellipse", "#6c7086", "filled"),    // Gray
        }
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{GraphLink, GraphNode};

    #[test]
    fn test_to_dot() {
        let graph = StructureGraph {
            error: None,
            nodes: vec![
                GraphNode {
                    id: 0,
                    label: "Func: main".to_string(),
                    node_type: NodeType::Function,
                    group: 1,
                    lineno: Some(1),
                },
                GraphNode {
                    id: 1,
                    label: "Loop: For i".to_string(),
                    node_type: NodeType::Loop,
                    group: 2,
                    lineno: Some(2),
                },
            ],
            links: vec![GraphLink { source: 0, target: 1 }],
        };

        let dot = DotExporter::to_dot(&graph);
        assert!(dot.contains("digraph Structure"));
        assert!(dot.contains("Func: main"));
        assert!(dot.contains("hexagon"));
        assert!(dot.contains("0 -> 1;"));
    }

    #[test]
    fn test_label_escaping() {
        assert_eq!(DotExporter::escape_label("say \"hi\""), "say \\\"hi\\\"");
    }
}
