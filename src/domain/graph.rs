//! Structure Graph Data Structures
//!
//! The node/link representation of a program's lexical nesting, shaped for
//! force-directed rendering. Ids are plain integers assigned in visit order
//! and are only meaningful within one compilation result.

use serde::{Deserialize, Serialize};

/// Classification of structure-graph nodes.
///
/// `Function`, `Loop` and `Decision` are container kinds: nodes emitted
/// while one of them is on the ancestor stack link to it. `Statement` and
/// `Operation` are leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Function,
    Loop,
    Decision,
    Statement,
    Operation,
}

impl NodeType {
    /// Visual clustering key derived from the node type.
    pub fn group(&self) -> u32 {
        match self {
            NodeType::Function => 1,
            _ => 2,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, NodeType::Function | NodeType::Loop | NodeType::Decision)
    }
}

/// A node in the structure graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: u32,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub group: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub lineno: Option<u32>,
}

/// A link from a container node to a construct lexically nested inside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: u32,
    pub target: u32,
}

/// Compilation result: a complete graph, or an error with empty lists.
///
/// Partial graphs are never emitted; a failure during parsing or traversal
/// discards any nodes collected so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureGraph {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl StructureGraph {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            nodes: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_serializes_type_and_skips_missing_lineno() {
        let node = GraphNode {
            id: 0,
            label: "Func: main".to_string(),
            node_type: NodeType::Function,
            group: NodeType::Function.group(),
            lineno: None,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "function");
        assert_eq!(json["group"], 1);
        assert!(json.get("lineno").is_none());
    }

    #[test]
    fn test_error_key_absent_on_success() {
        let graph = StructureGraph { error: None, nodes: vec![], links: vec![] };
        let json = serde_json::to_value(&graph).unwrap();
        assert!(json.get("error").is_none());
        assert!(json["nodes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_failure_has_empty_lists() {
        let graph = StructureGraph::failure("Code input is empty.");
        assert!(graph.is_error());
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_container_kinds() {
        assert!(NodeType::Function.is_container());
        assert!(NodeType::Loop.is_container());
        assert!(NodeType::Decision.is_container());
        assert!(!NodeType::Statement.is_container());
        assert!(!NodeType::Operation.is_container());
    }
}
