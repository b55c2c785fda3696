/// Structure Graph Verification Tests
/// End-to-end checks of the compiler contract: graph shape, id discipline,
/// labels, and the all-or-nothing error behavior.

use std::collections::HashSet;

use glassbox::application::compile_structure;
use glassbox::domain::graph::NodeType;
use glassbox::infrastructure::config::EngineConfig;

fn compile(source: &str) -> glassbox::domain::graph::StructureGraph {
    compile_structure(source, &EngineConfig::default())
}

#[test]
fn test_simple_assignment_scenario() {
    let graph = compile("x = 10");
    assert!(graph.error.is_none());
    assert_eq!(graph.nodes.len(), 1);
    assert_eq!(graph.nodes[0].label, "Assign: x");
    assert_eq!(graph.nodes[0].node_type, NodeType::Statement);
    assert!(graph.links.is_empty());
}

#[test]
fn test_function_with_nested_loop_scenario() {
    let graph = compile("def f():\n    for i in range(3):\n        pass");

    let func = graph
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Function)
        .expect("function node missing");
    assert_eq!(func.label, "Func: f");

    let looped = graph
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Loop)
        .expect("loop node missing");
    assert_eq!(looped.label, "Loop: For i");

    // The loop is nested directly under the function.
    assert!(
        graph
            .links
            .iter()
            .any(|l| l.source == func.id && l.target == looped.id),
        "expected link func -> loop, links: {:?}",
        graph.links
    );
}

#[test]
fn test_links_reference_existing_unique_ids() {
    let source = "\
def process(items):
    total = 0
    for item in items:
        if item > 0:
            total += item
        else:
            total -= item
    return total

def main():
    data = [1, -2, 3]
    result = process(data)
    print(result)
";
    let graph = compile(source);
    assert!(graph.error.is_none());

    let ids: Vec<u32> = graph.nodes.iter().map(|n| n.id).collect();
    let unique: HashSet<u32> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "node ids must be unique");

    for link in &graph.links {
        assert!(unique.contains(&link.source), "dangling link source");
        assert!(unique.contains(&link.target), "dangling link target");
    }
}

#[test]
fn test_primitive_statements_have_no_containers() {
    let graph = compile("x = 1\ny = 2\nz = x + y");
    assert!(graph.error.is_none());
    assert!(graph
        .nodes
        .iter()
        .all(|n| !n.node_type.is_container()));
    assert!(graph.links.is_empty());
}

#[test]
fn test_compilation_is_deterministic() {
    let source = "def f(n):\n    if n > 0:\n        return f(n - 1)\n    return 0";
    let first = compile(source);
    let second = compile(source);

    let labels = |g: &glassbox::domain::graph::StructureGraph| {
        g.nodes
            .iter()
            .map(|n| (n.id, n.label.clone(), n.node_type))
            .collect::<Vec<_>>()
    };
    assert_eq!(labels(&first), labels(&second));
}

#[test]
fn test_ids_follow_reading_order() {
    let graph = compile("a = 1\ndef f():\n    b = 2\nc = 3");
    let ids: Vec<u32> = graph.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
    assert_eq!(graph.nodes[0].label, "Assign: a");
    assert_eq!(graph.nodes[1].label, "Func: f");
    assert_eq!(graph.nodes[2].label, "Assign: b");
    assert_eq!(graph.nodes[3].label, "Assign: c");
}

#[test]
fn test_empty_input_error() {
    for source in ["", "   ", "\n\t\n"] {
        let graph = compile(source);
        assert_eq!(graph.error.as_deref(), Some("Code input is empty."));
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }
}

#[test]
fn test_syntax_error_is_all_or_nothing() {
    // First lines are valid; the graph must still come back empty.
    let graph = compile("x = 1\ny = 2\ndef broken(:\n    pass");
    let message = graph.error.expect("expected error");
    assert!(message.starts_with("Syntax Error:"), "got: {}", message);
    assert!(message.contains("line 3"), "got: {}", message);
    assert!(graph.nodes.is_empty());
    assert!(graph.links.is_empty());
}

#[test]
fn test_call_labels() {
    let graph = compile("print(1)\nitems = []\nitems.append(2)");
    let labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
    assert!(labels.contains(&"Call: print"));
    assert!(labels.contains(&"Call: items.append"));
}

#[test]
fn test_while_loop_is_container() {
    let graph = compile("while x > 0:\n    x = x - 1");
    let looped = graph
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::Loop)
        .expect("loop node missing");
    assert_eq!(looped.label, "Loop: While");
    let assign = graph
        .nodes
        .iter()
        .find(|n| n.label == "Assign: x")
        .expect("assign node missing");
    assert!(graph
        .links
        .iter()
        .any(|l| l.source == looped.id && l.target == assign.id));
}

#[test]
fn test_wire_shape_has_integer_ids_and_no_error_key() {
    let graph = compile("def f():\n    x = 1");
    let json = serde_json::to_value(&graph).unwrap();

    assert!(json.get("error").is_none());
    for node in json["nodes"].as_array().unwrap() {
        assert!(node["id"].is_u64(), "id must be an integer: {:?}", node);
        assert!(node["group"].is_u64());
        assert!(node["lineno"].is_u64());
        assert!(node["type"].is_string());
    }
    for link in json["links"].as_array().unwrap() {
        assert!(link["source"].is_u64());
        assert!(link["target"].is_u64());
    }
}

#[test]
fn test_decision_groups_and_linenos() {
    let graph = compile("def f():\n    if f:\n        pass");
    let func = &graph.nodes[0];
    let decision = &graph.nodes[1];
    assert_eq!(func.group, 1);
    assert_eq!(decision.group, 2);
    assert_eq!(func.lineno, Some(1));
    assert_eq!(decision.lineno, Some(2));
}
