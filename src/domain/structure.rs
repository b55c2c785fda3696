//! Structure Graph Compiler
//!
//! One depth-first pre-order walk over a parsed module, emitting a flat
//! node list plus links from each construct to its nearest enclosing
//! container. Containers are exactly function definitions, loops and
//! conditionals; assignments and calls are leaves and never become
//! ancestors for their own nested children.

use crate::domain::ast::{Expr, Module, Stmt};
use crate::domain::graph::{GraphLink, GraphNode, NodeType, StructureGraph};

/// Ancestor-stack walker. One instance per compilation; node ids restart
/// at zero for every call.
pub struct StructureCompiler {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    parent_stack: Vec<u32>,
    next_id: u32,
    condition_label_cap: usize,
}

impl StructureCompiler {
    pub fn new(condition_label_cap: usize) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            parent_stack: Vec::new(),
            next_id: 0,
            condition_label_cap,
        }
    }

    /// Walk the module and produce the complete graph.
    pub fn compile(mut self, module: &Module) -> StructureGraph {
        self.visit_body(&module.body);
        StructureGraph {
            error: None,
            nodes: self.nodes,
            links: self.links,
        }
    }

    fn add_node(&mut self, label: String, node_type: NodeType, lineno: Option<u32>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(GraphNode {
            id,
            label,
            node_type,
            group: node_type.group(),
            lineno,
        });
        id
    }

    fn link_to_parent(&mut self, target: u32) {
        if let Some(&source) = self.parent_stack.last() {
            self.links.push(GraphLink { source, target });
        }
    }

    fn visit_body(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef { name, body, line, .. } => {
                let id = self.add_node(format!("Func: {}", name), NodeType::Function, Some(*line));
                self.link_to_parent(id);
                self.parent_stack.push(id);
                self.visit_body(body);
                self.parent_stack.pop();
            }
            Stmt::For { target, iter, body, line } => {
                let target_name = target.simple_name().unwrap_or("iterator");
                let id = self.add_node(
                    format!("Loop: For {}", target_name),
                    NodeType::Loop,
                    Some(*line),
                );
                self.link_to_parent(id);
                self.parent_stack.push(id);
                // Calls inside the iterable belong to the loop node.
                self.visit_expr(iter);
                self.visit_body(body);
                self.parent_stack.pop();
            }
            Stmt::While { test, body, line } => {
                // While loops have no iteration target; fall back to a fixed label.
                let id = self.add_node("Loop: While".to_string(), NodeType::Loop, Some(*line));
                self.link_to_parent(id);
                self.parent_stack.push(id);
                self.visit_expr(test);
                self.visit_body(body);
                self.parent_stack.pop();
            }
            Stmt::If { test, body, orelse, line } => {
                let summary = self.condition_summary(test);
                let id = self.add_node(
                    format!("Decision: If ({})", summary),
                    NodeType::Decision,
                    Some(*line),
                );
                self.link_to_parent(id);
                self.parent_stack.push(id);
                self.visit_expr(test);
                self.visit_body(body);
                // elif/else branches stay nested under this decision.
                self.visit_body(orelse);
                self.parent_stack.pop();
            }
            Stmt::Assign { target, value, line } => {
                let target_name = target.simple_name().unwrap_or("Assignment");
                let id = self.add_node(
                    format!("Assign: {}", target_name),
                    NodeType::Statement,
                    Some(*line),
                );
                self.link_to_parent(id);
                // Not pushed: siblings keep attaching to the enclosing container,
                // but calls nested in either side are still discovered.
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Stmt::AugAssign { target, value, .. } => {
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::ExprStmt { value, .. } => self.visit_expr(value),
            Stmt::Pass { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Call { func, args, line } => {
                let label = match func.as_ref() {
                    Expr::Name { id, .. } => id.clone(),
                    Expr::Attribute { value, attr, .. } => {
                        let object_name = value.simple_name().unwrap_or("Object");
                        format!("{}.{}", object_name, attr)
                    }
                    _ => String::new(),
                };
                let id = self.add_node(
                    format!("Call: {}", label),
                    NodeType::Operation,
                    Some(*line),
                );
                self.link_to_parent(id);
                // Nested calls in the callee or the arguments get their own
                // nodes, linked to the same container as this one.
                self.visit_expr(func);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            Expr::BinOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { operand, .. } => self.visit_expr(operand),
            Expr::BoolOp { values, .. } => {
                for value in values {
                    self.visit_expr(value);
                }
            }
            Expr::Compare { left, comparators, .. } => {
                self.visit_expr(left);
                for comparator in comparators {
                    self.visit_expr(comparator);
                }
            }
            Expr::List { elements, .. }
            | Expr::Tuple { elements, .. }
            | Expr::Set { elements, .. } => {
                for element in elements {
                    self.visit_expr(element);
                }
            }
            Expr::Dict { pairs, .. } => {
                for (key, value) in pairs {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
            Expr::Attribute { value, .. } => self.visit_expr(value),
            Expr::Subscript { value, index, .. } => {
                self.visit_expr(value);
                self.visit_expr(index);
            }
            Expr::Name { .. }
            | Expr::NoneLit { .. }
            | Expr::BoolLit { .. }
            | Expr::IntLit { .. }
            | Expr::FloatLit { .. }
            | Expr::StrLit { .. } => {}
        }
    }

    /// Bounded rendering of a branch condition, with a `...` marker only
    /// when text was actually cut.
    fn condition_summary(&self, test: &Expr) -> String {
        let rendered = test.render();
        if rendered.chars().count() > self.condition_label_cap {
            let head: String = rendered.chars().take(self.condition_label_cap).collect();
            format!("{}...", head)
        } else {
            rendered
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ast::{BinOp, CmpOp};

    const LABEL_CAP: usize = 20;

    fn compile(module: &Module) -> StructureGraph {
        StructureCompiler::new(LABEL_CAP).compile(module)
    }

    fn assign(name: &str, value: Expr, line: u32) -> Stmt {
        Stmt::Assign {
            target: Expr::Name { id: name.to_string(), line },
            value,
            line,
        }
    }

    #[test]
    fn test_simple_assignment() {
        let module = Module {
            body: vec![assign("x", Expr::IntLit { value: 10, line: 1 }, 1)],
        };
        let graph = compile(&module);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].label, "Assign: x");
        assert_eq!(graph.nodes[0].node_type, NodeType::Statement);
        assert_eq!(graph.nodes[0].lineno, Some(1));
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_function_containing_loop() {
        let module = Module {
            body: vec![Stmt::FunctionDef {
                name: "f".to_string(),
                params: vec![],
                body: vec![Stmt::For {
                    target: Expr::Name { id: "i".to_string(), line: 2 },
                    iter: Expr::Call {
                        func: Box::new(Expr::Name { id: "range".to_string(), line: 2 }),
                        args: vec![Expr::IntLit { value: 3, line: 2 }],
                        line: 2,
                    },
                    body: vec![Stmt::Pass { line: 3 }],
                    line: 2,
                }],
                line: 1,
            }],
        };
        let graph = compile(&module);
        // Func, Loop, and the range() call inside the iterable.
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].label, "Func: f");
        assert_eq!(graph.nodes[0].node_type, NodeType::Function);
        assert_eq!(graph.nodes[1].label, "Loop: For i");
        assert_eq!(graph.nodes[1].node_type, NodeType::Loop);
        assert_eq!(graph.nodes[2].label, "Call: range");
        // Func -> Loop, Loop -> Call.
        assert_eq!(graph.links.len(), 2);
        assert_eq!((graph.links[0].source, graph.links[0].target), (0, 1));
        assert_eq!((graph.links[1].source, graph.links[1].target), (1, 2));
    }

    #[test]
    fn test_call_in_assignment_links_to_container_not_assign() {
        // def f():
        //     x = g()
        let module = Module {
            body: vec![Stmt::FunctionDef {
                name: "f".to_string(),
                params: vec![],
                body: vec![assign(
                    "x",
                    Expr::Call {
                        func: Box::new(Expr::Name { id: "g".to_string(), line: 2 }),
                        args: vec![],
                        line: 2,
                    },
                    2,
                )],
                line: 1,
            }],
        };
        let graph = compile(&module);
        assert_eq!(graph.nodes.len(), 3);
        let call = graph.nodes.iter().find(|n| n.label == "Call: g").unwrap();
        let link = graph.links.iter().find(|l| l.target == call.id).unwrap();
        // Linked to the function, not to the Assign leaf.
        assert_eq!(link.source, 0);
    }

    #[test]
    fn test_method_call_label_and_fallback() {
        let module = Module {
            body: vec![
                Stmt::ExprStmt {
                    value: Expr::Call {
                        func: Box::new(Expr::Attribute {
                            value: Box::new(Expr::Name { id: "items".to_string(), line: 1 }),
                            attr: "pop".to_string(),
                            line: 1,
                        }),
                        args: vec![],
                        line: 1,
                    },
                    line: 1,
                },
                Stmt::ExprStmt {
                    value: Expr::Call {
                        func: Box::new(Expr::Attribute {
                            value: Box::new(Expr::Subscript {
                                value: Box::new(Expr::Name { id: "grid".to_string(), line: 2 }),
                                index: Box::new(Expr::IntLit { value: 0, line: 2 }),
                                line: 2,
                            }),
                            attr: "sort".to_string(),
                            line: 2,
                        }),
                        args: vec![],
                        line: 2,
                    },
                    line: 2,
                },
            ],
        };
        let graph = compile(&module);
        assert_eq!(graph.nodes[0].label, "Call: items.pop");
        assert_eq!(graph.nodes[1].label, "Call: Object.sort");
        assert_eq!(graph.nodes[0].node_type, NodeType::Operation);
    }

    #[test]
    fn test_decision_label_truncation() {
        let long_test = Expr::Compare {
            left: Box::new(Expr::Name { id: "extremely_long_variable_name".to_string(), line: 1 }),
            ops: vec![CmpOp::Gt],
            comparators: vec![Expr::IntLit { value: 0, line: 1 }],
            line: 1,
        };
        let module = Module {
            body: vec![Stmt::If {
                test: long_test,
                body: vec![Stmt::Pass { line: 2 }],
                orelse: vec![],
                line: 1,
            }],
        };
        let graph = compile(&module);
        assert_eq!(
            graph.nodes[0].label,
            format!("Decision: If ({}...)", &"extremely_long_variable_name > 0"[..LABEL_CAP])
        );
    }

    #[test]
    fn test_short_condition_not_truncated() {
        let module = Module {
            body: vec![Stmt::If {
                test: Expr::Compare {
                    left: Box::new(Expr::Name { id: "x".to_string(), line: 1 }),
                    ops: vec![CmpOp::Gt],
                    comparators: vec![Expr::IntLit { value: 0, line: 1 }],
                    line: 1,
                },
                body: vec![Stmt::Pass { line: 2 }],
                orelse: vec![],
                line: 1,
            }],
        };
        let graph = compile(&module);
        assert_eq!(graph.nodes[0].label, "Decision: If (x > 0)");
    }

    #[test]
    fn test_augassign_is_transparent_but_calls_surface() {
        // total += len(items)
        let module = Module {
            body: vec![Stmt::AugAssign {
                target: Expr::Name { id: "total".to_string(), line: 1 },
                op: BinOp::Add,
                value: Expr::Call {
                    func: Box::new(Expr::Name { id: "len".to_string(), line: 1 }),
                    args: vec![Expr::Name { id: "items".to_string(), line: 1 }],
                    line: 1,
                },
                line: 1,
            }],
        };
        let graph = compile(&module);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].label, "Call: len");
    }

    #[test]
    fn test_ids_are_preorder_and_unique() {
        let module = Module {
            body: vec![Stmt::FunctionDef {
                name: "outer".to_string(),
                params: vec![],
                body: vec![
                    Stmt::FunctionDef {
                        name: "inner".to_string(),
                        params: vec![],
                        body: vec![Stmt::Pass { line: 3 }],
                        line: 2,
                    },
                    assign("x", Expr::IntLit { value: 1, line: 4 }, 4),
                ],
                line: 1,
            }],
        };
        let graph = compile(&module);
        let ids: Vec<u32> = graph.nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(graph.nodes[0].label, "Func: outer");
        assert_eq!(graph.nodes[1].label, "Func: inner");
        assert_eq!(graph.nodes[2].label, "Assign: x");
    }
}
