//! AST for the traced language.
//!
//! A line-annotated syntax tree produced by the indentation parser and
//! consumed by both engines. The statement and expression kinds form a
//! closed set; everything either engine dispatches on is a variant here.

use thiserror::Error;

/// A parsed source module (top-level statement sequence).
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// Statements. Every variant carries the 1-based source line of its header.
#[derive(Debug, Clone)]
pub enum Stmt {
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
        line: u32,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        /// `elif` chains are nested `If` statements inside `orelse`.
        orelse: Vec<Stmt>,
        line: u32,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    Assign {
        target: Expr,
        value: Expr,
        line: u32,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
        line: u32,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    ExprStmt {
        value: Expr,
        line: u32,
    },
    Pass { line: u32 },
    Break { line: u32 },
    Continue { line: u32 },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::FunctionDef { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::AugAssign { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::ExprStmt { line, .. }
            | Stmt::Pass { line }
            | Stmt::Break { line }
            | Stmt::Continue { line } => *line,
        }
    }
}

/// Expressions.
#[derive(Debug, Clone)]
pub enum Expr {
    Name { id: String, line: u32 },
    NoneLit { line: u32 },
    BoolLit { value: bool, line: u32 },
    IntLit { value: i64, line: u32 },
    FloatLit { value: f64, line: u32 },
    StrLit { value: String, line: u32 },
    List { elements: Vec<Expr>, line: u32 },
    Tuple { elements: Vec<Expr>, line: u32 },
    Set { elements: Vec<Expr>, line: u32 },
    Dict { pairs: Vec<(Expr, Expr)>, line: u32 },
    BinOp { left: Box<Expr>, op: BinOp, right: Box<Expr>, line: u32 },
    UnaryOp { op: UnaryOp, operand: Box<Expr>, line: u32 },
    BoolOp { op: BoolOp, values: Vec<Expr>, line: u32 },
    Compare { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr>, line: u32 },
    Call { func: Box<Expr>, args: Vec<Expr>, line: u32 },
    Attribute { value: Box<Expr>, attr: String, line: u32 },
    Subscript { value: Box<Expr>, index: Box<Expr>, line: u32 },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Name { line, .. }
            | Expr::NoneLit { line }
            | Expr::BoolLit { line, .. }
            | Expr::IntLit { line, .. }
            | Expr::FloatLit { line, .. }
            | Expr::StrLit { line, .. }
            | Expr::List { line, .. }
            | Expr::Tuple { line, .. }
            | Expr::Set { line, .. }
            | Expr::Dict { line, .. }
            | Expr::BinOp { line, .. }
            | Expr::UnaryOp { line, .. }
            | Expr::BoolOp { line, .. }
            | Expr::Compare { line, .. }
            | Expr::Call { line, .. }
            | Expr::Attribute { line, .. }
            | Expr::Subscript { line, .. } => *line,
        }
    }

    /// The bare identifier if this expression is a plain name.
    pub fn simple_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Compact single-line rendering, used for decision-node labels.
    pub fn render(&self) -> String {
        match self {
            Expr::Name { id, .. } => id.clone(),
            Expr::NoneLit { .. } => "None".to_string(),
            Expr::BoolLit { value, .. } => {
                if *value { "True".to_string() } else { "False".to_string() }
            }
            Expr::IntLit { value, .. } => value.to_string(),
            Expr::FloatLit { value, .. } => render_float(*value),
            Expr::StrLit { value, .. } => format!("'{}'", value),
            Expr::List { elements, .. } => format!("[{}]", render_list(elements)),
            Expr::Tuple { elements, .. } => format!("({})", render_list(elements)),
            Expr::Set { elements, .. } => format!("{{{}}}", render_list(elements)),
            Expr::Dict { pairs, .. } => {
                let inner: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.render(), v.render()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Expr::BinOp { left, op, right, .. } => {
                format!("{} {} {}", left.render(), op.symbol(), right.render())
            }
            Expr::UnaryOp { op, operand, .. } => match op {
                UnaryOp::Not => format!("not {}", operand.render()),
                UnaryOp::Neg => format!("-{}", operand.render()),
                UnaryOp::Pos => format!("+{}", operand.render()),
            },
            Expr::BoolOp { op, values, .. } => {
                let joined: Vec<String> = values.iter().map(Expr::render).collect();
                joined.join(&format!(" {} ", op.keyword()))
            }
            Expr::Compare { left, ops, comparators, .. } => {
                let mut out = left.render();
                for (op, comparator) in ops.iter().zip(comparators) {
                    out.push(' ');
                    out.push_str(op.symbol());
                    out.push(' ');
                    out.push_str(&comparator.render());
                }
                out
            }
            Expr::Call { func, args, .. } => {
                format!("{}({})", func.render(), render_list(args))
            }
            Expr::Attribute { value, attr, .. } => format!("{}.{}", value.render(), attr),
            Expr::Subscript { value, index, .. } => {
                format!("{}[{}]", value.render(), index.render())
            }
        }
    }
}

fn render_list(elements: &[Expr]) -> String {
    let parts: Vec<String> = elements.iter().map(Expr::render).collect();
    parts.join(", ")
}

/// Float rendering that keeps a trailing `.0` on integral values,
/// matching the runtime's display of float objects.
pub fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

/// Comparison operators (chainable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        }
    }
}

/// Short-circuit boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// A syntax error with the offending source line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (line {line})")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Self { message: message.into(), line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_compare_chain() {
        let expr = Expr::Compare {
            left: Box::new(Expr::IntLit { value: 0, line: 1 }),
            ops: vec![CmpOp::Lt, CmpOp::Lt],
            comparators: vec![
                Expr::Name { id: "x".to_string(), line: 1 },
                Expr::IntLit { value: 10, line: 1 },
            ],
            line: 1,
        };
        assert_eq!(expr.render(), "0 < x < 10");
    }

    #[test]
    fn test_render_call_with_attribute() {
        let expr = Expr::Call {
            func: Box::new(Expr::Attribute {
                value: Box::new(Expr::Name { id: "data".to_string(), line: 1 }),
                attr: "copy".to_string(),
                line: 1,
            }),
            args: vec![],
            line: 1,
        };
        assert_eq!(expr.render(), "data.copy()");
    }

    #[test]
    fn test_render_float_keeps_point() {
        assert_eq!(render_float(10.0), "10.0");
        assert_eq!(render_float(0.5), "0.5");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("invalid syntax", 3);
        assert_eq!(err.to_string(), "invalid syntax (line 3)");
    }
}
