//! Recursive-descent parser for the traced language.
//!
//! Consumes the token stream of [`crate::infrastructure::lexer`] and
//! produces the line-annotated AST both engines walk. All failures are
//! reported as [`ParseError`] with the offending line.

use crate::domain::ast::{BinOp, BoolOp, CmpOp, Expr, Module, ParseError, Stmt, UnaryOp};
use crate::infrastructure::lexer::{tokenize, Tok, Token};

/// Parse a full source text into a module.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    Parser { tokens, pos: 0 }.module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> u32 {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tok: &Tok) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(tok)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.check(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), ParseError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(format!("invalid syntax: expected {}", what)))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            Tok::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(format!("invalid syntax: expected {}", what))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn module(mut self) -> Result<Module, ParseError> {
        let mut body = Vec::new();
        while !self.check(&Tok::EndOfFile) {
            if self.check(&Tok::Indent) {
                return Err(self.error("unexpected indent"));
            }
            body.push(self.statement()?);
        }
        Ok(Module { body })
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Tok::Def => self.function_def(),
            Tok::If => self.if_stmt(),
            Tok::While => self.while_stmt(),
            Tok::For => self.for_stmt(),
            _ => {
                let stmt = self.simple_stmt()?;
                self.expect(&Tok::Newline, "end of line")?;
                Ok(stmt)
            }
        }
    }

    fn function_def(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.advance(); // def
        let name = self.expect_name("function name")?;
        self.expect(&Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&Tok::RParen) {
            loop {
                params.push(self.expect_name("parameter name")?);
                if !self.eat(&Tok::Comma) {
                    break;
                }
                if self.check(&Tok::RParen) {
                    break;
                }
            }
        }
        self.expect(&Tok::RParen, "')'")?;
        let body = self.suite()?;
        Ok(Stmt::FunctionDef { name, params, body, line })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.advance(); // if / elif
        let test = self.expression()?;
        let body = self.suite()?;
        let orelse = if self.check(&Tok::Elif) {
            // An elif chain nests as a single If in the else branch.
            vec![self.if_stmt()?]
        } else if self.eat(&Tok::Else) {
            self.suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse, line })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.advance();
        let test = self.expression()?;
        let body = self.suite()?;
        Ok(Stmt::While { test, body, line })
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.advance();
        let target = self.for_target()?;
        self.expect(&Tok::In, "'in'")?;
        let iter = self.expression_list()?;
        let body = self.suite()?;
        Ok(Stmt::For { target, iter, body, line })
    }

    /// Loop targets: a name or a comma-separated tuple of names.
    fn for_target(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = Expr::Name { id: self.expect_name("loop variable")?, line };
        if !self.check(&Tok::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(&Tok::Comma) {
            if self.check(&Tok::In) {
                break;
            }
            let line = self.line();
            elements.push(Expr::Name { id: self.expect_name("loop variable")?, line });
        }
        Ok(Expr::Tuple { elements, line })
    }

    /// A suite is either an indented block or a single inline simple
    /// statement after the colon.
    fn suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&Tok::Colon, "':'")?;
        if self.eat(&Tok::Newline) {
            self.expect(&Tok::Indent, "an indented block")?;
            let mut body = Vec::new();
            while !self.eat(&Tok::Dedent) {
                if self.check(&Tok::EndOfFile) {
                    return Err(self.error("unexpected end of input"));
                }
                body.push(self.statement()?);
            }
            Ok(body)
        } else {
            let stmt = self.simple_stmt()?;
            self.expect(&Tok::Newline, "end of line")?;
            Ok(vec![stmt])
        }
    }

    fn simple_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        match self.peek() {
            Tok::Return => {
                self.advance();
                let value = if self.check(&Tok::Newline) {
                    None
                } else {
                    Some(self.expression_list()?)
                };
                Ok(Stmt::Return { value, line })
            }
            Tok::Pass => {
                self.advance();
                Ok(Stmt::Pass { line })
            }
            Tok::Break => {
                self.advance();
                Ok(Stmt::Break { line })
            }
            Tok::Continue => {
                self.advance();
                Ok(Stmt::Continue { line })
            }
            _ => self.expr_or_assignment(line),
        }
    }

    fn expr_or_assignment(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let expr = self.expression_list()?;
        if self.eat(&Tok::Assign) {
            let target = self.to_target(expr)?;
            let value = self.expression_list()?;
            return Ok(Stmt::Assign { target, value, line });
        }
        let aug = match self.peek() {
            Tok::PlusAssign => Some(BinOp::Add),
            Tok::MinusAssign => Some(BinOp::Sub),
            Tok::StarAssign => Some(BinOp::Mul),
            Tok::SlashAssign => Some(BinOp::Div),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = self.to_target(expr)?;
            if matches!(target, Expr::Tuple { .. }) {
                return Err(ParseError::new(
                    "invalid syntax: cannot use tuple target in augmented assignment",
                    line,
                ));
            }
            let value = self.expression_list()?;
            return Ok(Stmt::AugAssign { target, op, value, line });
        }
        Ok(Stmt::ExprStmt { value: expr, line })
    }

    /// Validate an already-parsed expression as an assignment target.
    fn to_target(&self, expr: Expr) -> Result<Expr, ParseError> {
        match &expr {
            Expr::Name { .. } | Expr::Subscript { .. } | Expr::Attribute { .. } => Ok(expr),
            Expr::Tuple { elements, line } => {
                if elements.iter().all(|e| e.simple_name().is_some()) {
                    Ok(expr)
                } else {
                    Err(ParseError::new("invalid syntax: cannot assign to expression", *line))
                }
            }
            other => Err(ParseError::new(
                "invalid syntax: cannot assign to expression",
                other.line(),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    /// `a, b, c` builds a tuple; a single expression stays itself.
    fn expression_list(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = self.expression()?;
        if !self.check(&Tok::Comma) {
            return Ok(first);
        }
        let mut elements = vec![first];
        while self.eat(&Tok::Comma) {
            if self.check(&Tok::Newline)
                || self.check(&Tok::Assign)
                || self.check(&Tok::Colon)
                || self.check(&Tok::RParen)
                || self.check(&Tok::RBracket)
                || self.check(&Tok::RBrace)
                || self.check(&Tok::EndOfFile)
            {
                break;
            }
            elements.push(self.expression()?);
        }
        Ok(Expr::Tuple { elements, line })
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = self.and_expr()?;
        if !self.check(&Tok::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&Tok::Or) {
            values.push(self.and_expr()?);
        }
        Ok(Expr::BoolOp { op: BoolOp::Or, values, line })
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = self.not_expr()?;
        if !self.check(&Tok::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat(&Tok::And) {
            values.push(self.not_expr()?);
        }
        Ok(Expr::BoolOp { op: BoolOp::And, values, line })
    }

    fn not_expr(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        if self.eat(&Tok::Not) {
            let operand = Box::new(self.not_expr()?);
            return Ok(Expr::UnaryOp { op: UnaryOp::Not, operand, line });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let left = self.arith()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        loop {
            let op = match self.peek() {
                Tok::EqEq => CmpOp::Eq,
                Tok::NotEq => CmpOp::NotEq,
                Tok::Lt => CmpOp::Lt,
                Tok::LtE => CmpOp::LtE,
                Tok::Gt => CmpOp::Gt,
                Tok::GtE => CmpOp::GtE,
                Tok::In => CmpOp::In,
                Tok::Not => {
                    // `not` here can only begin `not in`.
                    self.advance();
                    self.expect(&Tok::In, "'in' after 'not'")?;
                    ops.push(CmpOp::NotIn);
                    comparators.push(self.arith()?);
                    continue;
                }
                _ => break,
            };
            self.advance();
            ops.push(op);
            comparators.push(self.arith()?);
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare { left: Box::new(left), ops, comparators, line })
        }
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.term()?;
            left = Expr::BinOp { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let right = self.factor()?;
            left = Expr::BinOp { left: Box::new(left), op, right: Box::new(right), line };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        if self.eat(&Tok::Minus) {
            let operand = Box::new(self.factor()?);
            return Ok(Expr::UnaryOp { op: UnaryOp::Neg, operand, line });
        }
        if self.eat(&Tok::Plus) {
            let operand = Box::new(self.factor()?);
            return Ok(Expr::UnaryOp { op: UnaryOp::Pos, operand, line });
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.check(&Tok::DoubleStar) {
            let line = self.line();
            self.advance();
            // Right-associative, and `2 ** -1` is legal.
            let right = self.factor()?;
            return Ok(Expr::BinOp {
                left: Box::new(base),
                op: BinOp::Pow,
                right: Box::new(right),
                line,
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Tok::LParen => {
                    let line = self.line();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&Tok::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&Tok::Comma) {
                                break;
                            }
                            if self.check(&Tok::RParen) {
                                break;
                            }
                        }
                    }
                    self.expect(&Tok::RParen, "')'")?;
                    expr = Expr::Call { func: Box::new(expr), args, line };
                }
                Tok::LBracket => {
                    let line = self.line();
                    self.advance();
                    let index = self.expression()?;
                    self.expect(&Tok::RBracket, "']'")?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                        line,
                    };
                }
                Tok::Dot => {
                    let line = self.line();
                    self.advance();
                    let attr = self.expect_name("attribute name")?;
                    expr = Expr::Attribute { value: Box::new(expr), attr, line };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        match self.peek().clone() {
            Tok::Name(id) => {
                self.advance();
                Ok(Expr::Name { id, line })
            }
            Tok::Int(value) => {
                self.advance();
                Ok(Expr::IntLit { value, line })
            }
            Tok::Float(value) => {
                self.advance();
                Ok(Expr::FloatLit { value, line })
            }
            Tok::Str(value) => {
                self.advance();
                Ok(Expr::StrLit { value, line })
            }
            Tok::True => {
                self.advance();
                Ok(Expr::BoolLit { value: true, line })
            }
            Tok::False => {
                self.advance();
                Ok(Expr::BoolLit { value: false, line })
            }
            Tok::None => {
                self.advance();
                Ok(Expr::NoneLit { line })
            }
            Tok::LParen => {
                self.advance();
                if self.eat(&Tok::RParen) {
                    return Ok(Expr::Tuple { elements: Vec::new(), line });
                }
                let inner = self.expression_list()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&Tok::RBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.eat(&Tok::Comma) {
                            break;
                        }
                        if self.check(&Tok::RBracket) {
                            break;
                        }
                    }
                }
                self.expect(&Tok::RBracket, "']'")?;
                Ok(Expr::List { elements, line })
            }
            Tok::LBrace => {
                self.advance();
                self.brace_display(line)
            }
            _ => Err(self.error("invalid syntax")),
        }
    }

    /// `{}` is an empty dict; `{a, b}` a set; `{k: v}` a dict.
    fn brace_display(&mut self, line: u32) -> Result<Expr, ParseError> {
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::Dict { pairs: Vec::new(), line });
        }
        let first = self.expression()?;
        if self.eat(&Tok::Colon) {
            let first_value = self.expression()?;
            let mut pairs = vec![(first, first_value)];
            while self.eat(&Tok::Comma) {
                if self.check(&Tok::RBrace) {
                    break;
                }
                let key = self.expression()?;
                self.expect(&Tok::Colon, "':'")?;
                let value = self.expression()?;
                pairs.push((key, value));
            }
            self.expect(&Tok::RBrace, "'}'")?;
            Ok(Expr::Dict { pairs, line })
        } else {
            let mut elements = vec![first];
            while self.eat(&Tok::Comma) {
                if self.check(&Tok::RBrace) {
                    break;
                }
                elements.push(self.expression()?);
            }
            self.expect(&Tok::RBrace, "'}'")?;
            Ok(Expr::Set { elements, line })
        }
    }
}
