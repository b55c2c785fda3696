//! Tree-Walking Interpreter
//!
//! Executes a parsed module in a freshly created scope, firing the step
//! hook after every executed statement. The hook occupies a single slot on
//! the interpreter for exactly the duration of one run and is cleared on
//! every exit path. All failures surface as [`RuntimeError`]; nothing
//! panics on user input.

use std::cmp::Ordering;
use std::rc::Rc;

use thiserror::Error;

use crate::domain::ast::{BinOp, BoolOp, CmpOp, Expr, Module, Stmt, UnaryOp};
use crate::domain::value::{Builtin, FunctionObject, RangeObject, Value};
use crate::ports::StepHook;

/// Runtime failures of a traced program. Messages follow the surface
/// language's conventions since they are shown verbatim to the learner.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),
    #[error("{0}")]
    Type(String),
    #[error("{0}")]
    Value(String),
    #[error("{0}")]
    Index(String),
    /// Message is the rendered key, e.g. `'missing'`.
    #[error("{0}")]
    Key(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer division or modulo by zero")]
    IntegerDivisionByZero,
    #[error("'{0}' object has no attribute '{1}'")]
    MissingAttribute(&'static str, String),
    #[error("maximum recursion depth exceeded")]
    RecursionLimit,
    #[error("execution step budget exceeded")]
    StepBudgetExceeded,
}

/// Control-flow signals threaded through statement execution.
#[derive(Debug)]
enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// One lexical scope: module globals or a function frame. Bindings keep
/// insertion order so snapshots read top-to-bottom.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: Vec<(String, Value)>,
}

impl Environment {
    fn get(&self, name: &str) -> Option<Value> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value.clone())
    }

    fn set(&mut self, name: &str, value: Value) {
        if let Some(entry) = self.bindings.iter_mut().find(|(bound, _)| bound == name) {
            entry.1 = value;
        } else {
            self.bindings.push((name.to_string(), value));
        }
    }

    fn snapshot(&self) -> Vec<(String, Value)> {
        self.bindings.clone()
    }
}

pub struct Interpreter<'h> {
    globals: Environment,
    frames: Vec<Environment>,
    hook: Option<&'h mut dyn StepHook>,
    stdout: String,
    call_depth: usize,
    max_call_depth: usize,
    /// Optional instruction-count limit, imposed by the caller.
    max_steps: Option<u64>,
    steps: u64,
}

impl<'h> Interpreter<'h> {
    pub fn new(max_call_depth: usize, max_steps: Option<u64>) -> Self {
        Self {
            globals: Environment::default(),
            frames: Vec::new(),
            hook: None,
            stdout: String::new(),
            call_depth: 0,
            max_call_depth,
            max_steps,
            steps: 0,
        }
    }

    /// Output buffered by `print` during the run.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Execute under step instrumentation. The hook slot is populated for
    /// the duration of this call only and cleared before returning, on
    /// success and on failure alike.
    pub fn run(&mut self, module: &Module, hook: &'h mut dyn StepHook) -> Result<(), RuntimeError> {
        self.hook = Some(hook);
        let result = self.exec_block(&module.body);
        self.hook = None;
        result.map(|_| ())
    }

    /// Execute without instrumentation.
    pub fn execute(&mut self, module: &Module) -> Result<(), RuntimeError> {
        self.exec_block(&module.body).map(|_| ())
    }

    fn current_scope(&self) -> &Environment {
        self.frames.last().unwrap_or(&self.globals)
    }

    fn scope_mut(&mut self) -> &mut Environment {
        self.frames.last_mut().unwrap_or(&mut self.globals)
    }

    /// Fires after a statement's effect is applied, so the final program
    /// state is observable in the last snapshot.
    fn step(&mut self, line: u32) -> Result<(), RuntimeError> {
        self.steps += 1;
        if let Some(budget) = self.max_steps {
            if self.steps > budget {
                return Err(RuntimeError::StepBudgetExceeded);
            }
        }
        if self.hook.is_some() {
            let locals = self.current_scope().snapshot();
            if let Some(hook) = self.hook.as_mut() {
                hook.on_step(line, &locals);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn exec_block(&mut self, body: &[Stmt]) -> Result<Signal, RuntimeError> {
        for stmt in body {
            match self.exec_stmt(stmt)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::FunctionDef { name, params, body, line } => {
                let function = Value::Function(Rc::new(FunctionObject {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    line: *line,
                }));
                self.scope_mut().set(name, function);
                self.step(*line)?;
                Ok(Signal::Normal)
            }
            Stmt::Assign { target, value, line } => {
                let value = self.eval(value)?;
                self.assign_target(target, value)?;
                self.step(*line)?;
                Ok(Signal::Normal)
            }
            Stmt::AugAssign { target, op, value, line } => {
                let current = self.eval(target)?;
                let rhs = self.eval(value)?;
                // `list += iterable` extends in place, preserving identity.
                if *op == BinOp::Add {
                    if let (Value::List(items), Value::List(extra)) = (&current, &rhs) {
                        let extra: Vec<Value> = extra.borrow().clone();
                        items.borrow_mut().extend(extra);
                        self.step(*line)?;
                        return Ok(Signal::Normal);
                    }
                }
                let result = self.binary_op(*op, current, rhs)?;
                self.assign_target(target, result)?;
                self.step(*line)?;
                Ok(Signal::Normal)
            }
            Stmt::ExprStmt { value, line } => {
                self.eval(value)?;
                self.step(*line)?;
                Ok(Signal::Normal)
            }
            Stmt::Return { value, line } => {
                let result = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                self.step(*line)?;
                Ok(Signal::Return(result))
            }
            Stmt::Pass { line } => {
                self.step(*line)?;
                Ok(Signal::Normal)
            }
            Stmt::Break { line } => {
                self.step(*line)?;
                Ok(Signal::Break)
            }
            Stmt::Continue { line } => {
                self.step(*line)?;
                Ok(Signal::Continue)
            }
            Stmt::If { test, body, orelse, line } => {
                let condition = self.eval(test)?;
                self.step(*line)?;
                if condition.is_truthy() {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                }
            }
            Stmt::While { test, body, line } => {
                loop {
                    let condition = self.eval(test)?;
                    self.step(*line)?;
                    if !condition.is_truthy() {
                        break;
                    }
                    match self.exec_block(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::For { target, iter, body, line } => {
                let iterable = self.eval(iter)?;
                let items = self.iterate(&iterable)?;
                if items.is_empty() {
                    // The header still fires once so empty loops stay
                    // visible in the trace.
                    self.step(*line)?;
                    return Ok(Signal::Normal);
                }
                for item in items {
                    self.assign_target(target, item)?;
                    self.step(*line)?;
                    match self.exec_block(body)? {
                        Signal::Break => break,
                        Signal::Continue | Signal::Normal => {}
                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }
                Ok(Signal::Normal)
            }
        }
    }

    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match target {
            Expr::Name { id, .. } => {
                self.scope_mut().set(id, value);
                Ok(())
            }
            Expr::Subscript { value: object, index, .. } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.set_index(object, index, value)
            }
            Expr::Tuple { elements, .. } => {
                let items = self.iterate(&value)?;
                match items.len().cmp(&elements.len()) {
                    Ordering::Less => {
                        return Err(RuntimeError::Value(format!(
                            "not enough values to unpack (expected {}, got {})",
                            elements.len(),
                            items.len()
                        )));
                    }
                    Ordering::Greater => {
                        return Err(RuntimeError::Value(format!(
                            "too many values to unpack (expected {})",
                            elements.len()
                        )));
                    }
                    Ordering::Equal => {}
                }
                for (element, item) in elements.iter().zip(items) {
                    self.assign_target(element, item)?;
                }
                Ok(())
            }
            Expr::Attribute { .. } => Err(RuntimeError::Type(
                "attribute assignment is not supported".to_string(),
            )),
            other => Err(RuntimeError::Type(format!(
                "cannot assign to {} expression",
                other.render()
            ))),
        }
    }

    fn set_index(&mut self, object: Value, index: Value, value: Value) -> Result<(), RuntimeError> {
        match object {
            Value::List(items) => {
                let len = items.borrow().len();
                let position = sequence_index(&index, len, "list")?;
                items.borrow_mut()[position] = value;
                Ok(())
            }
            Value::Dict(pairs) => {
                let mut pairs = pairs.borrow_mut();
                if let Some(entry) = pairs.iter_mut().find(|(key, _)| key.eq_value(&index)) {
                    entry.1 = value;
                } else {
                    pairs.push((index, value));
                }
                Ok(())
            }
            other => Err(RuntimeError::Type(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Name { id, .. } => self.lookup(id),
            Expr::NoneLit { .. } => Ok(Value::None),
            Expr::BoolLit { value, .. } => Ok(Value::Bool(*value)),
            Expr::IntLit { value, .. } => Ok(Value::Int(*value)),
            Expr::FloatLit { value, .. } => Ok(Value::Float(*value)),
            Expr::StrLit { value, .. } => Ok(Value::str(value.clone())),
            Expr::List { elements, .. } => {
                let items = self.eval_all(elements)?;
                Ok(Value::list(items))
            }
            Expr::Tuple { elements, .. } => {
                let items = self.eval_all(elements)?;
                Ok(Value::tuple(items))
            }
            Expr::Set { elements, .. } => {
                let mut items: Vec<Value> = Vec::new();
                for element in elements {
                    let item = self.eval(element)?;
                    if !items.iter().any(|existing| existing.eq_value(&item)) {
                        items.push(item);
                    }
                }
                Ok(Value::set(items))
            }
            Expr::Dict { pairs, .. } => {
                let mut entries: Vec<(Value, Value)> = Vec::new();
                for (key_expr, value_expr) in pairs {
                    let key = self.eval(key_expr)?;
                    let value = self.eval(value_expr)?;
                    if let Some(entry) = entries.iter_mut().find(|(k, _)| k.eq_value(&key)) {
                        entry.1 = value;
                    } else {
                        entries.push((key, value));
                    }
                }
                Ok(Value::dict(entries))
            }
            Expr::BinOp { left, op, right, .. } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*op, left, right)
            }
            Expr::UnaryOp { op, operand, .. } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(i) => Ok(Value::Int(-i)),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                        other => Err(RuntimeError::Type(format!(
                            "bad operand type for unary -: '{}'",
                            other.type_name()
                        ))),
                    },
                    UnaryOp::Pos => match value {
                        Value::Int(_) | Value::Float(_) => Ok(value),
                        Value::Bool(b) => Ok(Value::Int(b as i64)),
                        other => Err(RuntimeError::Type(format!(
                            "bad operand type for unary +: '{}'",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::BoolOp { op, values, .. } => {
                let mut last = Value::None;
                for (position, value_expr) in values.iter().enumerate() {
                    let value = self.eval(value_expr)?;
                    let truthy = value.is_truthy();
                    let is_last = position == values.len() - 1;
                    match op {
                        BoolOp::And if !truthy => return Ok(value),
                        BoolOp::Or if truthy => return Ok(value),
                        _ => {}
                    }
                    if is_last {
                        last = value;
                    }
                }
                Ok(last)
            }
            Expr::Compare { left, ops, comparators, .. } => {
                let mut current = self.eval(left)?;
                for (op, comparator_expr) in ops.iter().zip(comparators) {
                    let comparator = self.eval(comparator_expr)?;
                    if !self.compare(*op, &current, &comparator)? {
                        return Ok(Value::Bool(false));
                    }
                    current = comparator;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call { func, args, .. } => self.eval_call(func, args),
            Expr::Attribute { attr, .. } => Err(RuntimeError::Type(format!(
                "accessing method '{}' without calling it is not supported",
                attr
            ))),
            Expr::Subscript { value, index, .. } => {
                let object = self.eval(value)?;
                let index = self.eval(index)?;
                self.get_index(&object, &index)
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            out.push(self.eval(expr)?);
        }
        Ok(out)
    }

    fn lookup(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.get(name) {
                return Ok(value);
            }
        }
        if let Some(value) = self.globals.get(name) {
            return Ok(value);
        }
        if let Some(builtin) = Builtin::lookup(name) {
            return Ok(Value::BuiltinFunction(builtin));
        }
        Err(RuntimeError::UndefinedName(name.to_string()))
    }

    fn get_index(&self, object: &Value, index: &Value) -> Result<Value, RuntimeError> {
        match object {
            Value::List(items) => {
                let items = items.borrow();
                let position = sequence_index(index, items.len(), "list")?;
                Ok(items[position].clone())
            }
            Value::Tuple(items) => {
                let position = sequence_index(index, items.len(), "tuple")?;
                Ok(items[position].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let position = sequence_index(index, chars.len(), "string")?;
                Ok(Value::str(chars[position].to_string()))
            }
            Value::Dict(pairs) => {
                let pairs = pairs.borrow();
                pairs
                    .iter()
                    .find(|(key, _)| key.eq_value(index))
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| RuntimeError::Key(index.render(0)))
            }
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn iterate(&self, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Set(items) => Ok(items.borrow().clone()),
            Value::Dict(pairs) => {
                Ok(pairs.borrow().iter().map(|(key, _)| key.clone()).collect())
            }
            Value::Str(text) => Ok(text.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Range(range) => Ok(range.items().into_iter().map(Value::Int).collect()),
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Operators
    // ─────────────────────────────────────────────────────────────────────

    fn binary_op(&self, op: BinOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match op {
            BinOp::Add => self.add(left, right),
            BinOp::Sub => numeric_binop(&left, &right, op, |a, b| a.checked_sub(b), |a, b| a - b),
            BinOp::Mul => self.mul(left, right),
            BinOp::Div => {
                let (a, b) = float_pair(&left, &right)
                    .ok_or_else(|| type_error_for(op, &left, &right))?;
                if b == 0.0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            BinOp::FloorDiv => match int_pair(&left, &right) {
                Some((_, 0)) => Err(RuntimeError::IntegerDivisionByZero),
                Some((a, b)) => Ok(Value::Int(floor_div(a, b))),
                None => {
                    let (a, b) = float_pair(&left, &right)
                        .ok_or_else(|| type_error_for(op, &left, &right))?;
                    if b == 0.0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Ok(Value::Float((a / b).floor()))
                }
            },
            BinOp::Mod => match int_pair(&left, &right) {
                Some((_, 0)) => Err(RuntimeError::IntegerDivisionByZero),
                Some((a, b)) => Ok(Value::Int(floor_mod(a, b))),
                None => {
                    let (a, b) = float_pair(&left, &right)
                        .ok_or_else(|| type_error_for(op, &left, &right))?;
                    if b == 0.0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Ok(Value::Float(a - (a / b).floor() * b))
                }
            },
            BinOp::Pow => match int_pair(&left, &right) {
                Some((a, b)) if b >= 0 => {
                    let result = u32::try_from(b)
                        .ok()
                        .and_then(|exp| a.checked_pow(exp));
                    match result {
                        Some(value) => Ok(Value::Int(value)),
                        None => Ok(Value::Float((a as f64).powf(b as f64))),
                    }
                }
                Some((a, b)) => Ok(Value::Float((a as f64).powf(b as f64))),
                None => {
                    let (a, b) = float_pair(&left, &right)
                        .ok_or_else(|| type_error_for(op, &left, &right))?;
                    Ok(Value::Float(a.powf(b)))
                }
            },
        }
    }

    fn add(&self, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if let Some(result) =
            numeric_binop_opt(&left, &right, |a, b| a.checked_add(b), |a, b| a + b)
        {
            return Ok(result);
        }
        match (&left, &right) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                Ok(Value::tuple(items))
            }
            _ => Err(type_error_for(BinOp::Add, &left, &right)),
        }
    }

    fn mul(&self, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if let Some(result) =
            numeric_binop_opt(&left, &right, |a, b| a.checked_mul(b), |a, b| a * b)
        {
            return Ok(result);
        }
        let repeat = |count: i64| count.max(0) as usize;
        match (&left, &right) {
            (Value::Str(text), Value::Int(count)) | (Value::Int(count), Value::Str(text)) => {
                Ok(Value::str(text.repeat(repeat(*count))))
            }
            (Value::List(items), Value::Int(count)) | (Value::Int(count), Value::List(items)) => {
                let base = items.borrow();
                let mut out = Vec::with_capacity(base.len() * repeat(*count));
                for _ in 0..repeat(*count) {
                    out.extend(base.iter().cloned());
                }
                Ok(Value::list(out))
            }
            (Value::Tuple(items), Value::Int(count)) | (Value::Int(count), Value::Tuple(items)) => {
                let mut out = Vec::with_capacity(items.len() * repeat(*count));
                for _ in 0..repeat(*count) {
                    out.extend(items.iter().cloned());
                }
                Ok(Value::tuple(out))
            }
            _ => Err(type_error_for(BinOp::Mul, &left, &right)),
        }
    }

    fn compare(&self, op: CmpOp, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
        match op {
            CmpOp::Eq => Ok(left.eq_value(right)),
            CmpOp::NotEq => Ok(!left.eq_value(right)),
            CmpOp::In => self.membership(left, right),
            CmpOp::NotIn => self.membership(left, right).map(|found| !found),
            CmpOp::Lt => Ok(order_values(op, left, right)? == Ordering::Less),
            CmpOp::LtE => Ok(order_values(op, left, right)? != Ordering::Greater),
            CmpOp::Gt => Ok(order_values(op, left, right)? == Ordering::Greater),
            CmpOp::GtE => Ok(order_values(op, left, right)? != Ordering::Less),
        }
    }

    fn membership(&self, needle: &Value, haystack: &Value) -> Result<bool, RuntimeError> {
        if let (Value::Str(needle), Value::Str(haystack)) = (needle, haystack) {
            return Ok(haystack.contains(needle.as_str()));
        }
        match haystack {
            Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Dict(_) | Value::Range(_) => {
                let items = self.iterate(haystack)?;
                Ok(items.iter().any(|item| item.eq_value(needle)))
            }
            other => Err(RuntimeError::Type(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────

    fn eval_call(&mut self, func: &Expr, args: &[Expr]) -> Result<Value, RuntimeError> {
        // Method calls dispatch on the receiver; a bound-method object is
        // never materialized.
        if let Expr::Attribute { value, attr, .. } = func {
            let object = self.eval(value)?;
            let arg_values = self.eval_all(args)?;
            return self.call_method(object, attr, arg_values);
        }
        let callee = self.eval(func)?;
        let arg_values = self.eval_all(args)?;
        match callee {
            Value::Function(function) => self.call_function(function, arg_values),
            Value::BuiltinFunction(builtin) => self.call_builtin(builtin, arg_values),
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: Rc<FunctionObject>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != function.params.len() {
            return Err(RuntimeError::Type(format!(
                "{}() takes {} positional arguments but {} were given",
                function.name,
                function.params.len(),
                args.len()
            )));
        }
        if self.call_depth >= self.max_call_depth {
            return Err(RuntimeError::RecursionLimit);
        }
        self.call_depth += 1;
        let mut frame = Environment::default();
        for (param, arg) in function.params.iter().zip(args) {
            frame.set(param, arg);
        }
        self.frames.push(frame);
        let result = self.exec_block(&function.body);
        self.frames.pop();
        self.call_depth -= 1;
        match result? {
            Signal::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match builtin {
            Builtin::Print => {
                let parts: Vec<String> = args.iter().map(Value::display).collect();
                self.stdout.push_str(&parts.join(" "));
                self.stdout.push('\n');
                Ok(Value::None)
            }
            Builtin::Range => {
                if args.is_empty() || args.len() > 3 {
                    return Err(RuntimeError::Type(format!(
                        "range expected 1 to 3 arguments, got {}",
                        args.len()
                    )));
                }
                let mut bounds = Vec::with_capacity(args.len());
                for arg in &args {
                    bounds.push(expect_int(arg)?);
                }
                let range = match bounds.as_slice() {
                    [stop] => RangeObject { start: 0, stop: *stop, step: 1 },
                    [start, stop] => RangeObject { start: *start, stop: *stop, step: 1 },
                    [start, stop, step] => {
                        if *step == 0 {
                            return Err(RuntimeError::Value(
                                "range() arg 3 must not be zero".to_string(),
                            ));
                        }
                        RangeObject { start: *start, stop: *stop, step: *step }
                    }
                    _ => unreachable!(),
                };
                Ok(Value::Range(Rc::new(range)))
            }
            Builtin::Len => {
                let [arg] = one_arg("len", args)?;
                let len = match &arg {
                    Value::Str(text) => text.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Set(items) => items.borrow().len(),
                    Value::Dict(pairs) => pairs.borrow().len(),
                    Value::Range(range) => range.len(),
                    other => {
                        return Err(RuntimeError::Type(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::Abs => {
                let [arg] = one_arg("abs", args)?;
                match arg {
                    Value::Int(i) => Ok(Value::Int(i.abs())),
                    Value::Float(f) => Ok(Value::Float(f.abs())),
                    Value::Bool(b) => Ok(Value::Int(b as i64)),
                    other => Err(RuntimeError::Type(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                }
            }
            Builtin::Min | Builtin::Max => {
                let name = builtin.name();
                let items = if args.len() == 1 {
                    self.iterate(&args[0])?
                } else {
                    args
                };
                if items.is_empty() {
                    return Err(RuntimeError::Value(format!(
                        "{}() arg is an empty sequence",
                        name
                    )));
                }
                let mut best = items[0].clone();
                for item in &items[1..] {
                    let ordering = order_values(CmpOp::Lt, item, &best)?;
                    let better = if builtin == Builtin::Min {
                        ordering == Ordering::Less
                    } else {
                        ordering == Ordering::Greater
                    };
                    if better {
                        best = item.clone();
                    }
                }
                Ok(best)
            }
            Builtin::Sum => {
                if args.is_empty() || args.len() > 2 {
                    return Err(RuntimeError::Type(format!(
                        "sum expected 1 to 2 arguments, got {}",
                        args.len()
                    )));
                }
                let items = self.iterate(&args[0])?;
                let mut total = match args.get(1) {
                    Some(start) => start.clone(),
                    None => Value::Int(0),
                };
                for item in items {
                    total = self.add(total, item)?;
                }
                Ok(total)
            }
            Builtin::Sorted => {
                let [arg] = one_arg("sorted", args)?;
                let mut items = self.iterate(&arg)?;
                sort_values(&mut items)?;
                Ok(Value::list(items))
            }
            Builtin::Str => match args.len() {
                0 => Ok(Value::str("")),
                1 => Ok(Value::str(args[0].display())),
                n => Err(RuntimeError::Type(format!(
                    "str expected at most 1 argument, got {}",
                    n
                ))),
            },
            Builtin::Int => match args.as_slice() {
                [] => Ok(Value::Int(0)),
                [Value::Int(i)] => Ok(Value::Int(*i)),
                [Value::Bool(b)] => Ok(Value::Int(*b as i64)),
                [Value::Float(f)] => Ok(Value::Int(f.trunc() as i64)),
                [Value::Str(text)] => text.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    RuntimeError::Value(format!(
                        "invalid literal for int() with base 10: '{}'",
                        text
                    ))
                }),
                [other] => Err(RuntimeError::Type(format!(
                    "int() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
                _ => Err(RuntimeError::Type(format!(
                    "int expected at most 1 argument, got {}",
                    args.len()
                ))),
            },
            Builtin::Float => match args.as_slice() {
                [] => Ok(Value::Float(0.0)),
                [Value::Int(i)] => Ok(Value::Float(*i as f64)),
                [Value::Bool(b)] => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                [Value::Float(f)] => Ok(Value::Float(*f)),
                [Value::Str(text)] => {
                    text.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                        RuntimeError::Value(format!(
                            "could not convert string to float: '{}'",
                            text
                        ))
                    })
                }
                [other] => Err(RuntimeError::Type(format!(
                    "float() argument must be a string or a number, not '{}'",
                    other.type_name()
                ))),
                _ => Err(RuntimeError::Type(format!(
                    "float expected at most 1 argument, got {}",
                    args.len()
                ))),
            },
            Builtin::Bool => match args.len() {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(args[0].is_truthy())),
                n => Err(RuntimeError::Type(format!(
                    "bool expected at most 1 argument, got {}",
                    n
                ))),
            },
            Builtin::List => match args.len() {
                0 => Ok(Value::list(Vec::new())),
                1 => Ok(Value::list(self.iterate(&args[0])?)),
                n => Err(RuntimeError::Type(format!(
                    "list expected at most 1 argument, got {}",
                    n
                ))),
            },
            Builtin::Tuple => match args.len() {
                0 => Ok(Value::tuple(Vec::new())),
                1 => Ok(Value::tuple(self.iterate(&args[0])?)),
                n => Err(RuntimeError::Type(format!(
                    "tuple expected at most 1 argument, got {}",
                    n
                ))),
            },
            Builtin::Set => match args.len() {
                0 => Ok(Value::set(Vec::new())),
                1 => {
                    let mut items: Vec<Value> = Vec::new();
                    for item in self.iterate(&args[0])? {
                        if !items.iter().any(|existing| existing.eq_value(&item)) {
                            items.push(item);
                        }
                    }
                    Ok(Value::set(items))
                }
                n => Err(RuntimeError::Type(format!(
                    "set expected at most 1 argument, got {}",
                    n
                ))),
            },
            Builtin::Dict => match args.as_slice() {
                [] => Ok(Value::dict(Vec::new())),
                [Value::Dict(pairs)] => Ok(Value::dict(pairs.borrow().clone())),
                [other] => Err(RuntimeError::Type(format!(
                    "dict argument must be a dict, not '{}'",
                    other.type_name()
                ))),
                _ => Err(RuntimeError::Type(format!(
                    "dict expected at most 1 argument, got {}",
                    args.len()
                ))),
            },
            Builtin::Type => {
                let [arg] = one_arg("type", args)?;
                Ok(Value::str(arg.type_name()))
            }
            Builtin::Enumerate => {
                if args.is_empty() || args.len() > 2 {
                    return Err(RuntimeError::Type(format!(
                        "enumerate expected 1 to 2 arguments, got {}",
                        args.len()
                    )));
                }
                let start = match args.get(1) {
                    Some(value) => expect_int(value)?,
                    None => 0,
                };
                let items = self.iterate(&args[0])?;
                let pairs = items
                    .into_iter()
                    .enumerate()
                    .map(|(offset, item)| {
                        Value::tuple(vec![Value::Int(start + offset as i64), item])
                    })
                    .collect();
                Ok(Value::list(pairs))
            }
        }
    }

    fn call_method(
        &mut self,
        object: Value,
        attr: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match &object {
            Value::List(items) => self.list_method(items, attr, args),
            Value::Dict(pairs) => self.dict_method(pairs, attr, args),
            Value::Str(text) => self.str_method(text, attr, args),
            Value::Set(items) => self.set_method(items, attr, args),
            other => Err(RuntimeError::MissingAttribute(
                other.type_name(),
                attr.to_string(),
            )),
        }
    }

    fn list_method(
        &self,
        items: &Rc<std::cell::RefCell<Vec<Value>>>,
        attr: &str,
        mut args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match attr {
            "append" => {
                let [value] = one_arg("append", args)?;
                items.borrow_mut().push(value);
                Ok(Value::None)
            }
            "pop" => {
                let len = items.borrow().len();
                let position = match args.len() {
                    0 => {
                        if len == 0 {
                            return Err(RuntimeError::Index("pop from empty list".to_string()));
                        }
                        len - 1
                    }
                    1 => sequence_index(&args[0], len, "pop")?,
                    n => {
                        return Err(RuntimeError::Type(format!(
                            "pop expected at most 1 argument, got {}",
                            n
                        )));
                    }
                };
                Ok(items.borrow_mut().remove(position))
            }
            "extend" => {
                let [value] = one_arg("extend", args)?;
                let extra = self.iterate(&value)?;
                items.borrow_mut().extend(extra);
                Ok(Value::None)
            }
            "insert" => {
                if args.len() != 2 {
                    return Err(RuntimeError::Type(format!(
                        "insert expected 2 arguments, got {}",
                        args.len()
                    )));
                }
                let value = args.pop().expect("length checked");
                let raw = expect_int(&args[0])?;
                let len = items.borrow().len() as i64;
                // Out-of-range positions clamp instead of failing.
                let position = if raw < 0 {
                    (raw + len).clamp(0, len)
                } else {
                    raw.min(len)
                } as usize;
                items.borrow_mut().insert(position, value);
                Ok(Value::None)
            }
            "remove" => {
                let [value] = one_arg("remove", args)?;
                let position = items
                    .borrow()
                    .iter()
                    .position(|item| item.eq_value(&value));
                match position {
                    Some(position) => {
                        items.borrow_mut().remove(position);
                        Ok(Value::None)
                    }
                    None => Err(RuntimeError::Value(
                        "list.remove(x): x not in list".to_string(),
                    )),
                }
            }
            "index" => {
                let [value] = one_arg("index", args)?;
                let position = items
                    .borrow()
                    .iter()
                    .position(|item| item.eq_value(&value));
                match position {
                    Some(position) => Ok(Value::Int(position as i64)),
                    None => Err(RuntimeError::Value(format!(
                        "{} is not in list",
                        value.render(0)
                    ))),
                }
            }
            "count" => {
                let [value] = one_arg("count", args)?;
                let count = items
                    .borrow()
                    .iter()
                    .filter(|item| item.eq_value(&value))
                    .count();
                Ok(Value::Int(count as i64))
            }
            "copy" => {
                no_args("copy", &args)?;
                Ok(Value::list(items.borrow().clone()))
            }
            "clear" => {
                no_args("clear", &args)?;
                items.borrow_mut().clear();
                Ok(Value::None)
            }
            "reverse" => {
                no_args("reverse", &args)?;
                items.borrow_mut().reverse();
                Ok(Value::None)
            }
            "sort" => {
                no_args("sort", &args)?;
                let mut sorted = items.borrow().clone();
                sort_values(&mut sorted)?;
                *items.borrow_mut() = sorted;
                Ok(Value::None)
            }
            _ => Err(RuntimeError::MissingAttribute("list", attr.to_string())),
        }
    }

    fn dict_method(
        &self,
        pairs: &Rc<std::cell::RefCell<Vec<(Value, Value)>>>,
        attr: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match attr {
            "get" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(RuntimeError::Type(format!(
                        "get expected 1 to 2 arguments, got {}",
                        args.len()
                    )));
                }
                let found = pairs
                    .borrow()
                    .iter()
                    .find(|(key, _)| key.eq_value(&args[0]))
                    .map(|(_, value)| value.clone());
                Ok(found.unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
            }
            "keys" => {
                no_args("keys", &args)?;
                Ok(Value::list(
                    pairs.borrow().iter().map(|(key, _)| key.clone()).collect(),
                ))
            }
            "values" => {
                no_args("values", &args)?;
                Ok(Value::list(
                    pairs.borrow().iter().map(|(_, value)| value.clone()).collect(),
                ))
            }
            "items" => {
                no_args("items", &args)?;
                Ok(Value::list(
                    pairs
                        .borrow()
                        .iter()
                        .map(|(key, value)| Value::tuple(vec![key.clone(), value.clone()]))
                        .collect(),
                ))
            }
            "pop" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(RuntimeError::Type(format!(
                        "pop expected 1 to 2 arguments, got {}",
                        args.len()
                    )));
                }
                let position = pairs
                    .borrow()
                    .iter()
                    .position(|(key, _)| key.eq_value(&args[0]));
                match position {
                    Some(position) => Ok(pairs.borrow_mut().remove(position).1),
                    None => match args.get(1) {
                        Some(default) => Ok(default.clone()),
                        None => Err(RuntimeError::Key(args[0].render(0))),
                    },
                }
            }
            "copy" => {
                no_args("copy", &args)?;
                Ok(Value::dict(pairs.borrow().clone()))
            }
            "clear" => {
                no_args("clear", &args)?;
                pairs.borrow_mut().clear();
                Ok(Value::None)
            }
            _ => Err(RuntimeError::MissingAttribute("dict", attr.to_string())),
        }
    }

    fn str_method(
        &self,
        text: &Rc<String>,
        attr: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let expect_str = |value: &Value, what: &str| -> Result<Rc<String>, RuntimeError> {
            match value {
                Value::Str(s) => Ok(s.clone()),
                other => Err(RuntimeError::Type(format!(
                    "{} argument must be str, not '{}'",
                    what,
                    other.type_name()
                ))),
            }
        };
        match attr {
            "upper" => {
                no_args("upper", &args)?;
                Ok(Value::str(text.to_uppercase()))
            }
            "lower" => {
                no_args("lower", &args)?;
                Ok(Value::str(text.to_lowercase()))
            }
            "strip" => {
                no_args("strip", &args)?;
                Ok(Value::str(text.trim()))
            }
            "split" => match args.len() {
                0 => Ok(Value::list(
                    text.split_whitespace().map(Value::str).collect(),
                )),
                1 => {
                    let sep = expect_str(&args[0], "split")?;
                    if sep.is_empty() {
                        return Err(RuntimeError::Value("empty separator".to_string()));
                    }
                    Ok(Value::list(
                        text.split(sep.as_str()).map(Value::str).collect(),
                    ))
                }
                n => Err(RuntimeError::Type(format!(
                    "split expected at most 1 argument, got {}",
                    n
                ))),
            },
            "replace" => {
                if args.len() != 2 {
                    return Err(RuntimeError::Type(format!(
                        "replace expected 2 arguments, got {}",
                        args.len()
                    )));
                }
                let from = expect_str(&args[0], "replace")?;
                let to = expect_str(&args[1], "replace")?;
                Ok(Value::str(text.replace(from.as_str(), to.as_str())))
            }
            "startswith" => {
                let [value] = one_arg("startswith", args)?;
                let prefix = expect_str(&value, "startswith")?;
                Ok(Value::Bool(text.starts_with(prefix.as_str())))
            }
            "endswith" => {
                let [value] = one_arg("endswith", args)?;
                let suffix = expect_str(&value, "endswith")?;
                Ok(Value::Bool(text.ends_with(suffix.as_str())))
            }
            "find" => {
                let [value] = one_arg("find", args)?;
                let needle = expect_str(&value, "find")?;
                match text.find(needle.as_str()) {
                    Some(byte_pos) => {
                        let char_pos = text[..byte_pos].chars().count();
                        Ok(Value::Int(char_pos as i64))
                    }
                    None => Ok(Value::Int(-1)),
                }
            }
            "join" => {
                let [value] = one_arg("join", args)?;
                let items = self.iterate(&value)?;
                let mut parts = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    match item {
                        Value::Str(part) => parts.push(part.as_str().to_string()),
                        other => {
                            return Err(RuntimeError::Type(format!(
                                "sequence item {}: expected str instance, '{}' found",
                                position,
                                other.type_name()
                            )));
                        }
                    }
                }
                Ok(Value::str(parts.join(text.as_str())))
            }
            _ => Err(RuntimeError::MissingAttribute("str", attr.to_string())),
        }
    }

    fn set_method(
        &self,
        items: &Rc<std::cell::RefCell<Vec<Value>>>,
        attr: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match attr {
            "add" => {
                let [value] = one_arg("add", args)?;
                let mut items = items.borrow_mut();
                if !items.iter().any(|existing| existing.eq_value(&value)) {
                    items.push(value);
                }
                Ok(Value::None)
            }
            "remove" => {
                let [value] = one_arg("remove", args)?;
                let position = items.borrow().iter().position(|i| i.eq_value(&value));
                match position {
                    Some(position) => {
                        items.borrow_mut().remove(position);
                        Ok(Value::None)
                    }
                    None => Err(RuntimeError::Key(value.render(0))),
                }
            }
            "discard" => {
                let [value] = one_arg("discard", args)?;
                let position = items.borrow().iter().position(|i| i.eq_value(&value));
                if let Some(position) = position {
                    items.borrow_mut().remove(position);
                }
                Ok(Value::None)
            }
            "copy" => {
                no_args("copy", &args)?;
                Ok(Value::set(items.borrow().clone()))
            }
            "clear" => {
                no_args("clear", &args)?;
                items.borrow_mut().clear();
                Ok(Value::None)
            }
            _ => Err(RuntimeError::MissingAttribute("set", attr.to_string())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Free helpers
// ─────────────────────────────────────────────────────────────────────────

fn one_arg(name: &str, mut args: Vec<Value>) -> Result<[Value; 1], RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::Type(format!(
            "{} expected 1 argument, got {}",
            name,
            args.len()
        )));
    }
    Ok([args.pop().expect("length checked")])
}

fn no_args(name: &str, args: &[Value]) -> Result<(), RuntimeError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(RuntimeError::Type(format!(
            "{} expected 0 arguments, got {}",
            name,
            args.len()
        )))
    }
}

fn expect_int(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(*b as i64),
        other => Err(RuntimeError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            other.type_name()
        ))),
    }
}

/// Resolve a (possibly negative) sequence index against a length.
fn sequence_index(
    index: &Value,
    len: usize,
    sequence: &'static str,
) -> Result<usize, RuntimeError> {
    let raw = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => *b as i64,
        other => {
            return Err(RuntimeError::Type(format!(
                "{} indices must be integers, not '{}'",
                sequence,
                other.type_name()
            )));
        }
    };
    let adjusted = if raw < 0 { raw + len as i64 } else { raw };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(RuntimeError::Index(format!(
            "{} index out of range",
            sequence
        )));
    }
    Ok(adjusted as usize)
}

fn int_pair(left: &Value, right: &Value) -> Option<(i64, i64)> {
    let as_int = |value: &Value| match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    };
    Some((as_int(left)?, as_int(right)?))
}

fn float_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_number()?, right.as_number()?))
}

/// Integer op with overflow promotion to float, falling back to the float
/// op when either side is a float.
fn numeric_binop_opt(
    left: &Value,
    right: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Option<Value> {
    if let Some((a, b)) = int_pair(left, right) {
        return Some(match int_op(a, b) {
            Some(result) => Value::Int(result),
            None => Value::Float(float_op(a as f64, b as f64)),
        });
    }
    let (a, b) = float_pair(left, right)?;
    Some(Value::Float(float_op(a, b)))
}

fn numeric_binop(
    left: &Value,
    right: &Value,
    op: BinOp,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    numeric_binop_opt(left, right, int_op, float_op)
        .ok_or_else(|| type_error_for(op, left, right))
}

fn type_error_for(op: BinOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

/// Floor division with the divisor's sign, like the surface language.
fn floor_div(a: i64, b: i64) -> i64 {
    let quotient = a / b;
    let remainder = a % b;
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        quotient - 1
    } else {
        quotient
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    let remainder = a % b;
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        remainder + b
    } else {
        remainder
    }
}

/// Total ordering for comparable values; errors on mixed or unordered
/// types with the comparison operator in the message.
fn order_values(op: CmpOp, left: &Value, right: &Value) -> Result<Ordering, RuntimeError> {
    if let Some((a, b)) = float_pair(left, right) {
        return Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            order_slices(op, a.borrow().as_slice(), b.borrow().as_slice())
        }
        (Value::Tuple(a), Value::Tuple(b)) => order_slices(op, a, b),
        _ => Err(RuntimeError::Type(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn order_slices(op: CmpOp, a: &[Value], b: &[Value]) -> Result<Ordering, RuntimeError> {
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = order_values(op, x, y)?;
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

fn sort_values(items: &mut [Value]) -> Result<(), RuntimeError> {
    let mut error: Option<RuntimeError> = None;
    items.sort_by(|a, b| match order_values(CmpOp::Lt, a, b) {
        Ok(ordering) => ordering,
        Err(e) => {
            error.get_or_insert(e);
            Ordering::Equal
        }
    });
    match error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
