//! Memory Tracer
//!
//! The step hook of the execution tracer. On every step it rebuilds the
//! heap map from scratch: each local variable's object is serialized into
//! an identity-keyed arena, recursing into container children. Membership
//! is checked *before* recursing, which is what terminates cycles and
//! keeps shared substructure serialized once.

use std::collections::BTreeMap;

use crate::domain::snapshot::{HeapObject, StepSnapshot, TraceEntry, TraceError, TraceResult};
use crate::domain::value::Value;
use crate::ports::StepHook;

pub struct MemoryTracer {
    entries: Vec<TraceEntry>,
    /// Truncation cap for primitive value text.
    value_cap: usize,
    /// Bound on serialization recursion; objects at the cap are recorded
    /// opaque, without children.
    max_depth: usize,
}

impl MemoryTracer {
    pub fn new(value_cap: usize, max_depth: usize) -> Self {
        Self { entries: Vec::new(), value_cap, max_depth }
    }

    /// Append the terminal error entry. No snapshots follow it.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.entries.push(TraceEntry::Error(TraceError::new(message)));
    }

    pub fn finish(self) -> TraceResult {
        TraceResult { entries: self.entries }
    }

    fn truncate(&self, text: String) -> String {
        if text.chars().count() > self.value_cap {
            text.chars().take(self.value_cap).collect()
        } else {
            text
        }
    }

    fn serialize_value(&self, heap: &mut BTreeMap<String, HeapObject>, value: &Value, depth: usize) {
        let id = value.identity();
        if heap.contains_key(&id) {
            return;
        }
        match value {
            Value::List(items) => {
                let items = items.borrow();
                self.serialize_container(heap, id, "list", items.as_slice(), depth);
            }
            Value::Tuple(items) => {
                self.serialize_container(heap, id, "tuple", items.as_slice(), depth);
            }
            Value::Set(items) => {
                let items = items.borrow();
                self.serialize_container(heap, id, "set", items.as_slice(), depth);
            }
            Value::Dict(pairs) => {
                let pairs = pairs.borrow();
                let summary = format!("dict({})", pairs.len());
                if depth >= self.max_depth {
                    heap.insert(id.clone(), leaf(id, "dict", summary));
                    return;
                }
                // Entered before recursing so self-references resolve to
                // this record instead of recursing forever.
                heap.insert(id.clone(), leaf(id.clone(), "dict", summary));
                // Values only; keys are not walked.
                let mut children = Vec::with_capacity(pairs.len());
                for (_key, val) in pairs.iter() {
                    children.push(val.identity());
                    self.serialize_value(heap, val, depth + 1);
                }
                if let Some(record) = heap.get_mut(&id) {
                    record.children = children;
                }
            }
            other => {
                let text = self.truncate(other.display());
                heap.insert(id.clone(), leaf(id, other.type_name(), text));
            }
        }
    }

    fn serialize_container(
        &self,
        heap: &mut BTreeMap<String, HeapObject>,
        id: String,
        type_name: &str,
        items: &[Value],
        depth: usize,
    ) {
        let summary = format!("{}({})", type_name, items.len());
        if depth >= self.max_depth {
            heap.insert(id.clone(), leaf(id, type_name, summary));
            return;
        }
        heap.insert(id.clone(), leaf(id.clone(), type_name, summary));
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            children.push(item.identity());
            self.serialize_value(heap, item, depth + 1);
        }
        if let Some(record) = heap.get_mut(&id) {
            record.children = children;
        }
    }
}

fn leaf(id: String, type_name: &str, value: String) -> HeapObject {
    HeapObject {
        id,
        type_name: type_name.to_string(),
        value,
        children: Vec::new(),
    }
}

impl StepHook for MemoryTracer {
    fn on_step(&mut self, line: u32, locals: &[(String, Value)]) {
        let mut stack = BTreeMap::new();
        let mut heap = BTreeMap::new();
        for (name, value) in locals {
            // Runtime-internal names stay out of the picture.
            if name.starts_with("__") {
                continue;
            }
            let id = value.identity();
            stack.insert(name.clone(), id.clone());
            if !heap.contains_key(&id) {
                self.serialize_value(&mut heap, value, 0);
            }
        }
        self.entries.push(TraceEntry::Step(StepSnapshot {
            line,
            event: "line".to_string(),
            stack,
            heap,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn step_once(locals: &[(String, Value)]) -> StepSnapshot {
        let mut tracer = MemoryTracer::new(50, 64);
        tracer.on_step(1, locals);
        match tracer.finish().entries.remove(0) {
            TraceEntry::Step(step) => step,
            TraceEntry::Error(_) => panic!("expected a step"),
        }
    }

    #[test]
    fn test_shared_list_serialized_once() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let locals = vec![
            ("a".to_string(), list.clone()),
            ("b".to_string(), list.clone()),
        ];
        let step = step_once(&locals);
        assert_eq!(step.stack["a"], step.stack["b"]);
        let record = &step.heap[&step.stack["a"]];
        assert_eq!(record.value, "list(2)");
        assert_eq!(record.children, vec!["int:1".to_string(), "int:2".to_string()]);
        // Shared id appears exactly once in the heap map.
        assert_eq!(step.heap.values().filter(|o| o.type_name == "list").count(), 1);
    }

    #[test]
    fn test_cyclic_list_terminates_with_self_child() {
        let inner = Rc::new(RefCell::new(vec![Value::Int(1)]));
        let cyclic = Value::List(inner.clone());
        inner.borrow_mut().push(cyclic.clone());
        let locals = vec![("a".to_string(), cyclic.clone())];
        let step = step_once(&locals);
        let id = cyclic.identity();
        let record = &step.heap[&id];
        assert_eq!(record.value, "list(2)");
        // The cycle shows up as exactly one self-child reference.
        assert_eq!(record.children.iter().filter(|c| **c == id).count(), 1);
    }

    #[test]
    fn test_dict_children_are_values_only() {
        let key = Value::str("k");
        let val = Value::list(vec![Value::Int(7)]);
        let dict = Value::dict(vec![(key.clone(), val.clone())]);
        let locals = vec![("d".to_string(), dict.clone())];
        let step = step_once(&locals);
        let record = &step.heap[&dict.identity()];
        assert_eq!(record.value, "dict(1)");
        assert_eq!(record.children, vec![val.identity()]);
        // The key object was never serialized.
        assert!(!step.heap.contains_key(&key.identity()));
        // The value list was.
        assert!(step.heap.contains_key(&val.identity()));
    }

    #[test]
    fn test_depth_cap_yields_opaque_record() {
        // Build nesting deeper than the cap.
        let mut value = Value::list(vec![Value::Int(0)]);
        for _ in 0..10 {
            value = Value::list(vec![value]);
        }
        let mut tracer = MemoryTracer::new(50, 4);
        tracer.on_step(1, &[("deep".to_string(), value)]);
        let result = tracer.finish();
        let step = result.entries[0].as_step().unwrap();
        // Some record at the cap has no children despite being a list.
        assert!(step
            .heap
            .values()
            .any(|o| o.type_name == "list" && o.children.is_empty()));
    }

    #[test]
    fn test_long_primitive_value_truncated() {
        let long = "x".repeat(200);
        let locals = vec![("s".to_string(), Value::str(long))];
        let step = step_once(&locals);
        let record = step.heap.values().find(|o| o.type_name == "str").unwrap();
        assert_eq!(record.value.chars().count(), 50);
    }

    #[test]
    fn test_dunder_names_filtered() {
        let locals = vec![
            ("__builtins__".to_string(), Value::Int(1)),
            ("x".to_string(), Value::Int(2)),
        ];
        let step = step_once(&locals);
        assert!(!step.stack.contains_key("__builtins__"));
        assert!(step.stack.contains_key("x"));
    }

    #[test]
    fn test_error_entry_is_terminal_shape() {
        let mut tracer = MemoryTracer::new(50, 64);
        tracer.on_step(1, &[]);
        tracer.record_error("division by zero");
        let result = tracer.finish();
        assert_eq!(result.entries.len(), 2);
        let error = result.terminal_error().unwrap();
        assert_eq!(error.error, "division by zero");
        assert_eq!(error.line, -1);
    }
}
