//! Execution Trace Data Structures
//!
//! One snapshot per executed step: the local bindings of the active scope
//! plus a self-contained heap map of everything reachable from them. A
//! failing run is terminated by a single error entry with `line: -1`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A serialized heap object: bounded textual value plus the ids of the
/// objects it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub children: Vec<String>,
}

/// One step of the trace: the line just executed, the stack (variable name
/// to object id) and the heap map rebuilt fresh for this step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub line: u32,
    pub event: String,
    pub stack: BTreeMap<String, String>,
    pub heap: BTreeMap<String, HeapObject>,
}

/// Terminal entry appended when the traced program fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceError {
    pub error: String,
    pub line: i32,
}

impl TraceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into(), line: -1 }
    }
}

/// An element of the trace sequence: a normal snapshot or the terminal
/// error marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceEntry {
    Step(StepSnapshot),
    Error(TraceError),
}

impl TraceEntry {
    pub fn as_step(&self) -> Option<&StepSnapshot> {
        match self {
            TraceEntry::Step(step) => Some(step),
            TraceEntry::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TraceEntry::Error(_))
    }
}

/// The full, finite snapshot sequence of one run. Serializes to a JSON
/// array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceResult {
    pub entries: Vec<TraceEntry>,
}

impl TraceResult {
    pub fn steps(&self) -> impl Iterator<Item = &StepSnapshot> {
        self.entries.iter().filter_map(TraceEntry::as_step)
    }

    pub fn terminal_error(&self) -> Option<&TraceError> {
        match self.entries.last() {
            Some(TraceEntry::Error(error)) => Some(error),
            _ => None,
        }
    }
}
