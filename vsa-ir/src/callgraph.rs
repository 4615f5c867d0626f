//! The whole-program call graph, with a main-entry annotation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vsa_types::ProgramCounter;

/// A directed call-graph edge: `caller` calls `callee` at `call_site`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallEdge {
    pub caller: ProgramCounter,
    pub callee: ProgramCounter,
    pub call_site: ProgramCounter,
}

/// Function-to-function call edges for the whole program, plus the address
/// the interpreter should treat as the analysis entry point.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraph {
    pub edges: Vec<CallEdge>,
    pub main_entry: ProgramCounter,
}

impl CallGraph {
    /// Callees reachable directly from `caller`, in builder-assigned (i.e.
    /// deterministic) order.
    pub fn callees(&self, caller: ProgramCounter) -> impl Iterator<Item = &CallEdge> {
        self.edges.iter().filter(move |e| e.caller == caller)
    }

    /// Direct callers of `callee`.
    pub fn callers(&self, callee: ProgramCounter) -> impl Iterator<Item = &CallEdge> {
        self.edges.iter().filter(move |e| e.callee == callee)
    }
}
