//! Control-flow graphs, as supplied by the CFG builder.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use crate::stmt::Instruction;
use vsa_types::ProgramCounter;

/// Identifies a basic block within a single [`Cfg`]. Stable for the lifetime
/// of the `Cfg` it indexes into, never across CFGs.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicBlockId(pub u32);

/// A maximal straight-line run of instructions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BasicBlockId,
    pub address: ProgramCounter,
    pub instructions: Vec<Instruction>,
}

/// The reason a CFG edge exists. The interpreter does not currently refine
/// by branch condition; the kind is still carried so a future
/// restricted-widening pass can use it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Unconditional fallthrough or `jmp`.
    Fallthrough,
    /// The `cjmp` edge taken when its condition is true.
    True,
    /// The `cjmp` edge taken when its condition is false.
    False,
    /// A back-edge closing a loop, inserted/marked by CFG preprocessing. The
    /// WTO's SCC-header detection relies on these being flagged explicitly
    /// rather than re-derived by the interpreter.
    Back,
}

/// A directed edge between two basic blocks of the same [`Cfg`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: BasicBlockId,
    pub to: BasicBlockId,
    pub kind: EdgeKind,
}

/// A function's control-flow graph: self-loops already removed by CFG
/// preprocessing, with dummy predecessors inserted in their place.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cfg {
    pub entry: BasicBlockId,
    pub blocks: Vec<BasicBlock>,
    pub edges: Vec<Edge>,
}

impl Cfg {
    pub fn block(&self, id: BasicBlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Outgoing edges from `id`, in the order the builder produced them —
    /// the interpreter relies on this order being deterministic.
    pub fn successors(&self, id: BasicBlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn predecessors(&self, id: BasicBlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Exit blocks: those with no outgoing edges. The final analysis state is
    /// the join of the post-states at these blocks.
    pub fn exits(&self) -> impl Iterator<Item = BasicBlockId> + '_ {
        self.blocks
            .iter()
            .map(|b| b.id)
            .filter(move |id| self.successors(*id).next().is_none())
    }
}
