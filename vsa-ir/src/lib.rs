//! Program representation handed to the analyzer by its external collaborators.
//!
//! Everything in this crate is data, not logic: the loader, the
//! disassembler/IR lifter, and the CFG/call-graph builder are explicitly out
//! of scope for this repository (see the analyzer's design notes). This
//! crate only fixes the shape of what they hand over so `vsa-core` has a
//! stable interface to program against.

#![forbid(unsafe_code)]

pub mod callgraph;
pub mod cfg;
pub mod expr;
pub mod module;
pub mod program;
pub mod registers;
pub mod stmt;
pub mod trace;
pub mod wto;

pub use callgraph::CallGraph;
pub use cfg::{BasicBlock, BasicBlockId, Cfg, Edge, EdgeKind};
pub use expr::{BinOp, CastKind, Expr, UnOp};
pub use module::{Module, Section, SectionFlags};
pub use program::{Function, Prog};
pub use registers::{RegisterEntry, RegisterTable};
pub use stmt::Stmt;
pub use trace::TraceRecord;
pub use wto::{Wto, WtoComponent};
