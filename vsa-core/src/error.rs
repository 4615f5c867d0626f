//! Error taxonomy.
//!
//! Analysis warnings (out-of-bounds access, unresolved calls, ...) are not
//! modeled here: they are accumulated into a `vsa_storage::WarningSink`, not
//! returned as `Err`. Precision losses (overflow, alignment/stride
//! mismatches) are silently promoted to TOP by the domain operators and only
//! observable via `tracing::trace!`. What remains are the two fatal/
//! recoverable categories below.

use vsa_types::ProgramCounter;

/// A programming error: a lattice or persistent-structure invariant was
/// violated. These are fatal — callers are expected to `panic!` with the
/// formatted payload rather than try to recover.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Bug {
    #[error("inverted strided interval bounds: lo={lo} hi={hi} (lo must be <= hi)")]
    InvertedInterval { lo: i64, hi: i64 },
    #[error("zero stride on a non-constant strided interval: lo={lo} hi={hi}")]
    ZeroStrideOnRange { lo: i64, hi: i64 },
    #[error("persistent tree structural invariant broken: {detail}")]
    TreeInvariant { detail: String },
    #[error("hash mismatch during hash-cons cache lookup for {what}")]
    HashMismatch { what: String },
    #[error("blacklisted function at {address:#x} was not actually intercepted")]
    BlacklistedCallNotIntercepted { address: ProgramCounter },
}

/// A recoverable interpreter error: something about the external input
/// (the CFG, call graph, or CLI arguments) made analysis impossible to
/// start or continue, but no lattice invariant was broken.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("entry function not found: {0}")]
    EntryFunctionNotFound(String),
    #[error("function at {address:#x} has no basic block {block:?}")]
    DanglingCfgEdge { address: ProgramCounter, block: String },
    #[error("function at {0:#x} has an empty CFG")]
    EmptyCfg(ProgramCounter),
    #[error("call stack depth exceeded the configured limit of {0}")]
    CallStackOverflow(usize),
}

pub type Result<T> = core::result::Result<T, AnalysisError>;
