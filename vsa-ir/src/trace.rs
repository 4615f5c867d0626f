//! Optional execution-trace replay format: a sequence of `(address, size)`
//! records.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vsa_types::ProgramCounter;

/// One recorded instruction execution: the address it ran at and the
/// instruction's byte length, used by the CLI's trace-guided replay mode to
/// cross-check the interpreter's block order against a concrete run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    pub address: ProgramCounter,
    pub size: u32,
}
