//! Analysis warnings.

use serde::{Deserialize, Serialize};
use vsa_types::ProgramCounter;

/// The taxonomy of non-fatal, accumulated analysis warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    OutOfBoundsRead,
    OutOfBoundsWrite,
    PossibleNullDeref,
    UninitializedRead,
    MisalignedAccess,
    UnboundedMallocSize,
    UnresolvedIndirectCall,
    WriteToTopAddress,
}

/// One warning: its kind, the instruction address it fired at, and the
/// backward slice of addresses that influenced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecord {
    pub kind: WarningKind,
    pub address: ProgramCounter,
    pub backward_slice: Vec<ProgramCounter>,
}

/// Accumulates warnings over the course of an analysis run, in emission
/// order, ready to be handed to [`crate::encode`] for `--warns` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningSink {
    records: Vec<WarningRecord>,
}

impl WarningSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, kind: WarningKind, address: ProgramCounter, backward_slice: Vec<ProgramCounter>) {
        self.records.push(WarningRecord { kind, address, backward_slice });
    }

    pub fn records(&self) -> &[WarningRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_emission_order() {
        let mut sink = WarningSink::new();
        sink.emit(WarningKind::MisalignedAccess, 0x1000, vec![0x0ff0]);
        sink.emit(WarningKind::UnresolvedIndirectCall, 0x1010, vec![]);
        let addrs: Vec<_> = sink.records().iter().map(|r| r.address).collect();
        assert_eq!(addrs, vec![0x1000, 0x1010]);
    }
}
