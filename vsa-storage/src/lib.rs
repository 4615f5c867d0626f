//! Persistence for the value-set analyzer: the on-disk envelope `Prog`/
//! warning bundles are serialized into, and the warning sink the
//! interpreter accumulates analysis warnings into.

mod envelope;
mod error;
mod warnings;

pub use envelope::{decode, encode};
pub use error::StorageError;
pub use warnings::{WarningKind, WarningRecord, WarningSink};
