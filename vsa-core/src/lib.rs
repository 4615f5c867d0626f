//! Value-set analysis engine for 32-bit x86 binaries.
//!
//! The modules below build on each other in turn: a persistent
//! interval-augmented map, the strided-interval numeric domain, the
//! value-set domain built on top of it, the region memory abstraction, the
//! abstract state, and the WTO-driven interprocedural interpreter that ties
//! them together.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

static_assertions::const_assert!(vsa_types::GLOBAL_REGION < vsa_types::REGISTER_REGION);
static_assertions::const_assert!(vsa_types::REGISTER_REGION < vsa_types::STACK_REGION);
static_assertions::const_assert!(vsa_types::STACK_REGION < vsa_types::FIRST_HEAP_REGION);

pub mod context;
pub mod error;
pub mod interp;
pub mod interval;
pub mod pmap;
pub mod region;
pub mod state;
pub mod test_support;
pub mod valueset;

pub use context::{Context, ContextMode};
pub use error::{AnalysisError, Bug};
pub use interp::{analyze, AnalysisOutcome, InterpConfig, Warning};
pub use interval::StridedInterval;
pub use region::{Region, RegionKind, Strength, WarningKind};
pub use state::State;
pub use valueset::ValueSet;
