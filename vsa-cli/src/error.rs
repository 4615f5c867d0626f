//! Driver-level errors: everything that can go wrong before or around the
//! analysis proper, as opposed to inside it.

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("could not read {path}: {source}")]
    ReadInput { path: String, #[source] source: std::io::Error },
    #[error("could not write {path}: {source}")]
    WriteOutput { path: String, #[source] source: std::io::Error },
    #[error("(de)serializing program or warnings envelope failed: {0}")]
    Envelope(#[from] vsa_storage::StorageError),
    #[error("'{0}' is not a valid hex function address")]
    BadFunctionAddress(String),
    #[error(transparent)]
    Analysis(#[from] vsa_core::AnalysisError),
    #[error("analysis of function at {0:#x} timed out after {1}s")]
    Timeout(u32, u64),
}
