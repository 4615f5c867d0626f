/// Errors from persistence operations. `anyhow` is deliberately not a
/// dependency here: every fallible path is one of the variants below, so an
/// open-ended `anyhow::Error` catch-all has nothing left to carry.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// (De)serialization of the envelope payload failed.
    #[error("error performing serialization or deserialization: {0}")]
    Codec(#[from] bincode::Error),
    /// The zstd block (de)compressor failed.
    #[error("error (de)compressing storage envelope: {0}")]
    Compression(#[source] std::io::Error),
    /// The envelope header's magic bytes did not match.
    #[error("not a valid storage envelope (bad magic)")]
    BadMagic,
}

impl PartialEq for StorageError {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}
