//! The on-disk envelope, self-describing whether a compressed variant is
//! present: a 4-byte magic, a 1-byte flags field (bit 0 = zstd-compressed),
//! followed by a `bincode`-encoded payload.

use crate::error::StorageError;
use serde::{de::DeserializeOwned, Serialize};

const MAGIC: [u8; 4] = *b"VSA1";
const FLAG_COMPRESSED: u8 = 0b0000_0001;

/// zstd compression level used for envelopes; chosen for fast round-trip at
/// the modest payload sizes (`Prog`, warning sets) this format carries.
const ZSTD_LEVEL: i32 = 3;

/// Serialize `value` into the self-describing envelope. `compress` controls
/// whether the payload is zstd-compressed before being wrapped.
pub fn encode<T: Serialize>(value: &T, compress: bool) -> Result<Vec<u8>, StorageError> {
    let payload = bincode::serialize(value)?;
    let (flags, body) = if compress {
        let compressed = zstd::stream::encode_all(&payload[..], ZSTD_LEVEL).map_err(StorageError::Compression)?;
        (FLAG_COMPRESSED, compressed)
    } else {
        (0, payload)
    };

    let mut out = Vec::with_capacity(MAGIC.len() + 1 + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(flags);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse and decode an envelope produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    if bytes.len() < MAGIC.len() + 1 || bytes[..MAGIC.len()] != MAGIC {
        return Err(StorageError::BadMagic);
    }
    let flags = bytes[MAGIC.len()];
    let body = &bytes[MAGIC.len() + 1..];

    let payload = if flags & FLAG_COMPRESSED != 0 {
        zstd::stream::decode_all(body).map_err(StorageError::Compression)?
    } else {
        body.to_vec()
    };

    bincode::deserialize(&payload).map_err(StorageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: Vec<String>,
    }

    #[test]
    fn round_trips_uncompressed() {
        let s = Sample { a: 7, b: vec!["x".into(), "y".into()] };
        let bytes = encode(&s, false).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn round_trips_compressed() {
        let s = Sample { a: 42, b: vec!["hello".repeat(100)] };
        let bytes = encode(&s, true).unwrap();
        let back: Sample = decode(&bytes).unwrap();
        assert_eq!(s, back);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = decode::<Sample>(b"nope").unwrap_err();
        assert_eq!(err, StorageError::BadMagic);
    }
}
