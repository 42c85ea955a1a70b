//! Persisted record layouts.
//!
//! Everything that crosses a party boundary is encoded as a MessagePack
//! *map* (named fields, binary values), so any MessagePack implementation
//! can read the records back. Field names and nesting follow the protocol:
//! a [`KeyBundle`] holds the wrapped key next to the ciphertext, and a
//! [`FileRecord`] wraps the serialized bundle together with its integrity
//! tag and the pseudonymized access policy.
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Error, Result};

/// The encrypted key/payload bundle: `ctk` in the wire layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBundle {
    /// The file's key material, wrapped by the attribute-based scheme.
    #[serde(with = "serde_bytes")]
    pub encrypted_key_bytes: Vec<u8>,
    /// AES-CBC ciphertext of the payload.
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub iv: Vec<u8>,
}

/// A stored file record: the serialized [`KeyBundle`], its homomorphic MAC
/// tag, and the pseudo-policy the server evaluates at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(with = "serde_bytes")]
    pub ctk: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub mac: Vec<u8>,
    pub pseudo_policy: String,
}

/// Encode a record as a named MessagePack map.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(value).map_err(|_| Error::MalformedRecord)
}

/// Decode a record; any encoding defect is [`Error::MalformedRecord`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|_| Error::MalformedRecord)
}
