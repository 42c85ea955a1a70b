//! The attribute-based encryption seam.
//!
//! Attribute-based encryption itself is an external collaborator; this crate
//! only fixes its contract. A scheme wraps small payloads (file key
//! material, the trapdoor key) under a boolean policy over attributes, and
//! unwrapping succeeds exactly when the holder's attributes satisfy that
//! policy. Everything else (the pairing construction, key sizes, ciphertext
//! shape) is the implementation's business; ciphertexts cross this boundary
//! as opaque bytes.
use rand::{CryptoRng, Rng};

use crate::error::Result;

/// Contract for a ciphertext-policy attribute-based scheme.
///
/// `decrypt` must return [`Error::KeyUnwrapFailure`][crate::Error] when the
/// user key's attributes do not satisfy the ciphertext's policy, and may
/// return it for any other unwrap defect; it must never yield the payload in
/// that case (fail-closed).
pub trait AbeScheme {
    /// Master public key, shared with every party.
    type MasterPublic: Clone;
    /// Master secret key, held by the trusted authority only.
    type MasterSecret;
    /// A user's attribute secret key.
    type UserKey;

    /// Generate the master keypair.
    fn setup<R: Rng + CryptoRng>(&self, rng: R) -> (Self::MasterPublic, Self::MasterSecret);

    /// Generate a user key for the given attribute set.
    fn keygen<R: Rng + CryptoRng>(
        &self,
        rng: R,
        master_public: &Self::MasterPublic,
        master_secret: &Self::MasterSecret,
        attributes: &[String],
    ) -> Self::UserKey;

    /// Wrap a payload under a boolean access policy.
    fn encrypt<R: Rng + CryptoRng>(
        &self,
        rng: R,
        master_public: &Self::MasterPublic,
        policy: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>>;

    /// Unwrap a payload; fails when the key's attributes do not satisfy the
    /// policy the payload was wrapped under.
    fn decrypt(
        &self,
        master_public: &Self::MasterPublic,
        user_key: &Self::UserKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>>;
}
