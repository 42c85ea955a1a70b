//! Homomorphic aggregatable MAC for batch integrity verification.
//!
//! Tags live in G1 of BLS12-381 and are bound to an integer-encoded message
//! `m` and a secret scalar `sk`: `tag = g * (m * sk)`. Tags produced under
//! one key aggregate by the group operation, and a single pairing check
//! validates the whole batch against the *sum* of the messages:
//!
//! ```text
//! e(aggregate, h) == e(g, vk) * sum    with vk = h * sk
//! ```
//!
//! This authenticates the sum, not the individual messages; any message set
//! with the same sum verifies. That is the intended algebraic property of
//! the scheme (one pairing for many tags), not a defect.
//!
//! `g` and `h` are pinned to the standard group generators so that any party
//! holding the derived MAC scalar can recompute the same key; per-key random
//! generators would make a tag unverifiable for everyone but its creator.
use std::fmt::{self, Debug};

use bls12_381_plus::{
    ff::Field, group::Group, pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar,
};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ByteAccess;

/// Hash arbitrary bytes to a scalar message, via SHA-256 into the field's
/// okm mapping.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
    let mut wide = [0; 48];
    wide[..32].copy_from_slice(&Sha256::digest(data));
    Scalar::from_okm(&wide)
}

/// An authentication tag: a single G1 element.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(G1Affine);

impl ByteAccess for Tag {
    fn bytes(&self) -> Vec<u8> {
        self.0.to_compressed().to_vec()
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tag").field(&self.fingerprint()).finish()
    }
}

/// The secret signing side of the MAC.
#[derive(Clone, PartialEq, Eq)]
pub struct MacKey {
    g: G1Projective,
    h: G2Projective,
    sk: Scalar,
    vk: G2Projective,
}

impl Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The secret scalar stays out of the output.
        f.debug_struct("MacKey").finish_non_exhaustive()
    }
}

impl MacKey {
    /// Key from a fresh random scalar.
    pub fn new<R: Rng + CryptoRng>(mut rng: R) -> Self {
        Self::from_scalar(Scalar::random(&mut rng))
    }

    /// Key from an already-derived scalar, e.g. the MAC half of a file's key
    /// material. Both the tagging and the verifying party derive the same
    /// key this way.
    pub fn from_scalar(sk: Scalar) -> Self {
        let g = G1Projective::generator();
        let h = G2Projective::generator();
        MacKey { g, h, sk, vk: h * sk }
    }

    /// Tag an integer-encoded message.
    pub fn sign(&self, message: Scalar) -> Tag {
        Tag((self.g * (message * self.sk)).into())
    }

    /// The public verification side of this key.
    pub fn verification_key(&self) -> VerificationKey {
        VerificationKey { vk: self.vk.into() }
    }

    /// Shorthand for a single-message check with the holder's own key.
    pub fn verify(&self, message: Scalar, tag: &Tag) -> bool {
        self.verification_key().verify(message, tag)
    }
}

/// The public verification side of the MAC: `vk = h * sk`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    vk: G2Affine,
}

impl Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VerificationKey")
            .field(&self.fingerprint())
            .finish()
    }
}

impl ByteAccess for VerificationKey {
    fn bytes(&self) -> Vec<u8> {
        self.vk.to_compressed().to_vec()
    }
}

impl VerificationKey {
    /// Check an (aggregate) tag against the sum of the tagged messages.
    pub fn verify(&self, message_sum: Scalar, tag: &Tag) -> bool {
        let left = pairing(&tag.0, &G2Affine::generator());
        let right = pairing(&G1Affine::generator(), &self.vk) * message_sum;
        left == right
    }
}

/// Combine tags produced under one key into a single tag.
///
/// Aggregating tags from different keys produces garbage that will not
/// verify; the scheme offers no cross-key semantics.
pub fn aggregate(tags: &[Tag]) -> Tag {
    Tag(tags
        .iter()
        .map(|tag| G1Projective::from(tag.0))
        .sum::<G1Projective>()
        .into())
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn rng() -> ChaChaRng {
        ChaChaRng::from_seed([3; 32])
    }

    #[test]
    fn single_tag_verifies() {
        let key = MacKey::new(rng());
        let message = hash_to_scalar(b"ciphertext bundle");
        let tag = key.sign(message);
        assert!(key.verify(message, &tag));
        assert!(!key.verify(message + Scalar::ONE, &tag));
    }

    #[test]
    fn aggregate_verifies_against_message_sum() {
        let key = MacKey::new(rng());
        let messages = [
            hash_to_scalar(b"one"),
            hash_to_scalar(b"two"),
            hash_to_scalar(b"three"),
        ];
        let tags: Vec<Tag> = messages.iter().map(|m| key.sign(*m)).collect();
        let sum = messages.iter().fold(Scalar::ZERO, |acc, m| acc + m);
        let aggregated = aggregate(&tags);
        assert!(key.verify(sum, &aggregated));
        assert!(!key.verify(sum + Scalar::ONE, &aggregated));
    }

    #[test]
    fn wrong_key_rejects() {
        let key = MacKey::new(rng());
        let other = MacKey::new(ChaChaRng::from_seed([4; 32]));
        let message = hash_to_scalar(b"payload");
        let tag = key.sign(message);
        assert!(!other.verify(message, &tag));
    }

    #[test]
    fn derived_keys_agree() {
        let scalar = hash_to_scalar(b"second half of the key material");
        let signer = MacKey::from_scalar(scalar);
        let verifier = MacKey::from_scalar(scalar);
        let message = hash_to_scalar(b"bundle");
        assert!(verifier.verify(message, &signer.sign(message)));
    }

    #[test]
    fn tag_serialization_round_trips() {
        let key = MacKey::new(rng());
        let tag = key.sign(hash_to_scalar(b"bundle"));
        let bytes = rmp_serde::to_vec_named(&tag).unwrap();
        let restored: Tag = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(tag, restored);
    }
}
