//! Privacy-preserving wildcard searchable encryption with attribute-based
//! access control.
//!
//! # ⚠️ Warning: Cryptographic Hazmat ☣️
//!
//! This crate is made for playing around with searchable encryption and for
//! prototyping of protocols built on it. It has *not* been audited, it is
//! *not* battle tested, and *nobody* claims it to be secure.
//!
//! Use it at **your own risk** and if you know what you are doing!
//!
//! # Introduction
//!
//! Four parties cooperate so that an untrusted server can answer keyword
//! queries over encrypted records and enforce per-record access policies
//! while learning neither the keywords nor the attributes involved:
//!
//! * a **data owner** derives keyed trapdoor tokens from its keywords and
//!   builds a searchable trie index over them, encrypts each record under a
//!   boolean access policy, and stores the pseudonymized policy next to the
//!   ciphertext;
//! * a **data user** obtains the trapdoor key through an attribute-based
//!   channel and a signed pseudonym certificate from the authority, then
//!   queries with exact keywords or glob patterns (`*`, `?`);
//! * the **cloud server** verifies the certificate, walks the index over
//!   opaque tokens, and evaluates pseudo-policies against certified
//!   pseudonyms; everything it sees is keyed-hash output;
//! * the **trusted authority** issues attribute keys, the pseudonymization
//!   key, and ECDSA-signed attribute certificates.
//!
//! # Crate Structure
//!
//! The building blocks live in their own modules: [`trapdoor`] (token
//! derivation), [`iwt`] (the index wildcard tree with its [`bloom`] filter
//! and budgeted glob search), [`policy`] (pseudonymization and the closed
//! boolean grammar), [`cert`] (certificate issuance and verification),
//! [`mac`] (the aggregatable homomorphic MAC), [`symmetric`] and
//! [`envelope`] (payload and transport encryption), and [`record`] (the
//! MessagePack wire layouts). The [`protocol`] module assembles them into
//! the four actors.
//!
//! Attribute-based encryption itself is deliberately a seam: the [`abe`]
//! module fixes the contract ([`abe::AbeScheme`]) and nothing more, so any
//! CP-ABE implementation can be plugged in.
//!
//! The pairing-based pieces are implemented on top of
//! [`bls12_381_plus`](https://crates.io/crates/bls12_381_plus), as it
//! provides good `serde` support and access to the internals of the group
//! elements.
pub mod abe;
pub mod bloom;
pub mod cert;
pub mod envelope;
pub mod error;
pub mod iwt;
pub mod mac;
pub mod policy;
pub mod protocol;
pub mod record;
pub mod symmetric;
pub mod trapdoor;

pub use error::{Error, Result};

/// A trait to provide byte-level access to objects.
pub trait ByteAccess {
    /// Provides access to the bytes.
    ///
    /// Unlike [`AsRef`], there are no statements made about the performance
    /// of this operation. This operation will allocate a fresh vector, and
    /// the byte representation may or may not have to be computed first.
    fn bytes(&self) -> Vec<u8>;

    /// Provide a short fingerprint of the bytes.
    ///
    /// This can be used to "summarize" long keys when displaying them, to
    /// still provide distinguishing features but to not print out the whole
    /// key.
    ///
    /// By default, this method uses the first 16 bytes of the
    /// [`ByteAccess::bytes`] representation, and formats them as a hex
    /// string.
    fn fingerprint(&self) -> String {
        hex::encode(&self.bytes()[..16])
    }
}
