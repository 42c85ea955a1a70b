//! Attribute pseudonym certificates.
//!
//! The trusted authority pseudonymizes a user's attributes and signs the
//! ordered pseudonym list with ECDSA (P-256, SHA-256). The server verifies
//! the signature against the authority's public key and only then trusts
//! the pseudonyms for policy evaluation. The signed payload is the
//! MessagePack encoding of the pseudonym list, so verification is a pure
//! recompute-and-check; any mismatch, including transport corruption, is
//! [`Error::CertificateInvalid`].
use std::collections::BTreeSet;

use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    policy::{pseudonymize_attribute, PseudoKey},
    ByteAccess,
};

/// A signed, ordered list of attribute pseudonyms. Immutable after issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeCertificate {
    pub pseudo_attributes: Vec<String>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl ByteAccess for AttributeCertificate {
    fn bytes(&self) -> Vec<u8> {
        self.signature.clone()
    }
}

fn signed_payload(pseudo_attributes: &[String]) -> Result<Vec<u8>> {
    // The signed bytes are the plain MessagePack list encoding, not a map.
    rmp_serde::to_vec(&pseudo_attributes).map_err(|_| Error::MalformedRecord)
}

/// Issue a certificate over the given real attributes.
pub fn issue(
    pseudo_key: &PseudoKey,
    signing_key: &SigningKey,
    attributes: &[String],
) -> Result<AttributeCertificate> {
    let pseudo_attributes: Vec<String> = attributes
        .iter()
        .map(|attribute| pseudonymize_attribute(pseudo_key, attribute))
        .collect();
    let payload = signed_payload(&pseudo_attributes)?;
    let signature: Signature = signing_key.sign(&payload);
    Ok(AttributeCertificate {
        pseudo_attributes,
        signature: signature.to_vec(),
    })
}

/// Verify a certificate and, on success, hand back the certified pseudonym
/// set. Fail-closed: every defect maps to [`Error::CertificateInvalid`].
pub fn verify(
    certificate: &AttributeCertificate,
    verifying_key: &VerifyingKey,
) -> Result<BTreeSet<String>> {
    let payload =
        signed_payload(&certificate.pseudo_attributes).map_err(|_| Error::CertificateInvalid)?;
    let signature = Signature::from_slice(&certificate.signature)
        .map_err(|_| Error::CertificateInvalid)?;
    verifying_key
        .verify(&payload, &signature)
        .map_err(|_| Error::CertificateInvalid)?;
    Ok(certificate.pseudo_attributes.iter().cloned().collect())
}
