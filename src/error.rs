use thiserror::Error;

/// Errors produced by the scheme.
///
/// All cryptographic checks in this crate are fail-closed: any mismatch maps
/// to one of these variants and denies access, it never grants it.
#[derive(Debug, Error)]
pub enum Error {
    /// The attribute certificate's signature did not verify against the
    /// trusted authority's public key. Aborts the whole query batch.
    #[error("certificate signature verification failed")]
    CertificateInvalid,
    /// The attribute-based decryption of a wrapped key was rejected, i.e. the
    /// user's attributes do not satisfy the file's access policy.
    #[error("attribute key does not satisfy the access policy")]
    KeyUnwrapFailure,
    /// Symmetric decryption or an integrity tag check failed.
    #[error("padding or integrity check failed")]
    PaddingOrMacFailure,
    /// A policy string did not parse under the closed boolean grammar.
    #[error("malformed policy: {0}")]
    PolicyParse(String),
    /// Wildcard search exhausted its step budget or deadline.
    #[error("wildcard search exceeded its budget")]
    SearchBudgetExceeded,
    /// A persisted record or snapshot could not be decoded.
    #[error("malformed record encoding")]
    MalformedRecord,
    /// A keyword, pattern or token sequence was empty.
    #[error("keyword must not be empty")]
    EmptyKeyword,
    /// The user tried to derive query trapdoors before unwrapping the
    /// trapdoor key.
    #[error("trapdoor key has not been unwrapped yet")]
    TrapdoorKeyMissing,
}

pub type Result<V, E = Error> = std::result::Result<V, E>;
