//! The trusted authority: root of keys and certificates.
use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::{CryptoRng, Rng};

use crate::{
    abe::AbeScheme,
    cert::{self, AttributeCertificate},
    error::Result,
    policy::PseudoKey,
};

/// Holds the attribute-based master keys, the pseudonymization key and the
/// certificate signing key.
///
/// The pseudo-key is handed to the data owner only (so it can rewrite
/// policies); users never see it, they only receive its certified output.
pub struct TrustedAuthority<A: AbeScheme> {
    abe: A,
    master_public: A::MasterPublic,
    master_secret: A::MasterSecret,
    pseudo_key: PseudoKey,
    signing_key: SigningKey,
}

impl<A: AbeScheme> TrustedAuthority<A> {
    /// Set the authority up with fresh keys.
    pub fn new<R: Rng + CryptoRng>(abe: A, mut rng: R) -> Self {
        let (master_public, master_secret) = abe.setup(&mut rng);
        let pseudo_key = PseudoKey::generate(&mut rng);
        let signing_key = SigningKey::random(&mut rng);
        TrustedAuthority {
            abe,
            master_public,
            master_secret,
            pseudo_key,
            signing_key,
        }
    }

    /// The attribute-based master public key, shared with every party.
    pub fn master_public(&self) -> &A::MasterPublic {
        &self.master_public
    }

    /// The certificate verification key, shared with the server and users.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey::from(&self.signing_key)
    }

    /// The pseudonymization key. Owner-only handoff, assumed to happen over
    /// a secure channel.
    pub fn pseudo_key(&self) -> &PseudoKey {
        &self.pseudo_key
    }

    /// Generate a user's attribute secret key.
    pub fn user_key<R: Rng + CryptoRng>(&self, rng: R, attributes: &[String]) -> A::UserKey {
        self.abe
            .keygen(rng, &self.master_public, &self.master_secret, attributes)
    }

    /// Issue a signed pseudonym certificate over the user's attributes.
    pub fn issue_certificate(&self, attributes: &[String]) -> Result<AttributeCertificate> {
        cert::issue(&self.pseudo_key, &self.signing_key, attributes)
    }
}
