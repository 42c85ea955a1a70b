//! Confidential envelope for shipping certificates to the server.
//!
//! An ECIES-style construction: an ephemeral P-256 key agrees with the
//! recipient's static key, the shared secret runs through HKDF-SHA256 under
//! a fixed context label, and the derived key encrypts the payload with
//! AES-256-CBC. The envelope carries the ephemeral public key, ciphertext
//! and IV; opening with anything but the right static key fails closed.
use hkdf::Hkdf;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{ecdh::EphemeralSecret, PublicKey, SecretKey};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, Result},
    symmetric,
};

/// Domain-separation label for the envelope KDF.
const HKDF_CONTEXT: &[u8] = b"wildse certificate envelope v1";

/// A sealed payload addressed to one static P-256 key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// SEC1-encoded ephemeral public key.
    #[serde(with = "serde_bytes")]
    pub eph_pub: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub iv: Vec<u8>,
}

fn derive_envelope_key(shared_secret: &[u8]) -> [u8; 32] {
    let kdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0; 32];
    kdf.expand(HKDF_CONTEXT, &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Generate a static recipient keypair.
pub fn generate_keypair<R: Rng + CryptoRng>(mut rng: R) -> (SecretKey, PublicKey) {
    let secret = SecretKey::random(&mut rng);
    let public = secret.public_key();
    (secret, public)
}

/// Seal a payload for the recipient.
pub fn seal<R: Rng + CryptoRng>(
    mut rng: R,
    recipient: &PublicKey,
    plaintext: &[u8],
) -> Envelope {
    let ephemeral = EphemeralSecret::random(&mut rng);
    let eph_pub = ephemeral.public_key();
    let shared = ephemeral.diffie_hellman(recipient);
    let key = derive_envelope_key(shared.raw_secret_bytes());
    let (ciphertext, iv) = symmetric::sym_encrypt(&mut rng, &key, plaintext);
    Envelope {
        eph_pub: eph_pub.to_encoded_point(true).as_bytes().to_vec(),
        ciphertext,
        iv: iv.to_vec(),
    }
}

/// Open an envelope with the recipient's static secret.
pub fn open(secret: &SecretKey, envelope: &Envelope) -> Result<Vec<u8>> {
    let eph_pub = PublicKey::from_sec1_bytes(&envelope.eph_pub)
        .map_err(|_| Error::MalformedRecord)?;
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), eph_pub.as_affine());
    let key = derive_envelope_key(shared.raw_secret_bytes());
    symmetric::sym_decrypt(&key, &envelope.ciphertext, &envelope.iv)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn rng() -> ChaChaRng {
        ChaChaRng::from_seed([33; 32])
    }

    #[test]
    fn seal_open_round_trip() {
        let mut rng = rng();
        let (secret, public) = generate_keypair(&mut rng);
        let envelope = seal(&mut rng, &public, b"certificate bytes");
        assert_eq!(open(&secret, &envelope).unwrap(), b"certificate bytes");
    }

    #[test]
    fn wrong_recipient_fails_closed() {
        let mut rng = rng();
        let (_, public) = generate_keypair(&mut rng);
        let (other_secret, _) = generate_keypair(&mut rng);
        let envelope = seal(&mut rng, &public, b"certificate bytes");
        assert!(matches!(
            open(&other_secret, &envelope),
            Err(Error::PaddingOrMacFailure)
        ));
    }

    #[test]
    fn corrupt_ephemeral_key_is_malformed() {
        let mut rng = rng();
        let (secret, public) = generate_keypair(&mut rng);
        let mut envelope = seal(&mut rng, &public, b"certificate bytes");
        envelope.eph_pub.truncate(3);
        assert!(matches!(
            open(&secret, &envelope),
            Err(Error::MalformedRecord)
        ));
    }

    #[test]
    fn envelope_encoding_round_trips() {
        let mut rng = rng();
        let (secret, public) = generate_keypair(&mut rng);
        let envelope = seal(&mut rng, &public, b"payload");
        let bytes = crate::record::encode(&envelope).unwrap();
        let restored: Envelope = crate::record::decode(&bytes).unwrap();
        assert_eq!(open(&secret, &restored).unwrap(), b"payload");
    }
}
