//! Symmetric payload encryption and the file key-material split.
//!
//! Payloads are encrypted with AES-256 in CBC mode with PKCS7 padding; the
//! IV travels alongside the ciphertext in the persisted record. Decryption
//! failures (bad padding, wrong key) surface as
//! [`Error::PaddingOrMacFailure`], deliberately distinguishable from an
//! attribute-based key-unwrap rejection.
//!
//! Every file gets 32 bytes of fresh key material, which is split into two
//! independent keys: SHA-256 of the first half becomes the AES key, and the
//! second half is hashed to a scalar for the homomorphic MAC.
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use bls12_381_plus::Scalar;
use rand::{CryptoRng, Rng};
use sha2::{Digest, Sha256};

use crate::{
    error::{Error, Result},
    mac::hash_to_scalar,
};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt a payload under a 256-bit key with a fresh random IV.
pub fn sym_encrypt<R: Rng + CryptoRng>(
    mut rng: R,
    key: &[u8; 32],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; 16]) {
    let iv: [u8; 16] = rng.gen();
    let ciphertext =
        Aes256CbcEnc::new(&(*key).into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (ciphertext, iv)
}

/// Decrypt a payload. Fails closed on bad padding or a wrong key.
pub fn sym_decrypt(key: &[u8; 32], ciphertext: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    let iv: [u8; 16] = iv.try_into().map_err(|_| Error::MalformedRecord)?;
    Aes256CbcDec::new(&(*key).into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::PaddingOrMacFailure)
}

/// Split file key material into the encryption key and the MAC scalar.
///
/// Both the data owner (tagging) and the data user (checking) run this over
/// the same unwrapped material, so they agree on both keys.
pub fn derive_keys(key_material: &[u8; 32]) -> ([u8; 32], Scalar) {
    let encrypting_key: [u8; 32] = Sha256::digest(&key_material[..16]).into();
    let mac_scalar = hash_to_scalar(&key_material[16..]);
    (encrypting_key, mac_scalar)
}
