//! The data user: queries the server and decrypts authorized records.
use crate::{
    abe::AbeScheme,
    error::{Error, Result},
    mac::{hash_to_scalar, MacKey, Tag},
    record::{self, FileRecord, KeyBundle},
    symmetric,
    trapdoor::{self, PatternToken, TrapdoorKey},
};

/// Holds an attribute secret key and, once unwrapped, the trapdoor key.
pub struct DataUser<A: AbeScheme> {
    abe: A,
    master_public: A::MasterPublic,
    user_key: A::UserKey,
    trapdoor_key: Option<TrapdoorKey>,
}

impl<A: AbeScheme> DataUser<A> {
    pub fn new(abe: A, master_public: A::MasterPublic, user_key: A::UserKey) -> Self {
        DataUser { abe, master_public, user_key, trapdoor_key: None }
    }

    /// Unwrap the owner's trapdoor key from its attribute-based wrapping.
    ///
    /// Succeeds only when this user's attributes satisfy the distribution
    /// policy the owner wrapped the key under.
    pub fn unwrap_trapdoor_key(&mut self, wrapped: &[u8]) -> Result<()> {
        let bytes = self.abe.decrypt(&self.master_public, &self.user_key, wrapped)?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| Error::KeyUnwrapFailure)?;
        self.trapdoor_key = Some(TrapdoorKey::from_bytes(bytes));
        Ok(())
    }

    /// Derive query trapdoor sequences for a batch of patterns.
    ///
    /// Patterns may contain the glob markers `*` and `?`; the plaintext of
    /// every other position leaves this machine only as a keyed hash.
    pub fn query(&self, patterns: &[&str]) -> Result<Vec<Vec<PatternToken>>> {
        let key = self.trapdoor_key.as_ref().ok_or(Error::TrapdoorKeyMissing)?;
        patterns
            .iter()
            .map(|pattern| trapdoor::derive_pattern(key, pattern))
            .collect()
    }

    /// Decrypt a stored record fetched from the server.
    ///
    /// Walks the full fail-closed ladder: decode the record, unwrap the key
    /// material (attributes must satisfy the file's policy), check the
    /// homomorphic tag over the key bundle, then decrypt the payload. Each
    /// failure mode keeps its own error so callers can tell a policy
    /// rejection from a corrupted record.
    pub fn decrypt_record(&self, record_bytes: &[u8]) -> Result<Vec<u8>> {
        let record: FileRecord = record::decode(record_bytes)?;
        let bundle: KeyBundle = record::decode(&record.ctk)?;

        let key_material = self.abe.decrypt(
            &self.master_public,
            &self.user_key,
            &bundle.encrypted_key_bytes,
        )?;
        let key_material: [u8; 32] =
            key_material.try_into().map_err(|_| Error::KeyUnwrapFailure)?;
        let (encrypting_key, mac_scalar) = symmetric::derive_keys(&key_material);

        let tag: Tag = record::decode(&record.mac)?;
        if !MacKey::from_scalar(mac_scalar).verify(hash_to_scalar(&record.ctk), &tag) {
            return Err(Error::PaddingOrMacFailure);
        }

        symmetric::sym_decrypt(&encrypting_key, &bundle.ciphertext, &bundle.iv)
    }
}
