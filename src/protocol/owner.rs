//! The data owner: indexes keywords and encrypts records.
use rand::{CryptoRng, Rng};

use crate::{
    abe::AbeScheme,
    bloom::BloomParams,
    error::Result,
    iwt::IndexWildcardTree,
    mac::{hash_to_scalar, MacKey},
    policy::{self, PseudoKey},
    record::{self, FileRecord, KeyBundle},
    symmetric,
    trapdoor::{self, TrapdoorKey},
};

/// Owns the trapdoor key and the search index under construction.
///
/// The owner never shares the live index: the server receives a serialized
/// snapshot via [`DataOwner::export_index`].
pub struct DataOwner<A: AbeScheme> {
    abe: A,
    master_public: A::MasterPublic,
    trapdoor_key: TrapdoorKey,
    pseudo_key: PseudoKey,
    index: IndexWildcardTree,
}

impl<A: AbeScheme> DataOwner<A> {
    pub fn new<R: Rng + CryptoRng>(
        abe: A,
        master_public: A::MasterPublic,
        pseudo_key: PseudoKey,
        bloom_params: BloomParams,
        rng: R,
    ) -> Self {
        DataOwner {
            abe,
            master_public,
            trapdoor_key: TrapdoorKey::generate(rng),
            pseudo_key,
            index: IndexWildcardTree::new(bloom_params),
        }
    }

    /// Derive the keyword's trapdoor sequence and insert it into the index.
    pub fn index_keyword(&mut self, keyword: &str, file_ref: &str) -> Result<()> {
        let tokens = trapdoor::derive(&self.trapdoor_key, keyword)?;
        self.index.insert(&tokens, file_ref)
    }

    /// Encrypt a payload into a stored file record.
    ///
    /// Fresh key material is split into an AES key and a MAC scalar; the
    /// material itself is wrapped under `access_policy` by the
    /// attribute-based scheme. The homomorphic tag covers the serialized key
    /// bundle, and the record carries the pseudonymized policy for the
    /// server to evaluate.
    pub fn encrypt_record<R: Rng + CryptoRng>(
        &self,
        mut rng: R,
        plaintext: &[u8],
        access_policy: &str,
    ) -> Result<Vec<u8>> {
        let key_material: [u8; 32] = rng.gen();
        let (encrypting_key, mac_scalar) = symmetric::derive_keys(&key_material);

        let (ciphertext, iv) = symmetric::sym_encrypt(&mut rng, &encrypting_key, plaintext);
        let encrypted_key_bytes =
            self.abe
                .encrypt(&mut rng, &self.master_public, access_policy, &key_material)?;
        let ctk = record::encode(&KeyBundle {
            encrypted_key_bytes,
            ciphertext,
            iv: iv.to_vec(),
        })?;

        let tag = MacKey::from_scalar(mac_scalar).sign(hash_to_scalar(&ctk));
        let record = FileRecord {
            ctk,
            mac: record::encode(&tag)?,
            pseudo_policy: policy::rewrite_policy(&self.pseudo_key, access_policy),
        };
        record::encode(&record)
    }

    /// Wrap the trapdoor key under the given distribution policy, usually a
    /// broad "(global)" policy that every enrolled user satisfies.
    pub fn wrap_trapdoor_key<R: Rng + CryptoRng>(
        &self,
        rng: R,
        distribution_policy: &str,
    ) -> Result<Vec<u8>> {
        self.abe.encrypt(
            rng,
            &self.master_public,
            distribution_policy,
            self.trapdoor_key.as_bytes(),
        )
    }

    /// Serialize the index for transfer to the server.
    pub fn export_index(&self) -> Result<Vec<u8>> {
        self.index.export_snapshot()
    }
}
