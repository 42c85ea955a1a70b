//! The cloud server: certificate checks, index search, policy enforcement.
//!
//! The query pipeline runs `VerifyCertificate → ResolveQueries →
//! CombineResults → PolicyFilter` and returns only authorized file
//! references. The server holds the index behind a read-write lock: query
//! batches share read access, and an owner-initiated insert takes the write
//! lock so a concurrent search sees either none or all of a new word's
//! edges. It reads only record metadata (the stored pseudo-policy); payload
//! ciphertexts are never decrypted here.
use std::collections::{BTreeMap, BTreeSet};

use p256::ecdsa::VerifyingKey;
use p256::{PublicKey, SecretKey};
use parking_lot::RwLock;
use rand::{CryptoRng, Rng};

use crate::{
    cert::{self, AttributeCertificate},
    envelope::{self, Envelope},
    error::{Error, Result},
    iwt::{FileRef, IndexWildcardTree, SearchBudget},
    record::{self, FileRecord},
    trapdoor::{PatternToken, Token},
};

/// Per-server limits, applied to every query batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerConfig {
    /// Budget shared by all wildcard searches of one batch.
    pub budget: SearchBudget,
}

pub struct CloudServer {
    index: RwLock<IndexWildcardTree>,
    records: RwLock<BTreeMap<FileRef, Vec<u8>>>,
    ta_verifying_key: VerifyingKey,
    transport_secret: SecretKey,
    config: ServerConfig,
}

impl CloudServer {
    /// Build a server from an index snapshot and a record store.
    ///
    /// The snapshot boundary keeps owner and server from sharing a live
    /// index reference; a corrupt snapshot is rejected outright.
    pub fn new<R: Rng + CryptoRng>(
        rng: R,
        index_snapshot: &[u8],
        records: BTreeMap<FileRef, Vec<u8>>,
        ta_verifying_key: VerifyingKey,
        config: ServerConfig,
    ) -> Result<Self> {
        let index = IndexWildcardTree::import_snapshot(index_snapshot)?;
        let (transport_secret, _) = envelope::generate_keypair(rng);
        Ok(CloudServer {
            index: RwLock::new(index),
            records: RwLock::new(records),
            ta_verifying_key,
            transport_secret,
            config,
        })
    }

    /// The server's static key for confidential certificate transport.
    pub fn transport_key(&self) -> PublicKey {
        self.transport_secret.public_key()
    }

    /// Open a sealed certificate envelope addressed to this server.
    pub fn accept_sealed_certificate(&self, sealed: &Envelope) -> Result<AttributeCertificate> {
        let bytes = envelope::open(&self.transport_secret, sealed)?;
        record::decode(&bytes)
    }

    /// Store (or replace) a record under its file reference.
    pub fn store_record(&self, file_ref: &str, bytes: Vec<u8>) {
        self.records.write().insert(file_ref.to_owned(), bytes);
    }

    /// Fetch a stored record for delivery to a user.
    pub fn fetch_record(&self, file_ref: &str) -> Option<Vec<u8>> {
        self.records.read().get(file_ref).cloned()
    }

    /// Apply an incremental owner insert atomically with respect to
    /// concurrent searches.
    pub fn ingest_insert(&self, tokens: &[Token], file_ref: &str) -> Result<()> {
        self.index.write().insert(tokens, file_ref)
    }

    /// Answer a query batch.
    ///
    /// A failed certificate check aborts the whole batch with no partial
    /// results. Within one pattern the wildcard expansion unions its
    /// matches; across the distinct queries of the batch the sets
    /// intersect. Candidates then pass the policy filter: each file's
    /// stored pseudo-policy is evaluated against the certified pseudonym
    /// set, and a malformed policy denies that one file without failing
    /// the batch.
    pub fn process_batch(
        &self,
        queries: &[Vec<PatternToken>],
        certificate: &AttributeCertificate,
    ) -> Result<BTreeSet<FileRef>> {
        let pseudonyms = cert::verify(certificate, &self.ta_verifying_key)?;
        tracing::debug!(queries = queries.len(), "certificate verified");

        let mut meter = self.config.budget.meter();
        let mut combined: Option<BTreeSet<FileRef>> = None;
        {
            let index = self.index.read();
            for query in queries {
                let found = index.wildcard_search(query, &mut meter)?;
                combined = Some(match combined {
                    None => found,
                    Some(previous) => previous.intersection(&found).cloned().collect(),
                });
            }
        }
        let candidates = combined.unwrap_or_default();
        tracing::debug!(candidates = candidates.len(), "queries resolved");

        let records = self.records.read();
        let mut authorized = BTreeSet::new();
        for file_ref in candidates {
            let Some(bytes) = records.get(&file_ref) else {
                tracing::warn!(%file_ref, "candidate has no stored record, denying");
                continue;
            };
            let record: FileRecord = match record::decode(bytes) {
                Ok(record) => record,
                Err(_) => {
                    tracing::warn!(%file_ref, "stored record is malformed, denying");
                    continue;
                }
            };
            match crate::policy::evaluate(&record.pseudo_policy, &pseudonyms) {
                Ok(true) => {
                    authorized.insert(file_ref);
                }
                Ok(false) => {}
                Err(Error::PolicyParse(reason)) => {
                    tracing::warn!(%file_ref, reason, "stored pseudo-policy is malformed, denying");
                }
                Err(error) => return Err(error),
            }
        }
        tracing::debug!(authorized = authorized.len(), "policy filter done");
        Ok(authorized)
    }
}
