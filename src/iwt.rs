//! The index wildcard tree (IWT): a trie over trapdoor token sequences.
//!
//! The data owner inserts one token sequence per (keyword, file) pair; the
//! server later resolves exact and wildcard queries purely over tokens. A
//! token path exists from the root to a node iff some inserted word has that
//! exact token prefix, and file references appear only on end-of-word nodes.
//!
//! Two auxiliary structures ride along and are kept consistent on every
//! insert: an exact-match index keyed by a sequence's final token, and a
//! tree-level Bloom filter over final tokens. The filter is a fast negative
//! check for exact lookups only; authoritative answers always come from the
//! trie walk itself.
//!
//! Wildcard resolution uses an explicit work-list instead of recursion, and
//! charges every expansion against a [`SearchBudget`]: adversarial patterns
//! (long `*` runs in front of wide subtrees) are worst-case exponential, and
//! running out of budget is a reported failure, never a silent truncation.
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{
    bloom::{BloomFilter, BloomParams},
    error::{Error, Result},
    trapdoor::{PatternToken, Token},
};

/// Opaque reference to an encrypted file, as stored on the server.
pub type FileRef = String;

/// Resource limits for a wildcard search, or a whole batch of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBudget {
    /// Maximum number of work-list expansions.
    pub max_steps: u64,
    /// Optional wall-clock limit, measured from [`SearchBudget::meter`].
    pub time_limit: Option<Duration>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        SearchBudget { max_steps: 1_000_000, time_limit: None }
    }
}

impl SearchBudget {
    /// Start metering. One meter may be shared across several searches to
    /// bound a whole query batch.
    pub fn meter(&self) -> BudgetMeter {
        BudgetMeter {
            remaining: self.max_steps,
            deadline: self.time_limit.map(|limit| Instant::now() + limit),
            step: 0,
        }
    }
}

/// Running consumption state of a [`SearchBudget`].
#[derive(Debug)]
pub struct BudgetMeter {
    remaining: u64,
    deadline: Option<Instant>,
    step: u64,
}

impl BudgetMeter {
    fn charge(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::SearchBudgetExceeded);
        }
        self.remaining -= 1;
        self.step += 1;
        // The clock is only consulted periodically; `Instant::now` per
        // expansion would dominate the walk.
        if self.step % 1024 == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() > deadline {
                    return Err(Error::SearchBudgetExceeded);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TrieNode {
    children: BTreeMap<Token, TrieNode>,
    end_of_word: bool,
    file_refs: BTreeSet<FileRef>,
}

/// The trie index itself.
///
/// Built incrementally by owner inserts and handed to the server as a
/// serialized snapshot (see [`IndexWildcardTree::export_snapshot`]); the two
/// parties never share a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexWildcardTree {
    root: TrieNode,
    exact: BTreeMap<Token, BTreeSet<FileRef>>,
    final_token_filter: BloomFilter,
}

impl IndexWildcardTree {
    pub fn new(bloom_params: BloomParams) -> Self {
        IndexWildcardTree {
            root: TrieNode::default(),
            exact: BTreeMap::new(),
            final_token_filter: BloomFilter::new(bloom_params),
        }
    }

    /// Insert a token sequence with its file reference.
    ///
    /// Idempotent: re-inserting the same (sequence, reference) pair leaves
    /// the reference set unchanged.
    pub fn insert(&mut self, tokens: &[Token], file_ref: &str) -> Result<()> {
        let Some(last) = tokens.last() else {
            return Err(Error::EmptyKeyword);
        };
        let mut node = &mut self.root;
        for token in tokens {
            node = node.children.entry(token.clone()).or_default();
        }
        node.end_of_word = true;
        node.file_refs.insert(file_ref.to_owned());
        self.exact
            .entry(last.clone())
            .or_default()
            .insert(file_ref.to_owned());
        self.final_token_filter.add(last.as_str().as_bytes());
        Ok(())
    }

    /// Exact lookup: the terminal node's reference set, or empty if any
    /// token is missing along the path or the final node does not end a word.
    pub fn search(&self, tokens: &[Token]) -> BTreeSet<FileRef> {
        let Some(last) = tokens.last() else {
            return BTreeSet::new();
        };
        // Probabilistic short-circuit; a negative is definitive.
        if !self.final_token_filter.contains(last.as_str().as_bytes()) {
            return BTreeSet::new();
        }
        let mut node = &self.root;
        for token in tokens {
            match node.children.get(token) {
                Some(child) => node = child,
                None => return BTreeSet::new(),
            }
        }
        if node.end_of_word {
            node.file_refs.clone()
        } else {
            BTreeSet::new()
        }
    }

    /// Wildcard lookup under glob semantics.
    ///
    /// Returns the union of file references of every inserted word whose
    /// token sequence matches the pattern: [`PatternToken::AnyRun`] matches
    /// zero or more tokens, [`PatternToken::AnyOne`] exactly one, and
    /// literals must match a child edge. Exact, no false positives or
    /// negatives, but every expansion is charged against `meter`.
    pub fn wildcard_search(
        &self,
        pattern: &[PatternToken],
        meter: &mut BudgetMeter,
    ) -> Result<BTreeSet<FileRef>> {
        if pattern.is_empty() {
            return Err(Error::EmptyKeyword);
        }
        let mut results = BTreeSet::new();
        let mut work: Vec<(&TrieNode, usize)> = vec![(&self.root, 0)];
        while let Some((node, position)) = work.pop() {
            meter.charge()?;
            match pattern.get(position) {
                None => {
                    if node.end_of_word {
                        results.extend(node.file_refs.iter().cloned());
                    }
                }
                Some(PatternToken::Literal(token)) => {
                    if let Some(child) = node.children.get(token) {
                        work.push((child, position + 1));
                    }
                }
                Some(PatternToken::AnyOne) => {
                    for child in node.children.values() {
                        work.push((child, position + 1));
                    }
                }
                Some(PatternToken::AnyRun) => {
                    // Zero tokens consumed, or one token consumed with the
                    // run still open.
                    work.push((node, position + 1));
                    for child in node.children.values() {
                        work.push((child, position));
                    }
                }
            }
        }
        Ok(results)
    }

    /// The auxiliary exact-match index: files whose word ends in `token`.
    pub fn files_for_final_token(&self, token: &Token) -> BTreeSet<FileRef> {
        self.exact.get(token).cloned().unwrap_or_default()
    }

    /// Serialize the whole index for transfer to the server.
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self).map_err(|_| Error::MalformedRecord)
    }

    /// Rebuild an index from a snapshot produced by
    /// [`IndexWildcardTree::export_snapshot`].
    pub fn import_snapshot(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes).map_err(|_| Error::MalformedRecord)
    }
}

impl Default for IndexWildcardTree {
    fn default() -> Self {
        IndexWildcardTree::new(BloomParams::default())
    }
}
