//! Trapdoor derivation: turning keywords into server-visible tokens.
//!
//! A trapdoor sequence carries one token per keyword prefix length, each
//! token being the keyed hash (HMAC-SHA256) of that prefix. Two keywords that
//! share a literal prefix of length `n` therefore produce identical sequences
//! for their first `n` tokens under the same key, which is exactly the
//! property the trie index exploits: the server can route on token equality
//! without ever seeing a plaintext character. Without the key, a token is
//! computationally indistinguishable from random.
//!
//! Query-side derivation additionally understands the glob markers `*` and
//! `?`. A marker byte is emitted literally as a routing token instead of
//! being hashed, while later non-marker positions keep hashing the full
//! prefix as written in the pattern (markers included).
use std::fmt::{self, Debug};

use hmac::{Hmac, Mac};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    error::{Error, Result},
    ByteAccess,
};

type HmacSha256 = Hmac<Sha256>;

/// The shared secret under which trapdoors are derived.
///
/// Generated once per data owner and distributed to authorized users through
/// the attribute-based channel. The debug output shows a fingerprint only.
#[derive(Clone, PartialEq, Eq)]
pub struct TrapdoorKey([u8; 32]);

impl TrapdoorKey {
    pub fn generate<R: Rng + CryptoRng>(mut rng: R) -> Self {
        TrapdoorKey(rng.gen())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        TrapdoorKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl ByteAccess for TrapdoorKey {
    fn bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Debug for TrapdoorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TrapdoorKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// One opaque trapdoor token: the lowercase hex rendering of the keyed hash
/// of a keyword prefix.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.0[..self.0.len().min(8)];
        write!(f, "Token({head}..)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A query-side pattern element: either an opaque hashed token that must
/// match exactly, or one of the two glob markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternToken {
    /// Must match a child edge exactly.
    Literal(Token),
    /// `?`: matches exactly one token.
    AnyOne,
    /// `*`: matches zero or more tokens.
    AnyRun,
}

fn prf(key: &TrapdoorKey, data: &[u8]) -> Token {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data);
    Token(hex::encode(mac.finalize().into_bytes()))
}

/// Derive the trapdoor sequence for an index-side keyword.
///
/// Token `i` (1-based) is the keyed hash of `keyword[0..i]`, so
/// `derive(key, w)[0..n]` depends only on the first `n` bytes of `w`.
pub fn derive(key: &TrapdoorKey, keyword: &str) -> Result<Vec<Token>> {
    let bytes = keyword.as_bytes();
    if bytes.is_empty() {
        return Err(Error::EmptyKeyword);
    }
    Ok((1..=bytes.len()).map(|i| prf(key, &bytes[..i])).collect())
}

/// Derive the trapdoor sequence for a query pattern.
///
/// Marker bytes (`*`, `?`) become literal routing tokens; every other
/// position hashes the pattern prefix up to and including that byte.
pub fn derive_pattern(key: &TrapdoorKey, pattern: &str) -> Result<Vec<PatternToken>> {
    let bytes = pattern.as_bytes();
    if bytes.is_empty() {
        return Err(Error::EmptyKeyword);
    }
    Ok((0..bytes.len())
        .map(|i| match bytes[i] {
            b'*' => PatternToken::AnyRun,
            b'?' => PatternToken::AnyOne,
            _ => PatternToken::Literal(prf(key, &bytes[..=i])),
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn key(seed: u8) -> TrapdoorKey {
        TrapdoorKey::generate(ChaChaRng::from_seed([seed; 32]))
    }

    #[test]
    fn derivation_is_deterministic() {
        let k = key(1);
        assert_eq!(derive(&k, "diabetes").unwrap(), derive(&k, "diabetes").unwrap());
    }

    #[test]
    fn derivation_differs_across_keys() {
        assert_ne!(derive(&key(1), "diabetes").unwrap(), derive(&key(2), "diabetes").unwrap());
    }

    #[test]
    fn shared_prefixes_share_tokens() {
        let k = key(3);
        let long = derive(&k, "diabetes").unwrap();
        let short = derive(&k, "dia").unwrap();
        assert_eq!(long[..3], short[..3]);
        assert_eq!(short.len(), 3);
    }

    #[test]
    fn tokens_have_one_per_prefix() {
        let k = key(4);
        let sequence = derive(&k, "apple").unwrap();
        assert_eq!(sequence.len(), 5);
        // Hex of a 32-byte HMAC output.
        assert!(sequence.iter().all(|t| t.as_str().len() == 64));
    }

    #[test]
    fn empty_keyword_is_rejected() {
        assert!(matches!(derive(&key(5), ""), Err(Error::EmptyKeyword)));
        assert!(matches!(derive_pattern(&key(5), ""), Err(Error::EmptyKeyword)));
    }

    #[test]
    fn pattern_markers_become_wildcard_tokens() {
        let k = key(6);
        let pattern = derive_pattern(&k, "dia*").unwrap();
        assert_eq!(pattern.len(), 4);
        assert_eq!(pattern[3], PatternToken::AnyRun);
        let exact = derive(&k, "diabetes").unwrap();
        assert_eq!(pattern[0], PatternToken::Literal(exact[0].clone()));
        assert_eq!(pattern[2], PatternToken::Literal(exact[2].clone()));

        let question = derive_pattern(&k, "chro?").unwrap();
        assert_eq!(question[4], PatternToken::AnyOne);
    }

    #[test]
    fn pattern_without_markers_matches_index_side() {
        let k = key(7);
        let pattern = derive_pattern(&k, "apple").unwrap();
        let exact = derive(&k, "apple").unwrap();
        let literals: Vec<_> = pattern
            .into_iter()
            .map(|p| match p {
                PatternToken::Literal(t) => t,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(literals, exact);
    }
}
