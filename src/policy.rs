//! Pseudonymization and evaluation of boolean access policies.
//!
//! The server enforces per-file policies without learning real attribute
//! names: the authority's pseudo-key turns every attribute into a
//! deterministic pseudonym (uppercase hex of a keyed hash over the
//! lowercased name), and [`rewrite_policy`] rewrites a policy string by
//! replacing each identifier with its pseudonym while leaving operators,
//! parentheses and whitespace untouched. Because both the certificate
//! pseudonyms and the policy pseudonyms come from the same key, satisfaction
//! is preserved.
//!
//! Evaluation uses a dedicated parser for the closed grammar
//!
//! ```text
//! Expr := Ident | not Expr | Expr and Expr | Expr or Expr | ( Expr )
//! ```
//!
//! with `not` binding tighter than `and`/`or` and explicit parentheses
//! required wherever `and` and `or` would otherwise mix. No expression kind
//! outside these four can ever execute, which is the point: policies arrive
//! from storage and must not be able to invoke anything.
use std::collections::BTreeSet;
use std::fmt::{self, Debug};

use hmac::{Hmac, Mac};
use rand::{CryptoRng, Rng};
use sha2::Sha256;

use crate::{
    error::{Error, Result},
    ByteAccess,
};

type HmacSha256 = Hmac<Sha256>;

/// The reserved operator words. Everything else that looks like a word is an
/// attribute identifier and gets pseudonymized.
const RESERVED: [&str; 3] = ["and", "or", "not"];

/// The authority's pseudonymization secret.
///
/// Handed only to the data owner (to rewrite policies); users only ever see
/// its certified output.
#[derive(Clone, PartialEq, Eq)]
pub struct PseudoKey([u8; 32]);

impl PseudoKey {
    pub fn generate<R: Rng + CryptoRng>(mut rng: R) -> Self {
        PseudoKey(rng.gen())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        PseudoKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl ByteAccess for PseudoKey {
    fn bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Debug for PseudoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PseudoKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// Deterministic pseudonym of a real attribute: uppercase hex of
/// HMAC-SHA256 over the lowercased attribute name.
///
/// Lowercasing first means `DOCTOR` in a certificate and `doctor` in a
/// policy map to the same pseudonym.
pub fn pseudonymize_attribute(key: &PseudoKey, attribute: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(attribute.to_lowercase().as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Rewrite a policy string into its pseudonymized form.
///
/// Word runs that are not one of the reserved operators are replaced by
/// their pseudonym; all other characters pass through verbatim, so the
/// boolean structure of the policy is preserved exactly.
pub fn rewrite_policy(key: &PseudoKey, policy: &str) -> String {
    let mut out = String::with_capacity(policy.len());
    let mut word = String::new();
    let flush = |out: &mut String, word: &mut String| {
        if word.is_empty() {
            return;
        }
        if RESERVED.contains(&word.as_str()) {
            out.push_str(word);
        } else {
            out.push_str(&pseudonymize_attribute(key, word));
        }
        word.clear();
    };
    for c in policy.chars() {
        if is_word_char(c) {
            word.push(c);
        } else {
            flush(&mut out, &mut word);
            out.push(c);
        }
    }
    flush(&mut out, &mut word);
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Ident(String),
}

fn lex(policy: &str) -> Result<Vec<Lexeme>> {
    let mut lexemes = Vec::new();
    let mut chars = policy.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            chars.next();
            lexemes.push(Lexeme::LParen);
        } else if c == ')' {
            chars.next();
            lexemes.push(Lexeme::RParen);
        } else if is_word_char(c) {
            let mut word = String::new();
            while let Some(&w) = chars.peek() {
                if !is_word_char(w) {
                    break;
                }
                word.push(w);
                chars.next();
            }
            lexemes.push(match word.as_str() {
                "and" => Lexeme::And,
                "or" => Lexeme::Or,
                "not" => Lexeme::Not,
                _ => Lexeme::Ident(word),
            });
        } else {
            return Err(Error::PolicyParse(format!("unexpected character {c:?}")));
        }
    }
    if lexemes.is_empty() {
        return Err(Error::PolicyParse("empty policy".to_owned()));
    }
    Ok(lexemes)
}

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    position: usize,
    attributes: &'a BTreeSet<String>,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.position).cloned();
        if lexeme.is_some() {
            self.position += 1;
        }
        lexeme
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.position)
    }

    fn expression(&mut self) -> Result<bool> {
        let mut value = self.unary()?;
        let mut combinator: Option<Lexeme> = None;
        loop {
            let operator = match self.peek() {
                Some(Lexeme::And) => Lexeme::And,
                Some(Lexeme::Or) => Lexeme::Or,
                _ => break,
            };
            match &combinator {
                Some(previous) if *previous != operator => {
                    return Err(Error::PolicyParse(
                        "mixed 'and' and 'or' without parentheses".to_owned(),
                    ));
                }
                _ => combinator = Some(operator.clone()),
            }
            self.position += 1;
            // Evaluation stays total: the right-hand side is parsed even
            // when the boolean outcome is already decided.
            let rhs = self.unary()?;
            value = match operator {
                Lexeme::And => value && rhs,
                _ => value || rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<bool> {
        match self.next() {
            Some(Lexeme::Not) => Ok(!self.unary()?),
            Some(Lexeme::LParen) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Lexeme::RParen) => Ok(value),
                    _ => Err(Error::PolicyParse("missing closing parenthesis".to_owned())),
                }
            }
            Some(Lexeme::Ident(name)) => Ok(self.attributes.contains(&name)),
            other => Err(Error::PolicyParse(format!(
                "expected an identifier, 'not' or '(', found {other:?}"
            ))),
        }
    }
}

/// Evaluate a policy against a set of attribute identifiers.
///
/// An identifier evaluates to `true` iff it is a member of `attributes`.
/// Works identically on real policies with real attributes and on
/// pseudo-policies with certified pseudonyms. Pure; linear in the policy
/// length; any malformed input is a [`Error::PolicyParse`].
pub fn evaluate(policy: &str, attributes: &BTreeSet<String>) -> Result<bool> {
    let lexemes = lex(policy)?;
    let mut parser = Parser { lexemes: &lexemes, position: 0, attributes };
    let value = parser.expression()?;
    if parser.position != lexemes.len() {
        return Err(Error::PolicyParse("trailing input after expression".to_owned()));
    }
    Ok(value)
}
