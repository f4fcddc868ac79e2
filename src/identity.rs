//! Contributor identity canonicalization and interning.
//!
//! Emails are the canonical contributor key: NFC-normalized, trimmed, and
//! lowercased at ingest so differently-cased spellings of the same address
//! collapse into one identity. Identities are interned to dense `usize`
//! indices so the per-file and per-language aggregates can store indices
//! instead of owned strings.

use std::collections::HashMap;

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// Normalize an email into its canonical form (NFC, trimmed, lowercased).
pub fn canonical_email(raw: &str) -> String {
   raw.trim().nfc().collect::<String>().to_lowercase()
}

/// Case-fold an owner handle for comparison: strip a leading `@`, lowercase.
pub fn fold_handle(raw: &str) -> String {
   raw.trim().trim_start_matches('@').to_lowercase()
}

/// Local part of an email address, used as the observed handle when no
/// resolved platform handle is available.
pub fn email_local_part(email: &str) -> &str {
   email.split('@').next().unwrap_or(email)
}

/// A single contributor as sighted in history.
#[derive(Debug, Clone, Serialize)]
pub struct ContributorIdentity {
   /// Canonical (case-folded NFC) email. Identities never merge across
   /// distinct canonical emails.
   pub email: String,

   /// Display name. Commits arrive newest first, so the name recorded on
   /// first sighting is the most recent one.
   pub name: String,

   /// Resolved external-platform handle, when a review feed supplies one.
   #[serde(skip_serializing_if = "Option::is_none")]
   pub handle: Option<String>,
}

/// Interner mapping canonical emails to dense indices.
#[derive(Debug, Default)]
pub struct IdentityInterner {
   by_email: HashMap<String, usize>,
   entries:  Vec<ContributorIdentity>,
}

impl IdentityInterner {
   pub fn new() -> Self {
      Self::default()
   }

   /// Intern a raw (name, email) pair, returning the identity index.
   pub fn intern(&mut self, name: &str, email: &str) -> usize {
      let key = canonical_email(email);
      if let Some(&idx) = self.by_email.get(&key) {
         return idx;
      }
      let idx = self.entries.len();
      self.entries.push(ContributorIdentity {
         email:  key.clone(),
         name:   name.trim().to_string(),
         handle: None,
      });
      self.by_email.insert(key, idx);
      idx
   }

   /// Look up an identity index by canonical email.
   pub fn lookup(&self, email: &str) -> Option<usize> {
      self.by_email.get(&canonical_email(email)).copied()
   }

   pub fn get(&self, idx: usize) -> &ContributorIdentity {
      &self.entries[idx]
   }

   pub fn len(&self) -> usize {
      self.entries.len()
   }

   pub fn is_empty(&self) -> bool {
      self.entries.is_empty()
   }

   pub fn iter(&self) -> impl Iterator<Item = &ContributorIdentity> {
      self.entries.iter()
   }
}
