//! Commit-message classification.
//!
//! Each commit is sorted into one of four intent classes by case-insensitive
//! pattern tests over the message, applied in order; the first match wins.
//! Bugfix patterns are checked before feature patterns so messages like
//! "fix: add missing bounds check" classify as bugfix.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Commit intent classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitClass {
   Feature,
   Bugfix,
   Refactor,
   Other,
}

static BUGFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?i)\b(fix|bug|issue|patch|hotfix|resolve)|closes\s*#|fixes\s*#")
      .expect("bugfix pattern")
});

static REFACTOR_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?i)\b(refactor|cleanup|clean\s+up|reorganize|restructure|simplify|optimize)")
      .expect("refactor pattern")
});

static FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?i)\b(feat|feature|add|implement|create|new|introduce|support)")
      .expect("feature pattern")
});

/// Classify a commit message. Deterministic: the same message always maps to
/// the same class.
pub fn classify_message(message: &str) -> CommitClass {
   if BUGFIX_RE.is_match(message) {
      CommitClass::Bugfix
   } else if REFACTOR_RE.is_match(message) {
      CommitClass::Refactor
   } else if FEATURE_RE.is_match(message) {
      CommitClass::Feature
   } else {
      CommitClass::Other
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_bugfix_tokens() {
      assert_eq!(classify_message("fix: crash on empty input"), CommitClass::Bugfix);
      assert_eq!(classify_message("Hotfix for prod"), CommitClass::Bugfix);
      assert_eq!(classify_message("Resolved flaky test"), CommitClass::Bugfix);
      assert_eq!(classify_message("closes #42"), CommitClass::Bugfix);
      assert_eq!(classify_message("Fixes #101 in parser"), CommitClass::Bugfix);
   }

   #[test]
   fn test_bugfix_wins_over_feature() {
      // "add" is a feature token but "fix" is tested first
      assert_eq!(classify_message("fix: add missing bounds check"), CommitClass::Bugfix);
   }

   #[test]
   fn test_refactor_tokens() {
      assert_eq!(classify_message("refactor parser internals"), CommitClass::Refactor);
      assert_eq!(classify_message("Clean up imports"), CommitClass::Refactor);
      assert_eq!(classify_message("cleanup dead code"), CommitClass::Refactor);
      assert_eq!(classify_message("Simplify error paths"), CommitClass::Refactor);
      assert_eq!(classify_message("optimize hot loop"), CommitClass::Refactor);
   }

   #[test]
   fn test_feature_tokens() {
      assert_eq!(classify_message("feat: shiny thing"), CommitClass::Feature);
      assert_eq!(classify_message("Add retry logic"), CommitClass::Feature);
      assert_eq!(classify_message("Implement pagination"), CommitClass::Feature);
      assert_eq!(classify_message("Introduce config layer"), CommitClass::Feature);
      assert_eq!(classify_message("support IPv6"), CommitClass::Feature);
   }

   #[test]
   fn test_other_fallback() {
      assert_eq!(classify_message("bump version"), CommitClass::Other);
      assert_eq!(classify_message("Merge branch 'main'"), CommitClass::Other);
      assert_eq!(classify_message(""), CommitClass::Other);
   }

   #[test]
   fn test_case_insensitive() {
      assert_eq!(classify_message("FIX: CRASH"), CommitClass::Bugfix);
      assert_eq!(classify_message("REFACTOR everything"), CommitClass::Refactor);
      assert_eq!(classify_message("ADD feature"), CommitClass::Feature);
   }

   #[test]
   fn test_word_boundary_required() {
      // "prefix" must not match the "fix" token mid-word
      assert_eq!(classify_message("prefix table rework"), CommitClass::Other);
   }

   #[test]
   fn test_deterministic() {
      let msg = "feat: add X";
      assert_eq!(classify_message(msg), classify_message(msg));
   }
}
