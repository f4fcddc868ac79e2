//! CODEOWNERS parsing, validation, matching, and declared-vs-observed drift.
//!
//! The matcher implements deliberately simplified gitignore-style semantics:
//! `*` matches everything, a pattern containing `*` becomes an anchored
//! regex, a pattern ending in `/` prefix-matches the directory, anything
//! else must match exactly.

use std::{
   collections::{HashMap, HashSet},
   path::{Path, PathBuf},
   sync::LazyLock,
};

use indexmap::IndexMap;
use regex::Regex;

use crate::{
   attribution::FileStats,
   error::{OwnershipError, Result},
   identity::{IdentityInterner, email_local_part, fold_handle},
   scoring::round2,
   types::{CodeownerRule, CodeownersIssue, DriftItem, IssueCategory, IssueSeverity},
};

/// Search order; first existing file wins.
pub const CODEOWNERS_LOCATIONS: &[&str] = &[".github/CODEOWNERS", "CODEOWNERS", "docs/CODEOWNERS"];

/// More owners than this on one rule dilutes accountability (CO042).
const MAX_RULE_OWNERS: usize = 5;

/// Observed contributors compared against each rule's declared owners.
const DRIFT_TOP_OWNERS: usize = 3;

/// Rules below this overlap become drift items.
const DRIFT_OVERLAP_FLOOR: f64 = 0.5;

static USER_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"^@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").expect("user owner pattern")
});

static TEAM_RE: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"^@[A-Za-z0-9][A-Za-z0-9-]*/[A-Za-z0-9_.-]+$").expect("team owner pattern")
});

static EMAIL_RE: LazyLock<Regex> =
   LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("email owner pattern"));

/// Owner token shapes accepted by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
   User,
   Team,
   Email,
}

/// Classify an owner token, or `None` when it fails the grammar.
pub fn owner_kind(token: &str) -> Option<OwnerKind> {
   if TEAM_RE.is_match(token) {
      Some(OwnerKind::Team)
   } else if USER_RE.is_match(token) {
      Some(OwnerKind::User)
   } else if EMAIL_RE.is_match(token) {
      Some(OwnerKind::Email)
   } else {
      None
   }
}

/// Parse result: surviving rules plus syntax issues.
#[derive(Debug, Default)]
pub struct ParsedCodeowners {
   pub rules:  Vec<CodeownerRule>,
   pub issues: Vec<CodeownersIssue>,
}

fn issue(
   code: &str,
   category: IssueCategory,
   severity: IssueSeverity,
   message: String,
   remediation: &str,
) -> CodeownersIssue {
   CodeownersIssue {
      code: code.to_string(),
      category,
      severity,
      line: None,
      pattern: None,
      owner: None,
      message,
      remediation: remediation.to_string(),
   }
}

/// Locate the CODEOWNERS file under `root`, returning its repo-relative
/// location and content.
pub fn load_codeowners(root: &Path) -> Result<Option<(String, String)>> {
   for location in CODEOWNERS_LOCATIONS {
      let path: PathBuf = root.join(location);
      if path.exists() {
         let content = std::fs::read_to_string(&path).map_err(|e| {
            OwnershipError::ParseError(format!("cannot read {}: {e}", path.display()))
         })?;
         return Ok(Some(((*location).to_string(), content)));
      }
   }
   Ok(None)
}

/// The CO003 issue for a repository with no CODEOWNERS file.
pub fn missing_file_issue() -> CodeownersIssue {
   issue(
      "CO003",
      IssueCategory::Coverage,
      IssueSeverity::Medium,
      "No CODEOWNERS file found".to_string(),
      "Add a CODEOWNERS file under .github/, the repository root, or docs/",
   )
}

/// Parse CODEOWNERS content. Invalid owners are reported but valid owners on
/// the same line are retained; a rule with no valid owners is dropped.
pub fn parse_codeowners(content: &str) -> ParsedCodeowners {
   let mut parsed = ParsedCodeowners::default();

   for (i, raw_line) in content.lines().enumerate() {
      let line_no = i + 1;
      let line = raw_line.trim();
      if line.is_empty() || line.starts_with('#') {
         continue;
      }
      // Inline comments end the owner list
      let line = line.split('#').next().unwrap_or("").trim();
      if line.is_empty() {
         continue;
      }

      let tokens: Vec<&str> = line.split_whitespace().collect();
      if tokens.len() < 2 {
         let mut co001 = issue(
            "CO001",
            IssueCategory::Syntax,
            IssueSeverity::Critical,
            format!("Line {line_no} has no owners: {line:?}"),
            "Each rule needs a pattern followed by at least one owner",
         );
         co001.line = Some(line_no);
         co001.pattern = Some(tokens.first().unwrap_or(&"").to_string());
         parsed.issues.push(co001);
         continue;
      }

      let pattern = tokens[0].to_string();
      let mut owners = Vec::new();
      for token in &tokens[1..] {
         if owner_kind(token).is_some() {
            owners.push((*token).to_string());
         } else {
            let mut co002 = issue(
               "CO002",
               IssueCategory::Syntax,
               IssueSeverity::High,
               format!("Invalid owner {token:?} on line {line_no}"),
               "Owners must be @user, @org/team, or an email address",
            );
            co002.line = Some(line_no);
            co002.pattern = Some(pattern.clone());
            co002.owner = Some((*token).to_string());
            parsed.issues.push(co002);
         }
      }

      if owners.is_empty() {
         continue;
      }
      parsed.rules.push(CodeownerRule { pattern, owners, line: line_no });
   }

   parsed
}

/// Best-practice and coverage checks over the surviving rules.
/// `tracked` is the working set used for sensitive-pattern coverage.
pub fn validate_rules(
   rules: &[CodeownerRule],
   sensitive_patterns: &[String],
   tracked: &[String],
) -> Vec<CodeownersIssue> {
   let mut issues = Vec::new();

   // CO044: duplicate patterns; the latter silently overrides
   let mut seen: HashMap<&str, usize> = HashMap::new();
   for rule in rules {
      if let Some(&first_line) = seen.get(rule.pattern.as_str()) {
         let mut co044 = issue(
            "CO044",
            IssueCategory::BestPractice,
            IssueSeverity::Low,
            format!(
               "Pattern {:?} on line {} duplicates line {first_line}; the latter overrides",
               rule.pattern, rule.line
            ),
            "Merge duplicate patterns into one rule",
         );
         co044.line = Some(rule.line);
         co044.pattern = Some(rule.pattern.clone());
         issues.push(co044);
      } else {
         seen.insert(rule.pattern.as_str(), rule.line);
      }
   }

   // CO020: no catch-all default rule
   if !rules.iter().any(|r| r.pattern == "*") {
      issues.push(issue(
         "CO020",
         IssueCategory::Coverage,
         IssueSeverity::Medium,
         "No default `*` rule; unmatched files have no owner".to_string(),
         "Add a `*` rule as the first line so every file has a fallback owner",
      ));
   }

   for rule in rules {
      // CO041: single point of failure
      if rule.owners.len() == 1 {
         let mut co041 = issue(
            "CO041",
            IssueCategory::BestPractice,
            IssueSeverity::Medium,
            format!("Rule {:?} has a single owner", rule.pattern),
            "Add a second owner or use a team so reviews do not block on one person",
         );
         co041.line = Some(rule.line);
         co041.pattern = Some(rule.pattern.clone());
         issues.push(co041);
      }

      // CO042: too many owners dilutes accountability
      if rule.owners.len() > MAX_RULE_OWNERS {
         let mut co042 = issue(
            "CO042",
            IssueCategory::BestPractice,
            IssueSeverity::Low,
            format!("Rule {:?} lists {} owners", rule.pattern, rule.owners.len()),
            "Prefer a team owner over long owner lists",
         );
         co042.line = Some(rule.line);
         co042.pattern = Some(rule.pattern.clone());
         issues.push(co042);
      }

      // CO040: individual users outlive teams poorly
      for owner in &rule.owners {
         if owner_kind(owner) == Some(OwnerKind::User) {
            let mut co040 = issue(
               "CO040",
               IssueCategory::BestPractice,
               IssueSeverity::Low,
               format!("Owner {owner} on rule {:?} is an individual user", rule.pattern),
               "Prefer @org/team owners; individuals leave",
            );
            co040.line = Some(rule.line);
            co040.pattern = Some(rule.pattern.clone());
            co040.owner = Some(owner.clone());
            issues.push(co040);
         }
      }
   }

   // CO043: sensitive files on disk with no covering rule
   let matchers: Vec<PatternMatcher> =
      rules.iter().map(|r| PatternMatcher::compile(&r.pattern)).collect();
   for sensitive in sensitive_patterns {
      let Ok(glob_pattern) = glob::Pattern::new(sensitive) else {
         continue;
      };
      let matching: Vec<&str> = tracked
         .iter()
         .map(|path| path.as_str())
         .filter(|path| {
            let basename = path.rsplit('/').next().unwrap_or(path);
            glob_pattern.matches(path) || glob_pattern.matches(basename)
         })
         .collect();
      if matching.is_empty() {
         continue;
      }
      let uncovered = matching
         .iter()
         .find(|path| !matchers.iter().any(|m| m.matches(path)));
      if let Some(example) = uncovered {
         let mut co043 = issue(
            "CO043",
            IssueCategory::BestPractice,
            IssueSeverity::Medium,
            format!("Sensitive file {example:?} matches {sensitive:?} but no rule covers it"),
            "Add an explicit rule for sensitive files so changes always get review",
         );
         co043.pattern = Some(sensitive.clone());
         issues.push(co043);
      }
   }

   issues
}

/// Compiled form of one CODEOWNERS pattern.
#[derive(Debug)]
pub enum PatternMatcher {
   All,
   Regex(Regex),
   Prefix(String),
   Exact(String),
}

impl PatternMatcher {
   pub fn compile(pattern: &str) -> Self {
      if pattern == "*" {
         return Self::All;
      }
      if pattern.contains('*') {
         let escaped = regex::escape(pattern).replace(r"\*", ".*");
         return match Regex::new(&format!("^{escaped}$")) {
            Ok(re) => Self::Regex(re),
            Err(_) => Self::Exact(pattern.to_string()),
         };
      }
      if let Some(dir) = pattern.strip_suffix('/') {
         return Self::Prefix(format!("{dir}/"));
      }
      Self::Exact(pattern.to_string())
   }

   pub fn matches(&self, path: &str) -> bool {
      match self {
         Self::All => true,
         Self::Regex(re) => re.is_match(path),
         Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
         Self::Exact(exact) => path == exact,
      }
   }
}

/// Drift computation output.
#[derive(Debug, Default)]
pub struct DriftReport {
   pub items:       Vec<DriftItem>,
   pub has_drift:   bool,
   /// `(1 - mean_overlap) * 100` over rules with observed owners.
   pub drift_score: f64,
}

/// Compare declared owners against observed top contributors per rule.
pub fn compute_drift(
   rules: &[CodeownerRule],
   files: &IndexMap<String, FileStats>,
   interner: &IdentityInterner,
) -> DriftReport {
   let mut overlaps = Vec::new();
   let mut items = Vec::new();

   for rule in rules {
      let matcher = PatternMatcher::compile(&rule.pattern);

      // Aggregate observed commit counts across all matching paths
      let mut counts: HashMap<usize, usize> = HashMap::new();
      for (path, stats) in files {
         if !matcher.matches(path) {
            continue;
         }
         for (&idx, per) in &stats.contributors {
            *counts.entry(idx).or_insert(0) += per.commits;
         }
      }
      if counts.is_empty() {
         continue;
      }

      let mut ranked: Vec<(usize, usize)> = counts.into_iter().collect();
      ranked.sort_by(|a, b| {
         b.1.cmp(&a.1)
            .then_with(|| interner.get(a.0).email.cmp(&interner.get(b.0).email))
      });
      ranked.truncate(DRIFT_TOP_OWNERS);

      let observed_emails: Vec<String> =
         ranked.iter().map(|(idx, _)| interner.get(*idx).email.clone()).collect();

      // Observed handles: resolved platform handle when known, else the
      // email local part
      let observed_handles: HashSet<String> = ranked
         .iter()
         .map(|(idx, _)| {
            let identity = interner.get(*idx);
            identity
               .handle
               .as_deref()
               .map_or_else(|| fold_handle(email_local_part(&identity.email)), fold_handle)
         })
         .collect();
      let declared_handles: HashSet<String> =
         rule.owners.iter().map(|o| fold_handle(o)).collect();

      let intersection = declared_handles.intersection(&observed_handles).count();
      let union = declared_handles.len() + observed_handles.len() - intersection;
      let overlap = if union == 0 { 0.0 } else { intersection as f64 / union as f64 };
      overlaps.push(overlap);

      if overlap < DRIFT_OVERLAP_FLOOR {
         items.push(DriftItem {
            pattern:  rule.pattern.clone(),
            declared: rule.owners.clone(),
            observed: observed_emails,
            overlap:  round2(overlap),
         });
      }
   }

   if overlaps.is_empty() {
      return DriftReport::default();
   }

   let mean_overlap = overlaps.iter().sum::<f64>() / overlaps.len() as f64;
   DriftReport {
      has_drift:   !items.is_empty(),
      drift_score: round2((1.0 - mean_overlap) * 100.0),
      items,
   }
}
