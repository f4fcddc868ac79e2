use std::{
   fmt,
   path::PathBuf,
   sync::{
      Arc,
      atomic::{AtomicBool, Ordering},
   },
};

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

// === Cancellation ===

/// Cooperative cancellation signal threaded through the pipeline and checked
/// between commits and between per-file iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
   flag: Arc<AtomicBool>,
}

impl CancelToken {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn cancel(&self) {
      self.flag.store(true, Ordering::Relaxed);
   }

   pub fn is_cancelled(&self) -> bool {
      self.flag.load(Ordering::Relaxed)
   }
}

// === CLI ===

/// Repository code-ownership analyzer
#[derive(Parser, Debug)]
#[command(name = "ogit", version, about, long_about = None)]
pub struct Args {
   /// Repository to analyze
   #[arg(default_value = ".")]
   pub dir: PathBuf,

   /// Analysis window in days (defaults to config / 90)
   #[arg(long)]
   pub period_days: Option<i64>,

   /// Config file path (defaults to ~/.config/owner-git/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// JSON file mapping contributor email to review count
   #[arg(long)]
   pub reviews: Option<PathBuf>,

   /// Write the JSON report to this file instead of stdout
   #[arg(short, long)]
   pub output: Option<PathBuf>,

   /// Emit compact JSON instead of pretty-printed
   #[arg(long)]
   pub compact: bool,

   /// Skip CODEOWNERS validation
   #[arg(long)]
   pub no_codeowners: bool,

   /// Skip per-developer language competency profiles
   #[arg(long)]
   pub no_competency: bool,

   /// Skip declared-vs-observed drift computation
   #[arg(long)]
   pub no_drift: bool,

   /// Skip orphaned-file detection
   #[arg(long)]
   pub no_orphans: bool,

   /// Cumulative-ownership fraction for the bus factor
   #[arg(long)]
   pub bus_threshold: Option<f64>,

   /// Suppress the colored summary on stderr
   #[arg(short, long)]
   pub quiet: bool,
}

// === Contributors ===

/// Basic per-contributor activity row.
#[derive(Debug, Clone, Serialize)]
pub struct ContributorSummary {
   pub email:         String,
   pub name:          String,
   pub commits:       usize,
   pub files_touched: usize,
   pub lines_added:   usize,
   pub lines_removed: usize,
   pub last_activity: DateTime<Utc>,
}

/// Per-file ownership: contributors ordered most-frequent first.
#[derive(Debug, Clone, Serialize)]
pub struct FileOwnership {
   pub path:             String,
   pub top_contributors: Vec<String>,
   pub commit_count:     usize,
}

/// One language inside a developer profile.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageCompetency {
   pub language:        String,
   pub commits:         usize,
   pub file_count:      usize,
   pub feature_commits: usize,
   pub bugfix_commits:  usize,
   /// Share of the developer's language-attributed commits, in percent.
   pub percentage:      f64,
}

/// Finalized per-developer profile.
#[derive(Debug, Clone, Serialize)]
pub struct DeveloperProfile {
   pub email:            String,
   pub name:             String,
   pub total_commits:    usize,
   pub feature_commits:  usize,
   pub bugfix_commits:   usize,
   pub refactor_commits: usize,
   pub other_commits:    usize,
   /// Top languages, commit-count descending, at most ten.
   pub languages:        Vec<LanguageCompetency>,
   pub top_language:     Option<String>,
   pub competency_score: f64,
}

// === Scoring ===

/// Activity label derived from days since last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
   Active,
   Recent,
   Stale,
   Inactive,
   Abandoned,
}

impl fmt::Display for ActivityLevel {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let s = match self {
         Self::Active => "active",
         Self::Recent => "recent",
         Self::Stale => "stale",
         Self::Inactive => "inactive",
         Self::Abandoned => "abandoned",
      };
      f.write_str(s)
   }
}

/// Fleet risk band derived from the bus factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusFactorRisk {
   Critical,
   Warning,
   Healthy,
}

impl Default for BusFactorRisk {
   fn default() -> Self {
      Self::Critical
   }
}

impl fmt::Display for BusFactorRisk {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let s = match self {
         Self::Critical => "critical",
         Self::Warning => "warning",
         Self::Healthy => "healthy",
      };
      f.write_str(s)
   }
}

/// Weighted multi-factor ownership score for one contributor.
#[derive(Debug, Clone, Serialize)]
pub struct OwnershipScore {
   pub email:             String,
   pub name:              String,
   /// Total score in [0, 100].
   pub total:             f64,
   pub commits_score:     f64,
   pub reviews_score:     f64,
   pub lines_score:       f64,
   pub recency_score:     f64,
   pub consistency_score: f64,
   pub activity:          ActivityLevel,
   /// Confidence in [0, 1] that the score reflects reality.
   pub confidence:        f64,
   pub commit_count:      usize,
   pub review_count:      usize,
   pub lines_changed:     usize,
   pub last_activity:     DateTime<Utc>,
}

// === CODEOWNERS ===

/// One parsed CODEOWNERS rule.
#[derive(Debug, Clone, Serialize)]
pub struct CodeownerRule {
   pub pattern: String,
   pub owners:  Vec<String>,
   pub line:    usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
   Syntax,
   Coverage,
   BestPractice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
   Critical,
   High,
   Medium,
   Low,
}

/// One validator finding, keyed by a stable CO-prefixed code.
#[derive(Debug, Clone, Serialize)]
pub struct CodeownersIssue {
   pub code:        String,
   pub category:    IssueCategory,
   pub severity:    IssueSeverity,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub line:        Option<usize>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub pattern:     Option<String>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub owner:       Option<String>,
   pub message:     String,
   pub remediation: String,
}

/// Declared-vs-observed disagreement for one rule.
#[derive(Debug, Clone, Serialize)]
pub struct DriftItem {
   pub pattern:  String,
   pub declared: Vec<String>,
   pub observed: Vec<String>,
   /// Jaccard overlap of the two owner sets, in [0, 1].
   pub overlap:  f64,
}

/// CODEOWNERS validation plus drift, as one findings block.
#[derive(Debug, Clone, Serialize)]
pub struct CodeownersAnalysis {
   pub rules:       usize,
   pub issues:      Vec<CodeownersIssue>,
   pub drift_items: Vec<DriftItem>,
   pub has_drift:   bool,
   /// `(1 - mean_overlap) * 100` over rules with observed owners.
   pub drift_score: f64,
}

// === Succession ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactPriority {
   Critical,
   High,
   Medium,
   Low,
}

/// One ranked backup successor for a path.
#[derive(Debug, Clone, Serialize)]
pub struct BackupContact {
   pub email:     String,
   /// Takeover readiness in [0, 100].
   pub readiness: f64,
}

/// Primary/backup contact plan for one path.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentContact {
   pub path:     String,
   pub primary:  Vec<String>,
   pub backup:   Vec<BackupContact>,
   pub priority: ContactPriority,
   /// Pattern of the matching CODEOWNERS rule, if any.
   #[serde(skip_serializing_if = "Option::is_none")]
   pub rule:     Option<String>,
}

/// Recommended mentor-to-mentee pairing by shared-path count.
#[derive(Debug, Clone, Serialize)]
pub struct Mentorship {
   pub mentor:       String,
   pub mentee:       String,
   pub shared_paths: usize,
}

// === Recommendations ===

/// REC-coded advisory surfaced alongside the findings.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
   pub code:        String,
   pub message:     String,
   pub remediation: String,
}

// === Result envelope ===

#[derive(Debug, Clone, Serialize, Default)]
pub struct Summary {
   pub total_contributors: usize,
   pub files_analyzed:     usize,
   pub period_days:        i64,
   pub has_codeowners:     bool,
   pub codeowners_rules:   usize,
   pub codeowners_issues:  usize,
   pub orphaned_files:     usize,
   pub bus_factor:         usize,
   pub bus_factor_risk:    BusFactorRisk,
   pub ownership_coverage: f64,
   pub is_shallow_clone:   bool,
   /// Set when cancellation cut the walk short.
   pub partial:            bool,
   pub warnings:           Vec<String>,
   pub errors:             Vec<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Findings {
   pub contributors:        Vec<ContributorSummary>,
   pub codeowners:          Vec<CodeownerRule>,
   pub orphaned_files:      Vec<String>,
   pub file_owners:         Vec<FileOwnership>,
   pub competencies:        Vec<DeveloperProfile>,
   pub enhanced_ownership:  Vec<OwnershipScore>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub codeowners_analysis: Option<CodeownersAnalysis>,
   pub incident_contacts:   Vec<IncidentContact>,
   pub mentorships:         Vec<Mentorship>,
   pub recommendations:     Vec<Recommendation>,
}

/// The single in-memory result of an engine invocation.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AnalysisResult {
   pub summary:  Summary,
   pub findings: Findings,
}
