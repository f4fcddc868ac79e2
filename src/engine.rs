//! Pipeline orchestration.
//!
//! [`AnalysisEngine::analyze`] gathers raw inputs from the repository (the
//! only side-effectful step), then hands everything to the deterministic
//! assembly in `run`. Stage failures degrade into `warnings[]`/`errors[]`;
//! only `HistoryUnavailable` and `ConfigInvalid` abort the invocation.

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Duration, Utc};

use crate::{
   attribution::Attribution,
   codeowners::{self, DriftReport, ParsedCodeowners},
   config::AnalysisConfig,
   error::{OwnershipError, Result},
   history::{self, CommitRecord},
   languages::{ExtensionLanguages, LanguageDetector},
   scoring::{self, ScoreInputs},
   succession,
   types::{
      AnalysisResult, CancelToken, CodeownersAnalysis, ContributorSummary, Findings,
      Recommendation, Summary,
   },
};

/// Drift score at which the repository earns a REC003 recommendation.
const DRIFT_RECOMMENDATION_FLOOR: f64 = 50.0;

/// Everything `run` consumes; produced by `analyze` from the repository, or
/// synthesized directly by tests.
pub(crate) struct EngineInputs {
   pub now:           DateTime<Utc>,
   pub period_days:   i64,
   pub commits:       Vec<CommitRecord>,
   pub diagnostics:   Vec<String>,
   pub tracked:       Vec<String>,
   /// (location, content) of the CODEOWNERS file, when one exists.
   pub codeowners:    Option<(String, String)>,
   pub is_shallow:    bool,
   pub adaptive_note: Option<String>,
   /// Recovered stage failures collected while gathering inputs.
   pub stage_errors:  Vec<String>,
   /// Cancellation cut the walk short.
   pub truncated:     bool,
}

/// Single-invocation analysis engine. Holds no process-wide state; safe to
/// run concurrently with other engines on disjoint inputs.
pub struct AnalysisEngine {
   config:   AnalysisConfig,
   detector: Box<dyn LanguageDetector>,
   reviews:  HashMap<String, usize>,
   now:      Option<DateTime<Utc>>,
   cancel:   CancelToken,
}

impl AnalysisEngine {
   pub fn new(config: AnalysisConfig) -> Self {
      Self {
         config,
         detector: Box::new(ExtensionLanguages),
         reviews: HashMap::new(),
         now: None,
         cancel: CancelToken::new(),
      }
   }

   /// Replace the default extension-table language detector.
   pub fn with_detector(mut self, detector: Box<dyn LanguageDetector>) -> Self {
      self.detector = detector;
      self
   }

   /// Supply review counts (canonical email -> count) from an external feed.
   pub fn with_reviews(mut self, reviews: HashMap<String, usize>) -> Self {
      self.reviews = reviews;
      self
   }

   /// Pin the wall clock; identical inputs plus identical `now` make the
   /// output byte-reproducible.
   pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
      self.now = Some(now);
      self
   }

   pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
      self.cancel = cancel;
      self
   }

   /// Run the full analysis against a local repository clone.
   pub fn analyze(&self, repo: &Path) -> Result<AnalysisResult> {
      self.config.validate()?;
      history::open_repo(repo)?;

      let now = self.now.unwrap_or_else(Utc::now);
      let mut stage_errors = Vec::new();
      let mut diagnostics = Vec::new();
      let mut adaptive_note = None;
      let mut truncated = false;
      let mut period_days = self.config.period_days;

      let is_shallow = history::is_shallow(repo);
      let tip = history::head_commit(repo)?;

      let mut commits = Vec::new();
      if let Some(tip) = tip {
         commits = self.scan_window(
            repo,
            &tip,
            now,
            period_days,
            &mut diagnostics,
            &mut stage_errors,
            &mut truncated,
         );

         // Adaptive window: a quiet repo older than the window widens the
         // lookback in graduated steps until commits appear.
         if commits.is_empty()
            && !truncated
            && let Some(newest) = history::newest_commit_time(repo)
            && newest < now - Duration::days(period_days)
         {
            let age_days = (now - newest).num_days();
            for step in history::adaptive_steps(period_days, age_days) {
               commits = self.scan_window(
                  repo,
                  &tip,
                  now,
                  step,
                  &mut diagnostics,
                  &mut stage_errors,
                  &mut truncated,
               );
               if !commits.is_empty() || truncated {
                  adaptive_note = Some(format!(
                     "No commits within {period_days} days; window widened to {step} days"
                  ));
                  period_days = step;
                  break;
               }
            }
         }
      }

      let needs_tracked = self.config.detect_orphans || self.config.check_codeowners;
      let tracked = if needs_tracked {
         match history::list_tracked_files(repo) {
            Ok(files) => files,
            Err(e) => {
               stage_errors.push(e.to_string());
               Vec::new()
            },
         }
      } else {
         Vec::new()
      };

      let codeowners = if self.config.check_codeowners {
         match codeowners::load_codeowners(repo) {
            Ok(found) => found,
            Err(e) => {
               stage_errors.push(e.to_string());
               None
            },
         }
      } else {
         None
      };

      Ok(self.run(EngineInputs {
         now,
         period_days,
         commits,
         diagnostics,
         tracked,
         codeowners,
         is_shallow,
         adaptive_note,
         stage_errors,
         truncated,
      }))
   }

   /// Walk one window. An unrecoverable mid-walk failure degrades into a
   /// recorded `TraversalAborted` stage error and a partial result.
   fn scan_window(
      &self,
      repo: &Path,
      tip: &str,
      now: DateTime<Utc>,
      period_days: i64,
      diagnostics: &mut Vec<String>,
      stage_errors: &mut Vec<String>,
      truncated: &mut bool,
   ) -> Vec<CommitRecord> {
      let since = now - Duration::days(period_days);
      let raw = match history::log_since(repo, tip, since) {
         Ok(raw) => raw,
         Err(e) => {
            stage_errors.push(OwnershipError::TraversalAborted(e.to_string()).to_string());
            *truncated = true;
            return Vec::new();
         },
      };

      let mut commits = Vec::new();
      for record in history::parse_log(&raw) {
         if self.cancel.is_cancelled() {
            *truncated = true;
            break;
         }
         match record {
            Ok(commit) => commits.push(commit),
            Err(diag) => diagnostics.push(diag),
         }
      }
      commits
   }

   /// Deterministic assembly over gathered inputs.
   pub(crate) fn run(&self, inputs: EngineInputs) -> AnalysisResult {
      let config = &self.config;
      let mut warnings = Vec::new();
      let mut errors = inputs.stage_errors;
      let mut partial = inputs.truncated;

      if inputs.is_shallow {
         warnings
            .push("Shallow clone: history is truncated, results may be incomplete".to_string());
      }
      if let Some(note) = inputs.adaptive_note {
         warnings.push(note);
      }
      warnings.extend(inputs.diagnostics);
      if inputs.truncated {
         warnings.push("Analysis cancelled; returning partial results".to_string());
      }

      // Fold the commit stream
      let mut attribution = Attribution::new();
      for commit in &inputs.commits {
         if self.cancel.is_cancelled() {
            partial = true;
            break;
         }
         attribution.fold_commit(commit, self.detector.as_ref());
      }
      attribution.finish();

      // Per-file stages also stop promptly once cancellation lands; the
      // already-accumulated aggregates still ship, tagged partial.
      let cancelled = self.cancel.is_cancelled();
      partial = partial || cancelled;

      let file_owners = attribution.file_ownership();
      let total_contributors = attribution.interner.len();

      let contributors = if config.analyze_contributors {
         self.contributor_summaries(&attribution)
      } else {
         Vec::new()
      };

      if self.reviews.is_empty() && total_contributors > 0 {
         warnings.push("Review data unavailable; reviews component scored as zero".to_string());
      }

      // Scores always run: summary.bus_factor must stay meaningful even when
      // the contributor findings are toggled off.
      let scores = scoring::compute_scores(&ScoreInputs {
         interner:   &attribution.interner,
         activities: &attribution.activities,
         reviews:    &self.reviews,
         now:        inputs.now,
         weights:    config.scoring_weights,
         thresholds: config.activity_thresholds,
      });

      let (bus_factor, bus_factor_risk) =
         scoring::bus_factor(&scores, config.bus_factor_threshold);

      let enhanced_ownership = if config.analyze_contributors { scores } else { Vec::new() };
      let ownership_coverage = scoring::ownership_coverage(
         &file_owners,
         inputs.tracked.len(),
         config.min_file_contributors,
      );

      let competencies = if config.analyze_competency {
         attribution.finalize_profiles()
      } else {
         Vec::new()
      };

      let orphaned_files = if config.detect_orphans && !cancelled {
         attribution.orphaned_files(&inputs.tracked)
      } else {
         Vec::new()
      };

      // CODEOWNERS stage: a parse failure leaves every other section intact
      let mut has_codeowners = false;
      let mut rules = Vec::new();
      let mut codeowners_analysis = None;
      if config.check_codeowners {
         let mut issues = Vec::new();
         match inputs.codeowners {
            Some((_, content)) => {
               has_codeowners = true;
               let ParsedCodeowners { rules: parsed_rules, issues: parse_issues } =
                  codeowners::parse_codeowners(&content);
               rules = parsed_rules;
               issues = parse_issues;
               issues.extend(codeowners::validate_rules(
                  &rules,
                  &config.sensitive_patterns,
                  &inputs.tracked,
               ));
            },
            None => issues.push(codeowners::missing_file_issue()),
         }

         let drift = if config.detect_drift && !rules.is_empty() && !cancelled {
            codeowners::compute_drift(&rules, &attribution.files, &attribution.interner)
         } else {
            DriftReport::default()
         };

         codeowners_analysis = Some(CodeownersAnalysis {
            rules:       rules.len(),
            issues,
            drift_items: drift.items,
            has_drift:   drift.has_drift,
            drift_score: drift.drift_score,
         });
      }

      let (incident_contacts, mentorships) = if cancelled {
         (Vec::new(), Vec::new())
      } else {
         succession::plan_contacts(
            &attribution.files,
            &attribution.interner,
            &rules,
            inputs.now,
            config.succession_min_commits,
         )
      };

      let mut recommendations = Vec::new();
      if config.emit_recommendations {
         if config.check_codeowners && !has_codeowners {
            recommendations.push(Recommendation {
               code:        "REC001".to_string(),
               message:     "Repository has no CODEOWNERS file".to_string(),
               remediation: "Create .github/CODEOWNERS so every path has a declared owner"
                  .to_string(),
            });
         }
         if total_contributors > 0 && bus_factor <= 2 {
            recommendations.push(Recommendation {
               code:        "REC002".to_string(),
               message:     format!(
                  "Knowledge is concentrated: {bus_factor} contributor(s) hold the majority of \
                   ownership"
               ),
               remediation: "Spread reviews and pair work across more of the team".to_string(),
            });
         }
         if let Some(analysis) = &codeowners_analysis
            && analysis.drift_score >= DRIFT_RECOMMENDATION_FLOOR
         {
            recommendations.push(Recommendation {
               code:        "REC003".to_string(),
               message:     format!(
                  "Declared owners have drifted from observed contributors (drift score {:.1})",
                  analysis.drift_score
               ),
               remediation: "Update CODEOWNERS to match the people actually touching the code"
                  .to_string(),
            });
         }
      }

      let codeowners_issues =
         codeowners_analysis.as_ref().map_or(0, |a| a.issues.len());

      AnalysisResult {
         summary:  Summary {
            total_contributors,
            files_analyzed: file_owners.len(),
            period_days: inputs.period_days,
            has_codeowners,
            codeowners_rules: rules.len(),
            codeowners_issues,
            orphaned_files: orphaned_files.len(),
            bus_factor,
            bus_factor_risk,
            ownership_coverage,
            is_shallow_clone: inputs.is_shallow,
            partial,
            warnings,
            errors,
         },
         findings: Findings {
            contributors,
            codeowners: rules,
            orphaned_files,
            file_owners,
            competencies,
            enhanced_ownership,
            codeowners_analysis,
            incident_contacts,
            mentorships,
            recommendations,
         },
      }
   }

   fn contributor_summaries(&self, attribution: &Attribution) -> Vec<ContributorSummary> {
      let mut rows: Vec<ContributorSummary> = attribution
         .activities
         .iter()
         .map(|activity| {
            let identity = attribution.interner.get(activity.identity);
            ContributorSummary {
               email:         identity.email.clone(),
               name:          identity.name.clone(),
               commits:       activity.commits,
               files_touched: activity.file_touches,
               lines_added:   activity.lines_added,
               lines_removed: activity.lines_removed,
               last_activity: activity.last_activity,
            }
         })
         .collect();
      rows.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.email.cmp(&b.email)));
      rows
   }
}
