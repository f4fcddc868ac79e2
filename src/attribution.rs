//! Attribution of the commit stream to contributors, files, and languages.
//!
//! [`Attribution`] is the single-owner accumulator the engine folds every
//! commit into; nothing here touches the repository. Per-developer profile
//! finalization fans out across rayon workers once the fold is complete.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::{
   classify::{CommitClass, classify_message},
   history::CommitRecord,
   identity::IdentityInterner,
   languages::LanguageDetector,
   scoring::round2,
   types::{DeveloperProfile, FileOwnership, LanguageCompetency},
};

/// Languages retained per developer profile.
const MAX_PROFILE_LANGUAGES: usize = 10;

/// Accumulated activity for one contributor. Immutable once the fold ends.
#[derive(Debug, Clone)]
pub struct ContributorActivity {
   pub identity:         usize,
   pub commits:          usize,
   /// Multiset count: every (commit, path) touch counts.
   pub file_touches:     usize,
   pub lines_added:      usize,
   pub lines_removed:    usize,
   /// Authored timestamps, sorted ascending by [`Attribution::finish`].
   pub timestamps:       Vec<DateTime<Utc>>,
   pub last_activity:    DateTime<Utc>,
   pub feature_commits:  usize,
   pub bugfix_commits:   usize,
   pub refactor_commits: usize,
   pub other_commits:    usize,
}

/// Per-(file, contributor) aggregate, kept for the succession planner.
#[derive(Debug, Clone)]
pub struct FileContributor {
   pub commits:    usize,
   pub last_touch: DateTime<Utc>,
   /// Calendar days (UTC) on which this contributor touched the file.
   pub days:       BTreeSet<NaiveDate>,
}

/// Per-file aggregate over the window.
#[derive(Debug, Clone, Default)]
pub struct FileStats {
   pub total_commits: usize,
   /// Contributor index -> per-file stats, first-touch order.
   pub contributors:  IndexMap<usize, FileContributor>,
}

#[derive(Debug, Clone, Default)]
struct LanguageAccum {
   commits: usize,
   feature: usize,
   bugfix:  usize,
   files:   BTreeSet<String>,
}

/// The fold target. One instance per engine invocation; owned by exactly one
/// coordinator.
#[derive(Debug, Default)]
pub struct Attribution {
   pub interner:   IdentityInterner,
   pub activities: Vec<ContributorActivity>,
   /// Path -> per-file stats, first-seen order.
   pub files:      IndexMap<String, FileStats>,
   /// Per-contributor language accumulators, parallel to the interner.
   languages:      Vec<IndexMap<String, LanguageAccum>>,
}

impl Attribution {
   pub fn new() -> Self {
      Self::default()
   }

   /// Fold one commit into the aggregates.
   pub fn fold_commit(&mut self, commit: &CommitRecord, detector: &dyn LanguageDetector) {
      let idx = self.interner.intern(&commit.author_name, &commit.author_email);
      if idx == self.activities.len() {
         self.activities.push(ContributorActivity {
            identity:         idx,
            commits:          0,
            file_touches:     0,
            lines_added:      0,
            lines_removed:    0,
            timestamps:       Vec::new(),
            last_activity:    commit.timestamp,
            feature_commits:  0,
            bugfix_commits:   0,
            refactor_commits: 0,
            other_commits:    0,
         });
         self.languages.push(IndexMap::new());
      }

      let class = classify_message(&commit.message);
      let day = commit.timestamp.date_naive();

      {
         let activity = &mut self.activities[idx];
         activity.commits += 1;
         activity.timestamps.push(commit.timestamp);
         activity.last_activity = activity.last_activity.max(commit.timestamp);
         match class {
            CommitClass::Feature => activity.feature_commits += 1,
            CommitClass::Bugfix => activity.bugfix_commits += 1,
            CommitClass::Refactor => activity.refactor_commits += 1,
            CommitClass::Other => activity.other_commits += 1,
         }
      }

      // Languages present in this commit; commit counts increment once per
      // (commit, language) no matter how many files share the language.
      let mut commit_languages: BTreeSet<String> = BTreeSet::new();

      for change in &commit.changes {
         {
            let activity = &mut self.activities[idx];
            activity.file_touches += 1;
            activity.lines_added += change.added;
            activity.lines_removed += change.deleted;
         }

         let stats = self.files.entry(change.path.clone()).or_default();
         stats.total_commits += 1;
         let per = stats.contributors.entry(idx).or_insert_with(|| FileContributor {
            commits:    0,
            last_touch: commit.timestamp,
            days:       BTreeSet::new(),
         });
         per.commits += 1;
         per.last_touch = per.last_touch.max(commit.timestamp);
         per.days.insert(day);

         if let Some(label) = detector.detect_from_path(&change.path)
            && detector.is_programming(&label)
         {
            self.languages[idx]
               .entry(label.clone())
               .or_default()
               .files
               .insert(change.path.clone());
            commit_languages.insert(label);
         }
      }

      for label in commit_languages {
         let acc = self.languages[idx].entry(label).or_default();
         acc.commits += 1;
         match class {
            CommitClass::Feature => acc.feature += 1,
            CommitClass::Bugfix => acc.bugfix += 1,
            _ => {},
         }
      }
   }

   /// Seal the fold: sort timestamp lists so downstream consumers can rely
   /// on ascending order.
   pub fn finish(&mut self) {
      for activity in &mut self.activities {
         activity.timestamps.sort_unstable();
      }
   }

   /// Finalize developer profiles across rayon workers.
   pub fn finalize_profiles(&self) -> Vec<DeveloperProfile> {
      let mut profiles: Vec<DeveloperProfile> = (0..self.interner.len())
         .into_par_iter()
         .map(|idx| self.profile_for(idx))
         .collect();
      profiles.sort_by(|a, b| {
         b.total_commits
            .cmp(&a.total_commits)
            .then_with(|| a.email.cmp(&b.email))
      });
      profiles
   }

   fn profile_for(&self, idx: usize) -> DeveloperProfile {
      let identity = self.interner.get(idx);
      let activity = &self.activities[idx];
      let accum = &self.languages[idx];

      let total_attributions: usize = accum.values().map(|a| a.commits).sum();

      let mut languages: Vec<LanguageCompetency> = accum
         .iter()
         .map(|(language, acc)| {
            let percentage = if total_attributions == 0 {
               0.0
            } else {
               round2(acc.commits as f64 / total_attributions as f64 * 100.0)
            };
            LanguageCompetency {
               language: language.clone(),
               commits: acc.commits,
               file_count: acc.files.len(),
               feature_commits: acc.feature,
               bugfix_commits: acc.bugfix,
               percentage,
            }
         })
         .collect();
      languages.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.language.cmp(&b.language)));
      languages.truncate(MAX_PROFILE_LANGUAGES);

      let top_language = languages.first().map(|l| l.language.clone());
      let breadth = languages.len();
      let competency_score = if activity.commits == 0 {
         0.0
      } else {
         let bugfix_ratio = activity.bugfix_commits as f64 / activity.commits as f64;
         let breadth_bonus = 1.0 + 0.1 * (breadth.saturating_sub(1)) as f64;
         round2(activity.commits as f64 * (1.0 + 0.5 * bugfix_ratio) * breadth_bonus)
      };

      DeveloperProfile {
         email: identity.email.clone(),
         name: identity.name.clone(),
         total_commits: activity.commits,
         feature_commits: activity.feature_commits,
         bugfix_commits: activity.bugfix_commits,
         refactor_commits: activity.refactor_commits,
         other_commits: activity.other_commits,
         languages,
         top_language,
         competency_score,
      }
   }

   /// Ordered per-file owner lists: most-frequent first, ties broken by
   /// case-folded email.
   pub fn file_ownership(&self) -> Vec<FileOwnership> {
      let mut out: Vec<FileOwnership> = self
         .files
         .iter()
         .map(|(path, stats)| {
            let mut ranked: Vec<(usize, usize)> = stats
               .contributors
               .iter()
               .map(|(&idx, per)| (idx, per.commits))
               .collect();
            ranked.sort_by(|a, b| {
               b.1.cmp(&a.1)
                  .then_with(|| self.interner.get(a.0).email.cmp(&self.interner.get(b.0).email))
            });
            FileOwnership {
               path:             path.clone(),
               top_contributors: ranked
                  .into_iter()
                  .map(|(idx, _)| self.interner.get(idx).email.clone())
                  .collect(),
               commit_count:     stats.total_commits,
            }
         })
         .collect();
      out.sort_by(|a, b| b.commit_count.cmp(&a.commit_count).then_with(|| a.path.cmp(&b.path)));
      out
   }

   /// Working-set paths the window never attributed to anyone.
   pub fn orphaned_files(&self, tracked: &[String]) -> Vec<String> {
      let mut orphans: Vec<String> = tracked
         .iter()
         .filter(|path| !self.files.contains_key(*path))
         .cloned()
         .collect();
      orphans.sort_unstable();
      orphans
   }
}

#[cfg(test)]
mod tests {
   use chrono::TimeZone;

   use super::*;
   use crate::{history::FileChange, languages::ExtensionLanguages};

   fn ts(day: u32, hour: u32) -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
   }

   fn commit(
      hash: &str,
      email: &str,
      when: DateTime<Utc>,
      message: &str,
      paths: &[(&str, usize, usize)],
   ) -> CommitRecord {
      CommitRecord {
         hash:         hash.to_string(),
         author_name:  email.split('@').next().unwrap().to_string(),
         author_email: email.to_string(),
         timestamp:    when,
         message:      message.to_string(),
         changes:      paths
            .iter()
            .map(|(path, added, deleted)| FileChange {
               path:    path.to_string(),
               added:   *added,
               deleted: *deleted,
               binary:  false,
            })
            .collect(),
      }
   }

   fn fold(commits: &[CommitRecord]) -> Attribution {
      let detector = ExtensionLanguages;
      let mut attribution = Attribution::new();
      for c in commits {
         attribution.fold_commit(c, &detector);
      }
      attribution.finish();
      attribution
   }

   #[test]
   fn test_class_counts_sum_to_total() {
      let attribution = fold(&[
         commit("1", "a@x.com", ts(4, 0), "feat: add", &[("a.py", 1, 0)]),
         commit("2", "a@x.com", ts(3, 0), "fix: crash", &[("a.py", 1, 0)]),
         commit("3", "a@x.com", ts(2, 0), "refactor guts", &[("a.py", 1, 0)]),
         commit("4", "a@x.com", ts(1, 0), "bump version", &[("a.py", 1, 0)]),
      ]);
      let profile = &attribution.finalize_profiles()[0];
      assert_eq!(profile.total_commits, 4);
      assert_eq!(
         profile.feature_commits
            + profile.bugfix_commits
            + profile.refactor_commits
            + profile.other_commits,
         profile.total_commits
      );
   }

   #[test]
   fn test_language_unique_file_counting() {
      // Alice touches x.go in 3 separate commits and y.go in 1
      let attribution = fold(&[
         commit("1", "alice@x.com", ts(4, 0), "feat: a", &[("x.go", 1, 0)]),
         commit("2", "alice@x.com", ts(3, 0), "feat: b", &[("x.go", 1, 0)]),
         commit("3", "alice@x.com", ts(2, 0), "feat: c", &[("x.go", 1, 0)]),
         commit("4", "alice@x.com", ts(1, 0), "feat: d", &[("y.go", 1, 0)]),
      ]);
      let profile = &attribution.finalize_profiles()[0];
      assert_eq!(profile.languages.len(), 1);
      let go = &profile.languages[0];
      assert_eq!(go.language, "Go");
      assert_eq!(go.commits, 4);
      assert_eq!(go.file_count, 2);
      assert_eq!(go.percentage, 100.0);
      assert_eq!(profile.top_language.as_deref(), Some("Go"));
   }

   #[test]
   fn test_multi_language_commit_counts_each_once() {
      let attribution = fold(&[commit("1", "a@x.com", ts(1, 0), "feat: both", &[
         ("m.rs", 1, 0),
         ("n.rs", 1, 0),
         ("s.py", 1, 0),
      ])]);
      let profile = &attribution.finalize_profiles()[0];
      let rust = profile.languages.iter().find(|l| l.language == "Rust").unwrap();
      let python = profile.languages.iter().find(|l| l.language == "Python").unwrap();
      // One commit: each language counted once, Rust has two unique files
      assert_eq!(rust.commits, 1);
      assert_eq!(rust.file_count, 2);
      assert_eq!(python.commits, 1);
      let total: f64 = profile.languages.iter().map(|l| l.percentage).sum();
      assert!(total <= 100.0 + 1e-6);
   }

   #[test]
   fn test_non_programming_files_excluded_from_competency() {
      let attribution = fold(&[commit("1", "a@x.com", ts(1, 0), "docs", &[
         ("README.md", 5, 0),
         ("data.json", 2, 0),
      ])]);
      let profile = &attribution.finalize_profiles()[0];
      assert!(profile.languages.is_empty());
      assert_eq!(profile.top_language, None);
      // Still counted in the generic file-touch aggregate
      assert_eq!(attribution.activities[0].file_touches, 2);
   }

   #[test]
   fn test_file_ownership_ordering() {
      // Alice: 10 commits on a.py; Bob: 2 commits on a.py
      let mut commits = Vec::new();
      for i in 0..10 {
         commits.push(commit(
            &format!("a{i}"),
            "alice@x.com",
            ts(10, i),
            "feat: add X",
            &[("a.py", 3, 1), ("b.py", 2, 0)],
         ));
      }
      for i in 0..2 {
         commits.push(commit(&format!("b{i}"), "bob@x.com", ts(5, i), "fix: crash", &[(
            "a.py", 1, 1,
         )]));
      }
      let attribution = fold(&commits);
      let files = attribution.file_ownership();
      let a = files.iter().find(|f| f.path == "a.py").unwrap();
      assert_eq!(a.top_contributors, vec!["alice@x.com", "bob@x.com"]);
      assert_eq!(a.commit_count, 12);
   }

   #[test]
   fn test_file_ownership_tie_breaks_by_email() {
      let attribution = fold(&[
         commit("1", "zoe@x.com", ts(2, 0), "feat: a", &[("f.rs", 1, 0)]),
         commit("2", "amy@x.com", ts(1, 0), "feat: b", &[("f.rs", 1, 0)]),
      ]);
      let files = attribution.file_ownership();
      assert_eq!(files[0].top_contributors, vec!["amy@x.com", "zoe@x.com"]);
   }

   #[test]
   fn test_cased_emails_fold_into_one_contributor() {
      let attribution = fold(&[
         commit("1", "Alice@X.com", ts(2, 0), "feat: a", &[("f.rs", 1, 0)]),
         commit("2", "alice@x.com", ts(1, 0), "feat: b", &[("f.rs", 1, 0)]),
      ]);
      assert_eq!(attribution.interner.len(), 1);
      assert_eq!(attribution.activities[0].commits, 2);
   }

   #[test]
   fn test_orphaned_files() {
      let attribution = fold(&[commit("1", "a@x.com", ts(1, 0), "feat", &[("seen.rs", 1, 0)])]);
      let tracked =
         vec!["seen.rs".to_string(), "never.rs".to_string(), "also_never.py".to_string()];
      assert_eq!(attribution.orphaned_files(&tracked), vec!["also_never.py", "never.rs"]);
   }

   #[test]
   fn test_timestamps_sorted_ascending_after_finish() {
      let attribution = fold(&[
         commit("1", "a@x.com", ts(9, 0), "c", &[("f.rs", 1, 0)]),
         commit("2", "a@x.com", ts(3, 0), "b", &[("f.rs", 1, 0)]),
         commit("3", "a@x.com", ts(6, 0), "a", &[("f.rs", 1, 0)]),
      ]);
      let stamps = &attribution.activities[0].timestamps;
      assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
      assert_eq!(attribution.activities[0].last_activity, ts(9, 0));
   }

   #[test]
   fn test_lines_and_touch_aggregates() {
      let attribution = fold(&[
         commit("1", "a@x.com", ts(2, 0), "feat", &[("f.rs", 10, 2), ("g.rs", 5, 5)]),
         commit("2", "a@x.com", ts(1, 0), "fix", &[("f.rs", 1, 1)]),
      ]);
      let activity = &attribution.activities[0];
      assert_eq!(activity.file_touches, 3);
      assert_eq!(activity.lines_added, 16);
      assert_eq!(activity.lines_removed, 8);
   }

   #[test]
   fn test_per_file_day_sets_for_succession() {
      let attribution = fold(&[
         commit("1", "a@x.com", ts(2, 10), "feat", &[("f.rs", 1, 0)]),
         commit("2", "a@x.com", ts(2, 18), "fix", &[("f.rs", 1, 0)]),
         commit("3", "a@x.com", ts(5, 0), "fix", &[("f.rs", 1, 0)]),
      ]);
      let stats = attribution.files.get("f.rs").unwrap();
      let per = stats.contributors.get(&0).unwrap();
      assert_eq!(per.commits, 3);
      // Two commits on the same calendar day collapse into one entry
      assert_eq!(per.days.len(), 2);
   }
}
