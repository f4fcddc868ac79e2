//! Succession planning: who takes over a path when its primary owner is
//! unavailable, and which mentor/mentee pairings would close the gap.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::{
   attribution::{FileContributor, FileStats},
   codeowners::PatternMatcher,
   identity::IdentityInterner,
   scoring::round2,
   types::{BackupContact, CodeownerRule, ContactPriority, IncidentContact, Mentorship},
};

/// Paths need this many commits in the window to get a contact plan.
const NOTABLE_MIN_COMMITS: usize = 3;

/// Upper bound on planned paths, keeping reports readable for huge repos.
const NOTABLE_MAX_PATHS: usize = 100;

/// Backup successors listed per path.
const MAX_BACKUPS: usize = 3;

/// Readiness band that makes a candidate a mentee rather than a backup.
const MENTORSHIP_BAND: (f64, f64) = (20.0, 60.0);

/// Readiness below this for a lone successor escalates the path to High.
const LONE_SUCCESSOR_READINESS: f64 = 40.0;

/// Primary ownership share that marks concentration (Medium priority).
const CONCENTRATION_SHARE: f64 = 0.8;

/// Takeover readiness of `successor` relative to `primary` on one path,
/// in [0, 100]. Familiarity (lines currently authored) requires blame data
/// the engine does not collect, so that component contributes 0.
pub fn readiness(
   successor: &FileContributor,
   primary: &FileContributor,
   now: DateTime<Utc>,
) -> f64 {
   let frequency = if primary.commits == 0 {
      30.0
   } else {
      (successor.commits as f64 / primary.commits as f64 * 30.0).min(30.0)
   };

   let delta_days = ((now - successor.last_touch).num_seconds() as f64 / 86_400.0).max(0.0);
   let recency = if delta_days <= 30.0 {
      25.0
   } else if delta_days <= 60.0 {
      20.0
   } else if delta_days <= 90.0 {
      15.0
   } else {
      10.0
   };

   let familiarity = 0.0;

   let shared_days = successor.days.intersection(&primary.days).count();
   let collaboration = (5.0 * shared_days as f64).min(20.0);

   round2(frequency + recency + familiarity + collaboration)
}

struct PathPlan {
   contact:  IncidentContact,
   /// Best backup readiness, for ordering within a priority tier.
   top_readiness: f64,
   mentees:  Vec<(String, String)>,
}

/// Build the contact plan and mentorship pairings for every notable path.
pub fn plan_contacts(
   files: &IndexMap<String, FileStats>,
   interner: &IdentityInterner,
   rules: &[CodeownerRule],
   now: DateTime<Utc>,
   min_commits: usize,
) -> (Vec<IncidentContact>, Vec<Mentorship>) {
   let mut notable: Vec<(&String, &FileStats)> = files
      .iter()
      .filter(|(_, stats)| stats.total_commits >= NOTABLE_MIN_COMMITS)
      .collect();
   notable.sort_by(|a, b| b.1.total_commits.cmp(&a.1.total_commits).then_with(|| a.0.cmp(b.0)));
   notable.truncate(NOTABLE_MAX_PATHS);

   let matchers: Vec<(String, PatternMatcher)> = rules
      .iter()
      .map(|r| (r.pattern.clone(), PatternMatcher::compile(&r.pattern)))
      .collect();

   let mut plans: Vec<PathPlan> = notable
      .par_iter()
      .map(|(path, stats)| plan_path(path, stats, interner, &matchers, now, min_commits))
      .collect();

   plans.sort_by(|a, b| {
      a.contact
         .priority
         .cmp(&b.contact.priority)
         .then_with(|| {
            b.top_readiness
               .partial_cmp(&a.top_readiness)
               .unwrap_or(std::cmp::Ordering::Equal)
         })
         .then_with(|| a.contact.primary.cmp(&b.contact.primary))
         .then_with(|| a.contact.path.cmp(&b.contact.path))
   });

   // Group mentee pairs across paths
   let mut pair_counts: IndexMap<(String, String), usize> = IndexMap::new();
   for plan in &plans {
      for pair in &plan.mentees {
         *pair_counts.entry(pair.clone()).or_insert(0) += 1;
      }
   }
   let mut mentorships: Vec<Mentorship> = pair_counts
      .into_iter()
      .map(|((mentor, mentee), shared_paths)| Mentorship { mentor, mentee, shared_paths })
      .collect();
   mentorships.sort_by(|a, b| {
      b.shared_paths
         .cmp(&a.shared_paths)
         .then_with(|| a.mentor.cmp(&b.mentor))
         .then_with(|| a.mentee.cmp(&b.mentee))
   });

   (plans.into_iter().map(|p| p.contact).collect(), mentorships)
}

fn plan_path(
   path: &str,
   stats: &FileStats,
   interner: &IdentityInterner,
   matchers: &[(String, PatternMatcher)],
   now: DateTime<Utc>,
   min_commits: usize,
) -> PathPlan {
   let mut ranked: Vec<(usize, &FileContributor)> =
      stats.contributors.iter().map(|(&idx, per)| (idx, per)).collect();
   ranked.sort_by(|a, b| {
      b.1.commits
         .cmp(&a.1.commits)
         .then_with(|| interner.get(a.0).email.cmp(&interner.get(b.0).email))
   });

   let (primary_idx, primary) = ranked[0];
   let primary_email = interner.get(primary_idx).email.clone();
   let path_commits: usize = ranked.iter().map(|(_, per)| per.commits).sum();
   let primary_share =
      if path_commits == 0 { 0.0 } else { primary.commits as f64 / path_commits as f64 };

   let mut backups = Vec::new();
   let mut mentees = Vec::new();
   let mut qualified = Vec::new();
   for (idx, per) in &ranked[1..] {
      let score = readiness(per, primary, now);
      let email = interner.get(*idx).email.clone();
      if per.commits >= min_commits {
         qualified.push(score);
         backups.push(BackupContact { email: email.clone(), readiness: score });
      }
      if (MENTORSHIP_BAND.0..=MENTORSHIP_BAND.1).contains(&score) {
         mentees.push((primary_email.clone(), email));
      }
   }
   backups.sort_by(|a, b| {
      b.readiness
         .partial_cmp(&a.readiness)
         .unwrap_or(std::cmp::Ordering::Equal)
         .then_with(|| a.email.cmp(&b.email))
   });
   backups.truncate(MAX_BACKUPS);

   let priority = if qualified.is_empty() {
      ContactPriority::Critical
   } else if qualified.len() == 1 && qualified[0] < LONE_SUCCESSOR_READINESS {
      ContactPriority::High
   } else if primary_share >= CONCENTRATION_SHARE {
      ContactPriority::Medium
   } else {
      ContactPriority::Low
   };

   // Last matching rule wins, mirroring CODEOWNERS precedence
   let rule = matchers
      .iter()
      .rev()
      .find(|(_, m)| m.matches(path))
      .map(|(pattern, _)| pattern.clone());

   let top_readiness = backups.first().map_or(0.0, |b| b.readiness);

   PathPlan {
      contact: IncidentContact {
         path: path.to_string(),
         primary: vec![primary_email],
         backup: backups,
         priority,
         rule,
      },
      top_readiness,
      mentees,
   }
}
