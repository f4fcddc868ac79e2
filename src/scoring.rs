//! Ownership scoring and fleet-level risk indicators.
//!
//! Five additive components per contributor, each normalized to the cohort
//! maximum and scaled by its configured weight. When the cohort carries no
//! review data at all, the remaining components are rescaled so a sole
//! contributor can still reach 100.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{
   attribution::ContributorActivity,
   config::{ActivityThresholds, ScoringWeights},
   identity::IdentityInterner,
   types::{ActivityLevel, BusFactorRisk, FileOwnership, OwnershipScore},
};

/// Half-life of the recency decay, in days.
const RECENCY_HALF_LIFE_DAYS: f64 = 90.0;

pub(crate) fn round2(x: f64) -> f64 {
   (x * 100.0).round() / 100.0
}

/// Everything the scorer consumes; all borrowed, nothing mutated.
pub struct ScoreInputs<'a> {
   pub interner:   &'a IdentityInterner,
   pub activities: &'a [ContributorActivity],
   /// Canonical email -> review count; empty when no feed is available.
   pub reviews:    &'a HashMap<String, usize>,
   pub now:        DateTime<Utc>,
   pub weights:    ScoringWeights,
   pub thresholds: ActivityThresholds,
}

/// Compute per-contributor ownership scores, ordered by total descending
/// with ties broken by case-folded email.
pub fn compute_scores(inputs: &ScoreInputs<'_>) -> Vec<OwnershipScore> {
   let review_count = |activity: &ContributorActivity| -> usize {
      let email = &inputs.interner.get(activity.identity).email;
      inputs.reviews.get(email).copied().unwrap_or(0)
   };

   let max_commits = inputs.activities.iter().map(|a| a.commits).max().unwrap_or(0).max(1);
   let max_reviews = inputs.activities.iter().map(&review_count).max().unwrap_or(0).max(1);
   let max_lines = inputs
      .activities
      .iter()
      .map(|a| a.lines_added + a.lines_removed)
      .max()
      .unwrap_or(0)
      .max(1);

   let has_review_data = inputs.activities.iter().any(|a| review_count(a) > 0);

   // Without a review feed the reviews component is structurally zero;
   // rescale the others so the achievable maximum stays 100.
   let w = inputs.weights;
   let rescale = if has_review_data || w.reviews >= 1.0 { 1.0 } else { 1.0 / (1.0 - w.reviews) };

   let mut scores: Vec<OwnershipScore> = inputs
      .activities
      .iter()
      .map(|activity| {
         let identity = inputs.interner.get(activity.identity);
         let reviews = review_count(activity);
         let lines = activity.lines_added + activity.lines_removed;
         let delta_days = days_between(activity.last_activity, inputs.now);

         let commits_score =
            activity.commits as f64 / max_commits as f64 * w.commits * 100.0 * rescale;
         let reviews_score = reviews as f64 / max_reviews as f64 * w.reviews * 100.0;
         let lines_score = lines as f64 / max_lines as f64 * w.lines * 100.0 * rescale;
         let recency_score = recency_factor(delta_days) * w.recency * 100.0 * rescale;
         let consistency_score =
            consistency_factor(&activity.timestamps) * w.consistency * 100.0 * rescale;

         let total = (commits_score + reviews_score + lines_score + recency_score
            + consistency_score)
            .clamp(0.0, 100.0);

         OwnershipScore {
            email: identity.email.clone(),
            name: identity.name.clone(),
            total: round2(total),
            commits_score: round2(commits_score),
            reviews_score: round2(reviews_score),
            lines_score: round2(lines_score),
            recency_score: round2(recency_score),
            consistency_score: round2(consistency_score),
            activity: activity_level(delta_days, inputs.thresholds),
            confidence: confidence(activity, has_review_data),
            commit_count: activity.commits,
            review_count: reviews,
            lines_changed: lines,
            last_activity: activity.last_activity,
         }
      })
      .collect();

   scores.sort_by(|a, b| {
      b.total
         .partial_cmp(&a.total)
         .unwrap_or(std::cmp::Ordering::Equal)
         .then_with(|| a.email.cmp(&b.email))
   });
   scores
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
   ((later - earlier).num_seconds() as f64 / 86_400.0).max(0.0)
}

/// Exponential decay with a 90-day half-life.
fn recency_factor(delta_days: f64) -> f64 {
   (2.0_f64).powf(-delta_days / RECENCY_HALF_LIFE_DAYS)
}

/// Cadence regularity from the sorted authored-timestamp list.
///
/// Fewer than two timestamps is neutral (0.5). All commits on one instant
/// (mean gap zero) is perfectly consistent. Otherwise the coefficient of
/// variation of the day-gaps maps onto [0, 1] via `1 - CV/2`.
pub fn consistency_factor(timestamps: &[DateTime<Utc>]) -> f64 {
   if timestamps.len() < 2 {
      return 0.5;
   }

   let gaps: Vec<f64> = timestamps
      .windows(2)
      .map(|w| days_between(w[0], w[1]))
      .collect();
   let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
   if mean == 0.0 {
      return 1.0;
   }

   let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
   let cv = variance.sqrt() / mean;
   (1.0 - cv / 2.0).clamp(0.0, 1.0)
}

/// Map days-since-last-commit onto an activity label.
pub fn activity_level(delta_days: f64, thresholds: ActivityThresholds) -> ActivityLevel {
   if delta_days <= thresholds.active as f64 {
      ActivityLevel::Active
   } else if delta_days <= thresholds.recent as f64 {
      ActivityLevel::Recent
   } else if delta_days <= thresholds.stale as f64 {
      ActivityLevel::Stale
   } else if delta_days <= thresholds.inactive as f64 {
      ActivityLevel::Inactive
   } else {
      ActivityLevel::Abandoned
   }
}

fn confidence(activity: &ContributorActivity, has_review_data: bool) -> f64 {
   let mut value: f64 = 0.5;
   if activity.commits >= 10 {
      value += 0.2;
   } else if activity.commits >= 5 {
      value += 0.1;
   }
   if has_review_data {
      value += 0.2;
   }
   if activity.timestamps.len() >= 5 {
      value += 0.1;
   }
   round2(value.min(1.0))
}

/// Smallest k such that the top-k cumulative score reaches `threshold` of
/// the cohort total, with its risk band. Empty cohort is (0, critical).
pub fn bus_factor(scores: &[OwnershipScore], threshold: f64) -> (usize, BusFactorRisk) {
   if scores.is_empty() {
      return (0, BusFactorRisk::Critical);
   }

   let total: f64 = scores.iter().map(|s| s.total).sum();
   let k = if total <= 0.0 {
      scores.len()
   } else {
      let mut cumulative = 0.0;
      let mut k = scores.len();
      for (i, score) in scores.iter().enumerate() {
         cumulative += score.total;
         if cumulative / total >= threshold {
            k = i + 1;
            break;
         }
      }
      k
   };

   let risk = if k <= 2 {
      BusFactorRisk::Critical
   } else if k <= 5 {
      BusFactorRisk::Warning
   } else {
      BusFactorRisk::Healthy
   };
   (k, risk)
}

/// Fraction of the working set with at least `min_contributors` observed
/// contributors. An empty file set is fully covered.
pub fn ownership_coverage(
   file_owners: &[FileOwnership],
   total_files: usize,
   min_contributors: usize,
) -> f64 {
   let total = total_files.max(file_owners.len());
   if total == 0 {
      return 1.0;
   }
   let covered = file_owners
      .iter()
      .filter(|f| f.top_contributors.len() >= min_contributors)
      .count();
   (covered as f64 / total as f64).clamp(0.0, 1.0)
}
