use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OwnershipError, Result};

/// Weight of each ownership-score component. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringWeights {
   pub commits:     f64,
   pub reviews:     f64,
   pub lines:       f64,
   pub recency:     f64,
   pub consistency: f64,
}

impl Default for ScoringWeights {
   fn default() -> Self {
      Self { commits: 0.30, reviews: 0.25, lines: 0.20, recency: 0.15, consistency: 0.10 }
   }
}

impl ScoringWeights {
   pub fn sum(&self) -> f64 {
      self.commits + self.reviews + self.lines + self.recency + self.consistency
   }
}

/// Day cutoffs mapping "days since last commit" to an activity label.
/// A contributor past the inactive cutoff is considered abandoned.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityThresholds {
   pub active:   i64,
   pub recent:   i64,
   pub stale:    i64,
   pub inactive: i64,
}

impl Default for ActivityThresholds {
   fn default() -> Self {
      Self { active: 30, recent: 90, stale: 180, inactive: 365 }
   }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
   /// History window lower bound, in days before the wall clock.
   pub period_days: i64,

   pub analyze_contributors: bool,
   pub detect_orphans:       bool,
   pub analyze_competency:   bool,
   pub check_codeowners:     bool,
   pub detect_drift:         bool,

   /// Emit REC-coded recommendations alongside the findings.
   pub emit_recommendations: bool,

   pub scoring_weights: ScoringWeights,

   /// Cumulative-ownership fraction the top contributors must reach.
   pub bus_factor_threshold: f64,

   /// Globs checked against the working tree for uncovered sensitive files.
   pub sensitive_patterns: Vec<String>,

   pub activity_thresholds: ActivityThresholds,

   /// Minimum observed contributors for a file to count as covered.
   pub min_file_contributors: usize,

   /// Minimum commits on a path for a contributor to qualify as a successor.
   pub succession_min_commits: usize,
}

fn default_sensitive_patterns() -> Vec<String> {
   vec![
      "*.pem".to_string(),
      "*.key".to_string(),
      ".env*".to_string(),
      "*secrets*".to_string(),
      "*.tfstate".to_string(),
      "id_rsa*".to_string(),
   ]
}

impl Default for AnalysisConfig {
   fn default() -> Self {
      Self {
         period_days:            90,
         analyze_contributors:   true,
         detect_orphans:         true,
         analyze_competency:     true,
         check_codeowners:       true,
         detect_drift:           true,
         emit_recommendations:   true,
         scoring_weights:        ScoringWeights::default(),
         bus_factor_threshold:   0.5,
         sensitive_patterns:     default_sensitive_patterns(),
         activity_thresholds:    ActivityThresholds::default(),
         min_file_contributors:  1,
         succession_min_commits: 5,
      }
   }
}

impl AnalysisConfig {
   /// Load config from default location (~/.config/owner-git/config.toml)
   /// Falls back to Default if the file doesn't exist. `OGIT_CONFIG`
   /// overrides the path.
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("OGIT_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_else(|_| PathBuf::new())
      };

      let config = if config_path.exists() {
         Self::from_file(&config_path)?
      } else {
         Self::default()
      };

      config.validate()?;
      Ok(config)
   }

   /// Load config from a specific file.
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| OwnershipError::Other(format!("Failed to read config: {e}")))?;
      let config: Self = toml::from_str(&contents)
         .map_err(|e| OwnershipError::Other(format!("Failed to parse config: {e}")))?;
      config.validate()?;
      Ok(config)
   }

   /// Validate invariants before any walk starts.
   pub fn validate(&self) -> Result<()> {
      let sum = self.scoring_weights.sum();
      if (sum - 1.0).abs() > 1e-6 {
         return Err(OwnershipError::ConfigInvalid(format!(
            "scoring weights must sum to 1.0, got {sum}"
         )));
      }
      if self.period_days <= 0 {
         return Err(OwnershipError::ConfigInvalid(format!(
            "period_days must be positive, got {}",
            self.period_days
         )));
      }
      if !(0.0..=1.0).contains(&self.bus_factor_threshold) {
         return Err(OwnershipError::ConfigInvalid(format!(
            "bus_factor_threshold must be in [0, 1], got {}",
            self.bus_factor_threshold
         )));
      }
      let t = &self.activity_thresholds;
      if !(t.active <= t.recent && t.recent <= t.stale && t.stale <= t.inactive) {
         return Err(OwnershipError::ConfigInvalid(
            "activity thresholds must be non-decreasing".to_string(),
         ));
      }
      Ok(())
   }

   /// Get default config path (platform-safe)
   /// Tries HOME (Unix/Linux/macOS) then USERPROFILE (Windows)
   pub fn default_config_path() -> Result<PathBuf> {
      if let Ok(home) = std::env::var("HOME") {
         return Ok(PathBuf::from(home).join(".config/owner-git/config.toml"));
      }

      if let Ok(home) = std::env::var("USERPROFILE") {
         return Ok(PathBuf::from(home).join(".config/owner-git/config.toml"));
      }

      Err(OwnershipError::Other("No home directory found (tried HOME and USERPROFILE)".to_string()))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_default_weights_sum_to_one() {
      let config = AnalysisConfig::default();
      assert!((config.scoring_weights.sum() - 1.0).abs() < 1e-9);
      assert!(config.validate().is_ok());
   }

   #[test]
   fn test_bad_weights_rejected() {
      let mut config = AnalysisConfig::default();
      config.scoring_weights.commits = 0.9;
      let err = config.validate().unwrap_err();
      assert!(matches!(err, OwnershipError::ConfigInvalid(_)));
   }

   #[test]
   fn test_bad_threshold_rejected() {
      let mut config = AnalysisConfig::default();
      config.bus_factor_threshold = 1.5;
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_non_monotonic_thresholds_rejected() {
      let mut config = AnalysisConfig::default();
      config.activity_thresholds.recent = 10;
      assert!(config.validate().is_err());
   }

   #[test]
   fn test_toml_partial_override() {
      let config: AnalysisConfig = toml::from_str(
         r#"
         period_days = 30
         detect_drift = false

         [scoring_weights]
         commits = 0.40
         reviews = 0.15
         "#,
      )
      .unwrap();
      assert_eq!(config.period_days, 30);
      assert!(!config.detect_drift);
      assert!(config.check_codeowners);
      assert_eq!(config.scoring_weights.commits, 0.40);
      assert_eq!(config.scoring_weights.lines, 0.20);
      assert!(config.validate().is_ok());
   }

   #[test]
   fn test_default_activity_thresholds() {
      let t = ActivityThresholds::default();
      assert_eq!((t.active, t.recent, t.stale, t.inactive), (30, 90, 180, 365));
   }
}
