use std::{collections::HashMap, fs, path::Path};

use clap::Parser;
use owner_git::*;

use config::AnalysisConfig;
use engine::AnalysisEngine;
use error::{OwnershipError, Result};
use identity::canonical_email;
use types::{AnalysisResult, Args, BusFactorRisk};

/// Load config from args or default
fn load_config_from_args(args: &Args) -> Result<AnalysisConfig> {
   if let Some(ref config_path) = args.config {
      AnalysisConfig::from_file(config_path)
   } else {
      AnalysisConfig::load()
   }
}

/// Apply CLI overrides to config
fn apply_cli_overrides(config: &mut AnalysisConfig, args: &Args) {
   if let Some(period) = args.period_days {
      config.period_days = period;
   }
   if let Some(threshold) = args.bus_threshold {
      config.bus_factor_threshold = threshold;
   }
   if args.no_codeowners {
      config.check_codeowners = false;
   }
   if args.no_competency {
      config.analyze_competency = false;
   }
   if args.no_drift {
      config.detect_drift = false;
   }
   if args.no_orphans {
      config.detect_orphans = false;
   }
}

/// Load the optional review feed: a JSON object of email -> review count.
fn load_reviews(path: &Path) -> Result<HashMap<String, usize>> {
   let contents = fs::read_to_string(path)
      .map_err(|e| OwnershipError::Other(format!("Failed to read reviews file: {e}")))?;
   let raw: HashMap<String, usize> = serde_json::from_str(&contents)?;
   Ok(raw
      .into_iter()
      .map(|(email, count)| (canonical_email(&email), count))
      .collect())
}

/// Short human-readable summary on stderr; the JSON report is the real output.
fn print_summary(result: &AnalysisResult) {
   let s = &result.summary;
   eprintln!("{}", style::bold("Ownership analysis"));
   eprintln!(
      "  {} contributors, {} files, {} day window",
      style::bold(&s.total_contributors.to_string()),
      s.files_analyzed,
      s.period_days
   );

   let risk = match s.bus_factor_risk {
      BusFactorRisk::Critical => style::error("critical"),
      BusFactorRisk::Warning => style::warning("warning"),
      BusFactorRisk::Healthy => style::success("healthy"),
   };
   eprintln!("  bus factor {} ({risk})", style::bold(&s.bus_factor.to_string()));
   eprintln!("  ownership coverage {:.0}%", s.ownership_coverage * 100.0);

   if s.has_codeowners {
      eprintln!("  CODEOWNERS: {} rules, {} issues", s.codeowners_rules, s.codeowners_issues);
   } else {
      eprintln!("  CODEOWNERS: {}", style::warning("missing"));
   }
   if let Some(analysis) = &result.findings.codeowners_analysis
      && analysis.has_drift
   {
      eprintln!("  drift score {}", style::warning(&format!("{:.1}", analysis.drift_score)));
   }
   if s.orphaned_files > 0 {
      eprintln!("  {} orphaned files", style::warning(&s.orphaned_files.to_string()));
   }
   if s.is_shallow_clone {
      eprintln!("  {}", style::warning("shallow clone: results may be incomplete"));
   }
   if s.partial {
      eprintln!("  {}", style::warning("partial result (analysis interrupted)"));
   }

   for warning in &s.warnings {
      eprintln!("{} {}", style::warning("warning:"), warning);
   }
   for error in &s.errors {
      eprintln!("{} {}", style::error("error:"), error);
   }
}

fn main() -> Result<()> {
   let args = Args::parse();

   // Load config and apply CLI overrides
   let mut config = load_config_from_args(&args)?;
   apply_cli_overrides(&mut config, &args);

   let mut engine = AnalysisEngine::new(config);
   if let Some(ref reviews_path) = args.reviews {
      engine = engine.with_reviews(load_reviews(reviews_path)?);
   }

   let result = engine.analyze(&args.dir)?;

   let json = if args.compact {
      serde_json::to_string(&result)?
   } else {
      serde_json::to_string_pretty(&result)?
   };

   match args.output {
      Some(ref path) => {
         fs::write(path, &json)?;
         eprintln!("Report written to {}", style::dim(&path.display().to_string()));
      },
      None => println!("{json}"),
   }

   if !args.quiet {
      print_summary(&result);
   }

   Ok(())
}
