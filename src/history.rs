//! History walker over `git` subprocess output.
//!
//! One `git log` invocation produces the whole window: commits newest first,
//! each followed by its numstat block (the diff against the first parent; a
//! root commit reports its full tree as added). Records are parsed lazily by
//! [`LogRecords`]; corrupt records become diagnostics, not failures.

use std::{path::Path, process::Command};

use chrono::{DateTime, Utc};

use crate::error::{OwnershipError, Result};

/// Record separator between commits in the log pretty-format.
const RECORD_SEP: char = '\u{1e}';
/// Field separator within a commit record.
const FIELD_SEP: char = '\u{1f}';

/// hash / author name / author email / author date (strict ISO) / full
/// message, then the numstat block runs until the next record separator.
const LOG_FORMAT: &str = "%x1e%H%x1f%an%x1f%ae%x1f%aI%x1f%B%x1f";

/// One touched path within a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
   pub path:    String,
   pub added:   usize,
   pub deleted: usize,
   /// Numstat reports `-` counts for binary files.
   pub binary:  bool,
}

/// A commit materialized while walking; not persisted anywhere.
#[derive(Debug, Clone)]
pub struct CommitRecord {
   pub hash:         String,
   pub author_name:  String,
   pub author_email: String,
   pub timestamp:    DateTime<Utc>,
   pub message:      String,
   pub changes:      Vec<FileChange>,
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
   let output = Command::new("git")
      .args(args)
      .current_dir(dir)
      .output()
      .map_err(|e| OwnershipError::GitError(format!("Failed to run git {}: {e}", args[0])))?;

   if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(OwnershipError::GitError(format!("git {} failed: {stderr}", args[0])));
   }

   Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check that `dir` is inside a git repository.
pub fn open_repo(dir: &Path) -> Result<()> {
   run_git(dir, &["rev-parse", "--git-dir"])
      .map_err(|e| OwnershipError::HistoryUnavailable(format!("{}: {e}", dir.display())))?;
   Ok(())
}

/// Resolve the tip commit. `None` for a valid repository with no commits yet
/// (an empty history is a normal outcome, not an error).
pub fn head_commit(dir: &Path) -> Result<Option<String>> {
   let output = Command::new("git")
      .args(["rev-parse", "--verify", "--quiet", "HEAD"])
      .current_dir(dir)
      .output()
      .map_err(|e| OwnershipError::GitError(format!("Failed to resolve HEAD: {e}")))?;

   if !output.status.success() {
      return Ok(None);
   }
   Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}

/// Whether the clone's history was truncated at clone time.
pub fn is_shallow(dir: &Path) -> bool {
   run_git(dir, &["rev-parse", "--is-shallow-repository"])
      .map(|out| out.trim() == "true")
      .unwrap_or(false)
}

/// Authored timestamp of the newest reachable commit.
pub fn newest_commit_time(dir: &Path) -> Option<DateTime<Utc>> {
   let out = run_git(dir, &["log", "-1", "--pretty=%aI"]).ok()?;
   DateTime::parse_from_rfc3339(out.trim())
      .ok()
      .map(|dt| dt.with_timezone(&Utc))
}

/// Working-set paths (`git ls-files`), used for orphan detection, coverage,
/// and sensitive-pattern checks.
pub fn list_tracked_files(dir: &Path) -> Result<Vec<String>> {
   let out = run_git(dir, &["ls-files"])?;
   Ok(out.lines().filter(|l| !l.is_empty()).map(|l| l.to_string()).collect())
}

/// Raw log output for all commits reachable from `tip` authored after
/// `since`, newest first.
pub fn log_since(dir: &Path, tip: &str, since: DateTime<Utc>) -> Result<String> {
   let since_arg = format!("--since={}", since.to_rfc3339());
   run_git(dir, &[
      "log",
      tip,
      &since_arg,
      "--numstat",
      &format!("--pretty=format:{LOG_FORMAT}"),
   ])
}

/// Lazy parser over raw `git log` output. Yields `Ok(record)` per parseable
/// commit and `Err(diagnostic)` for records that must be skipped.
pub fn parse_log(raw: &str) -> LogRecords<'_> {
   LogRecords { chunks: raw.split(RECORD_SEP) }
}

pub struct LogRecords<'a> {
   chunks: std::str::Split<'a, char>,
}

impl Iterator for LogRecords<'_> {
   type Item = std::result::Result<CommitRecord, String>;

   fn next(&mut self) -> Option<Self::Item> {
      loop {
         let chunk = self.chunks.next()?;
         if chunk.trim().is_empty() {
            continue;
         }
         return Some(parse_record(chunk));
      }
   }
}

fn parse_record(chunk: &str) -> std::result::Result<CommitRecord, String> {
   let parts: Vec<&str> = chunk.splitn(6, FIELD_SEP).collect();
   if parts.len() < 6 {
      let head = chunk.lines().next().unwrap_or("");
      return Err(format!("skipping malformed log record starting at {head:.16}"));
   }

   let hash = parts[0].trim().to_string();
   let timestamp = DateTime::parse_from_rfc3339(parts[3].trim())
      .map_err(|e| format!("skipping commit {hash}: bad author date: {e}"))?
      .with_timezone(&Utc);

   let changes = parts[5]
      .lines()
      .filter(|line| !line.trim().is_empty())
      .filter_map(parse_numstat_line)
      .collect();

   Ok(CommitRecord {
      hash,
      author_name: parts[1].trim().to_string(),
      author_email: parts[2].trim().to_string(),
      timestamp,
      message: parts[4].trim().to_string(),
      changes,
   })
}

/// Parse one numstat line: "added\tdeleted\tpath". Binary files carry `-`
/// counts. Returns `None` for lines that are not numstat entries.
fn parse_numstat_line(line: &str) -> Option<FileChange> {
   let parts: Vec<&str> = line.split('\t').collect();
   if parts.len() < 3 {
      return None;
   }

   let binary = parts[0] == "-" || parts[1] == "-";
   let added = parts[0].parse::<usize>().unwrap_or(0);
   let deleted = parts[1].parse::<usize>().unwrap_or(0);
   // Paths may themselves contain tabs when quoted; rejoin the tail
   let path = extract_path_from_rename(&parts[2..].join("\t"));
   if path.is_empty() {
      return None;
   }

   Some(FileChange { path, added, deleted, binary })
}

/// Extract new path from rename syntax (handles both brace and arrow forms)
pub fn extract_path_from_rename(path_part: &str) -> String {
   // Handle renames with brace syntax: "lib/wal/{io_worker.rs => io.rs}"
   if let Some(brace_start) = path_part.find('{') {
      if let Some(arrow_pos) = path_part[brace_start..].find(" => ") {
         let arrow_abs = brace_start + arrow_pos;
         if let Some(brace_end) = path_part[arrow_abs..].find('}') {
            let brace_end_abs = arrow_abs + brace_end;
            let prefix = &path_part[..brace_start];
            let suffix = &path_part[brace_end_abs + 1..];
            let new_name = path_part[arrow_abs + 4..brace_end_abs].trim();
            return format!("{prefix}{new_name}{suffix}").replace("//", "/");
         }
      }
   } else if path_part.contains(" => ") {
      // Simple arrow syntax: "old/path => new/path"
      return path_part
         .split(" => ")
         .nth(1)
         .unwrap_or(path_part)
         .trim()
         .to_string();
   }

   path_part.trim().to_string()
}

/// Graduated window extensions when the requested window yields no commits:
/// 90 -> 180 -> 365 -> repo age + 30 days.
pub fn adaptive_steps(requested_days: i64, repo_age_days: i64) -> Vec<i64> {
   let mut steps: Vec<i64> = [180, 365, repo_age_days + 30]
      .into_iter()
      .filter(|&d| d > requested_days)
      .collect();
   steps.sort_unstable();
   steps.dedup();
   steps
}

#[cfg(test)]
mod tests {
   use super::*;

   const RS: char = '\u{1e}';
   const FS: char = '\u{1f}';

   fn record(hash: &str, email: &str, date: &str, message: &str, numstat: &str) -> String {
      format!("{RS}{hash}{FS}Author{FS}{email}{FS}{date}{FS}{message}{FS}\n{numstat}")
   }

   #[test]
   fn test_parse_single_record() {
      let raw = record(
         "abc123",
         "alice@example.com",
         "2024-03-01T10:00:00+00:00",
         "feat: add X",
         "10\t2\tsrc/main.rs\n5\t0\tREADME.md\n",
      );
      let records: Vec<_> = parse_log(&raw).collect::<std::result::Result<Vec<_>, _>>().unwrap();

      assert_eq!(records.len(), 1);
      let c = &records[0];
      assert_eq!(c.hash, "abc123");
      assert_eq!(c.author_email, "alice@example.com");
      assert_eq!(c.message, "feat: add X");
      assert_eq!(c.changes.len(), 2);
      assert_eq!(c.changes[0], FileChange {
         path:    "src/main.rs".to_string(),
         added:   10,
         deleted: 2,
         binary:  false,
      });
   }

   #[test]
   fn test_parse_multiple_records_newest_first_order_kept() {
      let raw = format!(
         "{}{}",
         record("a1", "a@x.com", "2024-03-02T00:00:00Z", "fix: crash", "1\t1\ta.py\n"),
         record("a2", "b@x.com", "2024-03-01T00:00:00Z", "feat: add", "2\t0\tb.py\n"),
      );
      let records: Vec<_> = parse_log(&raw).collect::<std::result::Result<Vec<_>, _>>().unwrap();
      assert_eq!(records.len(), 2);
      assert_eq!(records[0].hash, "a1");
      assert_eq!(records[1].hash, "a2");
   }

   #[test]
   fn test_parse_multiline_message() {
      let raw = record(
         "abc",
         "a@x.com",
         "2024-01-01T00:00:00Z",
         "feat: subject\n\nLonger body.\nCloses #12",
         "1\t0\tx.go\n",
      );
      let records: Vec<_> = parse_log(&raw).collect::<std::result::Result<Vec<_>, _>>().unwrap();
      assert!(records[0].message.contains("Closes #12"));
   }

   #[test]
   fn test_parse_binary_numstat() {
      let raw = record("abc", "a@x.com", "2024-01-01T00:00:00Z", "add image", "-\t-\tlogo.png\n");
      let records: Vec<_> = parse_log(&raw).collect::<std::result::Result<Vec<_>, _>>().unwrap();
      let change = &records[0].changes[0];
      assert!(change.binary);
      assert_eq!((change.added, change.deleted), (0, 0));
   }

   #[test]
   fn test_parse_malformed_record_yields_diagnostic() {
      let good = record("ok1", "a@x.com", "2024-01-01T00:00:00Z", "fine", "1\t0\tf.rs\n");
      let raw = format!("{RS}garbage-without-separators{good}");
      let items: Vec<_> = parse_log(&raw).collect();
      assert_eq!(items.len(), 2);
      assert!(items[0].is_err());
      assert!(items[1].is_ok());
   }

   #[test]
   fn test_parse_bad_date_yields_diagnostic() {
      let raw = record("abc", "a@x.com", "not-a-date", "msg", "1\t0\tf.rs\n");
      let items: Vec<_> = parse_log(&raw).collect();
      assert_eq!(items.len(), 1);
      assert!(items[0].as_ref().unwrap_err().contains("bad author date"));
   }

   #[test]
   fn test_parse_empty_log() {
      assert_eq!(parse_log("").count(), 0);
      assert_eq!(parse_log("\n").count(), 0);
   }

   #[test]
   fn test_timestamp_converted_to_utc() {
      let raw = record("abc", "a@x.com", "2024-06-01T12:00:00+02:00", "msg", "1\t0\tf.rs\n");
      let records: Vec<_> = parse_log(&raw).collect::<std::result::Result<Vec<_>, _>>().unwrap();
      assert_eq!(records[0].timestamp.to_rfc3339(), "2024-06-01T10:00:00+00:00");
   }

   // Rename extraction

   #[test]
   fn test_extract_path_from_rename_brace() {
      assert_eq!(
         extract_path_from_rename("lib/{old => new}/file.rs"),
         "lib/new/file.rs"
      );
   }

   #[test]
   fn test_extract_path_from_rename_brace_file() {
      assert_eq!(
         extract_path_from_rename("src/api/{client.rs => http_client.rs}"),
         "src/api/http_client.rs"
      );
   }

   #[test]
   fn test_extract_path_from_rename_brace_empty_side() {
      // "dir/{ => sub}/f.rs" inserts a new directory level
      assert_eq!(extract_path_from_rename("dir/{ => sub}/f.rs"), "dir/sub/f.rs");
   }

   #[test]
   fn test_extract_path_from_rename_arrow() {
      assert_eq!(extract_path_from_rename("old/file.rs => new/file.rs"), "new/file.rs");
   }

   #[test]
   fn test_extract_path_from_rename_plain() {
      assert_eq!(extract_path_from_rename("lib/file.rs"), "lib/file.rs");
   }

   #[test]
   fn test_extract_path_from_rename_malformed_brace() {
      // Missing closing brace - falls back to original
      assert_eq!(
         extract_path_from_rename("lib/{old => new/file.rs"),
         "lib/{old => new/file.rs"
      );
   }

   #[test]
   fn test_rename_does_not_duplicate_slash() {
      assert_eq!(extract_path_from_rename("a/{b => c}/d.rs"), "a/c/d.rs");
   }

   // Adaptive window

   #[test]
   fn test_adaptive_steps_from_default_window() {
      assert_eq!(adaptive_steps(90, 400), vec![180, 365, 430]);
   }

   #[test]
   fn test_adaptive_steps_skip_smaller_than_requested() {
      assert_eq!(adaptive_steps(365, 400), vec![430]);
   }

   #[test]
   fn test_adaptive_steps_young_repo() {
      // age + 30 below the graduated steps collapses into them
      assert_eq!(adaptive_steps(90, 100), vec![130, 180, 365]);
   }
}
