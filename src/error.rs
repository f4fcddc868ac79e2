use thiserror::Error;

#[derive(Debug, Error)]
pub enum OwnershipError {
   #[error("History unavailable: {0}")]
   HistoryUnavailable(String),

   #[error("History traversal aborted: {0}")]
   TraversalAborted(String),

   #[error("CODEOWNERS parse failed: {0}")]
   ParseError(String),

   #[error("Invalid configuration: {0}")]
   ConfigInvalid(String),

   #[error("Git command failed: {0}")]
   GitError(String),

   #[error("IO error: {0}")]
   IoError(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("{0}")]
   Other(String),
}

pub type Result<T> = std::result::Result<T, OwnershipError>;
