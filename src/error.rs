//! Error taxonomy for session operations.
//!
//! Commands decide fatality: validation and existence errors abort the
//! invoking command, metadata corruption degrades to "no identity" with a
//! warning, and external process failures carry captured stderr so it can
//! be surfaced verbatim.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CcForkError>;

#[derive(Debug, Error)]
pub enum CcForkError {
    #[error("Session name is required")]
    NameRequired,

    #[error("Session name can only contain letters, numbers, hyphens, and underscores")]
    InvalidName,

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("Session file has invalid frontmatter: {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("Session file is empty. Aborting.")]
    EmptyContent,

    #[error("Session '{name}' already exists. Use 'cc-fork refresh {name}' to recreate.")]
    AlreadyExists { name: String },

    #[error("Claude CLI exited with code {code}")]
    ExternalProcessFailure { code: i32, stderr: String },

    #[error("Session '{name}' has a stale session ID. Run 'cc-fork refresh {name}' to rebuild.")]
    StaleIdentity { name: String, stderr: String },

    #[error("Failed to spawn claude: {0}")]
    SpawnFailure(#[source] std::io::Error),

    #[error("Editor '{editor}' not found. Edit the file manually at:\n  {path}")]
    EditorNotFound { editor: String, path: PathBuf },

    #[error("Editor exited with code {0}")]
    EditorFailure(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CcForkError {
    /// Captured stderr for external process failures, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CcForkError::ExternalProcessFailure { stderr, .. }
            | CcForkError::StaleIdentity { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
