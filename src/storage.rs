//! Per-user metadata store for session identity.
//!
//! Volatile session identity (the claude conversation id, timestamps, and
//! the prompt hash captured at last materialization) lives outside the
//! project tree so it is never committed:
//!
//! ```text
//! ~/.cc-fork/
//!   <projectId>/
//!     <name>.json    # {id, created, updated, promptHash}
//! ```
//!
//! `projectId` is derived once per invocation, in priority order: explicit
//! config value, normalized git remote origin, hashed absolute path. The
//! derived id is sanitized before becoming a directory segment; that
//! sanitization is a security boundary, not cosmetics.

use crate::config::ProjectConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const USER_STORAGE_DIR: &str = ".cc-fork";
const PROJECT_ID_FALLBACK: &str = "project";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub created: String,
    pub updated: String,
    #[serde(rename = "promptHash", skip_serializing_if = "Option::is_none")]
    pub prompt_hash: Option<String>,
}

/// Per-invocation context for the metadata store. The project id is
/// memoized on the context, so tests and repeated operations within one
/// command never leak state across invocations.
pub struct ProjectContext {
    base: PathBuf,
    storage_root: PathBuf,
    explicit_project_id: Option<String>,
    project_id: OnceCell<String>,
}

impl ProjectContext {
    pub fn new(base: &Path, config: &ProjectConfig) -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "Could not find home directory")
        })?;
        Ok(Self::with_storage_root(
            base,
            &home.join(USER_STORAGE_DIR),
            config,
        ))
    }

    /// Construct with an explicit storage root (tests point this at a
    /// temporary directory).
    pub fn with_storage_root(base: &Path, storage_root: &Path, config: &ProjectConfig) -> Self {
        Self {
            base: base.to_path_buf(),
            storage_root: storage_root.to_path_buf(),
            explicit_project_id: config.project_id.clone(),
            project_id: OnceCell::new(),
        }
    }

    pub fn project_id(&self) -> &str {
        self.project_id.get_or_init(|| self.resolve_project_id())
    }

    fn resolve_project_id(&self) -> String {
        if let Some(explicit) = &self.explicit_project_id {
            return sanitize_project_id(explicit);
        }
        if let Some(url) = git_remote_origin(&self.base) {
            return sanitize_project_id(&project_id_from_remote(&url));
        }
        sanitize_project_id(&project_id_from_path(&self.base))
    }

    pub fn project_storage_dir(&self) -> PathBuf {
        self.storage_root.join(self.project_id())
    }

    pub fn record_path(&self, name: &str) -> PathBuf {
        self.project_storage_dir().join(format!("{name}.json"))
    }

    /// Read a session's metadata record. Missing file is `None`; a record
    /// that fails to parse is also `None` (with a warning) because metadata
    /// corruption must never block the user. The session degrades to draft
    /// state, recoverable via refresh.
    pub fn read_record(&self, name: &str) -> Result<Option<SessionRecord>> {
        let path = self.record_path(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                eprintln!(
                    "Warning: Corrupted session data at {}. Run 'cc-fork refresh' to fix.",
                    path.display()
                );
                Ok(None)
            }
        }
    }

    pub fn write_record(&self, name: &str, record: &SessionRecord) -> Result<()> {
        fs::create_dir_all(self.project_storage_dir())?;
        let path = self.record_path(name);
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }

    /// Delete a session's metadata record; silently succeeds when absent.
    pub fn delete_record(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.record_path(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn record_exists(&self, name: &str) -> bool {
        self.record_path(name).is_file()
    }

    /// Names of all records stored for this project. Used to detect
    /// orphaned records whose session file is gone.
    pub fn list_record_names(&self) -> Vec<String> {
        let dir = self.project_storage_dir();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension() == Some(std::ffi::OsStr::new("json")))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        names.sort();
        names
    }
}

// =============================================================================
// Hashing
// =============================================================================

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short fingerprint used in project ids.
fn short_hash(input: &str) -> String {
    sha256_hex(input)[..8].to_string()
}

/// Content fingerprint for staleness detection. Not a security boundary.
/// Trailing newlines are ignored so the serializer's single-trailing-newline
/// normalization never registers as drift.
pub fn compute_prompt_hash(content: &str) -> String {
    sha256_hex(content.trim_end_matches('\n'))[..16].to_string()
}

// =============================================================================
// Project identity
// =============================================================================

/// Ask git for the remote origin URL. None outside a repo or with no origin.
fn git_remote_origin(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if url.is_empty() { None } else { Some(url) }
}

/// Normalize a git URL to a canonical form for hashing.
///
/// ```text
/// git@github.com:org/repo.git           => github.com/org/repo
/// https://github.com/org/repo.git       => github.com/org/repo
/// https://token@github.com/org/repo.git => github.com/org/repo
/// ssh://git@github.com/org/repo         => github.com/org/repo
/// ```
pub fn normalize_git_url(url: &str) -> String {
    let mut normalized = url.trim().to_string();

    if !normalized.contains("://") && normalized.contains(':') {
        // scp-style: [user@]host:path => host/path
        let (head, tail) = normalized.split_once(':').unwrap();
        let host = head.rsplit_once('@').map(|(_, h)| h).unwrap_or(head);
        normalized = format!("{host}/{tail}");
    } else {
        if let Some((_, rest)) = normalized.split_once("://") {
            normalized = rest.to_string();
        }
        // Strip userinfo (credentials, tokens).
        if let Some((_, rest)) = normalized.split_once('@') {
            normalized = rest.to_string();
        }
    }

    if let Some(stripped) = normalized.strip_suffix(".git") {
        normalized = stripped.to_string();
    }
    normalized = normalized.trim_end_matches('/').to_string();

    // Lowercase the host segment only.
    match normalized.find('/') {
        Some(idx) if idx > 0 => {
            format!("{}{}", normalized[..idx].to_lowercase(), &normalized[idx..])
        }
        _ => normalized.to_lowercase(),
    }
}

/// Last path segment of a normalized URL.
pub fn extract_repo_name(normalized_url: &str) -> &str {
    match normalized_url.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "unknown",
    }
}

fn project_id_from_remote(url: &str) -> String {
    let normalized = normalize_git_url(url);
    format!("{}-{}", extract_repo_name(&normalized), short_hash(&normalized))
}

fn project_id_from_path(path: &Path) -> String {
    let dir_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}-{}", dir_name, short_hash(&path.to_string_lossy()))
}

/// Sanitize a project id so it cannot escape the storage root. Strips
/// traversal sequences, path separators, and filesystem-unsafe characters.
pub fn sanitize_project_id(id: &str) -> String {
    let mut s = id.replace("..", "");
    s = s.replace(['/', '\\'], "-");
    s.retain(|c| !matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*'));
    let s = s.trim_start_matches('.').trim_end_matches('.');

    // Collapse dash runs and trim dashes from the ends.
    let mut collapsed = String::with_capacity(s.len());
    let mut last_dash = false;
    for c in s.chars() {
        if c == '-' {
            if !last_dash {
                collapsed.push('-');
            }
            last_dash = true;
        } else {
            collapsed.push(c);
            last_dash = false;
        }
    }
    let result = collapsed.trim_matches('-');

    if result.is_empty() {
        PROJECT_ID_FALLBACK.to_string()
    } else {
        result.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
