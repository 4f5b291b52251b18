//! Session store: one markdown file per base session.
//!
//! A session file holds the claude flags for the session in its frontmatter
//! and the prompt in its body. Conversation identity lives in the separate
//! per-user metadata store (`storage`); legacy files from the unsplit
//! generation may still carry `id`/`created`/`updated` in frontmatter and
//! are migrated on first use by the command layer.

use crate::config;
use crate::error::{CcForkError, Result};
use crate::flags::Flags;
use crate::frontmatter;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub path: PathBuf,
    pub frontmatter: Flags,
    pub content: String,
}

/// Validate a session name before it is used in any path construction.
/// The character class doubles as the path-traversal guard.
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CcForkError::NameRequired);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CcForkError::InvalidName);
    }
    Ok(())
}

/// Scaffold content for a brand-new session file. Just a starting point
/// for the user's editor; only required to be non-empty.
pub fn default_template(name: &str) -> String {
    format!(
        "# {name}\n\
         \n\
         ## Files to Read\n\
         \n\
         List the files Claude should read to understand the context:\n\
         \n\
         1. `docs/README.md` - Project overview\n\
         2. `src/main.rs` - Entry point\n\
         \n\
         ## Key Concepts\n\
         \n\
         Describe what Claude should focus on understanding:\n\
         \n\
         - How the authentication flow works\n\
         - The data model structure\n\
         \n\
         ## Summary Request\n\
         \n\
         After reading, ask Claude to summarize:\n\
         \n\
         - Main components and their responsibilities\n\
         - Key patterns used in the codebase\n"
    )
}

pub fn read_session(base: &Path, name: &str) -> Result<Session> {
    let path = config::session_path(base, name);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CcForkError::SessionNotFound(name.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let (fm, content) =
        frontmatter::parse_document(&raw).map_err(|reason| CcForkError::Corrupted {
            path: path.clone(),
            reason,
        })?;

    Ok(Session {
        name: name.to_string(),
        path,
        frontmatter: fm,
        content,
    })
}

pub fn write_session(base: &Path, name: &str, frontmatter: &Flags, content: &str) -> Result<()> {
    let path = config::session_path(base, name);
    let output = frontmatter::serialize_document(frontmatter, content);
    fs::write(&path, output)?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct ListSessionsResult {
    pub sessions: Vec<Session>,
    /// Sessions whose file could not be parsed, by name. Listing never
    /// aborts on a single bad file.
    pub errors: Vec<(String, String)>,
}

pub fn list_sessions(base: &Path) -> Result<ListSessionsResult> {
    let dir = config::config_dir(base);
    let mut result = ListSessionsResult::default();

    if !dir.is_dir() {
        return Ok(result);
    }

    let mut names: Vec<String> = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension() == Some(std::ffi::OsStr::new("md")))
        .filter_map(|e| e.path().file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    names.sort();

    for name in names {
        match read_session(base, &name) {
            Ok(session) => result.sessions.push(session),
            Err(err) => result.errors.push((name, err.to_string())),
        }
    }

    Ok(result)
}

pub fn session_exists(base: &Path, name: &str) -> bool {
    config::session_path(base, name).is_file()
}

pub fn delete_session(base: &Path, name: &str) -> Result<()> {
    let path = config::session_path(base, name);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(CcForkError::SessionNotFound(name.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

// =============================================================================
// Tests
// =============================================================================
