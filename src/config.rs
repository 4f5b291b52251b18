//! Project configuration and on-disk layout.
//!
//! Everything project-local lives under `.claude/cc-fork/` in the working
//! directory:
//!
//! ```text
//! .claude/cc-fork/
//!   config.yaml     # project config (frontmatter block, no delimiters)
//!   <name>.md       # one session file per base session
//! ```
//!
//! Recognized config keys: `interactive` (bool), `defaultCommand`
//! ("fork" or "use"), `projectId` (string override for metadata scoping).
//! Any other key is collected as a project-level default flag, merged
//! beneath session and CLI flags.

use crate::error::{CcForkError, Result};
use crate::flags::{FlagValue, Flags};
use crate::frontmatter;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = ".claude/cc-fork";
const CONFIG_FILE_NAME: &str = "config.yaml";

pub fn config_dir(base: &Path) -> PathBuf {
    base.join(CONFIG_DIR_NAME)
}

pub fn ensure_config_dir(base: &Path) -> Result<PathBuf> {
    let dir = config_dir(base);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn session_path(base: &Path, name: &str) -> PathBuf {
    config_dir(base).join(format!("{name}.md"))
}

pub fn config_path(base: &Path) -> PathBuf {
    config_dir(base).join(CONFIG_FILE_NAME)
}

/// Which command a bare `cc-fork <name>` invocation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultCommand {
    #[default]
    Fork,
    Use,
}

impl DefaultCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            DefaultCommand::Fork => "fork",
            DefaultCommand::Use => "use",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    /// Enter claude interactively after sending the prompt (create/refresh).
    pub interactive: Option<bool>,
    pub default_command: DefaultCommand,
    /// Explicit project id override for the metadata store.
    pub project_id: Option<String>,
    /// Unrecognized keys, treated as default claude flags (lowest layer).
    pub default_flags: Flags,
}

/// Read the project config, or defaults when the file is missing.
/// An unparseable config is an error; unlike metadata corruption it is
/// user-authored and silently ignoring it would mask typos.
pub fn read_project_config(base: &Path) -> Result<ProjectConfig> {
    let path = config_path(base);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ProjectConfig::default());
        }
        Err(err) => return Err(err.into()),
    };

    let entries = frontmatter::parse_block(&raw).map_err(|reason| CcForkError::Corrupted {
        path: path.clone(),
        reason,
    })?;

    let mut config = ProjectConfig::default();
    for (key, value) in entries.iter() {
        match (key, value) {
            ("interactive", FlagValue::Bool(b)) => config.interactive = Some(*b),
            ("defaultCommand", FlagValue::Str(s)) => match s.as_str() {
                "fork" => config.default_command = DefaultCommand::Fork,
                "use" => config.default_command = DefaultCommand::Use,
                other => {
                    eprintln!("Warning: unknown defaultCommand '{other}' in {}", path.display());
                }
            },
            ("projectId", FlagValue::Str(s)) => config.project_id = Some(s.clone()),
            _ => config.default_flags.insert(key, value.clone()),
        }
    }

    Ok(config)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(base: &Path, contents: &str) {
        fs::create_dir_all(config_dir(base)).unwrap();
        fs::write(config_path(base), contents).unwrap();
    }

    #[test]
    fn missing_config_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = read_project_config(dir.path()).unwrap();
        assert!(config.interactive.is_none());
        assert_eq!(config.default_command, DefaultCommand::Fork);
        assert!(config.project_id.is_none());
        assert!(config.default_flags.is_empty());
    }

    #[test]
    fn known_keys_are_recognized() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            "interactive: false\ndefaultCommand: use\nprojectId: my-project\n",
        );

        let config = read_project_config(dir.path()).unwrap();
        assert_eq!(config.interactive, Some(false));
        assert_eq!(config.default_command, DefaultCommand::Use);
        assert_eq!(config.project_id, Some("my-project".to_string()));
    }

    #[test]
    fn unknown_keys_become_default_flags() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), "model: haiku\ninteractive: true\n");

        let config = read_project_config(dir.path()).unwrap();
        assert_eq!(config.interactive, Some(true));
        assert_eq!(
            config.default_flags.get("model"),
            Some(&FlagValue::Str("haiku".to_string()))
        );
    }

    #[test]
    fn unparseable_config_is_an_error() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), "not a key value line");
        assert!(matches!(
            read_project_config(dir.path()),
            Err(CcForkError::Corrupted { .. })
        ));
    }

    #[test]
    fn session_path_layout() {
        let path = session_path(Path::new("/work"), "demo");
        assert_eq!(path, Path::new("/work/.claude/cc-fork/demo.md"));
    }
}
