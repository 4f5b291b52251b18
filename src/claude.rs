//! Claude CLI invocation.
//!
//! Three stdio wirings cover every call site:
//!
//! - capture-all: non-interactive session creation, stdout parsed as JSON
//! - inherit-all: interactive session creation, terminal handed over
//! - inherit-with-stderr-tap: resume/fork, terminal handed over but stderr
//!   captured so stale-identity failures can be told apart from generic ones
//!
//! Every mode blocks until the child exits; persisting a new identity is
//! only valid after a successful run. No timeouts are imposed, interactive
//! sessions may run for hours.

use crate::error::{CcForkError, Result};
use crate::flags::{Flags, flags_to_args};
use serde::Deserialize;
use std::io::Read;
use std::process::{Command, Stdio};

const CLAUDE_BIN: &str = "claude";

/// Marker the claude CLI writes to stderr when a resumed conversation no
/// longer exists.
const STALE_SESSION_MARKER: &str = "No conversation found";

#[derive(Debug, Deserialize)]
pub struct ClaudeResponse {
    pub session_id: String,
    pub result: Option<String>,
    pub cost_usd: Option<f64>,
}

// =============================================================================
// Argument construction
// =============================================================================

fn create_args(uuid: &str, prompt: &str, flags: &Flags, interactive: bool) -> Vec<String> {
    let mut args = vec!["--session-id".to_string(), uuid.to_string()];
    if interactive {
        // Positional prompt starts the interactive REPL pre-seeded.
        args.push(prompt.to_string());
    } else {
        args.push("-p".to_string());
        args.push(prompt.to_string());
        args.push("--output-format".to_string());
        args.push("json".to_string());
    }
    args.extend(flags_to_args(flags));
    args
}

fn resume_args(id: &str, fork: bool, flags: &Flags) -> Vec<String> {
    let mut args = vec!["--resume".to_string(), id.to_string()];
    if fork {
        args.push("--fork-session".to_string());
    }
    args.extend(flags_to_args(flags));
    args
}

fn is_stale_session_stderr(stderr: &str) -> bool {
    stderr.contains(STALE_SESSION_MARKER)
}

// =============================================================================
// Invocation modes
// =============================================================================

fn spawn_error(err: std::io::Error) -> CcForkError {
    CcForkError::SpawnFailure(err)
}

/// Create a base session non-interactively; stdout is the structured JSON
/// response.
pub fn create_base_session(uuid: &str, prompt: &str, flags: &Flags) -> Result<ClaudeResponse> {
    let output = Command::new(CLAUDE_BIN)
        .args(create_args(uuid, prompt, flags, false))
        .stdin(Stdio::inherit())
        .output()
        .map_err(spawn_error)?;

    if !output.status.success() {
        return Err(CcForkError::ExternalProcessFailure {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let response: ClaudeResponse = serde_json::from_str(&stdout)?;
    Ok(response)
}

/// Create a base session with the terminal handed to claude.
pub fn create_base_session_interactive(uuid: &str, prompt: &str, flags: &Flags) -> Result<()> {
    let status = Command::new(CLAUDE_BIN)
        .args(create_args(uuid, prompt, flags, true))
        .status()
        .map_err(spawn_error)?;

    if !status.success() {
        return Err(CcForkError::ExternalProcessFailure {
            code: status.code().unwrap_or(-1),
            stderr: String::new(),
        });
    }
    Ok(())
}

/// Fork a new conversation off an existing identity.
pub fn fork_session(id: &str, session_name: &str, flags: &Flags) -> Result<()> {
    resume_with_stderr_tap(resume_args(id, true, flags), session_name)
}

/// Resume an existing identity in place.
pub fn resume_session(id: &str, session_name: &str, flags: &Flags) -> Result<()> {
    resume_with_stderr_tap(resume_args(id, false, flags), session_name)
}

/// Interactive invocation with stderr tapped. The tap is what lets us
/// rewrite a "No conversation found" failure into an actionable
/// stale-identity message instead of a bare exit code.
fn resume_with_stderr_tap(args: Vec<String>, session_name: &str) -> Result<()> {
    let mut child = Command::new(CLAUDE_BIN)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(spawn_error)?;

    // Drain stderr on a separate thread so a chatty child cannot fill the
    // pipe buffer and deadlock against our blocking wait.
    let stderr_handle = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    });

    let status = child.wait()?;
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    if !status.success() {
        if is_stale_session_stderr(&stderr) {
            return Err(CcForkError::StaleIdentity {
                name: session_name.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        return Err(CcForkError::ExternalProcessFailure {
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
