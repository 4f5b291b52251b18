//! Command layer: reconciles the session file store, the metadata store,
//! and CLI flags into claude invocations.
//!
//! Per-session state machine:
//!
//! ```text
//! Absent --create--> Draft --create/refresh--> Ready
//!                      ^                         |
//!                      +-------- delete ---------+
//! ```
//!
//! Draft means the file exists with no linked identity record; Ready means
//! the metadata store holds a conversation id for it. Fork and use require
//! Ready and leave the state untouched; refresh always mints a brand-new
//! identity. Identity is persisted only after the claude invocation
//! succeeds.

use crate::claude;
use crate::colors;
use crate::config::{self, ProjectConfig};
use crate::error::CcForkError;
use crate::flags::{Flags, extract_flags, merge_flags};
use crate::prompt;
use crate::session::{self, Session};
use crate::storage::{ProjectContext, SessionRecord, compute_prompt_hash};
use anyhow::{Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::IsTerminal;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

// =============================================================================
// Shared helpers
// =============================================================================

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Layered flag precedence: project config defaults < stored session flags
/// < CLI flags.
fn effective_flags(config: &ProjectConfig, stored: &Flags, cli: &Flags) -> Flags {
    merge_flags(&merge_flags(&config.default_flags, stored), cli)
}

fn read_session_checked(base: &Path, name: &str) -> Result<Session> {
    match session::read_session(base, name) {
        Ok(session) => Ok(session),
        Err(CcForkError::Corrupted { path, .. }) => bail!(
            "Failed to read session '{name}'. The file may be corrupted. Fix or delete: {}",
            path.display()
        ),
        Err(err) => Err(err.into()),
    }
}

fn require_session(base: &Path, name: &str) -> Result<()> {
    session::validate_session_name(name)?;
    if !session::session_exists(base, name) {
        bail!("Session '{name}' not found. Run 'cc-fork create {name}' first.");
    }
    Ok(())
}

/// Move identity out of a legacy unsplit session file into the metadata
/// store. One-way: after this runs the file holds only flags. A no-op for
/// files already in the split layout.
fn migrate_legacy_identity(
    base: &Path,
    ctx: &ProjectContext,
    session: Session,
) -> Result<Session> {
    let legacy_id = match session.frontmatter.get("id") {
        Some(crate::flags::FlagValue::Str(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    };
    let flags_only = extract_flags(&session.frontmatter);
    if flags_only.len() == session.frontmatter.len() {
        return Ok(session);
    }

    if let Some(id) = legacy_id {
        if !ctx.record_exists(&session.name) {
            let timestamp = |key: &str| match session.frontmatter.get(key) {
                Some(crate::flags::FlagValue::Str(s)) if !s.is_empty() => s.clone(),
                _ => now_iso(),
            };
            ctx.write_record(
                &session.name,
                &SessionRecord {
                    id,
                    created: timestamp("created"),
                    updated: timestamp("updated"),
                    prompt_hash: None,
                },
            )?;
        }
    }

    session::write_session(base, &session.name, &flags_only, &session.content)?;
    Ok(Session {
        frontmatter: flags_only,
        ..session
    })
}

fn persist_materialized(
    base: &Path,
    ctx: &ProjectContext,
    name: &str,
    stored_flags: &Flags,
    content: &str,
    id: String,
    created: String,
) -> Result<()> {
    session::write_session(base, name, stored_flags, content)?;
    ctx.write_record(
        name,
        &SessionRecord {
            id,
            created,
            updated: now_iso(),
            prompt_hash: Some(compute_prompt_hash(content)),
        },
    )?;
    Ok(())
}

/// Run the create/refresh materialization against claude and report.
fn materialize(
    name: &str,
    uuid: &str,
    content: &str,
    flags: &Flags,
    interactive: bool,
    verb: &str,
) -> Result<()> {
    let start = Instant::now();

    if interactive {
        println!("{}Entering Claude Code...{}", colors::DIM, colors::RESET);
        claude::create_base_session_interactive(uuid, content, flags)?;
        println!();
    } else {
        println!(
            "{}{verb} base session '{name}'...{}",
            colors::DIM,
            colors::RESET
        );
        let response = claude::create_base_session(uuid, content, flags)?;
        if response.session_id != uuid {
            println!(
                "{}Warning: claude reported session ID {} (expected {uuid}){}",
                colors::YELLOW,
                response.session_id,
                colors::RESET
            );
        }
        if let Some(cost) = response.cost_usd {
            println!("{}Cost: ${cost:.4}{}", colors::DIM, colors::RESET);
        }
        if let Some(result) = response.result {
            println!("{}Claude's response:{}", colors::DIM, colors::RESET);
            let truncated: String = if result.chars().count() > 500 {
                format!("{}...", result.chars().take(500).collect::<String>())
            } else {
                result
            };
            println!("{truncated}");
        }
    }

    let duration = start.elapsed().as_secs_f64();
    println!("{}Session ID: {uuid}{}", colors::DIM, colors::RESET);
    println!("{}Duration: {duration:.1}s{}", colors::DIM, colors::RESET);
    Ok(())
}

// =============================================================================
// create
// =============================================================================

#[derive(Debug, Default)]
pub struct CreateOptions {
    pub interactive: Option<bool>,
    pub prompt: Option<String>,
}

pub fn create(
    base: &Path,
    config: &ProjectConfig,
    name: Option<String>,
    cli_flags: Flags,
    options: CreateOptions,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => prompt::ask("Session name: ")?,
    };
    session::validate_session_name(&name)?;
    config::ensure_config_dir(base)?;

    let ctx = ProjectContext::new(base, config)?;
    let session_path = config::session_path(base, &name);
    let exists = session::session_exists(base, &name);

    if exists {
        let existing = read_session_checked(base, &name)?;
        migrate_legacy_identity(base, &ctx, existing)?;
        let ready = ctx
            .read_record(&name)?
            .map(|r| !r.id.is_empty())
            .unwrap_or(false);

        if ready {
            if !std::io::stdin().is_terminal() {
                return Err(CcForkError::AlreadyExists { name }.into());
            }

            let choice = prompt::choose(
                &format!(
                    "{}Session '{name}' already exists.{}",
                    colors::YELLOW,
                    colors::RESET
                ),
                &[
                    "Refresh - re-run prompt for new session ID",
                    "Edit - open session content in editor",
                    "Delete - remove session and start over",
                    "Exit",
                ],
            )?;

            match choice {
                Some(0) => return refresh(base, config, &name, cli_flags, options.interactive),
                Some(1) => {
                    prompt::open_editor(&session_path)?;
                    println!("{}Editor closed.{}", colors::DIM, colors::RESET);
                    println!(
                        "{}Run 'cc-fork refresh {name}' to rebuild with updated content.{}",
                        colors::DIM,
                        colors::RESET
                    );
                    return Ok(());
                }
                Some(2) => {
                    session::delete_session(base, &name)?;
                    ctx.delete_record(&name)?;
                    println!("{}Deleted session '{name}'{}", colors::GREEN, colors::RESET);
                    return Ok(());
                }
                _ => {
                    println!("{}Aborted.{}", colors::DIM, colors::RESET);
                    return Ok(());
                }
            }
        }
    }

    // Collect the prompt content and the flags to store in the session file.
    let (content, stored_flags) = if let Some(inline) = options.prompt {
        session::write_session(base, &name, &cli_flags, &inline)?;
        (inline, cli_flags)
    } else {
        if !exists {
            session::write_session(base, &name, &Flags::new(), &session::default_template(&name))?;
            println!(
                "{}Created {}{}",
                colors::DIM,
                session_path.display(),
                colors::RESET
            );
        }

        println!(
            "{}Opening editor... Save and close when done.{}",
            colors::DIM,
            colors::RESET
        );
        prompt::open_editor(&session_path)?;

        let edited = read_session_checked(base, &name)?;
        if edited.content.trim().is_empty() {
            return Err(CcForkError::EmptyContent.into());
        }
        // Flags typed into the frontmatter by hand participate like any
        // other stored layer.
        let stored = merge_flags(&extract_flags(&edited.frontmatter), &cli_flags);
        (edited.content, stored)
    };

    let flags = effective_flags(config, &stored_flags, &Flags::new());
    let uuid = Uuid::new_v4().to_string();
    let interactive = options.interactive.or(config.interactive).unwrap_or(true);

    materialize(&name, &uuid, &content, &flags, interactive, "Creating")?;
    persist_materialized(base, &ctx, &name, &stored_flags, &content, uuid, now_iso())?;
    println!(
        "{}Created base session '{name}'{}",
        colors::GREEN,
        colors::RESET
    );
    Ok(())
}

// =============================================================================
// refresh
// =============================================================================

pub fn refresh(
    base: &Path,
    config: &ProjectConfig,
    name: &str,
    cli_flags: Flags,
    interactive: Option<bool>,
) -> Result<()> {
    require_session(base, name)?;

    let ctx = ProjectContext::new(base, config)?;
    let session = read_session_checked(base, name)?;
    let session = migrate_legacy_identity(base, &ctx, session)?;
    if session.content.trim().is_empty() {
        return Err(CcForkError::EmptyContent.into());
    }

    let stored_flags = extract_flags(&session.frontmatter);
    let flags = effective_flags(config, &stored_flags, &cli_flags);

    // A refresh never reuses the old conversation; the original creation
    // time survives, everything else is newly minted.
    let uuid = Uuid::new_v4().to_string();
    let created = ctx
        .read_record(name)?
        .map(|r| r.created)
        .unwrap_or_else(now_iso);
    let interactive = interactive.or(config.interactive).unwrap_or(true);

    materialize(name, &uuid, &session.content, &flags, interactive, "Refreshing")?;
    persist_materialized(base, &ctx, name, &stored_flags, &session.content, uuid, created)?;
    println!(
        "{}Refreshed base session '{name}'{}",
        colors::GREEN,
        colors::RESET
    );
    Ok(())
}

// =============================================================================
// fork / use
// =============================================================================

/// True when the session file's prompt no longer matches the content the
/// conversation was last materialized from. Records without a hash (legacy
/// migrations) never report drift.
fn content_drifted(record: &SessionRecord, content: &str) -> bool {
    match &record.prompt_hash {
        Some(stored) => *stored != compute_prompt_hash(content),
        None => false,
    }
}

fn ready_record(
    base: &Path,
    ctx: &ProjectContext,
    name: &str,
) -> Result<(Session, SessionRecord)> {
    require_session(base, name)?;
    let session = read_session_checked(base, name)?;
    let session = migrate_legacy_identity(base, ctx, session)?;

    let record = ctx.read_record(name)?.filter(|r| !r.id.is_empty());
    let Some(record) = record else {
        bail!("Session '{name}' has no base session. Run 'cc-fork create {name}' first.");
    };
    Ok((session, record))
}

pub fn fork(base: &Path, config: &ProjectConfig, name: &str, cli_flags: Flags) -> Result<()> {
    let ctx = ProjectContext::new(base, config)?;
    let (session, record) = ready_record(base, &ctx, name)?;

    let flags = effective_flags(config, &extract_flags(&session.frontmatter), &cli_flags);

    println!(
        "{}Forking base session '{name}'...{}",
        colors::DIM,
        colors::RESET
    );
    claude::fork_session(&record.id, name, &flags)?;
    println!();
    println!("{}Exited fork of '{name}'{}", colors::GREEN, colors::RESET);
    Ok(())
}

pub fn use_session(base: &Path, config: &ProjectConfig, name: &str, cli_flags: Flags) -> Result<()> {
    let ctx = ProjectContext::new(base, config)?;
    let (session, record) = ready_record(base, &ctx, name)?;

    // Drift warns but never blocks the resume.
    if content_drifted(&record, &session.content) {
        println!(
            "{}Warning: Prompt content has changed since last refresh. \
             Consider running 'cc-fork refresh {name}'.{}",
            colors::YELLOW,
            colors::RESET
        );
    }

    let flags = effective_flags(config, &extract_flags(&session.frontmatter), &cli_flags);

    println!(
        "{}Resuming base session '{name}'...{}",
        colors::DIM,
        colors::RESET
    );
    claude::resume_session(&record.id, name, &flags)?;
    println!();
    println!(
        "{}Exited base session '{name}'{}",
        colors::GREEN,
        colors::RESET
    );
    Ok(())
}

// =============================================================================
// list
// =============================================================================

fn format_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(date) => date.format("%b %-d, %Y %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn list(base: &Path, config: &ProjectConfig) -> Result<()> {
    let ctx = ProjectContext::new(base, config)?;
    let result = session::list_sessions(base)?;

    if !result.errors.is_empty() {
        eprintln!(
            "{}Warning: {} session(s) could not be read:{}",
            colors::YELLOW,
            result.errors.len(),
            colors::RESET
        );
        for (name, error) in &result.errors {
            eprintln!("{}  - {name}: {error}{}", colors::YELLOW, colors::RESET);
        }
        println!();
    }

    if result.sessions.is_empty() && result.errors.is_empty() {
        println!("{}No sessions found.{}", colors::DIM, colors::RESET);
        println!(
            "{}Run 'cc-fork create <name>' to create your first session.{}",
            colors::DIM,
            colors::RESET
        );
        return Ok(());
    }

    println!(
        "{}{:<20}{:<22}{:<22}STATUS{}",
        colors::BOLD,
        "NAME",
        "CREATED",
        "UPDATED",
        colors::RESET
    );

    for session in &result.sessions {
        let record = ctx.read_record(&session.name)?;
        let legacy_ready = matches!(
            session.frontmatter.get("id"),
            Some(crate::flags::FlagValue::Str(id)) if !id.is_empty()
        );
        let (created, updated, ready) = match &record {
            Some(r) => (format_date(&r.created), format_date(&r.updated), !r.id.is_empty()),
            None => ("-".to_string(), "-".to_string(), legacy_ready),
        };
        let status = if ready {
            format!("{}ready{}", colors::GREEN, colors::RESET)
        } else {
            format!("{}draft{}", colors::YELLOW, colors::RESET)
        };
        println!("{:<20}{:<22}{:<22}{status}", session.name, created, updated);
    }

    // Records whose session file is gone are prunable leftovers.
    let orphans: Vec<String> = ctx
        .list_record_names()
        .into_iter()
        .filter(|name| !session::session_exists(base, name))
        .collect();
    if !orphans.is_empty() {
        println!();
        println!(
            "{}Orphaned session data (no session file):{}",
            colors::YELLOW,
            colors::RESET
        );
        for name in &orphans {
            println!(
                "{}  - {name} (run 'cc-fork delete {name}' to prune){}",
                colors::YELLOW,
                colors::RESET
            );
        }
    }

    Ok(())
}

// =============================================================================
// delete
// =============================================================================

/// Validation phase of delete: every name must be valid and refer to a
/// session file or a metadata record. Nothing is removed unless all names
/// pass.
fn validate_deletions(base: &Path, ctx: &ProjectContext, names: &[String]) -> Result<()> {
    for name in names {
        session::validate_session_name(name)?;
        if !session::session_exists(base, name) && !ctx.record_exists(name) {
            bail!("Session '{name}' not found.");
        }
    }
    Ok(())
}

pub fn delete(base: &Path, config: &ProjectConfig, names: &[String], force: bool) -> Result<()> {
    let ctx = ProjectContext::new(base, config)?;
    validate_deletions(base, &ctx, names)?;

    if !force {
        let listed = names.join("', '");
        if !prompt::confirm(&format!("Delete session(s) '{listed}'?"))? {
            println!("{}Aborted.{}", colors::DIM, colors::RESET);
            return Ok(());
        }
    }

    for name in names {
        if session::session_exists(base, name) {
            session::delete_session(base, name)?;
        }
        ctx.delete_record(name)?;
        println!("{}Deleted session '{name}'{}", colors::GREEN, colors::RESET);
    }
    Ok(())
}

// =============================================================================
// edit
// =============================================================================

pub fn edit(base: &Path, name: &str) -> Result<()> {
    require_session(base, name)?;

    prompt::open_editor(&config::session_path(base, name))?;
    println!("{}Editor closed.{}", colors::DIM, colors::RESET);
    println!(
        "{}Run 'cc-fork refresh {name}' to rebuild with updated content.{}",
        colors::DIM,
        colors::RESET
    );
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
