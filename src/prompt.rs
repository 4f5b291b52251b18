//! Terminal prompts and editor invocation.

use crate::error::{CcForkError, Result};
use std::env;
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::Command;

/// Ask a free-form question, returning the trimmed answer.
pub fn ask(question: &str) -> Result<String> {
    print!("{question}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

/// Yes/no confirmation, defaulting to no.
pub fn confirm(message: &str) -> Result<bool> {
    let answer = ask(&format!("{message} (y/N): "))?.to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Present a numbered menu and return the chosen index, or `None` on
/// invalid or empty input (callers treat that as abort).
pub fn choose(message: &str, options: &[&str]) -> Result<Option<usize>> {
    println!("{message}");
    for (i, option) in options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }

    let answer = ask("Choice: ")?;
    match answer.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => Ok(Some(n - 1)),
        _ => Ok(None),
    }
}

/// Open the user's editor on a file and wait for it to exit.
/// `$EDITOR`, then `$VISUAL`, then `vi`.
pub fn open_editor(path: &Path) -> Result<()> {
    let editor = env::var("EDITOR")
        .or_else(|_| env::var("VISUAL"))
        .ok()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "vi".to_string());

    let status = Command::new(&editor).arg(path).status();
    match status {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(CcForkError::EditorNotFound {
            editor,
            path: path.to_path_buf(),
        }),
        Err(err) => Err(err.into()),
        Ok(status) if !status.success() => {
            Err(CcForkError::EditorFailure(status.code().unwrap_or(-1)))
        }
        Ok(_) => Ok(()),
    }
}
