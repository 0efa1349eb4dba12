//! Clipboard integration
//!
//! Pipes text into the platform's clipboard command. The first tool that can
//! be started wins; a tool that starts but exits non-zero is an error.

use crate::error::{DctxError, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Candidate clipboard commands for this platform, in order of preference
pub fn clipboard_commands() -> &'static [&'static [&'static str]] {
    if cfg!(target_os = "macos") {
        &[&["pbcopy"]]
    } else if cfg!(windows) {
        &[&["clip"]]
    } else {
        &[
            &["wl-copy"],
            &["xclip", "-selection", "clipboard"],
            &["xsel", "--clipboard", "--input"],
        ]
    }
}

/// Copy `text` to the system clipboard
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    for argv in clipboard_commands() {
        let (program, args) = match argv.split_first() {
            Some(split) => split,
            None => continue,
        };
        match pipe_to(program, args, text) {
            Ok(()) => {
                debug!("Copied {} bytes to clipboard via {}", text.len(), program);
                return Ok(());
            }
            Err(PipeError::NotInstalled) => continue,
            Err(PipeError::Failed(msg)) => {
                return Err(DctxError::clipboard(format!("{} failed: {}", program, msg)))
            }
        }
    }
    Err(DctxError::clipboard("no clipboard tool found"))
}

enum PipeError {
    NotInstalled,
    Failed(String),
}

fn pipe_to(program: &str, args: &[&str], text: &str) -> std::result::Result<(), PipeError> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(PipeError::NotInstalled),
        Err(e) => return Err(PipeError::Failed(e.to_string())),
    };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            drop(stdin);
            // Reap the child before reporting
            let _ = child.kill();
            let _ = child.wait();
            return Err(PipeError::Failed(e.to_string()));
        }
    }
    let status = child.wait().map_err(|e| PipeError::Failed(e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(PipeError::Failed(status.to_string()))
    }
}
