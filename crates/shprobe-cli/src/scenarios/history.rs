//! The `history` builtin scenario.
//!
//! Issues a known sequence of interactive commands, invokes `history`, and
//! checks that the entries come back as ordered `(index, command)` pairs
//! with indices strictly increasing from 1 -- one entry per interactive
//! command, builtins excluded.

use std::time::Duration;

use shprobe_harness::ShellSession;
use shprobe_types::{HarnessConfig, HarnessError};

/// Commands issued before the first history check.
const COMMANDS: &[&str] = &["ls", "ls", "ls | grep c", "ls"];

pub fn run(config: &HarnessConfig) -> Result<(), HarnessError> {
    let mut session = ShellSession::spawn(config)?;
    session.expect_prompt()?;

    for command in COMMANDS {
        session.sendline(command)?;
        session.expect_prompt()?;
    }

    let out = session.run_builtin("history", &[])?;
    let entries = parse_history(&out);
    verify_indices(&entries, &out)?;
    verify_prefix(&entries, COMMANDS, &out)?;

    // A long-running command: the prompt only returns once it finishes, so
    // the next history check sees it as a completed fifth entry.
    session.sendline("sleep 1")?;
    session.expect_prompt()?;

    let out = session.run_builtin("history", &[])?;
    let entries = parse_history(&out);
    verify_indices(&entries, &out)?;
    let fifth = entries.get(4).ok_or_else(|| HarnessError::Assertion {
        message: "history should have a fifth entry after the sleep command".into(),
        context: out.clone(),
    })?;
    if !fifth.1.contains("sleep") {
        return Err(HarnessError::Assertion {
            message: format!("fifth history entry should reference sleep, got {:?}", fifth.1),
            context: out,
        });
    }

    session.sendline("exit")?;
    session.expect_eof(Duration::from_secs(2))?;
    session.terminate()?;
    Ok(())
}

/// Extract `(index, command)` pairs from history output.
///
/// Accepts any line shaped like `<digits> <whitespace> <command>`; other
/// lines (blank, decoration) are skipped. Carriage returns from the pty are
/// trimmed.
fn parse_history(output: &str) -> Vec<(u32, String)> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim_start();
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        let rest = trimmed[digits.len()..].trim();
        if rest.is_empty() {
            continue;
        }
        if let Ok(index) = digits.parse() {
            entries.push((index, rest.to_string()));
        }
    }
    entries
}

/// Indices must be strictly increasing integers starting at 1.
fn verify_indices(entries: &[(u32, String)], context: &str) -> Result<(), HarnessError> {
    for (i, (index, command)) in entries.iter().enumerate() {
        let expected = (i + 1) as u32;
        if *index != expected {
            return Err(HarnessError::Assertion {
                message: format!(
                    "history index {index} for {command:?} out of order, expected {expected}"
                ),
                context: context.to_string(),
            });
        }
    }
    Ok(())
}

/// The first entries must be exactly the commands issued, in order.
fn verify_prefix(
    entries: &[(u32, String)],
    commands: &[&str],
    context: &str,
) -> Result<(), HarnessError> {
    if entries.len() < commands.len() {
        return Err(HarnessError::Assertion {
            message: format!(
                "history has {} entries, expected at least {}",
                entries.len(),
                commands.len()
            ),
            context: context.to_string(),
        });
    }
    for (entry, command) in entries.iter().zip(commands) {
        if entry.1 != *command {
            return Err(HarnessError::Assertion {
                message: format!(
                    "history entry {} is {:?}, expected {command:?}",
                    entry.0, entry.1
                ),
                context: context.to_string(),
            });
        }
    }
    Ok(())
}
