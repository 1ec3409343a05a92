//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use shprobe_harness::{Pattern, PtySession, ShellSession};

pub const MOCK_PROMPT: &str = "mock> ";

/// Spawn an arbitrary command in a pty and wrap it in a session that
/// synchronizes on [`MOCK_PROMPT`].
pub fn spawn_session(command: &str, args: &[&str]) -> ShellSession {
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let pty = PtySession::spawn(Path::new(command), &args, &PathBuf::from("/tmp"), &[])
        .expect("should spawn command in pty");
    ShellSession::from_parts(pty, Pattern::literal(MOCK_PROMPT), Duration::from_secs(5))
}

/// A scripted stand-in for a shell under test: prints a prompt, echoes each
/// line back tagged with `got:`, and prompts again.
pub fn spawn_mock_shell() -> ShellSession {
    spawn_session(
        "/bin/sh",
        &[
            "-c",
            r#"printf 'mock> '; while read line; do echo "got:$line"; printf 'mock> '; done"#,
        ],
    )
}
