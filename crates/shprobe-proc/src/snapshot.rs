//! Point-in-time reads of the OS process table.
//!
//! A [`ProcessSnapshot`] is what the kernel says about a process right now:
//! its identity (pid, parent, process group, session) and run state. It is a
//! fact, never mutated -- take another snapshot when you need newer data.
//! This is what lets the harness verify job control independently of
//! whatever the shell under test claims.

use std::fmt;

use shprobe_types::HarnessError;

/// Run state as reported in `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Runnable or sleeping (R, S, D, and friends).
    Running,
    /// Stopped by a signal or under trace (T, t).
    Stopped,
    /// Exited but not yet reaped (Z).
    Zombie,
}

impl RunState {
    fn from_stat_char(c: char) -> Self {
        match c {
            'T' | 't' => RunState::Stopped,
            'Z' => RunState::Zombie,
            _ => RunState::Running,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Zombie => write!(f, "zombie"),
        }
    }
}

/// An immutable point-in-time capture of one process-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    /// Process id.
    pub pid: i32,
    /// Parent process id.
    pub ppid: i32,
    /// Process group id.
    pub pgid: i32,
    /// Session id.
    pub sid: i32,
    /// Executable name (the `comm` field, without parentheses).
    pub comm: String,
    /// Run state at capture time.
    pub state: RunState,
}

impl fmt::Display for ProcessSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid={} ({}) ppid={} pgid={} sid={} state={}",
            self.pid, self.comm, self.ppid, self.pgid, self.sid, self.state
        )
    }
}

/// Capture a snapshot of `pid` from `/proc/<pid>/stat`.
pub fn snapshot(pid: i32) -> Result<ProcessSnapshot, HarnessError> {
    let path = format!("/proc/{pid}/stat");
    let stat = std::fs::read_to_string(&path)
        .map_err(|e| HarnessError::Proc(format!("cannot read {path}: {e}")))?;
    parse_stat(&stat)
}

/// Parse one `/proc/<pid>/stat` line.
///
/// The comm field is parenthesized and may itself contain spaces or
/// parentheses, so fields are split after the *last* closing paren.
fn parse_stat(stat: &str) -> Result<ProcessSnapshot, HarnessError> {
    let open = stat
        .find('(')
        .ok_or_else(|| HarnessError::Proc(format!("malformed stat line: {stat:?}")))?;
    let close = stat
        .rfind(')')
        .ok_or_else(|| HarnessError::Proc(format!("malformed stat line: {stat:?}")))?;
    if close < open {
        return Err(HarnessError::Proc(format!("malformed stat line: {stat:?}")));
    }

    let pid: i32 = stat[..open]
        .trim()
        .parse()
        .map_err(|e| HarnessError::Proc(format!("bad pid field: {e}")))?;
    let comm = stat[open + 1..close].to_string();

    // After the comm: state ppid pgrp session ...
    let mut rest = stat[close + 1..].split_whitespace();
    let state_field = rest
        .next()
        .ok_or_else(|| HarnessError::Proc("stat line missing state".into()))?;
    let state_char = state_field
        .chars()
        .next()
        .ok_or_else(|| HarnessError::Proc("empty state field".into()))?;

    let mut next_i32 = |name: &str| -> Result<i32, HarnessError> {
        rest.next()
            .ok_or_else(|| HarnessError::Proc(format!("stat line missing {name}")))?
            .parse()
            .map_err(|e| HarnessError::Proc(format!("bad {name} field: {e}")))
    };
    let ppid = next_i32("ppid")?;
    let pgid = next_i32("pgrp")?;
    let sid = next_i32("session")?;

    Ok(ProcessSnapshot {
        pid,
        ppid,
        pgid,
        sid,
        comm,
        state: RunState::from_stat_char(state_char),
    })
}
