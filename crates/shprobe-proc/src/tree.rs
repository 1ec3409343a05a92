//! Process-tree enumeration and foreground-group checks.
//!
//! Walks `/proc` to find the descendants of a given process (the pipeline
//! members and background jobs a shell spawned) and answers which process
//! group the controlling terminal currently considers foreground.

use std::collections::HashMap;
use std::os::fd::AsFd;

use tracing::debug;

use shprobe_types::HarnessError;

use crate::snapshot::{snapshot, ProcessSnapshot};

/// Snapshot every live process visible in `/proc`.
///
/// Entries that disappear between the directory listing and the stat read
/// are skipped; the table is a moving target by nature.
fn enumerate_processes() -> Result<Vec<ProcessSnapshot>, HarnessError> {
    let entries = std::fs::read_dir("/proc")
        .map_err(|e| HarnessError::Proc(format!("cannot read /proc: {e}")))?;

    let mut processes = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };

        // Only numeric directory names are PIDs.
        let name = entry.file_name();
        let pid: i32 = match name.to_string_lossy().parse() {
            Ok(p) => p,
            Err(_) => continue,
        };

        match snapshot(pid) {
            Ok(snap) => processes.push(snap),
            Err(_) => continue, // Process exited mid-scan.
        }
    }

    debug!(process_count = processes.len(), "enumerated process table");
    Ok(processes)
}

/// Snapshots of every descendant of `root_pid`, parents before children.
///
/// The root itself is not included. Each snapshot is a point-in-time fact;
/// re-call to observe state changes.
pub fn descendants(root_pid: i32) -> Result<Vec<ProcessSnapshot>, HarnessError> {
    let processes = enumerate_processes()?;

    let mut children_map: HashMap<i32, Vec<&ProcessSnapshot>> = HashMap::new();
    for snap in &processes {
        children_map.entry(snap.ppid).or_default().push(snap);
    }

    let mut found = Vec::new();
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root_pid);

    while let Some(pid) = queue.pop_front() {
        if let Some(children) = children_map.get(&pid) {
            for &child in children {
                if child.pid == root_pid {
                    continue;
                }
                found.push(child.clone());
                queue.push_back(child.pid);
            }
        }
    }

    Ok(found)
}

/// Whether `pid`'s process group is the foreground group of `terminal`.
///
/// Compares the pid's process group against what the kernel reports via
/// `tcgetpgrp` on the controlling terminal (for a harness session, the pty
/// master). This is the ground truth for job-control assertions: a shell can
/// claim whatever it likes in its job list, but only the terminal knows who
/// actually holds the foreground.
pub fn is_foreground_group<F: AsFd>(terminal: F, pid: i32) -> Result<bool, HarnessError> {
    let snap = snapshot(pid)?;
    let fg = nix::unistd::tcgetpgrp(terminal)
        .map_err(|e| HarnessError::Proc(format!("tcgetpgrp: {e}")))?;
    Ok(fg.as_raw() == snap.pgid)
}
