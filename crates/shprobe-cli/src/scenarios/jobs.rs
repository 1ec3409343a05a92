//! Job-control scenario, cross-checked against the OS process table.
//!
//! The shell's own `jobs` output is never trusted: every claim is verified
//! with [`shprobe_proc`] snapshots and the terminal's foreground group.

use std::time::{Duration, Instant};

use shprobe_harness::ShellSession;
use shprobe_proc::{descendants, is_foreground_group, snapshot, ProcessSnapshot, RunState};
use shprobe_types::{HarnessConfig, HarnessError};

/// How long to wait for the process table to reflect a state change.
const STATE_SETTLE: Duration = Duration::from_secs(3);

pub fn run(config: &HarnessConfig) -> Result<(), HarnessError> {
    let mut session = ShellSession::spawn(config)?;
    session.expect_prompt()?;

    // Launch a background job. The prompt must come straight back.
    session.sendline("sleep 60 &")?;
    session.expect_prompt()?;

    let job = wait_for_descendant(session.pid(), "sleep")?;

    // A backgrounded job's group must not hold the terminal.
    wait_for_foreground(&session, job.pid, false)?;
    wait_for_state(job.pid, RunState::Running)?;

    // Foreground it. The shell hands the terminal to the job, so no prompt
    // is expected until the job stops or exits.
    session.sendline("fg 1")?;
    wait_for_foreground(&session, job.pid, true)?;

    // Ctrl-Z through the pty delivers SIGTSTP to the foreground group. The
    // OS table must show the stop even before any job-list builtin is asked.
    session.send_ctrl('z')?;
    session.expect_prompt()?;
    wait_for_state(job.pid, RunState::Stopped)?;

    // Resume in the background: running again, but not foreground.
    session.sendline("bg 1")?;
    session.expect_prompt()?;
    wait_for_state(job.pid, RunState::Running)?;
    wait_for_foreground(&session, job.pid, false)?;

    // Kill the job and make sure the shell is still conversational.
    session.sendline("kill 1")?;
    session.expect_prompt()?;

    session.sendline("exit")?;
    session.expect_eof(Duration::from_secs(2))?;
    session.terminate()?;
    Ok(())
}

/// Poll the shell's descendant tree until a process named `comm` appears.
fn wait_for_descendant(shell_pid: i32, comm: &str) -> Result<ProcessSnapshot, HarnessError> {
    let deadline = Instant::now() + STATE_SETTLE;
    loop {
        if let Some(snap) = descendants(shell_pid)?.into_iter().find(|p| p.comm == comm) {
            return Ok(snap);
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::StateMismatch {
                expected: format!("a {comm:?} process under the shell (pid {shell_pid})"),
                actual: "no such descendant".to_string(),
            });
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Poll until the job's run state matches, or report the mismatch.
fn wait_for_state(pid: i32, want: RunState) -> Result<(), HarnessError> {
    let deadline = Instant::now() + STATE_SETTLE;
    loop {
        let snap = snapshot(pid)?;
        if snap.state == want {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::StateMismatch {
                expected: format!("pid {pid} {want}"),
                actual: snap.to_string(),
            });
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Poll until the job's foreground status matches the terminal's report.
fn wait_for_foreground(
    session: &ShellSession,
    pid: i32,
    want: bool,
) -> Result<(), HarnessError> {
    let deadline = Instant::now() + STATE_SETTLE;
    loop {
        if is_foreground_group(session.terminal(), pid)? == want {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::StateMismatch {
                expected: format!(
                    "pid {pid} group {} the foreground group",
                    if want { "to be" } else { "not to be" }
                ),
                actual: snapshot(pid)?.to_string(),
            });
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
