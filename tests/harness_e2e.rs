//! End-to-end checks of the harness against real processes in real ptys:
//! synchronization, output isolation, process-tree inspection, and
//! foreground-group ground truth.

mod common;

use std::time::Duration;

use nix::sys::signal::Signal;

use common::{spawn_mock_shell, spawn_session};
use shprobe_harness::{Pattern, Reporter, TestResult};
use shprobe_proc::{descendants, is_foreground_group, snapshot, RunState};
use shprobe_types::HarnessError;

#[test]
fn full_conversation_with_mock_shell() {
    let mut session = spawn_mock_shell();
    session.expect_prompt().expect("initial prompt");

    for command in ["ls", "ls", "ls | grep c", "ls"] {
        session.sendline(command).expect("sendline");
        session.expect_prompt().expect("prompt reappears");
    }

    let out = session.run_builtin("status", &[]).expect("run builtin");
    assert!(out.contains("got:status"));
    assert!(!out.contains("ls"), "no bleed from earlier commands: {out:?}");
}

#[test]
fn timeout_and_eof_are_distinguishable_outcomes() {
    // A silent child produces a timeout...
    let mut silent = spawn_session("/bin/cat", &[]);
    let timeout = silent.expect(&Pattern::literal("nothing"), Duration::from_millis(300));
    assert!(matches!(timeout, Err(HarnessError::Timeout { .. })));

    // ...a dying child produces EOF.
    let mut dying = spawn_session("/bin/sh", &["-c", "echo gone"]);
    let eof = dying.expect(&Pattern::literal("nothing"), Duration::from_secs(5));
    assert!(matches!(eof, Err(HarnessError::Eof { .. })));
}

#[test]
fn session_survives_a_timed_out_expectation() {
    let mut session = spawn_mock_shell();
    session.expect_prompt().expect("initial prompt");

    let missed = session.expect(&Pattern::literal("never"), Duration::from_millis(200));
    assert!(missed.is_err());

    // The timeout cancelled only the expectation; the conversation goes on.
    let out = session.run_builtin("after-timeout", &[]).expect("still usable");
    assert!(out.contains("got:after-timeout"));
}

#[test]
fn pty_child_is_the_foreground_group() {
    // The spawned child is its pty session's leader and holds the terminal.
    let session = spawn_session("/bin/cat", &[]);
    std::thread::sleep(Duration::from_millis(100));

    assert!(
        is_foreground_group(session.terminal(), session.pid()).expect("fg check"),
        "pty child should hold its own terminal's foreground"
    );

    // This test process lives on a different terminal entirely.
    let me = std::process::id() as i32;
    assert!(
        !is_foreground_group(session.terminal(), me).expect("fg check"),
        "an unrelated process must not be the pty's foreground group"
    );
}

#[test]
fn ctrl_z_stop_is_visible_in_the_process_table() {
    let mut session = spawn_session("/bin/sleep", &["300"]);
    std::thread::sleep(Duration::from_millis(200));
    let pid = session.pid();
    assert_eq!(snapshot(pid).expect("snapshot").state, RunState::Running);

    // Ctrl-Z through the terminal delivers SIGTSTP to the foreground group.
    session.send_ctrl('z').expect("send ctrl-z");
    let mut state = RunState::Running;
    for _ in 0..100 {
        state = snapshot(pid).expect("snapshot").state;
        if state == RunState::Stopped {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(state, RunState::Stopped, "OS table should show the stop");

    session.signal_group(Signal::SIGCONT).expect("resume");
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(snapshot(pid).expect("snapshot").state, RunState::Running);

    session.terminate().expect("terminate");
}

#[test]
fn terminate_cleans_up_the_whole_process_group() {
    let mut session = spawn_session("/bin/sh", &["-c", "sleep 300 & wait"]);
    std::thread::sleep(Duration::from_millis(500));

    let tree = descendants(session.pid()).expect("descendants");
    let sleep_pid = tree
        .iter()
        .find(|p| p.comm == "sleep")
        .expect("sleep should be running under the shell")
        .pid;

    session.terminate().expect("terminate");
    assert!(!session.is_alive(), "root must be gone");

    // The sleep was in the session's process group, so the group signal
    // reached it too.
    let mut gone = false;
    for _ in 0..100 {
        match snapshot(sleep_pid) {
            Err(_) => {
                gone = true;
                break;
            }
            Ok(snap) if snap.state == RunState::Zombie => {
                gone = true;
                break;
            }
            Ok(_) => std::thread::sleep(Duration::from_millis(20)),
        }
    }
    assert!(gone, "descendant should not outlive terminate()");
}

#[test]
fn reporter_turns_outcomes_into_exit_status() {
    let mut session = spawn_mock_shell();
    let mut reporter = Reporter::new();

    match session.expect_prompt() {
        Ok(_) => reporter.record(TestResult::pass("prompt")),
        Err(err) => reporter.record(TestResult::from_error("prompt", &err)),
    }

    let missed = session
        .expect(&Pattern::literal("absent"), Duration::from_millis(200))
        .unwrap_err();
    reporter.record(TestResult::from_error("absent-pattern", &missed));

    assert!(reporter.has_failures());
    assert_eq!(reporter.finalize(), 1);
}
