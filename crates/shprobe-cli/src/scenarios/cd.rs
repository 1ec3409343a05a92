//! The `cd` builtin scenario.
//!
//! Drives `cd` with no arguments, with `~`, and with a path that does not
//! exist, synchronizing on the prompt after each and checking the error
//! messages the shell emits. The exact wording comes from configuration,
//! not from this file.

use std::time::Duration;

use shprobe_harness::ShellSession;
use shprobe_types::{HarnessConfig, HarnessError};

use super::{ensure_contains, ensure_lacks};

pub fn run(config: &HarnessConfig) -> Result<(), HarnessError> {
    let mut session = ShellSession::spawn(config)?;
    session.expect_prompt()?;

    // No arguments: the shell must complain about the argument count and
    // still come back with a prompt.
    let out = session.run_builtin("cd", &[])?;
    ensure_contains(
        &out,
        &config.messages.cd_wrong_args,
        "cd with no arguments",
    )?;

    // `cd ~` is valid: prompt reappears and no error text shows up.
    let out = session.run_builtin("cd", &["~"])?;
    ensure_lacks(&out, &config.messages.cd_wrong_args, "cd ~")?;
    ensure_lacks(&out, &config.messages.cd_bad_path, "cd ~")?;

    // A path that cannot exist: expect the path-not-found message.
    let out = session.run_builtin("cd", &["wsfwefwarfg"])?;
    ensure_contains(&out, &config.messages.cd_bad_path, "cd to a missing path")?;

    // The shell should exit cleanly on request.
    session.sendline("exit")?;
    session.expect_eof(Duration::from_secs(2))?;
    session.terminate()?;
    Ok(())
}
