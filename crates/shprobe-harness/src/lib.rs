//! PTY-based black-box test harness for interactive shells.
//!
//! Spawns a shell under test in a pseudo-terminal, drives a request/response
//! conversation with it, and synchronizes on expected output patterns with
//! explicit timeouts. Matching runs over the raw output text; there is no
//! terminal emulation and no understanding of shell syntax.
//!
//! # Overview
//!
//! - [`PtySession`]: the child process and its pty, with guaranteed cleanup
//! - [`ShellSession`]: buffered sendline/expect conversation over the pty
//! - [`Pattern`]: literal-or-regex expected output
//! - [`Reporter`] / [`TestResult`]: pass/fail aggregation and exit status
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shprobe_harness::{Pattern, ShellSession};
//! use shprobe_types::HarnessConfig;
//!
//! # fn example() -> Result<(), shprobe_types::HarnessError> {
//! let mut session = ShellSession::spawn(&HarnessConfig::default())?;
//! session.expect_prompt()?;
//! session.sendline("ls")?;
//! session.expect_prompt()?;
//! let listing = session.run_builtin("history", &[])?;
//! assert!(listing.contains("ls"));
//! # Ok(())
//! # }
//! ```

pub mod pattern;
pub mod pty;
pub mod report;
pub mod session;

pub use pattern::Pattern;
pub use pty::{PtyRead, PtySession};
pub use report::{Reporter, TestResult, TestStatus};
pub use session::{MatchedSpan, ShellSession};
