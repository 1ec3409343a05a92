//! OS process-table inspection for job-control verification.
//!
//! The harness never trusts the shell's own job list: it reads the kernel's
//! view instead. [`snapshot`] captures one process, [`descendants`] walks
//! the subtree a shell spawned, and [`is_foreground_group`] asks the
//! controlling terminal who really holds the foreground.

pub mod snapshot;
pub mod tree;

pub use snapshot::{snapshot, ProcessSnapshot, RunState};
pub use tree::{descendants, is_foreground_group};
