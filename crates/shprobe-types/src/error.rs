//! Error types shared across all shprobe crates.

/// Errors that can occur while driving a shell under test.
///
/// Every variant except [`HarnessError::Spawn`] is recoverable at the
/// scenario level: the runner records the failure and moves on to cleanup
/// and the remaining scenarios. A spawn failure means no session exists to
/// continue against, so it aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The shell executable could not be started or the pty could not be
    /// allocated.
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// Expected output did not appear within the timeout.
    #[error("timeout waiting for: {expected}\nBuffered output:\n{buffer}")]
    Timeout {
        /// The pattern that was expected.
        expected: String,
        /// Unconsumed output accumulated at the time of the timeout.
        buffer: String,
    },

    /// The pty stream closed before the pattern matched. Distinct from a
    /// timeout: it signals the shell exited or crashed mid-conversation.
    #[error("stream closed while waiting for: {expected}\nBuffered output:\n{buffer}")]
    Eof {
        /// The pattern that was expected.
        expected: String,
        /// Unconsumed output accumulated when the stream closed.
        buffer: String,
    },

    /// An OS-level process-tree assertion did not hold.
    #[error("process state mismatch: expected {expected}, observed {actual}")]
    StateMismatch {
        /// What the scenario required of the process table.
        expected: String,
        /// What the process table actually showed.
        actual: String,
    },

    /// An output-text assertion failed.
    #[error("assertion failed: {message}\nCaptured output:\n{context}")]
    Assertion {
        /// Description of what was expected.
        message: String,
        /// The output the assertion ran against.
        context: String,
    },

    /// An error reading the OS process table.
    #[error("process table error: {0}")]
    Proc(String),

    /// An error from the underlying pty.
    #[error("pty error: {0}")]
    Pty(String),

    /// An invalid regex pattern was provided.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// A catch-all I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Whether this error must abort the entire run rather than just the
    /// current scenario.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Spawn(_))
    }
}
