//! Interactive shell session with pattern synchronization.
//!
//! [`ShellSession`] owns the PTY conversation with the shell under test: it
//! accumulates raw output in a buffer, and [`ShellSession::expect`] blocks
//! (bounded by `poll`) until a [`Pattern`] appears in the unconsumed portion
//! of that buffer. Matched output is consumed so consecutive expectations
//! never see the same bytes twice, and a pattern split across read chunks is
//! still found because the buffer persists between calls.

use std::os::fd::BorrowedFd;
use std::time::{Duration, Instant};

use tracing::debug;

use shprobe_types::{HarnessConfig, HarnessError};

use crate::pattern::Pattern;
use crate::pty::{PtyRead, PtySession};

/// The span a pattern matched, with offsets into the session's lifetime
/// output buffer.
#[derive(Debug, Clone)]
pub struct MatchedSpan {
    /// The matched text.
    pub text: String,
    /// Byte offset of the match start in the session buffer.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
}

/// A shell under test, driven through a pseudo-terminal.
///
/// One session is driven synchronously by one sequence of `sendline`/`expect`
/// calls; `expect` takes `&mut self`, so at most one expectation is ever
/// active. The child process and master fd are released when the session is
/// dropped, on every exit path.
pub struct ShellSession {
    pty: PtySession,
    buffer: String,
    consumed: usize,
    prompt: Pattern,
    timeout: Duration,
    saw_eof: bool,
}

impl ShellSession {
    /// Spawn the configured shell in a fresh PTY.
    pub fn spawn(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let prompt = if config.prompt_is_regex {
            Pattern::regex(&config.prompt)?
        } else {
            Pattern::literal(config.prompt.clone())
        };
        let pty = PtySession::spawn(&config.shell, &config.args, &config.working_dir, &config.env)?;
        Ok(Self::from_parts(pty, prompt, config.timeout()))
    }

    /// Build a session around an already-spawned PTY.
    ///
    /// Used by tests that drive stand-in programs instead of a real shell.
    pub fn from_parts(pty: PtySession, prompt: Pattern, timeout: Duration) -> Self {
        Self {
            pty,
            buffer: String::new(),
            consumed: 0,
            prompt,
            timeout,
            saw_eof: false,
        }
    }

    /// Send a line of text to the shell. Appends a newline; does not wait.
    pub fn sendline(&mut self, text: &str) -> Result<(), HarnessError> {
        debug!(line = text, "sendline");
        self.pty.send_line(text)
    }

    /// Send a control character (e.g. `send_ctrl('z')` for SIGTSTP,
    /// `send_ctrl('c')` for SIGINT) through the terminal.
    pub fn send_ctrl(&mut self, c: char) -> Result<(), HarnessError> {
        let byte = (c.to_ascii_uppercase() as u8) & 0x1f;
        self.pty.write_all(&[byte])
    }

    /// Block until `pattern` appears in the unconsumed output, the timeout
    /// elapses, or the stream closes.
    ///
    /// On a match, everything up to and including the matched span is
    /// consumed. On timeout or EOF the buffered-but-unmatched output is
    /// attached to the error for diagnosis; the session itself stays usable
    /// (a timeout cancels only this expectation).
    pub fn expect(&mut self, pattern: &Pattern, timeout: Duration) -> Result<MatchedSpan, HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain_available()?;

            if let Some((start, end)) = pattern.find(&self.buffer[self.consumed..]) {
                let (start, end) = (self.consumed + start, self.consumed + end);
                let text = self.buffer[start..end].to_string();
                self.consumed = end;
                debug!(pattern = %pattern, start, end, "expect matched");
                return Ok(MatchedSpan { text, start, end });
            }

            if self.saw_eof {
                return Err(HarnessError::Eof {
                    expected: pattern.to_string(),
                    buffer: self.unconsumed().to_string(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HarnessError::Timeout {
                    expected: pattern.to_string(),
                    buffer: self.unconsumed().to_string(),
                });
            }

            // Bounded block until more output arrives or the deadline passes.
            self.pty.poll_readable(deadline - now)?;
        }
    }

    /// `expect` with the session's default timeout.
    pub fn expect_default(&mut self, pattern: &Pattern) -> Result<MatchedSpan, HarnessError> {
        self.expect(pattern, self.timeout)
    }

    /// Wait for the shell's prompt -- the synchronization anchor between
    /// every command.
    pub fn expect_prompt(&mut self) -> Result<MatchedSpan, HarnessError> {
        let prompt = self.prompt.clone();
        self.expect(&prompt, self.timeout)
    }

    /// Run one command and capture exactly its output.
    ///
    /// Sends the composed command line, waits for the next prompt, and
    /// returns only the text between the send and the prompt match, with the
    /// terminal's echo of the command line itself stripped. Output from
    /// earlier or later commands cannot bleed in: the slice starts at the
    /// buffer position recorded at send time and ends where the prompt
    /// matched.
    pub fn run_builtin(&mut self, name: &str, args: &[&str]) -> Result<String, HarnessError> {
        let command = if args.is_empty() {
            name.to_string()
        } else {
            format!("{name} {}", args.join(" "))
        };

        // Pick up any straggling output first so the mark is exact.
        self.drain_available()?;
        let mark = self.buffer.len();

        self.sendline(&command)?;
        let matched = self.expect_prompt()?;

        let raw = &self.buffer[mark..matched.start];
        // The first line is the pty's echo of the command we just sent.
        let output = match raw.find('\n') {
            Some(i) => &raw[i + 1..],
            None => "",
        };
        Ok(output.to_string())
    }

    /// Block until the shell closes its end of the pty.
    ///
    /// The inverse of [`expect`](Self::expect): here end-of-stream is the
    /// success case (e.g. after sending `exit`), and a still-open stream at
    /// the deadline is the failure.
    pub fn expect_eof(&mut self, timeout: Duration) -> Result<(), HarnessError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.drain_available()?;
            if self.saw_eof {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(HarnessError::Timeout {
                    expected: "end of stream".to_string(),
                    buffer: self.unconsumed().to_string(),
                });
            }
            self.pty.poll_readable(deadline - now)?;
        }
    }

    /// Read whatever the pty has ready, without blocking.
    ///
    /// Remembers EOF so `expect` can report it even when it is observed
    /// between expectations.
    fn drain_available(&mut self) -> Result<(), HarnessError> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.pty.read(&mut chunk)? {
                PtyRead::Data(n) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));
                }
                PtyRead::WouldBlock => return Ok(()),
                PtyRead::Eof => {
                    self.saw_eof = true;
                    return Ok(());
                }
            }
        }
    }

    /// Output received but not yet consumed by a match.
    pub fn unconsumed(&self) -> &str {
        &self.buffer[self.consumed..]
    }

    /// Everything the shell has written so far.
    pub fn full_output(&self) -> &str {
        &self.buffer
    }

    /// Whether the shell process is still running.
    pub fn is_alive(&self) -> bool {
        self.pty.is_alive()
    }

    /// The shell's process id.
    pub fn pid(&self) -> i32 {
        self.pty.pid()
    }

    /// The pty master fd, the controlling terminal of the shell. Needed to
    /// ask the kernel which process group currently holds the foreground.
    pub fn terminal(&self) -> BorrowedFd<'_> {
        self.pty.master()
    }

    /// Send a signal to the shell's process group.
    pub fn signal_group(&self, sig: nix::sys::signal::Signal) -> Result<(), HarnessError> {
        self.pty.signal_group(sig)
    }

    /// Terminate the shell's process group and reap it.
    pub fn terminate(&mut self) -> Result<(), HarnessError> {
        self.pty.terminate()
    }

    /// Wait for the shell to exit on its own and return the exit code.
    pub fn wait(&mut self) -> Result<i32, HarnessError> {
        self.pty.wait()
    }
}
