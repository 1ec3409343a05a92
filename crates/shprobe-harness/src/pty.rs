//! Pseudo-terminal session management.
//!
//! Spawns the shell under test in a PTY so the harness can feed it input and
//! read its output exactly as an interactive user would. The master end of
//! the PTY is owned by the harness; the child gets the slave as its
//! controlling terminal, which is what makes job control observable.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::Path;
use std::time::{Duration, Instant};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::pty::openpty;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use shprobe_types::HarnessError;

/// Grace period between SIGTERM and SIGKILL when tearing a session down.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Polling interval while waiting for the child to die after SIGTERM.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a non-blocking read from the PTY master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyRead {
    /// This many bytes were read into the buffer.
    Data(usize),
    /// No data available right now (EAGAIN).
    WouldBlock,
    /// The child closed its end of the PTY; no more output will arrive.
    Eof,
}

/// A child process running in a pseudo-terminal.
pub struct PtySession {
    master: OwnedFd,
    child_pid: Pid,
    reaped: bool,
}

impl PtySession {
    /// Spawn a command in a new PTY.
    ///
    /// The child calls `setsid()` and takes the slave as its controlling
    /// terminal, so it becomes the leader of a fresh session and process
    /// group. The master fd is set non-blocking for use with `poll()`.
    pub fn spawn(
        command: &Path,
        args: &[String],
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Self, HarnessError> {
        // exec happens after fork, where failures can only surface as the
        // child dying. Check path-qualified commands up front so a missing
        // executable is reported as a spawn failure, not a closed stream.
        // Bare names are left to execvp's PATH lookup. Relative paths resolve
        // against working_dir because the child chdir's there before exec.
        if command.components().count() > 1 {
            let resolved = if command.is_absolute() {
                command.to_path_buf()
            } else {
                working_dir.join(command)
            };
            nix::unistd::access(resolved.as_path(), nix::unistd::AccessFlags::X_OK).map_err(|e| {
                HarnessError::Spawn(format!("{} is not executable: {e}", resolved.display()))
            })?;
        }

        let pty = openpty(None, None)
            .map_err(|e| HarnessError::Spawn(format!("openpty failed: {e}")))?;

        // Safety: fork is unsafe but standard Unix practice for PTY management.
        // The child immediately exec's, so async-signal-safety is maintained.
        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => {
                // Child: wire the slave PTY up as stdin/stdout/stderr. Errors
                // must end in _exit(), never a return -- returning would put
                // two processes on the parent's code path.
                let err = (|| -> Result<(), String> {
                    drop(pty.master);

                    unistd::setsid().map_err(|e| format!("setsid failed: {e}"))?;

                    // Adopt the slave as the controlling terminal.
                    unsafe {
                        if libc::ioctl(pty.slave.as_raw_fd(), libc::TIOCSCTTY as _, 0) < 0 {
                            let err = std::io::Error::last_os_error();
                            eprintln!("shprobe: TIOCSCTTY failed: {err}");
                        }
                    }

                    unistd::dup2(pty.slave.as_raw_fd(), libc::STDIN_FILENO)
                        .map_err(|e| format!("dup2 stdin: {e}"))?;
                    unistd::dup2(pty.slave.as_raw_fd(), libc::STDOUT_FILENO)
                        .map_err(|e| format!("dup2 stdout: {e}"))?;
                    unistd::dup2(pty.slave.as_raw_fd(), libc::STDERR_FILENO)
                        .map_err(|e| format!("dup2 stderr: {e}"))?;

                    drop(pty.slave);

                    unistd::chdir(working_dir).map_err(|e| format!("chdir: {e}"))?;

                    for (key, value) in env {
                        std::env::set_var(key, value);
                    }

                    let c_command = CString::new(command.as_os_str().as_encoded_bytes())
                        .map_err(|e| format!("invalid command: {e}"))?;
                    let mut c_args: Vec<CString> = vec![c_command.clone()];
                    for arg in args {
                        c_args.push(
                            CString::new(arg.as_str()).map_err(|e| format!("invalid arg: {e}"))?,
                        );
                    }

                    unistd::execvp(&c_command, &c_args)
                        .map_err(|e| format!("exec failed: {e}"))?;

                    Ok(()) // unreachable: execvp replaces the process
                })();

                if let Err(e) = err {
                    eprintln!("shprobe: child setup failed: {e}");
                }
                unsafe { libc::_exit(127) };
            }
            Ok(ForkResult::Parent { child }) => {
                drop(pty.slave);

                // Non-blocking master so expect() can interleave poll and read.
                let flags = fcntl(pty.master.as_raw_fd(), FcntlArg::F_GETFL)
                    .map_err(|e| HarnessError::Spawn(format!("fcntl F_GETFL: {e}")))?;
                let flags = OFlag::from_bits_truncate(flags);
                fcntl(
                    pty.master.as_raw_fd(),
                    FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK),
                )
                .map_err(|e| HarnessError::Spawn(format!("fcntl F_SETFL: {e}")))?;

                debug!(pid = child.as_raw(), command = %command.display(), "spawned shell in pty");

                Ok(Self {
                    master: pty.master,
                    child_pid: child,
                    reaped: false,
                })
            }
            Err(e) => Err(HarnessError::Spawn(format!("fork failed: {e}"))),
        }
    }

    /// Non-blocking read from the master PTY.
    ///
    /// EIO on the master means the child closed the slave side, which is the
    /// PTY's way of reporting end-of-stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<PtyRead, HarnessError> {
        match unistd::read(self.master.as_raw_fd(), buf) {
            Ok(0) => Ok(PtyRead::Eof),
            Ok(n) => Ok(PtyRead::Data(n)),
            Err(nix::errno::Errno::EAGAIN) => Ok(PtyRead::WouldBlock),
            Err(nix::errno::Errno::EIO) => Ok(PtyRead::Eof),
            Err(e) => Err(HarnessError::Pty(format!("pty read: {e}"))),
        }
    }

    /// Write all bytes to the master PTY (injecting into the child's stdin).
    ///
    /// Retries on EAGAIN up to ~5 seconds. Without a limit, a child that
    /// stops reading stdin would make this spin forever.
    pub fn write_all(&self, data: &[u8]) -> Result<(), HarnessError> {
        let mut written = 0;
        let mut retries = 0u32;
        while written < data.len() {
            match unistd::write(&self.master, &data[written..]) {
                Ok(n) => {
                    written += n;
                    retries = 0;
                }
                Err(nix::errno::Errno::EAGAIN) => {
                    retries += 1;
                    if retries > 5000 {
                        return Err(HarnessError::Pty(
                            "pty write: buffer full after 5s of retries".into(),
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => {
                    return Err(HarnessError::Pty(format!("pty write: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Send a line of text to the child's stdin (appends newline).
    pub fn send_line(&self, text: &str) -> Result<(), HarnessError> {
        let mut data = text.as_bytes().to_vec();
        data.push(b'\n');
        self.write_all(&data)
    }

    /// Check if the child process is still alive.
    ///
    /// Uses `kill(pid, 0)` rather than `waitpid(WNOHANG)` so the exit status
    /// is not consumed before `wait()` can report it.
    pub fn is_alive(&self) -> bool {
        !self.reaped && signal::kill(self.child_pid, None).is_ok()
    }

    /// Wait for the child to exit and return its exit code.
    ///
    /// Returns negative values for signal termination (-signum).
    pub fn wait(&mut self) -> Result<i32, HarnessError> {
        loop {
            match waitpid(self.child_pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    self.reaped = true;
                    return Ok(code);
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    self.reaped = true;
                    return Ok(-(sig as i32));
                }
                Ok(_) => continue, // Stopped, continued, etc. -- keep waiting
                Err(nix::errno::Errno::ECHILD) => {
                    self.reaped = true;
                    return Ok(0); // Already reaped
                }
                Err(e) => return Err(HarnessError::Pty(format!("waitpid: {e}"))),
            }
        }
    }

    /// Send a signal to the child's process group.
    ///
    /// The child is a session leader, so its process group id equals its pid
    /// and the signal reaches every pipeline member it spawned into its own
    /// group as well.
    pub fn signal_group(&self, sig: Signal) -> Result<(), HarnessError> {
        signal::killpg(self.child_pid, sig)
            .map_err(|e| HarnessError::Pty(format!("killpg {sig:?}: {e}")))
    }

    /// Terminate the child's process group and reap the child.
    ///
    /// Sends SIGTERM to the group, polls for exit within a grace period, and
    /// escalates to SIGKILL for a survivor. Guarantees the child is reaped on
    /// return so no zombies accumulate across a test suite.
    pub fn terminate(&mut self) -> Result<(), HarnessError> {
        if self.reaped || !self.is_alive() {
            self.reap_nonblocking();
            return Ok(());
        }

        debug!(pid = self.child_pid.as_raw(), "terminating session process group");
        let _ = signal::killpg(self.child_pid, Signal::SIGTERM);

        let deadline = Instant::now() + TERMINATE_GRACE;
        loop {
            if self.reap_nonblocking() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    pid = self.child_pid.as_raw(),
                    "grace period expired, escalating to SIGKILL"
                );
                let _ = signal::killpg(self.child_pid, Signal::SIGKILL);
                // SIGKILL cannot be caught; a blocking wait is now bounded.
                return self.wait().map(|_| ());
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }
    }

    /// Try to reap the child without blocking. Returns true once reaped.
    fn reap_nonblocking(&mut self) -> bool {
        if self.reaped {
            return true;
        }
        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => {
                self.reaped = true;
                true
            }
            Err(nix::errno::Errno::ECHILD) => {
                self.reaped = true;
                true
            }
            _ => false,
        }
    }

    /// The raw file descriptor of the master PTY (for use with poll).
    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Borrowed fd of the master PTY, for `tcgetpgrp` and friends.
    pub fn master(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }

    /// The child's process ID.
    pub fn pid(&self) -> i32 {
        self.child_pid.as_raw()
    }

    /// Poll the master fd for readability with a timeout.
    ///
    /// Returns `true` if data is available to read (or the child hung up),
    /// `false` on timeout.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool, HarnessError> {
        let borrowed = self.master.as_fd();
        let mut poll_fd = [PollFd::new(borrowed, PollFlags::POLLIN)];
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
        let timeout = PollTimeout::try_from(millis).unwrap_or(PollTimeout::MAX);

        match nix::poll::poll(&mut poll_fd, timeout) {
            Ok(0) => Ok(false),
            Ok(_) => {
                let revents = poll_fd[0].revents().unwrap_or(PollFlags::empty());
                // POLLIN means data available; POLLHUP means child closed.
                Ok(revents.contains(PollFlags::POLLIN)
                    || revents.contains(PollFlags::POLLHUP))
            }
            Err(nix::errno::Errno::EINTR) => Ok(false), // Interrupted, treat as timeout
            Err(e) => Err(HarnessError::Pty(format!("poll: {e}"))),
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        // Best-effort cleanup so no exit path leaks the child, including
        // panics in scenario code. Errors are ignored in a destructor.
        if !self.reaped {
            let _ = self.terminate();
        }
        // OwnedFd closes the master fd automatically when dropped.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn read_all(session: &PtySession) -> String {
        let mut buf = [0u8; 1024];
        let mut output = Vec::new();
        loop {
            match session.read(&mut buf) {
                Ok(PtyRead::Data(n)) => output.extend_from_slice(&buf[..n]),
                Ok(PtyRead::WouldBlock) | Ok(PtyRead::Eof) => break,
                Err(_) => break,
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn spawn_echo_and_read_output() {
        let mut session = PtySession::spawn(
            Path::new("/bin/echo"),
            &["hello probe".to_string()],
            &PathBuf::from("/tmp"),
            &[],
        )
        .expect("spawn failed");

        std::thread::sleep(Duration::from_millis(100));
        let text = read_all(&session);
        assert!(
            text.contains("hello probe"),
            "expected 'hello probe' in output: {text:?}"
        );

        let code = session.wait().expect("wait failed");
        assert_eq!(code, 0);
    }

    #[test]
    fn spawn_and_write_to_stdin() {
        let mut session =
            PtySession::spawn(Path::new("/bin/cat"), &[], &PathBuf::from("/tmp"), &[])
                .expect("spawn failed");

        std::thread::sleep(Duration::from_millis(50));
        session.send_line("test input").expect("write failed");
        std::thread::sleep(Duration::from_millis(100));

        let text = read_all(&session);
        assert!(
            text.contains("test input"),
            "expected 'test input' in output: {text:?}"
        );

        // Ctrl-D ends cat
        session.write_all(&[0x04]).expect("EOF failed");
        let code = session.wait().expect("wait failed");
        assert_eq!(code, 0);
    }

    #[test]
    fn read_reports_eof_after_child_exits() {
        let mut session = PtySession::spawn(
            Path::new("/bin/echo"),
            &["done".to_string()],
            &PathBuf::from("/tmp"),
            &[],
        )
        .expect("spawn failed");

        std::thread::sleep(Duration::from_millis(200));
        // Drain the real output first.
        let mut buf = [0u8; 1024];
        loop {
            match session.read(&mut buf).expect("read failed") {
                PtyRead::Data(_) => continue,
                PtyRead::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(20));
                    continue;
                }
                PtyRead::Eof => break,
            }
        }
        session.wait().ok();
    }

    #[test]
    fn terminate_reaps_a_long_running_child() {
        let mut session = PtySession::spawn(
            Path::new("/bin/sleep"),
            &["300".to_string()],
            &PathBuf::from("/tmp"),
            &[],
        )
        .expect("spawn failed");

        assert!(session.is_alive());
        session.terminate().expect("terminate failed");
        assert!(!session.is_alive(), "child should be gone after terminate");
    }

    #[test]
    fn poll_readable_returns_data() {
        let mut session = PtySession::spawn(
            Path::new("/bin/echo"),
            &["poll test".to_string()],
            &PathBuf::from("/tmp"),
            &[],
        )
        .expect("spawn failed");

        let readable = session
            .poll_readable(Duration::from_secs(1))
            .expect("poll failed");
        assert!(readable, "expected data to be readable");

        session.wait().ok();
    }

    #[test]
    fn spawn_missing_executable_is_spawn_failure() {
        let result = PtySession::spawn(
            Path::new("/nonexistent/shell"),
            &[],
            &PathBuf::from("/tmp"),
            &[],
        );
        assert!(
            matches!(result, Err(HarnessError::Spawn(_))),
            "missing executable should fail at spawn time: {:?}",
            result.as_ref().err()
        );
    }

    #[test]
    fn spawn_non_executable_file_is_spawn_failure() {
        let tmp = tempfile::NamedTempFile::new().expect("temp file");
        let result = PtySession::spawn(tmp.path(), &[], &PathBuf::from("/tmp"), &[]);
        assert!(matches!(result, Err(HarnessError::Spawn(_))));
    }
}
