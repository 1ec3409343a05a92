//! Configuration for the shell under test.
//!
//! [`HarnessConfig`] is loaded from `shprobe.toml` and controls which shell
//! executable is spawned, the prompt pattern used as the synchronization
//! anchor, per-expectation timeouts, and the error-message strings the
//! scenarios assert on.
//!
//! Sources are merged in priority order (later overrides earlier):
//! 1. Built-in defaults ([`HarnessConfig::default()`])
//! 2. A TOML file, when one is provided
//! 3. `SHPROBE_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::HarnessError;

/// Maximum config file size in bytes. Anything larger is almost certainly
/// not a harness config.
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Error-message strings the shell is expected to emit.
///
/// The exact wording is convention, not contract, so scenarios match against
/// these configured strings rather than hard-coded literals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExpectedMessages {
    /// Emitted when `cd` is invoked with the wrong number of arguments.
    pub cd_wrong_args: String,
    /// Emitted when `cd` is given a path that does not exist.
    pub cd_bad_path: String,
}

impl Default for ExpectedMessages {
    fn default() -> Self {
        Self {
            cd_wrong_args: "cd requires exactly one argument".to_string(),
            cd_bad_path: "Path not recognized.".to_string(),
        }
    }
}

/// Top-level configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Path to the shell executable under test.
    pub shell: PathBuf,
    /// Arguments passed to the shell.
    pub args: Vec<String>,
    /// Working directory for the shell process.
    pub working_dir: PathBuf,
    /// Extra environment variables for the shell process.
    pub env: Vec<(String, String)>,
    /// The prompt the shell emits when ready for input. Matched as a
    /// substring unless `prompt_is_regex` is set.
    pub prompt: String,
    /// Interpret `prompt` as a regular expression instead of a literal.
    pub prompt_is_regex: bool,
    /// Per-expectation timeout in seconds.
    pub timeout_secs: u64,
    /// Stop after the first failing scenario instead of continuing.
    pub fail_fast: bool,
    /// Expected error-message strings.
    pub messages: ExpectedMessages,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("./cush"),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            env: Vec::new(),
            prompt: "cush> ".to_string(),
            prompt_is_regex: false,
            timeout_secs: 5,
            fail_fast: false,
            messages: ExpectedMessages::default(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration: defaults, then the given TOML file (if any),
    /// then `SHPROBE_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, HarnessError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, rejecting oversized files before reading.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            HarnessError::Config(format!("cannot stat {}: {e}", path.display()))
        })?;
        if meta.len() > MAX_CONFIG_FILE_SIZE {
            return Err(HarnessError::Config(format!(
                "config file {} exceeds {MAX_CONFIG_FILE_SIZE} bytes",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&text)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `SHPROBE_SHELL`, `SHPROBE_PROMPT`, and `SHPROBE_TIMEOUT_SECS`
    /// overrides from the environment.
    fn apply_env_overrides(&mut self) {
        if let Ok(shell) = std::env::var("SHPROBE_SHELL") {
            self.shell = PathBuf::from(shell);
        }
        if let Ok(prompt) = std::env::var("SHPROBE_PROMPT") {
            self.prompt = prompt;
        }
        if let Ok(secs) = std::env::var("SHPROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                self.timeout_secs = secs;
            }
        }
    }

    /// Reject configurations the harness cannot run with.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.shell.as_os_str().is_empty() {
            return Err(HarnessError::Config("shell path is empty".into()));
        }
        if self.prompt.is_empty() {
            return Err(HarnessError::Config("prompt is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::Config("timeout_secs must be nonzero".into()));
        }
        Ok(())
    }

    /// The per-expectation timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.prompt, "cush> ");
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            tmp,
            r#"
shell = "/usr/local/bin/cush"
prompt = "$ "
timeout_secs = 10

[messages]
cd_wrong_args = "usage: cd dir"
cd_bad_path = "no such directory"
"#
        )
        .expect("write config");

        let config = HarnessConfig::from_file(tmp.path()).expect("parse config");
        assert_eq!(config.shell, PathBuf::from("/usr/local/bin/cush"));
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.messages.cd_wrong_args, "usage: cd dir");
        assert_eq!(config.messages.cd_bad_path, "no such directory");
        // Fields absent from the file keep their defaults.
        assert!(!config.fail_fast);
    }

    #[test]
    fn empty_prompt_rejected() {
        let config = HarnessConfig {
            prompt: String::new(),
            ..HarnessConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(HarnessError::Config(_))
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = HarnessConfig {
            timeout_secs: 0,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut tmp = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(tmp, "shell = [not toml").expect("write config");
        assert!(matches!(
            HarnessConfig::from_file(tmp.path()),
            Err(HarnessError::Config(_))
        ));
    }
}
