//! Scenario registry and runner.
//!
//! Each scenario is a thin sequence of sendline/expect steps over a fresh
//! [`ShellSession`](shprobe_harness::ShellSession); the runner converts its
//! outcome into a [`TestResult`] and keeps going with the remaining
//! scenarios unless the failure was fatal (no session could be spawned) or
//! `fail_fast` is configured.

pub mod cd;
pub mod history;
pub mod jobs;

use tracing::{error, info};

use shprobe_harness::{Reporter, TestResult};
use shprobe_types::{HarnessConfig, HarnessError};

/// A named scenario over a fresh shell session.
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: fn(&HarnessConfig) -> Result<(), HarnessError>,
}

/// All known scenarios, in execution order.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "cd",
        description: "cd builtin: argument count, ~ expansion, bad paths",
        run: cd::run,
    },
    Scenario {
        name: "history",
        description: "history builtin: ordered, strictly increasing indices",
        run: history::run,
    },
    Scenario {
        name: "jobs",
        description: "job control verified against the OS process table",
        run: jobs::run,
    },
];

/// Run every scenario matching `filter` (all when `None`) and collect the
/// results.
pub fn run_scenarios(config: &HarnessConfig, filter: Option<&str>) -> Reporter {
    let mut reporter = Reporter::new();

    for scenario in SCENARIOS
        .iter()
        .filter(|s| filter.map_or(true, |f| f == s.name))
    {
        info!(scenario = scenario.name, "running scenario");
        match (scenario.run)(config) {
            Ok(()) => reporter.record(TestResult::pass(scenario.name)),
            Err(err) => {
                let fatal = err.is_fatal();
                reporter.record(TestResult::from_error(scenario.name, &err));
                if fatal {
                    error!(scenario = scenario.name, %err, "aborting run: no session to continue against");
                    break;
                }
                if config.fail_fast {
                    break;
                }
            }
        }
    }

    reporter
}

/// Fail unless `output` contains `needle`.
pub(crate) fn ensure_contains(
    output: &str,
    needle: &str,
    what: &str,
) -> Result<(), HarnessError> {
    if !output.contains(needle) {
        return Err(HarnessError::Assertion {
            message: format!("{what}: expected output to contain {needle:?}"),
            context: output.to_string(),
        });
    }
    Ok(())
}

/// Fail if `output` contains `needle`.
pub(crate) fn ensure_lacks(output: &str, needle: &str, what: &str) -> Result<(), HarnessError> {
    if output.contains(needle) {
        return Err(HarnessError::Assertion {
            message: format!("{what}: output must not contain {needle:?}"),
            context: output.to_string(),
        });
    }
    Ok(())
}
