//! Scenario outcome aggregation.
//!
//! Scenario code reports each run as a [`TestResult`]; the [`Reporter`]
//! collects them and turns the whole run into a process exit status.
//! Diagnostics go to stderr, never to the stream used for matching.

use tracing::info;

use shprobe_types::HarnessError;

/// How a scenario ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// All steps and assertions succeeded.
    Pass,
    /// An expectation or assertion failed.
    Fail,
    /// The scenario could not run to a verdict (I/O problems and the like).
    Error,
}

/// The recorded outcome of one scenario.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Scenario name.
    pub scenario: String,
    /// Pass, fail, or error.
    pub status: TestStatus,
    /// What failed, for humans.
    pub message: String,
    /// Captured output context at the point of failure.
    pub context: String,
}

impl TestResult {
    /// A passing result.
    pub fn pass(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            status: TestStatus::Pass,
            message: String::new(),
            context: String::new(),
        }
    }

    /// Classify a scenario error into a result.
    ///
    /// Expectation and assertion failures are test failures; anything else
    /// means the harness itself could not finish the scenario.
    pub fn from_error(scenario: &str, err: &HarnessError) -> Self {
        let (status, context) = match err {
            HarnessError::Timeout { buffer, .. } | HarnessError::Eof { buffer, .. } => {
                (TestStatus::Fail, buffer.clone())
            }
            HarnessError::Assertion { context, .. } => (TestStatus::Fail, context.clone()),
            HarnessError::StateMismatch { .. } => (TestStatus::Fail, String::new()),
            _ => (TestStatus::Error, String::new()),
        };
        Self {
            scenario: scenario.to_string(),
            status,
            message: err.to_string(),
            context,
        }
    }

    /// Whether this result counts toward a passing run.
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Pass
    }
}

/// Collects scenario results and produces the final exit status.
#[derive(Debug, Default)]
pub struct Reporter {
    results: Vec<TestResult>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scenario outcome.
    pub fn record(&mut self, result: TestResult) {
        info!(
            scenario = %result.scenario,
            status = ?result.status,
            "scenario finished"
        );
        self.results.push(result);
    }

    /// Results recorded so far.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Whether any scenario failed or errored.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.passed())
    }

    /// Print a summary to stderr and return the process exit code:
    /// zero only if every recorded result passed.
    pub fn finalize(self) -> i32 {
        let total = self.results.len();
        let passed = self.results.iter().filter(|r| r.passed()).count();

        for result in &self.results {
            match result.status {
                TestStatus::Pass => eprintln!("PASS  {}", result.scenario),
                TestStatus::Fail => {
                    eprintln!("FAIL  {}: {}", result.scenario, result.message);
                    if !result.context.is_empty() {
                        eprintln!("----- captured output -----");
                        eprintln!("{}", result.context);
                        eprintln!("---------------------------");
                    }
                }
                TestStatus::Error => {
                    eprintln!("ERROR {}: {}", result.scenario, result.message);
                }
            }
        }
        eprintln!("{passed}/{total} scenarios passed");

        if passed == total {
            0
        } else {
            1
        }
    }
}
