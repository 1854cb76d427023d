//! Local run and test records
//!
//! Every test outcome is recorded locally whether or not remote tracking is
//! active; the tracking client and the results report both read from these
//! types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
        }
    }

    /// Marker used in per-test log lines.
    pub fn marker(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "-",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded test outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Failure screenshot, when one was captured.
    pub screenshot: Option<PathBuf>,
}

impl TestRecord {
    pub fn new(
        name: &str,
        status: TestStatus,
        duration: Duration,
        error_message: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            status,
            duration_ms: duration.as_millis() as u64,
            error_message: error_message.map(String::from),
            recorded_at: Utc::now(),
            screenshot: None,
        }
    }

    /// Duration in fractional seconds, for log lines.
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Aggregate statistics for a finished run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub status: RunStatus,
}

impl RunSummary {
    /// Partition recorded outcomes into aggregate counts.
    ///
    /// The overall status is failed exactly when at least one record failed;
    /// skips alone do not fail a run.
    pub fn tally(records: &[TestRecord], duration: Duration) -> Self {
        let passed = records.iter().filter(|r| r.status == TestStatus::Passed).count();
        let failed = records.iter().filter(|r| r.status == TestStatus::Failed).count();
        let skipped = records.iter().filter(|r| r.status == TestStatus::Skipped).count();
        let status = if failed > 0 { RunStatus::Failed } else { RunStatus::Passed };
        Self {
            total: records.len(),
            passed,
            failed,
            skipped,
            duration_ms: duration.as_millis() as u64,
            status,
        }
    }

    /// Process exit code for this summary: 0 unless something failed.
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }
}
