//! Tracking client
//!
//! Reports run and per-test outcomes to the tracking backend over three
//! lifecycle calls:
//!
//! 1. `start_run`   POST  /api/pipeline-runs/      create the run record
//! 2. `record_test` POST  /api/test-cases/         one child record per test
//! 3. `finish_run`  PATCH /api/pipeline-runs/{id}/ final statistics
//!
//! Remote calls only happen under CI; local runs keep the same bookkeeping
//! and log instead. Every backend failure degrades to a log line, so a
//! tracking outage can never change a test result.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::record::{RunStatus, RunSummary, TestRecord, TestStatus};

/// Fixed per-call timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend used when API_BASE_URL is not set.
pub const DEFAULT_API_BASE_URL: &str = "https://unsobering-maribeth-hokey.ngrok-free.dev";

const DEFAULT_ORG_ID: &str = "374060a8-925c-49aa-8495-8a823949f3e0";
const DEFAULT_CREATED_BY: &str = "c9279b2d-701c-48eb-9122-fbeae465771c";

/// Tracking configuration, resolved from the environment once at startup.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Whether remote reporting is active.
    pub enabled: bool,
    pub api_base_url: String,
    pub api_token: String,
    /// Repository label sent with the run record.
    pub repo_name: String,
    /// Environment tag sent with the run record.
    pub environment: String,
    pub job_name: String,
    /// Raw build number; parsed to an integer for the payload.
    pub build_number: String,
    pub build_url: String,
    pub git_branch: String,
    pub git_commit: String,
    pub org_id: String,
    pub created_by: String,
}

impl TrackingConfig {
    /// Read the conventional CI variables. The run counts as CI when either
    /// JENKINS_HOME or BUILD_NUMBER is present.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let build_number = var("BUILD_NUMBER");
        Self {
            enabled: var("JENKINS_HOME").is_some() || build_number.is_some(),
            api_base_url: var("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_token: var("API_TOKEN").unwrap_or_else(|| "your-api-token-here".to_string()),
            repo_name: "webdrill".to_string(),
            environment: "qa".to_string(),
            job_name: var("JOB_NAME").unwrap_or_else(|| "Unknown Job".to_string()),
            build_number: build_number.unwrap_or_else(|| "0".to_string()),
            build_url: var("BUILD_URL").unwrap_or_default(),
            git_branch: var("GIT_BRANCH").unwrap_or_else(|| "main".to_string()),
            git_commit: var("GIT_COMMIT").unwrap_or_else(|| "unknown".to_string()),
            org_id: var("ORG_ID").unwrap_or_else(|| DEFAULT_ORG_ID.to_string()),
            created_by: var("CREATED_BY").unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
        }
    }
}

/// What a lifecycle call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// No remote call attempted (reporting disabled or no run id).
    Skipped,
    /// The backend accepted the call.
    Sent,
    /// The call was attempted and failed; the failure was logged.
    Failed,
}

/// Successful backend calls per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub run_create: u32,
    pub test_case: u32,
    pub run_update: u32,
}

impl CallCounts {
    pub fn total(&self) -> u32 {
        self.run_create + self.test_case + self.run_update
    }
}

#[derive(Debug, Serialize)]
struct RunCreatePayload<'a> {
    name: String,
    repo_name: &'a str,
    environment: &'a str,
    org: &'a str,
    created_by: &'a str,
    build_number: i64,
    build_url: &'a str,
    git_branch: &'a str,
    git_commit: &'a str,
    status: RunStatus,
    started_at: String,
}

#[derive(Debug, Serialize)]
struct TestCasePayload<'a> {
    run: &'a str,
    name: &'a str,
    status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<&'a str>,
    duration: i64,
    started_at: String,
    completed_at: String,
}

#[derive(Debug, Serialize)]
struct RunUpdatePayload {
    status: RunStatus,
    completed_at: String,
    total_tests: usize,
    passed_tests: usize,
    failed_tests: usize,
    duration: i64,
}

/// Client for the tracking backend. Owned by the session harness and handed
/// to the lifecycle hooks; there is no process-global instance.
pub struct TrackingClient {
    config: TrackingConfig,
    http: reqwest::Client,
    run_id: Option<String>,
    records: Vec<TestRecord>,
    started: Option<Instant>,
    calls: CallCounts,
}

impl TrackingClient {
    pub fn new(config: &TrackingConfig) -> HarnessResult<Self> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            config: config.clone(),
            http,
            run_id: None,
            records: Vec::new(),
            started: None,
            calls: CallCounts::default(),
        })
    }

    /// Remote run identifier, once the backend has assigned one.
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Everything recorded so far, in execution order.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn call_counts(&self) -> CallCounts {
        self.calls
    }

    /// Create the remote run record. Outside CI this logs a notice and does
    /// nothing else.
    pub async fn start_run(&mut self) -> CallOutcome {
        self.started = Some(Instant::now());

        if !self.config.enabled {
            info!("local run detected, skipping tracking API calls");
            info!("set BUILD_NUMBER to enable remote run tracking");
            return CallOutcome::Skipped;
        }

        let payload = self.run_create_payload();
        info!("creating pipeline run: POST {}/api/pipeline-runs/", self.config.api_base_url);

        match self.post("/api/pipeline-runs/", &payload).await {
            Ok(body) => match extract_run_id(&body) {
                Ok(id) => {
                    info!(
                        "pipeline run created: id={} build=#{} branch={}",
                        id, self.config.build_number, self.config.git_branch
                    );
                    self.run_id = Some(id);
                    self.calls.run_create += 1;
                    CallOutcome::Sent
                }
                Err(e) => {
                    error!("pipeline run response rejected: {e}");
                    CallOutcome::Failed
                }
            },
            Err(e) => {
                self.log_call_failure("pipeline run create", &e);
                CallOutcome::Failed
            }
        }
    }

    /// Record one test outcome locally and, when a remote run exists,
    /// forward it as a child record.
    pub async fn record_test(
        &mut self,
        name: &str,
        status: TestStatus,
        duration: Duration,
        error_message: Option<&str>,
    ) -> CallOutcome {
        let record = TestRecord::new(name, status, duration, error_message);
        info!(
            "{} {} | {} ({:.2}s)",
            status.marker(),
            name,
            status.as_str().to_uppercase(),
            record.duration_secs()
        );
        let duration_ms = record.duration_ms;
        self.records.push(record);

        let Some(run_id) = self.run_id.clone() else {
            return CallOutcome::Skipped;
        };

        // Both timestamps are the send time: per-test wall-clock boundaries
        // are not tracked separately, only the measured duration is.
        let now = utc_timestamp();
        let payload = TestCasePayload {
            run: &run_id,
            name,
            status,
            error_message,
            duration: duration_ms as i64,
            started_at: now.clone(),
            completed_at: now,
        };

        match self.post("/api/test-cases/", &payload).await {
            Ok(_) => {
                self.calls.test_case += 1;
                info!("test case recorded ({duration_ms} ms)");
                CallOutcome::Sent
            }
            Err(e) => {
                self.log_call_failure("test case create", &e);
                CallOutcome::Failed
            }
        }
    }

    /// Attach a failure screenshot to the most recent record for `name`.
    /// Best effort: a missing record is silently ignored.
    pub fn attach_screenshot(&mut self, name: &str, path: PathBuf) {
        if let Some(record) = self.records.iter_mut().rev().find(|r| r.name == name) {
            record.screenshot = Some(path);
        }
    }

    /// Close out the run: update the remote record when one exists, log the
    /// summary either way, and return it.
    pub async fn finish_run(&mut self) -> RunSummary {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        let summary = RunSummary::tally(&self.records, elapsed);

        let Some(run_id) = self.run_id.clone() else {
            self.log_local_summary(&summary);
            return summary;
        };

        let payload = RunUpdatePayload {
            status: summary.status,
            completed_at: utc_timestamp(),
            total_tests: summary.total,
            passed_tests: summary.passed,
            failed_tests: summary.failed,
            duration: summary.duration_ms as i64,
        };

        info!("updating pipeline run: PATCH /api/pipeline-runs/{run_id}/");

        match self.patch(&format!("/api/pipeline-runs/{run_id}/"), &payload).await {
            Ok(()) => {
                self.calls.run_update += 1;
                info!(
                    "pipeline run updated: total={} passed={} failed={} skipped={} status={}",
                    summary.total, summary.passed, summary.failed, summary.skipped, summary.status
                );
            }
            Err(e) => self.log_call_failure("pipeline run update", &e),
        }

        self.log_call_summary();
        summary
    }

    fn run_create_payload(&self) -> RunCreatePayload<'_> {
        RunCreatePayload {
            name: format!("{} - Build #{}", self.config.job_name, self.config.build_number),
            repo_name: &self.config.repo_name,
            environment: &self.config.environment,
            org: &self.config.org_id,
            created_by: &self.config.created_by,
            build_number: self.config.build_number.parse().unwrap_or(0),
            build_url: &self.config.build_url,
            git_branch: &self.config.git_branch,
            git_commit: &self.config.git_commit,
            status: RunStatus::Running,
            started_at: utc_timestamp(),
        }
    }

    fn log_local_summary(&self, summary: &RunSummary) {
        if summary.total == 0 {
            return;
        }
        info!(
            "test execution summary: total={} passed={} failed={} skipped={}",
            summary.total, summary.passed, summary.failed, summary.skipped
        );
    }

    fn log_call_summary(&self) {
        info!(
            "tracking API calls: run-create={} test-case={} run-update={} total={}",
            self.calls.run_create,
            self.calls.test_case,
            self.calls.run_update,
            self.calls.total()
        );
    }

    fn log_call_failure(&self, what: &str, err: &HarnessError) {
        match err {
            HarnessError::Http(e) if e.is_timeout() => {
                error!("{what} timed out after {}s", CALL_TIMEOUT.as_secs());
            }
            HarnessError::Http(e) if e.is_connect() => {
                error!("{what} could not reach {}: {e}", self.config.api_base_url);
            }
            _ => error!("{what} failed: {err}"),
        }
    }

    async fn post<T: Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> HarnessResult<serde_json::Value> {
        let response = self
            .request(reqwest::Method::POST, endpoint)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::CREATED {
            Ok(response.json().await?)
        } else {
            warn!("POST {endpoint} returned status {status}");
            Err(HarnessError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn patch<T: Serialize>(&self, endpoint: &str, payload: &T) -> HarnessResult<()> {
        let response = self
            .request(reqwest::Method::PATCH, endpoint)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::OK || status == reqwest::StatusCode::NO_CONTENT {
            Ok(())
        } else {
            warn!("PATCH {endpoint} returned status {status}");
            Err(HarnessError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.config.api_base_url, endpoint))
            .bearer_auth(&self.config.api_token)
            // The backend sits behind a tunnel that interposes a browser
            // warning page unless asked not to.
            .header("ngrok-skip-browser-warning", "true")
    }
}

/// Pull the assigned run id out of a create response body. Accepts string
/// and integer ids.
fn extract_run_id(body: &serde_json::Value) -> HarnessResult<String> {
    let id = body
        .get("pipeline_run")
        .ok_or(HarnessError::MissingField("pipeline_run"))?
        .get("run_id")
        .ok_or(HarnessError::MissingField("pipeline_run.run_id"))?;
    match id {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(HarnessError::MissingField("pipeline_run.run_id")),
    }
}

/// UTC now as a Z-suffixed ISO-8601 string with microsecond precision.
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrackingConfig {
        TrackingConfig {
            enabled: true,
            api_base_url: "http://127.0.0.1:1".to_string(),
            api_token: "token".to_string(),
            repo_name: "webdrill".to_string(),
            environment: "qa".to_string(),
            job_name: "webdrill-e2e".to_string(),
            build_number: "17".to_string(),
            build_url: "http://ci.example.com/job/webdrill/17/".to_string(),
            git_branch: "main".to_string(),
            git_commit: "abc123".to_string(),
            org_id: "org-1".to_string(),
            created_by: "user-1".to_string(),
        }
    }

    #[test]
    fn extract_run_id_accepts_both_id_shapes() {
        let body = serde_json::json!({"pipeline_run": {"run_id": "run-1"}});
        assert_eq!(extract_run_id(&body).unwrap(), "run-1");

        let body = serde_json::json!({"pipeline_run": {"run_id": 42}});
        assert_eq!(extract_run_id(&body).unwrap(), "42");
    }

    #[test]
    fn extract_run_id_reports_the_missing_level() {
        let body = serde_json::json!({"detail": "created"});
        assert!(matches!(
            extract_run_id(&body),
            Err(HarnessError::MissingField("pipeline_run"))
        ));

        let body = serde_json::json!({"pipeline_run": {}});
        assert!(matches!(
            extract_run_id(&body),
            Err(HarnessError::MissingField("pipeline_run.run_id"))
        ));
    }

    #[test]
    fn run_create_payload_shape() {
        let client = TrackingClient::new(&config()).unwrap();
        let value = serde_json::to_value(client.run_create_payload()).unwrap();

        assert_eq!(value["name"], "webdrill-e2e - Build #17");
        assert_eq!(value["build_number"], 17);
        assert_eq!(value["status"], "running");
        assert_eq!(value["org"], "org-1");
        assert!(value["started_at"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn unparsable_build_number_becomes_zero() {
        let mut cfg = config();
        cfg.build_number = "nightly".to_string();
        let client = TrackingClient::new(&cfg).unwrap();
        let value = serde_json::to_value(client.run_create_payload()).unwrap();
        assert_eq!(value["build_number"], 0);
        assert_eq!(value["name"], "webdrill-e2e - Build #nightly");
    }

    #[test]
    fn test_case_payload_omits_absent_error() {
        let payload = TestCasePayload {
            run: "run-1",
            name: "login_valid_credentials",
            status: TestStatus::Passed,
            error_message: None,
            duration: 1234,
            started_at: "t".into(),
            completed_at: "t".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("error_message").is_none());
        assert_eq!(value["status"], "passed");
        assert_eq!(value["duration"], 1234);
    }

    #[test]
    fn timestamps_are_utc_with_z_suffix() {
        let ts = utc_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('T'));
    }

    #[tokio::test]
    async fn disabled_client_stays_local() {
        let mut cfg = config();
        cfg.enabled = false;
        let mut client = TrackingClient::new(&cfg).unwrap();

        assert_eq!(client.start_run().await, CallOutcome::Skipped);
        assert_eq!(
            client
                .record_test("t", TestStatus::Passed, Duration::from_millis(5), None)
                .await,
            CallOutcome::Skipped
        );

        let summary = client.finish_run().await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.passed, 1);
        assert!(client.run_id().is_none());
        assert_eq!(client.call_counts().total(), 0);
    }

    #[tokio::test]
    async fn screenshots_attach_to_the_named_record() {
        let mut cfg = config();
        cfg.enabled = false;
        let mut client = TrackingClient::new(&cfg).unwrap();

        client
            .record_test("a", TestStatus::Failed, Duration::from_millis(5), Some("boom"))
            .await;
        client.attach_screenshot("a", PathBuf::from("reports/screenshots/a_20240301_120000.png"));
        client.attach_screenshot("missing", PathBuf::from("nowhere.png"));

        assert_eq!(
            client.records()[0].screenshot.as_deref(),
            Some(std::path::Path::new("reports/screenshots/a_20240301_120000.png"))
        );
    }
}
