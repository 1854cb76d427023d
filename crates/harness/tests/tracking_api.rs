//! Tracking client integration tests
//!
//! Stands up a local mock of the tracking backend and verifies the full
//! lifecycle wire contract: endpoints, payload shapes, counters, and the
//! degrade-to-local behavior when the backend misbehaves or is unreachable.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{patch, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;

use webdrill_harness::record::{RunStatus, TestStatus};
use webdrill_harness::tracking::{CallOutcome, TrackingClient, TrackingConfig};

/// Everything the mock backend saw.
#[derive(Default)]
struct Seen {
    run_creates: Vec<Value>,
    test_cases: Vec<Value>,
    run_updates: Vec<(String, Value)>,
}

#[derive(Clone)]
struct MockState {
    seen: Arc<Mutex<Seen>>,
    /// run_id handed out on create; None simulates a response without one.
    run_id: Option<String>,
}

async fn create_run(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen.lock().run_creates.push(body);
    let response = match &state.run_id {
        Some(id) => serde_json::json!({ "pipeline_run": { "run_id": id } }),
        None => serde_json::json!({ "pipeline_run": {} }),
    };
    (StatusCode::CREATED, Json(response))
}

async fn create_test_case(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen.lock().test_cases.push(body);
    (StatusCode::CREATED, Json(serde_json::json!({ "detail": "created" })))
}

async fn update_run(
    State(state): State<MockState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.seen.lock().run_updates.push((id, body));
    StatusCode::OK
}

async fn spawn_mock(run_id: Option<&str>) -> (String, Arc<Mutex<Seen>>) {
    let state = MockState {
        seen: Arc::new(Mutex::new(Seen::default())),
        run_id: run_id.map(String::from),
    };
    let seen = state.seen.clone();

    let app = Router::new()
        .route("/api/pipeline-runs/", post(create_run))
        .route("/api/test-cases/", post(create_test_case))
        .route("/api/pipeline-runs/:id/", patch(update_run))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), seen)
}

fn ci_config(base_url: &str) -> TrackingConfig {
    TrackingConfig {
        enabled: true,
        api_base_url: base_url.to_string(),
        api_token: "test-token".to_string(),
        repo_name: "webdrill".to_string(),
        environment: "qa".to_string(),
        job_name: "webdrill-e2e".to_string(),
        build_number: "42".to_string(),
        build_url: "http://ci.example.com/job/webdrill/42/".to_string(),
        git_branch: "main".to_string(),
        git_commit: "0c1ee2f".to_string(),
        org_id: "org-1".to_string(),
        created_by: "user-1".to_string(),
    }
}

#[tokio::test]
async fn reports_a_full_session_to_the_backend() {
    let run_id = uuid::Uuid::new_v4().to_string();
    let (base_url, seen) = spawn_mock(Some(&run_id)).await;
    let mut client = TrackingClient::new(&ci_config(&base_url)).unwrap();

    assert_eq!(client.start_run().await, CallOutcome::Sent);
    assert_eq!(client.run_id(), Some(run_id.as_str()));

    assert_eq!(
        client
            .record_test(
                "login_valid_credentials",
                TestStatus::Passed,
                Duration::from_secs_f64(1.2349),
                None,
            )
            .await,
        CallOutcome::Sent
    );
    assert_eq!(
        client
            .record_test(
                "login_invalid_password",
                TestStatus::Failed,
                Duration::from_millis(800),
                Some("flash text mismatch"),
            )
            .await,
        CallOutcome::Sent
    );
    assert_eq!(
        client
            .record_test(
                "login_password_reset",
                TestStatus::Skipped,
                Duration::ZERO,
                Some("fixture not provisioned"),
            )
            .await,
        CallOutcome::Sent
    );

    let summary = client.finish_run().await;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(client.call_counts().total(), 5);

    let seen = seen.lock();
    assert_eq!(seen.run_creates.len(), 1);
    assert_eq!(seen.test_cases.len(), 3);
    assert_eq!(seen.run_updates.len(), 1);

    let create = &seen.run_creates[0];
    assert_eq!(create["name"], "webdrill-e2e - Build #42");
    assert_eq!(create["repo_name"], "webdrill");
    assert_eq!(create["environment"], "qa");
    assert_eq!(create["status"], "running");
    assert_eq!(create["build_number"], 42);
    assert_eq!(create["git_branch"], "main");
    assert!(create["started_at"].as_str().unwrap().ends_with('Z'));

    let passed = &seen.test_cases[0];
    assert_eq!(passed["run"], run_id.as_str());
    assert_eq!(passed["name"], "login_valid_credentials");
    assert_eq!(passed["status"], "passed");
    assert_eq!(passed["duration"], 1234);
    assert!(passed.get("error_message").is_none());
    assert_eq!(passed["started_at"], passed["completed_at"]);

    let failed = &seen.test_cases[1];
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["error_message"], "flash text mismatch");

    let skipped = &seen.test_cases[2];
    assert_eq!(skipped["status"], "skipped");
    assert_eq!(skipped["duration"], 0);

    let (patched_id, update) = &seen.run_updates[0];
    assert_eq!(patched_id, &run_id);
    assert_eq!(update["status"], "failed");
    assert_eq!(update["total_tests"], 3);
    assert_eq!(update["passed_tests"], 1);
    assert_eq!(update["failed_tests"], 1);
    assert!(update.get("skipped_tests").is_none());
    assert!(update["completed_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn disabled_config_never_calls_the_backend() {
    let (base_url, seen) = spawn_mock(Some("run-1")).await;
    let mut config = ci_config(&base_url);
    config.enabled = false;
    let mut client = TrackingClient::new(&config).unwrap();

    assert_eq!(client.start_run().await, CallOutcome::Skipped);
    assert_eq!(
        client
            .record_test("t", TestStatus::Passed, Duration::from_millis(10), None)
            .await,
        CallOutcome::Skipped
    );
    let summary = client.finish_run().await;
    assert_eq!(summary.total, 1);

    assert!(client.run_id().is_none());
    assert_eq!(client.call_counts().total(), 0);

    let seen = seen.lock();
    assert!(seen.run_creates.is_empty());
    assert!(seen.test_cases.is_empty());
    assert!(seen.run_updates.is_empty());
}

#[tokio::test]
async fn missing_run_id_downgrades_to_local_only() {
    let (base_url, seen) = spawn_mock(None).await;
    let mut client = TrackingClient::new(&ci_config(&base_url)).unwrap();

    assert_eq!(client.start_run().await, CallOutcome::Failed);
    assert!(client.run_id().is_none());

    assert_eq!(
        client
            .record_test("t", TestStatus::Passed, Duration::from_millis(10), None)
            .await,
        CallOutcome::Skipped
    );
    let summary = client.finish_run().await;
    assert_eq!(summary.total, 1);
    assert_eq!(client.call_counts().total(), 0);

    let seen = seen.lock();
    // The create was attempted; nothing else should have been.
    assert_eq!(seen.run_creates.len(), 1);
    assert!(seen.test_cases.is_empty());
    assert!(seen.run_updates.is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_logged_not_raised() {
    // Bind then drop to get a port with no listener behind it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut client = TrackingClient::new(&ci_config(&format!("http://{addr}"))).unwrap();

    assert_eq!(client.start_run().await, CallOutcome::Failed);
    assert_eq!(
        client
            .record_test("a", TestStatus::Passed, Duration::from_millis(5), None)
            .await,
        CallOutcome::Skipped
    );
    assert_eq!(
        client
            .record_test("b", TestStatus::Failed, Duration::from_millis(5), Some("boom"))
            .await,
        CallOutcome::Skipped
    );

    let summary = client.finish_run().await;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.status, RunStatus::Failed);
    assert_eq!(client.call_counts().total(), 0);
}
