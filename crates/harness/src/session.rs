//! Session lifecycle
//!
//! One [`Session`] covers one suite invocation: session start, N sequential
//! tests, session end. It owns the tracking client and hands each test a
//! fresh browser session already sitting on the configured base URL. Hook
//! call sites receive the client through this struct rather than through a
//! process global.

use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::browser::BrowserSession;
use crate::config::SuiteConfig;
use crate::error::HarnessResult;
use crate::logging;
use crate::record::{RunSummary, TestRecord, TestStatus};
use crate::screenshot;
use crate::tracking::{TrackingClient, TrackingConfig};

/// Entry point of a registered test. The body returns an error to fail the
/// test; panics are not part of the contract.
pub type TestFn = for<'a> fn(&'a mut BrowserSession) -> BoxFuture<'a, anyhow::Result<()>>;

/// A test known to the session runner.
pub struct RegisteredTest {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    /// Reason the test is skipped, when it is.
    pub skip: Option<&'static str>,
    pub run: TestFn,
}

impl RegisteredTest {
    pub fn matches_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }
}

/// JSON results report written at session end.
#[derive(Serialize)]
struct SuiteReport<'a> {
    summary: &'a RunSummary,
    tests: &'a [TestRecord],
}

/// One suite execution.
pub struct Session {
    config: SuiteConfig,
    tracking: TrackingClient,
}

impl Session {
    /// Initialize logging (idempotent) and construct the tracking client.
    pub fn new(config: SuiteConfig, tracking_config: &TrackingConfig) -> HarnessResult<Self> {
        logging::init(&config.log_level, &config.logs_dir)?;
        let tracking = TrackingClient::new(tracking_config)?;
        Ok(Self { config, tracking })
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Session-start hook: banner plus remote run creation.
    pub async fn start(&mut self) {
        info!(
            "starting session: environment={} browser={} base_url={}",
            self.config.environment,
            self.config.browser.browser.as_str(),
            self.config.base_url
        );
        self.tracking.start_run().await;
    }

    /// Run one registered test through the full per-test lifecycle and
    /// record its outcome.
    pub async fn run_test(&mut self, test: &RegisteredTest) -> TestStatus {
        if let Some(reason) = test.skip {
            debug!("skipping {}: {reason}", test.name);
            self.tracking
                .record_test(test.name, TestStatus::Skipped, Duration::ZERO, Some(reason))
                .await;
            return TestStatus::Skipped;
        }

        let mut browser = match BrowserSession::launch(&self.config.browser).await {
            Ok(browser) => browser,
            Err(e) => {
                let message = format!("browser session failed to start: {e}");
                error!("{message}");
                self.tracking
                    .record_test(test.name, TestStatus::Failed, Duration::ZERO, Some(&message))
                    .await;
                return TestStatus::Failed;
            }
        };

        if let Err(e) = browser.goto(&self.config.base_url).await {
            let message = format!("could not open {}: {e}", self.config.base_url);
            error!("{message}");
            self.tracking
                .record_test(test.name, TestStatus::Failed, Duration::ZERO, Some(&message))
                .await;
            let _ = browser.close().await;
            return TestStatus::Failed;
        }

        debug!("running {}", test.name);
        let started = Instant::now();
        let outcome = (test.run)(&mut browser).await;
        let duration = started.elapsed();

        let (status, message) = match outcome {
            Ok(()) => (TestStatus::Passed, None),
            Err(e) => (TestStatus::Failed, Some(format!("{e:#}"))),
        };

        let shot = if status == TestStatus::Failed && self.config.screenshots_on {
            screenshot::capture_failure(Some(&mut browser), test.name, &self.config.screenshot_dir())
                .await
        } else {
            None
        };

        self.tracking
            .record_test(test.name, status, duration, message.as_deref())
            .await;

        if let Some(path) = shot {
            self.tracking.attach_screenshot(test.name, path);
        }

        if let Err(e) = browser.close().await {
            debug!("driver close failed: {e}");
        }

        status
    }

    /// Session-end hook: final tracking update plus the JSON report.
    pub async fn finish(mut self) -> RunSummary {
        let summary = self.tracking.finish_run().await;

        if let Err(e) = self.write_report(&summary) {
            warn!("could not write results report: {e}");
        }

        info!(
            "session finished: {} passed, {} failed, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.skipped, summary.duration_ms
        );

        summary
    }

    fn write_report(&self, summary: &RunSummary) -> HarnessResult<()> {
        std::fs::create_dir_all(&self.config.reports_dir)?;
        let path = self.config.results_file();
        let report = SuiteReport { summary, tests: self.tracking.records() };
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        info!("results written to {}", path.display());
        Ok(())
    }
}
