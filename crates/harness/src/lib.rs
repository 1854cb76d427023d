//! webdrill harness
//!
//! Framework layer for the webdrill browser suite:
//!
//! - Drives Playwright through a persistent `node` subprocess speaking
//!   line-delimited JSON over stdin/stdout
//! - Owns the session lifecycle: run creation, per-test records, failure
//!   screenshots, final statistics
//! - Reports to the tracking backend when running under CI and degrades to
//!   local logging everywhere else
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Session                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │ start()    -> TrackingClient::start_run()                   │
//! │ run_test() -> BrowserSession::launch() -> goto(base_url)    │
//! │               test body, screenshot on failure              │
//! │               -> TrackingClient::record_test()              │
//! │ finish()   -> TrackingClient::finish_run() -> results.json  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod logging;
pub mod record;
pub mod screenshot;
pub mod session;
pub mod tracking;

pub use browser::{playwright_available, Browser, BrowserConfig, BrowserSession};
pub use config::SuiteConfig;
pub use error::{HarnessError, HarnessResult};
pub use record::{RunStatus, RunSummary, TestRecord, TestStatus};
pub use session::{RegisteredTest, Session, TestFn};
pub use tracking::{CallCounts, CallOutcome, TrackingClient, TrackingConfig};
