//! The webdrill login suite
//!
//! Registered end-to-end tests plus the runner that drives a [`Session`]
//! over them. Test bodies return `anyhow::Result`, so an assertion failure
//! becomes a recorded error message rather than a panic.

use anyhow::{bail, ensure};
use futures::future::BoxFuture;
use tracing::{info, warn};

use webdrill_harness::browser::{playwright_available, BrowserSession};
use webdrill_harness::record::RunSummary;
use webdrill_harness::session::{RegisteredTest, Session};
use webdrill_harness::tracking::TrackingConfig;
use webdrill_harness::{HarnessResult, SuiteConfig};
use webdrill_pages::{LoginPage, SecurePage};

const VALID_USERNAME: &str = "tomsmith";
const VALID_PASSWORD: &str = "SuperSecretPassword!";

/// Every test the suite knows, in execution order.
pub fn registered_tests() -> Vec<RegisteredTest> {
    vec![
        RegisteredTest {
            name: "login_valid_credentials",
            tags: &["smoke"],
            skip: None,
            run: login_valid_credentials,
        },
        RegisteredTest {
            name: "login_invalid_password",
            tags: &["regression"],
            skip: None,
            run: login_invalid_password,
        },
        RegisteredTest {
            name: "login_invalid_username",
            tags: &["regression"],
            skip: None,
            run: login_invalid_username,
        },
        RegisteredTest {
            name: "login_password_reset",
            tags: &["regression"],
            skip: Some("reset mailbox fixture not provisioned yet"),
            run: login_password_reset,
        },
        RegisteredTest {
            name: "failure_screenshot_demo",
            tags: &["demo"],
            skip: None,
            run: failure_screenshot_demo,
        },
    ]
}

/// Valid credentials land on the secure area and can log out again.
fn login_valid_credentials(browser: &mut BrowserSession) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        let mut login = LoginPage::new(browser);
        login.login(VALID_USERNAME, VALID_PASSWORD).await?;

        let mut secure = SecurePage::new(browser);
        ensure!(secure.is_loaded().await?, "secure page should load after a valid login");

        let message = secure.success_message().await?;
        ensure!(
            message.contains("You logged into a secure area!"),
            "unexpected success flash: {message}"
        );

        secure.logout().await?;
        Ok(())
    })
}

fn login_invalid_password(browser: &mut BrowserSession) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        let mut login = LoginPage::new(browser);
        login.login(VALID_USERNAME, "WrongPassword").await?;

        let error = login.error_message().await?;
        ensure!(
            error.contains("Your password is invalid!"),
            "flash should call out the invalid password, got: {error}"
        );
        Ok(())
    })
}

fn login_invalid_username(browser: &mut BrowserSession) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        let mut login = LoginPage::new(browser);
        login.login("wrongUser", VALID_PASSWORD).await?;

        let error = login.error_message().await?;
        ensure!(
            error.contains("Your username is invalid!"),
            "flash should call out the invalid username, got: {error}"
        );
        Ok(())
    })
}

/// Placeholder until the reset-mail fixture exists; skip-marked in the
/// registry.
fn login_password_reset(_browser: &mut BrowserSession) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move { Ok(()) })
}

/// Fails on purpose after a valid login so failure reporting and screenshot
/// capture stay exercised end to end.
fn failure_screenshot_demo(browser: &mut BrowserSession) -> BoxFuture<'_, anyhow::Result<()>> {
    Box::pin(async move {
        let mut login = LoginPage::new(browser);
        login.login(VALID_USERNAME, VALID_PASSWORD).await?;
        bail!("intentional failure to exercise screenshot capture");
    })
}

/// Test selection for one suite invocation. Name wins over tag.
#[derive(Debug, Default, Clone)]
pub struct Filter {
    pub tag: Option<String>,
    pub name: Option<String>,
}

impl Filter {
    fn keep(&self, test: &RegisteredTest) -> bool {
        if let Some(name) = &self.name {
            return test.name == name;
        }
        if let Some(tag) = &self.tag {
            return test.matches_tag(tag);
        }
        true
    }
}

/// Drive a full session over the registered tests.
///
/// When the Playwright driver is not installed the suite logs a notice and
/// reports an empty passing run, so runners without browsers are not failed
/// by it.
pub async fn run(
    config: SuiteConfig,
    tracking: &TrackingConfig,
    filter: &Filter,
) -> HarnessResult<RunSummary> {
    let mut session = Session::new(config, tracking)?;

    if !playwright_available() {
        warn!("playwright driver not found (npx playwright install); skipping browser suite");
        return Ok(RunSummary::tally(&[], std::time::Duration::ZERO));
    }

    let tests: Vec<RegisteredTest> =
        registered_tests().into_iter().filter(|t| filter.keep(t)).collect();

    session.start().await;
    info!("running {} test(s)", tests.len());

    for test in &tests {
        session.run_test(test).await;
    }

    Ok(session.finish().await)
}
