//! Shared page-object behavior

use async_trait::async_trait;
use tracing::{debug, info};

use webdrill_harness::browser::BrowserSession;
use webdrill_harness::error::HarnessResult;

/// A page object pairs a borrowed browser session with named selectors.
///
/// Every interaction delegates straight to the driver and logs what it did;
/// driver errors propagate unchanged so the caller decides what a failed
/// click means for the test.
#[async_trait]
pub trait PageObject: Send {
    fn session(&mut self) -> &mut BrowserSession;

    /// Short page name used in log lines.
    fn name(&self) -> &'static str;

    async fn open(&mut self, url: &str) -> HarnessResult<()> {
        self.session().goto(url).await?;
        info!("{}: opened {url}", self.name());
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> HarnessResult<()> {
        self.session().click(selector).await?;
        info!("{}: clicked {selector}", self.name());
        Ok(())
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> HarnessResult<()> {
        self.session().fill(selector, text).await?;
        info!("{}: typed into {selector}", self.name());
        debug!("{}: {selector} <- {text}", self.name());
        Ok(())
    }

    async fn is_visible(&mut self, selector: &str) -> HarnessResult<bool> {
        let visible = self.session().is_visible(selector).await?;
        debug!("{}: {selector} visible={visible}", self.name());
        Ok(visible)
    }

    async fn text_of(&mut self, selector: &str) -> HarnessResult<String> {
        self.session().text(selector).await
    }
}
