//! Post-login secure area

use async_trait::async_trait;

use webdrill_harness::browser::BrowserSession;
use webdrill_harness::error::HarnessResult;

use crate::base::PageObject;

/// The secure area reached after a successful login.
pub struct SecurePage<'a> {
    session: &'a mut BrowserSession,
}

impl<'a> SecurePage<'a> {
    pub const FLASH: &'static str = "#flash";
    pub const LOGOUT_BUTTON: &'static str = "a.button.secondary.radius";

    pub fn new(session: &'a mut BrowserSession) -> Self {
        Self { session }
    }

    /// Whether the secure area rendered its flash banner.
    pub async fn is_loaded(&mut self) -> HarnessResult<bool> {
        self.is_visible(Self::FLASH).await
    }

    /// Trimmed text of the welcome flash banner.
    pub async fn success_message(&mut self) -> HarnessResult<String> {
        Ok(self.text_of(Self::FLASH).await?.trim().to_string())
    }

    pub async fn logout(&mut self) -> HarnessResult<()> {
        self.click(Self::LOGOUT_BUTTON).await
    }
}

#[async_trait]
impl PageObject for SecurePage<'_> {
    fn session(&mut self) -> &mut BrowserSession {
        self.session
    }

    fn name(&self) -> &'static str {
        "secure"
    }
}
