//! Login page

use async_trait::async_trait;

use webdrill_harness::browser::BrowserSession;
use webdrill_harness::error::HarnessResult;

use crate::base::PageObject;

/// The login form.
pub struct LoginPage<'a> {
    session: &'a mut BrowserSession,
}

impl<'a> LoginPage<'a> {
    pub const USERNAME: &'static str = "#username";
    pub const PASSWORD: &'static str = "#password";
    pub const LOGIN_BUTTON: &'static str = "button[type='submit']";
    pub const FLASH: &'static str = "#flash";

    pub fn new(session: &'a mut BrowserSession) -> Self {
        Self { session }
    }

    /// Fill both fields and submit the form.
    pub async fn login(&mut self, username: &str, password: &str) -> HarnessResult<()> {
        self.type_into(Self::USERNAME, username).await?;
        self.type_into(Self::PASSWORD, password).await?;
        self.click(Self::LOGIN_BUTTON).await
    }

    /// Trimmed text of the flash banner shown after a rejected login.
    pub async fn error_message(&mut self) -> HarnessResult<String> {
        Ok(self.text_of(Self::FLASH).await?.trim().to_string())
    }
}

#[async_trait]
impl PageObject for LoginPage<'_> {
    fn session(&mut self) -> &mut BrowserSession {
        self.session
    }

    fn name(&self) -> &'static str {
        "login"
    }
}
