//! Page objects for the application under test
//!
//! Thin stateless wrappers that pair a borrowed browser session with the
//! selectors of one page. All interaction goes through [`PageObject`], so
//! every click and keystroke shows up in the logs with the page it came
//! from.

pub mod base;
pub mod login;
pub mod secure;

pub use base::PageObject;
pub use login::LoginPage;
pub use secure::SecurePage;
