//! Failure screenshots

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info};

use crate::browser::BrowserSession;

/// Capture a screenshot for a failed test into `dir`.
///
/// A missing session is a no-op, and every capture failure is swallowed: a
/// broken screenshot pipeline must never change a test outcome.
pub async fn capture_failure(
    session: Option<&mut BrowserSession>,
    test_name: &str,
    dir: &Path,
) -> Option<PathBuf> {
    let session = session?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{test_name}_{stamp}.png"));

    match session.screenshot(&path).await {
        Ok(()) => {
            info!("saved failure screenshot: {}", path.display());
            Some(path)
        }
        Err(e) => {
            debug!("screenshot capture failed for {test_name}: {e}");
            None
        }
    }
}
