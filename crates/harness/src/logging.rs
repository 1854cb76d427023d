//! Process-wide logging
//!
//! Two layers share one subscriber: a console layer for interactive output
//! and a file layer that routes every event to a dated per-name log file
//! under the logs directory, keyed by the last segment of the event's
//! target. An event from `webdrill_harness::tracking` on 2024-03-01 lands in
//! `logs/tracking_20240301.log`.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::HarnessResult;

/// Initialize logging once for the whole process.
///
/// Safe to call from every entry point: the first call installs the
/// subscriber and later calls are no-ops. RUST_LOG overrides `level` when
/// set.
pub fn init(level: &str, dir: &Path) -> HarnessResult<()> {
    std::fs::create_dir_all(dir)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = tracing_subscriber::fmt::layer().with_target(false);
    let files = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(TargetFiles::new(dir));

    // try_init fails when a subscriber is already installed; that is the
    // repeat-call path, not an error.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(files)
        .try_init();

    Ok(())
}

/// Routes each event to `{dir}/{name}_{YYYYMMDD}.log` by event target.
struct TargetFiles {
    dir: PathBuf,
    date: String,
    files: Arc<Mutex<HashMap<String, Option<Arc<File>>>>>,
}

impl TargetFiles {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            date: Local::now().format("%Y%m%d").to_string(),
            files: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or open the dated file for a logger name. An open failure is
    /// cached and the name degrades to a null writer.
    fn writer_for(&self, name: &str) -> LogWriter {
        let key = sanitize(name);
        let mut files = self.files.lock();
        let entry = files.entry(key).or_insert_with_key(|key| {
            let path = self.dir.join(format!("{}_{}.log", key, self.date));
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
                .map(Arc::new)
        });
        LogWriter(entry.clone())
    }
}

impl<'a> MakeWriter<'a> for TargetFiles {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer_for("harness")
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.writer_for(short_target(meta.target()))
    }
}

/// Writer over a shared append-mode file; a failed open writes nowhere.
struct LogWriter(Option<Arc<File>>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &self.0 {
            Some(file) => (&**file).write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &self.0 {
            Some(file) => (&**file).flush(),
            None => Ok(()),
        }
    }
}

/// Last `::` segment of a target: `webdrill_pages::login` becomes `login`.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Keep log file names to a safe alphabet.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
