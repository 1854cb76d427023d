//! Playwright driver session
//!
//! Spawns a persistent `node` process running a generated bootstrap script
//! and speaks a line-delimited JSON command protocol with it over
//! stdin/stdout. One [`BrowserSession`] maps to one browser page; the page
//! lives until the session is closed, so state carries across commands
//! within a test.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Browser engine the driver should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(HarnessError::InvalidConfig(format!("unknown browser: {other}"))),
        }
    }
}

/// Configuration for one driver session.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,
    /// WebSocket endpoint of a remote browser server. When set the driver
    /// connects to it instead of launching locally.
    pub remote_url: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Default navigation and action timeout inside the page, in ms.
    pub page_load_timeout_ms: u64,
    /// Extra launch arguments.
    pub args: Vec<String>,
    /// Unpacked extensions to load. Chromium only.
    pub extensions: Vec<PathBuf>,
    /// Extra browser-context options merged into the bootstrap verbatim.
    pub capabilities: Option<serde_json::Value>,
    /// How long to wait for a single command reply.
    pub command_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            remote_url: None,
            viewport_width: 1280,
            viewport_height: 720,
            page_load_timeout_ms: 30_000,
            args: Vec::new(),
            extensions: Vec::new(),
            capabilities: None,
            command_timeout: Duration::from_secs(60),
        }
    }
}

/// Check whether the Playwright CLI is reachable.
pub fn playwright_available() -> bool {
    std::process::Command::new("npx")
        .args(["playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// One command sent to the bootstrap loop.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Goto { url: &'a str },
    Click { selector: &'a str },
    Fill { selector: &'a str, value: &'a str },
    Text { selector: &'a str },
    Visible { selector: &'a str },
    Screenshot { path: &'a str },
    Close,
}

/// One reply line from the bootstrap loop.
#[derive(Debug, Deserialize)]
struct DriverReply {
    ok: bool,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// A live browser page controlled through the driver process.
pub struct BrowserSession {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
    command_timeout: Duration,
    closed: bool,
    /// Keeps the bootstrap script on disk for the life of the process.
    _workdir: tempfile::TempDir,
}

impl BrowserSession {
    /// Spawn the driver process and wait for its ready reply.
    pub async fn launch(config: &BrowserConfig) -> HarnessResult<Self> {
        if !playwright_available() {
            return Err(HarnessError::DriverNotFound);
        }

        let workdir = tempfile::tempdir()?;
        let script_path = workdir.path().join("session.js");
        std::fs::write(&script_path, build_bootstrap(config))?;

        debug!("spawning driver: node {}", script_path.display());

        let mut child = Command::new("node")
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarnessError::DriverStartup(format!("failed to spawn node: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HarnessError::DriverStartup("driver stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::DriverStartup("driver stdout unavailable".into()))?;

        let mut session = Self {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
            command_timeout: config.command_timeout,
            closed: false,
            _workdir: workdir,
        };

        // The first reply arrives once the page exists.
        let ready = session.read_reply().await?;
        if !ready.ok {
            let reason = ready.error.unwrap_or_else(|| "unknown driver error".into());
            return Err(HarnessError::DriverStartup(reason));
        }

        info!("driver session ready ({})", config.browser.as_str());
        Ok(session)
    }

    /// Navigate the page.
    pub async fn goto(&mut self, url: &str) -> HarnessResult<()> {
        self.command(&DriverCommand::Goto { url }).await?;
        Ok(())
    }

    pub async fn click(&mut self, selector: &str) -> HarnessResult<()> {
        self.command(&DriverCommand::Click { selector }).await?;
        Ok(())
    }

    /// Clear the matched input and type `value` into it.
    pub async fn fill(&mut self, selector: &str, value: &str) -> HarnessResult<()> {
        self.command(&DriverCommand::Fill { selector, value }).await?;
        Ok(())
    }

    /// Text content of the first match; empty when the node has none.
    pub async fn text(&mut self, selector: &str) -> HarnessResult<String> {
        let value = self.command(&DriverCommand::Text { selector }).await?;
        Ok(value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    pub async fn is_visible(&mut self, selector: &str) -> HarnessResult<bool> {
        let value = self.command(&DriverCommand::Visible { selector }).await?;
        Ok(value.as_ref().and_then(|v| v.as_bool()).unwrap_or(false))
    }

    /// Write a PNG screenshot of the current page to `path`.
    pub async fn screenshot(&mut self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = path.to_string_lossy();
        self.command(&DriverCommand::Screenshot { path: &path }).await?;
        Ok(())
    }

    /// Ask the driver to shut down, then reap the process.
    pub async fn close(mut self) -> HarnessResult<()> {
        self.closed = true;
        // Best effort; the process may already be gone.
        let _ = self.send(&DriverCommand::Close).await;
        match timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(Ok(status)) => debug!("driver exited: {status}"),
            _ => {
                warn!("driver did not exit after close, killing");
                let _ = self.child.kill().await;
            }
        }
        Ok(())
    }

    async fn command(
        &mut self,
        cmd: &DriverCommand<'_>,
    ) -> HarnessResult<Option<serde_json::Value>> {
        self.send(cmd).await?;
        let reply = self.read_reply().await?;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(HarnessError::Driver(
                reply.error.unwrap_or_else(|| "unknown driver error".into()),
            ))
        }
    }

    async fn send(&mut self, cmd: &DriverCommand<'_>) -> HarnessResult<()> {
        let mut line = serde_json::to_string(cmd)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> HarnessResult<DriverReply> {
        match timeout(self.command_timeout, self.replies.next_line()).await {
            Ok(line) => parse_reply(line?),
            Err(_) => Err(HarnessError::ReplyTimeout(self.command_timeout)),
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.start_kill();
        }
    }
}

fn parse_reply(line: Option<String>) -> HarnessResult<DriverReply> {
    let line =
        line.ok_or_else(|| HarnessError::Protocol("driver closed its output stream".into()))?;
    serde_json::from_str(&line)
        .map_err(|e| HarnessError::Protocol(format!("bad reply line: {e}: {line}")))
}

/// Render the bootstrap script for this configuration.
fn build_bootstrap(config: &BrowserConfig) -> String {
    let mut args = config.args.clone();
    if config.browser == Browser::Chromium && !config.extensions.is_empty() {
        let paths = config
            .extensions
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(",");
        args.push(format!("--disable-extensions-except={paths}"));
        args.push(format!("--load-extension={paths}"));
    }

    let acquire = match &config.remote_url {
        Some(endpoint) => format!("await browserType.connect({})", js_str(endpoint)),
        None => format!(
            "await browserType.launch({{ headless: {}, args: {} }})",
            config.headless,
            serde_json::to_string(&args).unwrap_or_else(|_| "[]".into()),
        ),
    };

    let capabilities = config
        .capabilities
        .as_ref()
        .map(|caps| format!(", ...{caps}"))
        .unwrap_or_default();

    format!(
        r#"const playwright = require('playwright');
const readline = require('readline');

(async () => {{
  const browserType = playwright.{browser};
  const browser = {acquire};
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}{capabilities}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout_ms});
  page.setDefaultNavigationTimeout({timeout_ms});

  const reply = (obj) => process.stdout.write(JSON.stringify(obj) + '\n');
  reply({{ ok: true }});

  const rl = readline.createInterface({{ input: process.stdin }});
  for await (const line of rl) {{
    let msg;
    try {{
      msg = JSON.parse(line);
    }} catch (error) {{
      reply({{ ok: false, error: 'bad command: ' + error.message }});
      continue;
    }}
    try {{
      switch (msg.cmd) {{
        case 'goto':
          await page.goto(msg.url);
          reply({{ ok: true }});
          break;
        case 'click':
          await page.click(msg.selector);
          reply({{ ok: true }});
          break;
        case 'fill':
          await page.fill(msg.selector, msg.value);
          reply({{ ok: true }});
          break;
        case 'text':
          reply({{ ok: true, value: (await page.textContent(msg.selector)) || '' }});
          break;
        case 'visible':
          reply({{ ok: true, value: await page.isVisible(msg.selector) }});
          break;
        case 'screenshot':
          await page.screenshot({{ path: msg.path }});
          reply({{ ok: true, value: msg.path }});
          break;
        case 'close':
          reply({{ ok: true }});
          await browser.close();
          process.exit(0);
        default:
          reply({{ ok: false, error: 'unknown command: ' + msg.cmd }});
      }}
    }} catch (error) {{
      reply({{ ok: false, error: error.message }});
    }}
  }}
  await browser.close();
}})().catch((error) => {{
  process.stdout.write(JSON.stringify({{ ok: false, error: error.message }}) + '\n');
  process.exit(1);
}});
"#,
        browser = config.browser.as_str(),
        acquire = acquire,
        width = config.viewport_width,
        height = config.viewport_height,
        capabilities = capabilities,
        timeout_ms = config.page_load_timeout_ms,
    )
}

/// JSON-encode a string so it embeds safely as a JS literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}
