use std::fs;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::{resolve_chrome_executable, SessionConfig};
use crate::error::{SurfaceError, SurfaceErrorKind};
use crate::surface::{ChatSurface, ElementProbe};

/// One exclusive Chromium-backed chat session: the browser process, its
/// event drive task, and the navigated page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    drive_task: JoinHandle<()>,
    closed: bool,
}

impl ChromiumSession {
    /// Launches a browser, navigates to the configured URL and waits the
    /// settle period before the page counts as interactive.
    pub async fn open(cfg: &SessionConfig) -> Result<Self, SurfaceError> {
        let browser_config = build_browser_config(cfg)?;
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::LaunchFailed)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        // The handler stream must keep draining or every CDP command stalls.
        let drive_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let navigate = async {
            let page = browser.new_page(cfg.url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<Page, CdpError>(page)
        };

        let page = match timeout(cfg.navigation_timeout(), navigate).await {
            Ok(Ok(page)) => page,
            Ok(Err(err)) => {
                drive_task.abort();
                // Dropping the browser tears down the spawned child.
                drop(browser);
                return Err(SurfaceError::new(SurfaceErrorKind::NavTimeout)
                    .with_hint(format!("navigation to {} failed: {err}", cfg.url)));
            }
            Err(_) => {
                drive_task.abort();
                drop(browser);
                return Err(SurfaceError::new(SurfaceErrorKind::NavTimeout).with_hint(
                    format!("no interactive page within {}ms", cfg.navigation_timeout_ms),
                ));
            }
        };

        sleep(cfg.page_settle()).await;
        info!(url = %cfg.url, headless = cfg.headless, "chat session ready");

        Ok(Self {
            browser,
            page,
            drive_task,
            closed: false,
        })
    }

    async fn eval(&self, script: String) -> Result<Value, SurfaceError> {
        let outcome = self.page.evaluate(script).await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::CdpIo).with_hint(format!("evaluate failed: {err}"))
        })?;
        Ok(outcome.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChatSurface for ChromiumSession {
    async fn probe(&self, selector: &str) -> Result<ElementProbe, SurfaceError> {
        let value = self.eval(probe_script(selector)).await?;
        serde_json::from_value(value).map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::ScriptFailed)
                .with_hint(format!("probe result malformed: {err}"))
        })
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        let value = self.eval(fill_script(selector, text)).await?;
        match value.get("status").and_then(Value::as_str) {
            Some("filled") => Ok(()),
            Some("not-found") => Err(SurfaceError::new(SurfaceErrorKind::TargetNotFound)
                .with_hint(selector.to_string())),
            other => Err(SurfaceError::new(SurfaceErrorKind::ScriptFailed)
                .with_hint(format!("unexpected fill status: {other:?}"))),
        }
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let element = self.page.find_element(selector).await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::TargetNotFound)
                .with_hint(format!("{selector}: {err}"))
        })?;
        let _ = element.scroll_into_view().await;
        element.click().await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::CdpIo).with_hint(format!("click failed: {err}"))
        })?;
        Ok(())
    }

    async fn confirm(&self, selector: &str) -> Result<(), SurfaceError> {
        let element = self.page.find_element(selector).await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::TargetNotFound)
                .with_hint(format!("{selector}: {err}"))
        })?;
        element.press_key("Enter").await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::CdpIo)
                .with_hint(format!("enter keystroke failed: {err}"))
        })?;
        Ok(())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>, SurfaceError> {
        let value = self.eval(read_text_script(selector)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn close(&mut self) -> Result<(), SurfaceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing chat session");
        let outcome = self.browser.close().await.map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::CdpIo)
                .with_hint(format!("browser close failed: {err}"))
        });
        self.drive_task.abort();
        outcome.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.drive_task.abort();
        if !self.closed {
            // The Browser's own drop still kills the spawned child; only
            // the graceful CDP goodbye is skipped on this path.
            warn!("chat session dropped without explicit close");
        }
    }
}

fn build_browser_config(cfg: &SessionConfig) -> Result<BrowserConfig, SurfaceError> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.navigation_timeout_ms))
        .launch_timeout(Duration::from_secs(20));

    if !cfg.headless {
        builder = builder.with_head();
    }

    if std::env::var("FURROW_DISABLE_SANDBOX")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        builder = builder.no_sandbox();
    }

    let mut args = vec![
        "--disable-background-networking",
        "--disable-component-update",
        "--disable-default-apps",
        "--disable-dev-shm-usage",
        "--disable-hang-monitor",
        "--disable-popup-blocking",
        "--disable-prompt-on-repost",
        "--disable-sync",
        "--metrics-recording-only",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
    ];
    if cfg.headless {
        args.push("--headless=new");
        args.push("--hide-scrollbars");
        args.push("--mute-audio");
    }
    builder = builder.args(args);

    if let Some(executable) = resolve_chrome_executable(cfg) {
        builder = builder.chrome_executable(executable);
    }

    if let Some(dir) = &cfg.user_data_dir {
        fs::create_dir_all(dir).map_err(|err| {
            SurfaceError::new(SurfaceErrorKind::LaunchFailed)
                .with_hint(format!("failed to ensure user-data-dir: {err}"))
        })?;
        builder = builder.user_data_dir(dir);
    }

    builder.build().map_err(|err| {
        SurfaceError::new(SurfaceErrorKind::LaunchFailed)
            .with_hint(format!("browser config error: {err}"))
    })
}

fn js_quote(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

fn probe_script(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) {{ return {{ found: false, enabled: false }}; }}
    const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true';
    return {{ found: true, enabled: enabled }};
}})()"#,
        sel = js_quote(selector)
    )
}

fn fill_script(selector: &str, text: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    if (!el) {{ return {{ status: 'not-found' }}; }}
    el.focus();
    if (el.isContentEditable) {{
        document.execCommand('selectAll', false, null);
        document.execCommand('insertText', false, {text});
    }} else {{
        el.value = {text};
        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    }}
    return {{ status: 'filled' }};
}})()"#,
        sel = js_quote(selector),
        text = js_quote(text)
    )
}

fn read_text_script(selector: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({sel});
    return el ? el.innerText : null;
}})()"#,
        sel = js_quote(selector)
    )
}
