//! [`BrowserSession`] backed by a headless Chromium driven through chromiumoxide.
//!
//! Element lookups run as small scripts against a "current document"
//! expression. Entering a frame replaces that expression with the frame's
//! `contentDocument`, which keeps lookups identical on both sides of a switch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::session::{BrowserSession, FrameStrategy, Locator, SessionFactory};
use crate::wait::{POLL_INTERVAL, poll_until};

const TOP_DOCUMENT: &str = "document";

/// Looks for a Chrome or Chromium binary on `PATH` and in the usual macOS spot.
pub fn find_chromium() -> Option<PathBuf> {
    for name in [
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one headless Chromium per session.
///
/// The binary is resolved once up front. If that fails, every `open` tries
/// again, so installing a browser does not need a restart.
pub struct ChromiumSessionFactory {
    executable: Option<PathBuf>,
}

impl ChromiumSessionFactory {
    pub fn new(configured: Option<PathBuf>) -> Self {
        let executable = match configured {
            Some(path) if path.exists() => Some(path),
            Some(path) => {
                warn!("configured browser {} does not exist, searching PATH", path.display());
                find_chromium()
            }
            None => find_chromium(),
        };
        match &executable {
            Some(path) => info!("using browser at {}", path.display()),
            None => warn!("no Chrome/Chromium binary found, will retry on each request"),
        }
        Self { executable }
    }

    fn resolve_executable(&self) -> Result<PathBuf> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        warn!("browser path not cached, searching again");
        find_chromium().context("no Chrome/Chromium binary found")
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let executable = self.resolve_executable()?;
        let session = ChromiumSession::launch(&executable).await?;
        Ok(Box::new(session))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    document: String,
    _profile: TempDir,
}

impl ChromiumSession {
    pub async fn launch(executable: &Path) -> Result<Self> {
        // Each browser gets its own profile so concurrent sessions never share a lock.
        let profile = tempfile::Builder::new()
            .prefix("attendance-bot-")
            .tempdir()
            .context("failed to create browser profile directory")?;

        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--blink-settings=imagesEnabled=false")
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(e).context("failed to open browser tab");
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            document: TOP_DOCUMENT.to_string(),
            _profile: profile,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate_expression(script)
            .await
            .context("script evaluation failed")?;
        result
            .into_value()
            .map_err(|e| anyhow!("unexpected script result: {e:?}"))
    }

    /// Polls a boolean script. Evaluation errors (typically a navigation in
    /// flight) count as "not yet".
    async fn poll_script(&self, script: &str, timeout: Duration) -> bool {
        let this = self;
        poll_until(timeout, POLL_INTERVAL, move || async move {
            match this.eval::<bool>(script).await {
                Ok(true) => Some(()),
                Ok(false) => None,
                Err(e) => {
                    debug!("probe failed, retrying: {e:#}");
                    None
                }
            }
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("failed to load {url}"))?;
        self.document = TOP_DOCUMENT.to_string();
        Ok(())
    }

    async fn wait_for_element(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let script = presence_script(&self.document, locator);
        if self.poll_script(&script, timeout).await {
            Ok(())
        } else {
            bail!("{locator} not present after {timeout:?}")
        }
    }

    async fn wait_and_click(&mut self, locator: &Locator, timeout: Duration) -> Result<()> {
        let script = click_script(&self.document, locator, true);
        if self.poll_script(&script, timeout).await {
            Ok(())
        } else {
            bail!("{locator} not clickable after {timeout:?}")
        }
    }

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()> {
        let filled: bool = self.eval(&fill_script(&self.document, locator, text)).await?;
        if !filled {
            bail!("element not found: {locator}");
        }
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let clicked: bool = self
            .eval(&click_script(&self.document, locator, false))
            .await?;
        if !clicked {
            bail!("element not found: {locator}");
        }
        Ok(())
    }

    async fn switch_to_frame(&mut self, frame: &FrameStrategy, timeout: Duration) -> Result<()> {
        let target = frame_document(&self.document, frame);
        if self.poll_script(&loaded_script(&target), timeout).await {
            self.document = target;
            Ok(())
        } else {
            bail!("{frame} not available after {timeout:?}")
        }
    }

    async fn page_source(&mut self) -> Result<String> {
        self.eval(&format!("{}.documentElement.outerHTML", self.document))
            .await
    }

    async fn quit(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.map(|_| ()).context("failed to close browser")
    }
}

fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn element_expr(document: &str, locator: &Locator) -> String {
    match locator {
        Locator::Name(name) => format!("{document}.getElementsByName({})[0]", js_string(name)),
        Locator::PartialLinkText(text) => format!(
            "Array.from({document}.querySelectorAll('a')).find(a => (a.innerText || a.textContent || '').includes({}))",
            js_string(text)
        ),
    }
}

fn presence_script(document: &str, locator: &Locator) -> String {
    format!(
        "(() => {{ try {{ return !!({}); }} catch (e) {{ return false; }} }})()",
        element_expr(document, locator)
    )
}

fn click_script(document: &str, locator: &Locator, require_visible: bool) -> String {
    let visibility = if require_visible {
        "const r = el.getBoundingClientRect(); if (el.disabled || (r.width === 0 && r.height === 0)) return false; "
    } else {
        ""
    };
    format!(
        "(() => {{ try {{ const el = {}; if (!el) return false; {visibility}el.click(); return true; }} catch (e) {{ return false; }} }})()",
        element_expr(document, locator)
    )
}

fn fill_script(document: &str, locator: &Locator, text: &str) -> String {
    format!(
        "(() => {{ const el = {}; if (!el) return false; el.focus(); el.value = {}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
        element_expr(document, locator),
        js_string(text)
    )
}

fn frame_document(document: &str, frame: &FrameStrategy) -> String {
    match frame {
        FrameStrategy::ById(id) => {
            format!("{document}.getElementById({}).contentDocument", js_string(id))
        }
        FrameStrategy::ByIndex(index) => format!("{document}.defaultView.frames[{index}].document"),
    }
}

fn loaded_script(document: &str) -> String {
    format!(
        "(() => {{ try {{ const d = {document}; return !!(d && d.readyState === 'complete' && d.documentElement); }} catch (e) {{ return false; }} }})()"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_locator_script() {
        let expr = element_expr("document", &Locator::name("txtId2"));
        assert_eq!(expr, "document.getElementsByName(\"txtId2\")[0]");
    }

    #[test]
    fn link_text_is_escaped() {
        let expr = element_expr("document", &Locator::partial_link_text("A \"B\""));
        assert!(expr.contains(r#".includes("A \"B\"")"#));
    }

    #[test]
    fn fill_escapes_secret() {
        let script = fill_script("document", &Locator::name("txtPwd2"), "p'a\"ss\n");
        assert!(script.contains(r#"el.value = "p'a\"ss\n";"#));
    }

    #[test]
    fn frames_nest_on_current_document() {
        let inner = frame_document("document", &FrameStrategy::ById("capIframeId".into()));
        assert_eq!(
            inner,
            "document.getElementById(\"capIframeId\").contentDocument"
        );
        let nested = frame_document(&inner, &FrameStrategy::ByIndex(0));
        assert!(nested.starts_with(&inner));
        assert!(nested.ends_with(".defaultView.frames[0].document"));
    }

    #[test]
    fn visible_click_checks_bounds() {
        let script = click_script("document", &Locator::name("imgBtn2"), true);
        assert!(script.contains("getBoundingClientRect"));
        let plain = click_script("document", &Locator::name("imgBtn2"), false);
        assert!(!plain.contains("getBoundingClientRect"));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome or Chromium to be installed
    async fn chromium_reads_register_from_frame() {
        let factory = ChromiumSessionFactory::new(None);
        let mut session = factory.open().await.expect("failed to launch browser");
        let html = "data:text/html,<iframe id='capIframeId' srcdoc=\"<table><tr><td>Sl.No</td></tr></table>\"></iframe>";
        session.goto(html).await.expect("navigation failed");
        session
            .switch_to_frame(
                &FrameStrategy::ById("capIframeId".into()),
                Duration::from_secs(5),
            )
            .await
            .expect("frame switch failed");
        let source = session.page_source().await.expect("no page source");
        assert!(source.contains("Sl.No"));
        session.quit().await.expect("quit failed");
    }
}
