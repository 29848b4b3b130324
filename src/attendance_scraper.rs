use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::{ExtractionError, SessionStage};
use crate::register_table::parse_register;
use crate::session::{BrowserSession, FrameStrategy, Locator, SessionFactory};
use crate::snapshot::AttendanceSnapshot;
use crate::text_manipulators::redact_identifier;

pub const DEFAULT_WAIT: Duration = Duration::from_secs(15);

/// Where things live on the portal.
#[derive(Debug, Clone)]
pub struct PortalLayout {
    pub url: String,
    pub identifier_field: Locator,
    pub secret_field: Locator,
    pub submit_button: Locator,
    pub register_link: Locator,
    /// Tried in order; if none works the register is read from the page itself.
    pub register_frames: Vec<FrameStrategy>,
}

impl PortalLayout {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            identifier_field: Locator::name("txtId2"),
            secret_field: Locator::name("txtPwd2"),
            submit_button: Locator::name("imgBtn2"),
            register_link: Locator::partial_link_text("ACADAMIC REGISTER"),
            register_frames: vec![
                FrameStrategy::ById("capIframeId".to_string()),
                FrameStrategy::ByIndex(0),
            ],
        }
    }
}

/// Logs into the portal and reads the academic register.
///
/// Holds no per-user state: each [`extract`](Self::extract) opens, uses and
/// tears down its own browser session.
pub struct AttendanceScraper {
    factory: Arc<dyn SessionFactory>,
    layout: PortalLayout,
    wait: Duration,
}

impl AttendanceScraper {
    pub fn new(factory: Arc<dyn SessionFactory>, layout: PortalLayout) -> Self {
        Self {
            factory,
            layout,
            wait: DEFAULT_WAIT,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub async fn extract(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AttendanceSnapshot, ExtractionError> {
        let who = redact_identifier(identifier);
        info!("fetching attendance for {who}");

        let mut session = self.factory.open().await.map_err(|e| {
            error!("failed to start browser: {e:#}");
            ExtractionError::DriverUnavailable(format!("{e:#}"))
        })?;

        let result = self.run(session.as_mut(), identifier, secret).await;

        if let Err(e) = session.quit().await {
            warn!("failed to shut browser down cleanly: {e:#}");
        }

        match &result {
            Ok(snapshot) => info!(
                "attendance fetched for {who}: {} subjects logged, aggregate {}",
                snapshot.daily_log.len(),
                if snapshot.total.is_some() { "present" } else { "missing" }
            ),
            Err(e) => error!("scraper error for {who}: {e}"),
        }
        result
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        identifier: &str,
        secret: &str,
    ) -> Result<AttendanceSnapshot, ExtractionError> {
        self.login(session, identifier, secret)
            .await
            .map_err(|e| ExtractionError::session(SessionStage::Login, e))?;

        session
            .wait_and_click(&self.layout.register_link, self.wait)
            .await
            .map_err(|e| ExtractionError::session(SessionStage::Navigate, e))?;

        self.enter_register_frame(session).await;

        let html = session
            .page_source()
            .await
            .map_err(|e| ExtractionError::session(SessionStage::Harvest, e))?;
        Ok(parse_register(&html))
    }

    async fn login(
        &self,
        session: &mut dyn BrowserSession,
        identifier: &str,
        secret: &str,
    ) -> anyhow::Result<()> {
        let layout = &self.layout;
        session.goto(&layout.url).await?;
        session
            .wait_for_element(&layout.identifier_field, self.wait)
            .await?;
        session.fill(&layout.identifier_field, identifier).await?;
        session.fill(&layout.secret_field, secret).await?;
        session.click(&layout.submit_button).await
    }

    /// Best effort: a frame that never shows up just leaves the current context in place.
    async fn enter_register_frame(&self, session: &mut dyn BrowserSession) -> Option<FrameStrategy> {
        for frame in &self.layout.register_frames {
            match session.switch_to_frame(frame, self.wait).await {
                Ok(()) => {
                    debug!("entered {frame}");
                    return Some(frame.clone());
                }
                Err(e) => debug!("could not enter {frame}: {e:#}"),
            }
        }
        debug!("no register frame found, reading the current document");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const REGISTER: &str = "<html><body><table>\
        <tr><td>Sl.No</td><td>Subject</td><td>16/10</td><td>Att/Held</td><td>%</td></tr>\
        <tr><td>1</td><td>MATH101</td><td>P</td><td>8/10</td><td>80</td></tr>\
        <tr><td></td><td>TOTAL</td><td></td><td>8/10</td><td>80</td></tr>\
        </table></body></html>";

    #[derive(Clone)]
    struct Script {
        open_fails: bool,
        login_form_present: bool,
        link_clickable: bool,
        frames: Vec<FrameStrategy>,
        source_fails: bool,
    }

    impl Default for Script {
        fn default() -> Self {
            Self {
                open_fails: false,
                login_form_present: true,
                link_clickable: true,
                frames: vec![FrameStrategy::ById("capIframeId".into())],
                source_fails: false,
            }
        }
    }

    struct FakeSession {
        script: Script,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSession {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn goto(&mut self, url: &str) -> Result<()> {
            self.record(format!("goto {url}"));
            Ok(())
        }

        async fn wait_for_element(&mut self, locator: &Locator, _timeout: Duration) -> Result<()> {
            self.record(format!("wait {locator}"));
            if !self.script.login_form_present {
                bail!("{locator} not present");
            }
            Ok(())
        }

        async fn wait_and_click(&mut self, locator: &Locator, _timeout: Duration) -> Result<()> {
            self.record(format!("wait_and_click {locator}"));
            if !self.script.link_clickable {
                bail!("{locator} not clickable");
            }
            Ok(())
        }

        async fn fill(&mut self, locator: &Locator, _text: &str) -> Result<()> {
            self.record(format!("fill {locator}"));
            Ok(())
        }

        async fn click(&mut self, locator: &Locator) -> Result<()> {
            self.record(format!("click {locator}"));
            Ok(())
        }

        async fn switch_to_frame(&mut self, frame: &FrameStrategy, _timeout: Duration) -> Result<()> {
            self.record(format!("switch {frame}"));
            if !self.script.frames.contains(frame) {
                bail!("{frame} missing");
            }
            Ok(())
        }

        async fn page_source(&mut self) -> Result<String> {
            self.record("page_source".into());
            if self.script.source_fails {
                bail!("target closed");
            }
            Ok(REGISTER.to_string())
        }

        async fn quit(self: Box<Self>) -> Result<()> {
            self.record("quit".into());
            Ok(())
        }
    }

    struct FakeFactory {
        script: Script,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn open(&self) -> Result<Box<dyn BrowserSession>> {
            if self.script.open_fails {
                bail!("no Chrome/Chromium binary found");
            }
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn scraper(script: Script) -> (AttendanceScraper, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let factory = FakeFactory {
            script,
            calls: Arc::clone(&calls),
        };
        let scraper = AttendanceScraper::new(Arc::new(factory), PortalLayout::new("https://portal.test"))
            .with_wait(Duration::ZERO);
        (scraper, calls)
    }

    fn recorded(calls: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn extracts_register_through_named_frame() {
        let (scraper, calls) = scraper(Script::default());
        let snapshot = scraper.extract("21L31A0501", "secret").await.unwrap();

        let total = snapshot.total.unwrap();
        assert_eq!((total.attended, total.held), (8, 10));
        assert_eq!(snapshot.daily_log.len(), 1);
        assert_eq!(snapshot.last_date, "16/10");

        assert_eq!(
            recorded(&calls),
            vec![
                "goto https://portal.test",
                "wait [name=txtId2]",
                "fill [name=txtId2]",
                "fill [name=txtPwd2]",
                "click [name=imgBtn2]",
                "wait_and_click link containing 'ACADAMIC REGISTER'",
                "switch frame #capIframeId",
                "page_source",
                "quit",
            ]
        );
    }

    #[tokio::test]
    async fn navigation_timeout_is_session_failure_and_quits() {
        let (scraper, calls) = scraper(Script {
            link_clickable: false,
            ..Script::default()
        });
        let err = scraper.extract("user", "wrong").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::SessionFailure {
                stage: SessionStage::Navigate,
                ..
            }
        ));
        let calls = recorded(&calls);
        assert_eq!(calls.last().map(String::as_str), Some("quit"));
        assert!(!calls.iter().any(|c| c == "page_source"));
    }

    #[tokio::test]
    async fn missing_login_form_fails_at_login() {
        let (scraper, calls) = scraper(Script {
            login_form_present: false,
            ..Script::default()
        });
        let err = scraper.extract("user", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::SessionFailure {
                stage: SessionStage::Login,
                ..
            }
        ));
        assert_eq!(recorded(&calls).last().map(String::as_str), Some("quit"));
    }

    #[tokio::test]
    async fn driver_unavailable() {
        let (scraper, calls) = scraper(Script {
            open_fails: true,
            ..Script::default()
        });
        let err = scraper.extract("user", "pw").await.unwrap_err();
        assert!(matches!(err, ExtractionError::DriverUnavailable(_)));
        assert!(recorded(&calls).is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_positional_frame() {
        let (scraper, calls) = scraper(Script {
            frames: vec![FrameStrategy::ByIndex(0)],
            ..Script::default()
        });
        assert!(scraper.extract("user", "pw").await.is_ok());
        let calls = recorded(&calls);
        let switches: Vec<_> = calls.iter().filter(|c| c.starts_with("switch")).collect();
        assert_eq!(switches, vec!["switch frame #capIframeId", "switch frame[0]"]);
    }

    #[tokio::test]
    async fn reads_current_document_without_frames() {
        let (scraper, calls) = scraper(Script {
            frames: vec![],
            ..Script::default()
        });
        let snapshot = scraper.extract("user", "pw").await.unwrap();
        assert!(snapshot.total.is_some());
        let calls = recorded(&calls);
        assert_eq!(calls.iter().filter(|c| c.starts_with("switch")).count(), 2);
        assert!(calls.iter().any(|c| c == "page_source"));
    }

    #[tokio::test]
    async fn page_source_failure_still_quits() {
        let (scraper, calls) = scraper(Script {
            source_fails: true,
            ..Script::default()
        });
        let err = scraper.extract("user", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::SessionFailure {
                stage: SessionStage::Harvest,
                ..
            }
        ));
        assert_eq!(recorded(&calls).last().map(String::as_str), Some("quit"));
    }
}
