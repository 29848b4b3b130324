//! Browser-session abstraction the extraction protocol is written against.
//!
//! A [`SessionFactory`] is the injected capability that knows how to start a
//! browser; a [`BrowserSession`] is one single-use browser instance.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// How to find an element in the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `name` attribute, as used by the portal's form fields.
    Name(String),
    /// Anchor whose visible text contains the given fragment.
    PartialLinkText(String),
}

impl Locator {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn partial_link_text(text: impl Into<String>) -> Self {
        Self::PartialLinkText(text.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Name(name) => write!(f, "[name={name}]"),
            Locator::PartialLinkText(text) => write!(f, "link containing '{text}'"),
        }
    }
}

/// One way of entering an embedded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStrategy {
    ById(String),
    ByIndex(usize),
}

impl std::fmt::Display for FrameStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameStrategy::ById(id) => write!(f, "frame #{id}"),
            FrameStrategy::ByIndex(index) => write!(f, "frame[{index}]"),
        }
    }
}

/// A single browser instance, used for exactly one extraction.
///
/// Every lookup is relative to the current browsing context, which starts
/// as the top-level document and changes after a successful
/// [`switch_to_frame`](BrowserSession::switch_to_frame).
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Waits until an element matching `locator` is present.
    async fn wait_for_element(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;

    /// Waits until `locator` is visible and enabled, then clicks it.
    async fn wait_and_click(&mut self, locator: &Locator, timeout: Duration) -> Result<()>;

    async fn fill(&mut self, locator: &Locator, text: &str) -> Result<()>;

    async fn click(&mut self, locator: &Locator) -> Result<()>;

    /// Waits for the frame to load and makes it the current context.
    async fn switch_to_frame(&mut self, frame: &FrameStrategy, timeout: Duration) -> Result<()>;

    /// Serialized HTML of the current context.
    async fn page_source(&mut self) -> Result<String>;

    /// Tears the browser down.
    async fn quit(self: Box<Self>) -> Result<()>;
}

/// Starts browser sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}
