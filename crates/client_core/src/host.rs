use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::CycleId;

/// Fixed location of the rendering view.
pub const RETRIEVE_VIEW_LOCATION: &str = "retrieve.html";

#[async_trait]
pub trait ActivePageInspector: Send + Sync {
    /// Address of the page that currently has focus.
    async fn active_page_url(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    pub location: &'static str,
    pub cycle_id: CycleId,
}

#[async_trait]
pub trait ViewActivator: Send + Sync {
    /// Creates or focuses the rendering view. Must only be called once the
    /// batch for `request.cycle_id` has been staged.
    async fn open_view(&self, request: &ViewRequest) -> Result<()>;
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<()>;
}

#[async_trait]
pub trait PasscodePrompt: Send + Sync {
    /// `None` when the user cancelled.
    async fn request_passcode(&self, prompt: &str) -> Option<String>;
}

/// Reports a fixed address; `None` behaves like an inspector with no focused page.
pub struct StaticPageInspector {
    address: Option<String>,
}

impl StaticPageInspector {
    pub fn new(address: Option<String>) -> Self {
        Self { address }
    }
}

#[async_trait]
impl ActivePageInspector for StaticPageInspector {
    async fn active_page_url(&self) -> Result<String> {
        self.address
            .clone()
            .ok_or_else(|| anyhow!("no active page"))
    }
}

/// For hosts that only save and never open the rendering view.
pub struct MissingViewActivator;

#[async_trait]
impl ViewActivator for MissingViewActivator {
    async fn open_view(&self, request: &ViewRequest) -> Result<()> {
        Err(anyhow!("{} is unavailable in this context", request.location))
    }
}
