use std::sync::Arc;

use shared::domain::{Credential, CycleId};
use tracing::{debug, info, warn};

use crate::{
    error::{HandoffFlowError, COPY_FAILED_MESSAGE},
    host::Clipboard,
    staging::{read_batch, release_batch, StagingCache},
};

pub const NO_PASSWORDS_MESSAGE: &str = "No passwords found.";
pub const LOAD_FAILED_MESSAGE: &str =
    "Error loading passwords. Please try again from the extension popup.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportField {
    Username,
    Password,
}

impl ExportField {
    fn copied_message(self) -> &'static str {
        match self {
            Self::Username => "Username copied!",
            Self::Password => "Password copied!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedItem {
    credential: Credential,
}

impl RenderedItem {
    pub fn website(&self) -> &str {
        &self.credential.website
    }

    pub fn username(&self) -> &str {
        &self.credential.username
    }

    pub fn password(&self) -> &str {
        &self.credential.password
    }

    /// The two independent export actions of this item.
    pub fn export_actions(&self) -> [ExportField; 2] {
        [ExportField::Username, ExportField::Password]
    }

    /// Copies one field to the clipboard. Failure only affects this export.
    pub async fn export(
        &self,
        field: ExportField,
        clipboard: &dyn Clipboard,
    ) -> Result<&'static str, HandoffFlowError> {
        let value = match field {
            ExportField::Username => self.username(),
            ExportField::Password => self.password(),
        };
        match clipboard.write_text(value).await {
            Ok(()) => {
                info!(?field, website = %self.website(), "copied to clipboard");
                Ok(field.copied_message())
            }
            Err(err) => {
                warn!(?field, error = %err, "clipboard export failed");
                Err(HandoffFlowError::Clipboard(COPY_FAILED_MESSAGE.to_string()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedView {
    Items(Vec<RenderedItem>),
    /// Nothing (current) was staged. A normal terminal state.
    NoPasswords,
    /// The staging slot could not be read.
    LoadFailed,
}

impl RenderedView {
    pub fn items(&self) -> &[RenderedItem] {
        match self {
            Self::Items(items) => items,
            Self::NoPasswords | Self::LoadFailed => &[],
        }
    }

    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            Self::Items(_) => None,
            Self::NoPasswords => Some(NO_PASSWORDS_MESSAGE),
            Self::LoadFailed => Some(LOAD_FAILED_MESSAGE),
        }
    }
}

pub struct RenderContext {
    staging: Arc<dyn StagingCache>,
    clipboard: Arc<dyn Clipboard>,
}

impl RenderContext {
    pub fn new(staging: Arc<dyn StagingCache>, clipboard: Arc<dyn Clipboard>) -> Self {
        Self { staging, clipboard }
    }

    pub fn clipboard(&self) -> &dyn Clipboard {
        self.clipboard.as_ref()
    }

    /// Reads the staging slot exactly once and builds the view for `cycle_id`.
    /// A batch staged by another cycle is treated as absent and left in place
    /// for its own view; a matching batch is cleared once read.
    pub async fn initialize(&self, cycle_id: CycleId) -> RenderedView {
        let read = match read_batch(self.staging.as_ref()).await {
            Ok(read) => read,
            Err(err) => {
                warn!(error = %err, %cycle_id, "failed to read staged batch");
                return RenderedView::LoadFailed;
            }
        };

        let batch = match read {
            Some(read) if read.batch.cycle_id != cycle_id => {
                warn!(
                    expected = %cycle_id,
                    staged = %read.batch.cycle_id,
                    "ignoring batch staged by another cycle"
                );
                return RenderedView::NoPasswords;
            }
            Some(read) => {
                match release_batch(self.staging.as_ref(), &read).await {
                    Ok(true) => {}
                    Ok(false) => debug!(%cycle_id, "staging slot replaced before it was cleared"),
                    Err(err) => warn!(error = %err, "failed to clear staging slot after read"),
                }
                Some(read.batch)
            }
            None => None,
        };

        match batch {
            Some(batch) if !batch.credentials.is_empty() => {
                info!(%cycle_id, count = batch.credentials.len(), "rendering staged credentials");
                RenderedView::Items(
                    batch
                        .credentials
                        .into_iter()
                        .map(|credential| RenderedItem { credential })
                        .collect(),
                )
            }
            _ => RenderedView::NoPasswords,
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
