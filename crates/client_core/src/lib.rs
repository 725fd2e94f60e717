pub mod controller;
pub mod error;
pub mod host;
pub mod remote;
pub mod render;
pub mod staging;

pub use controller::{
    CredentialForm, HandoffReceipt, Notice, NoticeKind, RetrievalController, RetrievePhase,
    SavePhase,
};
pub use error::HandoffFlowError;
pub use host::{
    ActivePageInspector, Clipboard, MissingViewActivator, PasscodePrompt, StaticPageInspector,
    ViewActivator, ViewRequest, RETRIEVE_VIEW_LOCATION,
};
pub use remote::{
    CredentialService, RemoteClient, RetrieveRequest, RetrieveResult, StoreError, StoreRequest,
};
pub use render::{ExportField, RenderContext, RenderedItem, RenderedView};
pub use staging::{MemoryStagingCache, StagingCache, STAGING_KEY};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
