use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::{Credential, CycleId, StagedBatch};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{
        HandoffFlowError, CONNECTIVITY_MESSAGE, FILL_ALL_FIELDS_MESSAGE,
        PASSCODE_REQUIRED_MESSAGE, RETRIEVAL_IN_PROGRESS_MESSAGE,
    },
    host::{ActivePageInspector, PasscodePrompt, ViewActivator, ViewRequest, RETRIEVE_VIEW_LOCATION},
    remote::{CredentialService, RetrieveRequest, RetrieveResult, StoreError},
    staging::{stage_batch, StagingCache},
};

/// How long a surfaced notice stays visible.
pub const NOTICE_DISPLAY_WINDOW: Duration = Duration::from_secs(3);
pub const PASSCODE_PROMPT: &str = "Enter Unlock Passcode:";
pub const WEBSITE_PLACEHOLDER: &str = "Could not get website URL";
pub const OPENING_VIEW_MESSAGE: &str = "Opening passwords in new tab...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    expires_at: Instant,
}

impl Notice {
    fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            expires_at: Instant::now() + NOTICE_DISPLAY_WINDOW,
        }
    }

    fn is_visible(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePhase {
    Idle,
    Validating,
    Submitting,
    Done(NoticeKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievePhase {
    Idle,
    AwaitingPasscode,
    Retrieving,
    Staging,
    HandoffRequested,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialForm {
    pub website: String,
    pub username: String,
    pub password: String,
}

impl CredentialForm {
    fn to_credential(&self) -> Credential {
        Credential::new(&self.website, &self.username, &self.password)
    }
}

/// Returned when the rendering view was asked to open for a freshly staged batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffReceipt {
    pub cycle_id: CycleId,
    pub credential_count: usize,
}

#[derive(Default)]
struct ControllerState {
    form: CredentialForm,
    notice: Option<Notice>,
    save_phase: Option<SavePhase>,
    retrieve_phase: Option<RetrievePhase>,
}

pub struct RetrievalController {
    service: Arc<dyn CredentialService>,
    staging: Arc<dyn StagingCache>,
    views: Arc<dyn ViewActivator>,
    prompt: Arc<dyn PasscodePrompt>,
    pages: Arc<dyn ActivePageInspector>,
    retrieval_in_flight: AtomicBool,
    inner: Mutex<ControllerState>,
}

/// Clears the in-flight flag on every exit path of a retrieve cycle.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RetrievalController {
    pub fn new(
        service: Arc<dyn CredentialService>,
        staging: Arc<dyn StagingCache>,
        views: Arc<dyn ViewActivator>,
        prompt: Arc<dyn PasscodePrompt>,
        pages: Arc<dyn ActivePageInspector>,
    ) -> Self {
        Self {
            service,
            staging,
            views,
            prompt,
            pages,
            retrieval_in_flight: AtomicBool::new(false),
            inner: Mutex::new(ControllerState::default()),
        }
    }

    pub async fn form(&self) -> CredentialForm {
        self.inner.lock().await.form.clone()
    }

    pub async fn set_website(&self, website: impl Into<String>) {
        self.inner.lock().await.form.website = website.into();
    }

    pub async fn set_username(&self, username: impl Into<String>) {
        self.inner.lock().await.form.username = username.into();
    }

    pub async fn set_password(&self, password: impl Into<String>) {
        self.inner.lock().await.form.password = password.into();
    }

    /// The currently visible notice; `None` once the display window has elapsed.
    pub async fn notice(&self) -> Option<Notice> {
        let mut guard = self.inner.lock().await;
        expire_notice(&mut guard);
        guard.notice.clone()
    }

    pub async fn save_phase(&self) -> SavePhase {
        let mut guard = self.inner.lock().await;
        expire_notice(&mut guard);
        guard.save_phase.unwrap_or(SavePhase::Idle)
    }

    pub async fn retrieve_phase(&self) -> RetrievePhase {
        let mut guard = self.inner.lock().await;
        expire_notice(&mut guard);
        guard.retrieve_phase.unwrap_or(RetrievePhase::Idle)
    }

    /// Fills the website field with the focused page's host name, or a
    /// placeholder when the page cannot be inspected.
    pub async fn prefill_website(&self) {
        let website = match self.pages.active_page_url().await.and_then(|raw| host_of(&raw)) {
            Ok(host) => host,
            Err(err) => {
                warn!(error = %err, "could not inspect active page");
                WEBSITE_PLACEHOLDER.to_string()
            }
        };
        self.inner.lock().await.form.website = website;
    }

    pub async fn save(&self) -> Result<String, HandoffFlowError> {
        let credential = {
            let mut guard = self.inner.lock().await;
            guard.save_phase = Some(SavePhase::Validating);
            guard.form.to_credential()
        };

        if !credential.is_complete() {
            debug!("save rejected: incomplete form");
            return Err(self
                .finish_save_with_error(HandoffFlowError::Validation(
                    FILL_ALL_FIELDS_MESSAGE.to_string(),
                ))
                .await);
        }

        self.inner.lock().await.save_phase = Some(SavePhase::Submitting);
        info!(website = %credential.website, "submitting credential");

        match self.service.store(credential.into()).await {
            Ok(message) => {
                let mut guard = self.inner.lock().await;
                guard.form.username.clear();
                guard.form.password.clear();
                guard.save_phase = Some(SavePhase::Done(NoticeKind::Success));
                guard.notice = Some(Notice::new(NoticeKind::Success, message.clone()));
                info!("credential saved");
                Ok(message)
            }
            Err(err) => {
                warn!(error = %err, "credential save failed");
                let err = match err {
                    StoreError::Rejected { message, .. } => HandoffFlowError::Service(message),
                    StoreError::Unreachable { .. } => {
                        HandoffFlowError::Connectivity(CONNECTIVITY_MESSAGE.to_string())
                    }
                };
                Err(self.finish_save_with_error(err).await)
            }
        }
    }

    /// Runs one retrieve cycle up to the point where the rendering view has been
    /// asked to open.
    pub async fn retrieve(&self) -> Result<HandoffReceipt, HandoffFlowError> {
        if self
            .retrieval_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("retrieve ignored: a cycle is already running");
            let err = HandoffFlowError::InProgress(RETRIEVAL_IN_PROGRESS_MESSAGE.to_string());
            self.surface_error(&err).await;
            return Err(err);
        }
        let _in_flight = InFlightGuard(&self.retrieval_in_flight);

        self.enter_retrieve_phase(RetrievePhase::AwaitingPasscode).await;
        let passcode = self
            .prompt
            .request_passcode(PASSCODE_PROMPT)
            .await
            .filter(|passcode| !passcode.is_empty());
        let Some(passcode) = passcode else {
            return Err(self
                .fail_retrieve(HandoffFlowError::Validation(
                    PASSCODE_REQUIRED_MESSAGE.to_string(),
                ))
                .await);
        };

        self.enter_retrieve_phase(RetrievePhase::Retrieving).await;
        let credentials = match self.service.retrieve(RetrieveRequest { passcode }).await {
            RetrieveResult::Success { credentials } => credentials,
            RetrieveResult::Failure { reason } => {
                return Err(self.fail_retrieve(HandoffFlowError::Service(reason)).await);
            }
        };

        self.enter_retrieve_phase(RetrievePhase::Staging).await;
        let cycle_id = CycleId::new();
        let credential_count = credentials.len();
        let batch = StagedBatch::new(cycle_id, credentials);
        if let Err(err) = stage_batch(self.staging.as_ref(), &batch).await {
            warn!(error = %err, %cycle_id, "staging write failed");
            return Err(self
                .fail_retrieve(HandoffFlowError::Handoff(format!(
                    "Failed to stage passwords: {err}"
                )))
                .await);
        }
        debug!(%cycle_id, credential_count, "staging write acknowledged");

        self.enter_retrieve_phase(RetrievePhase::HandoffRequested).await;
        let request = ViewRequest {
            location: RETRIEVE_VIEW_LOCATION,
            cycle_id,
        };
        if let Err(err) = self.views.open_view(&request).await {
            warn!(error = %err, %cycle_id, "view activation failed");
            return Err(self
                .fail_retrieve(HandoffFlowError::Handoff(format!(
                    "Failed to open retrieve page: {err}"
                )))
                .await);
        }

        info!(%cycle_id, credential_count, "rendering view requested");
        self.inner.lock().await.notice =
            Some(Notice::new(NoticeKind::Success, OPENING_VIEW_MESSAGE));
        Ok(HandoffReceipt {
            cycle_id,
            credential_count,
        })
    }

    async fn enter_retrieve_phase(&self, phase: RetrievePhase) {
        debug!(?phase, "retrieve phase");
        self.inner.lock().await.retrieve_phase = Some(phase);
    }

    async fn finish_save_with_error(&self, err: HandoffFlowError) -> HandoffFlowError {
        {
            let mut guard = self.inner.lock().await;
            guard.save_phase = Some(SavePhase::Done(NoticeKind::Error));
        }
        self.surface_error(&err).await;
        err
    }

    async fn fail_retrieve(&self, err: HandoffFlowError) -> HandoffFlowError {
        self.inner.lock().await.retrieve_phase = Some(RetrievePhase::Failed);
        self.surface_error(&err).await;
        err
    }

    async fn surface_error(&self, err: &HandoffFlowError) {
        self.inner.lock().await.notice = Some(Notice::new(NoticeKind::Error, err.user_message()));
    }
}

/// Once the notice has expired the flows that produced it are back at idle.
fn expire_notice(state: &mut ControllerState) {
    if state.notice.as_ref().is_some_and(|notice| !notice.is_visible()) {
        state.notice = None;
        if matches!(state.save_phase, Some(SavePhase::Done(_))) {
            state.save_phase = None;
        }
        if matches!(
            state.retrieve_phase,
            Some(RetrievePhase::Failed | RetrievePhase::HandoffRequested)
        ) {
            state.retrieve_phase = None;
        }
    }
}

fn host_of(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw)?;
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("page address '{raw}' has no host"))
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
