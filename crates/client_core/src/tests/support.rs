//! Test doubles for the host capabilities and the credential service.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex as StdMutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use crate::{
    controller::RetrievalController,
    host::{
        ActivePageInspector, Clipboard, PasscodePrompt, StaticPageInspector, ViewActivator,
        ViewRequest,
    },
    remote::{CredentialService, RetrieveRequest, RetrieveResult, StoreError, StoreRequest},
    staging::{MemoryStagingCache, StagingCache},
};

/// Ordered record of handoff-relevant side effects across fakes.
pub type EventLog = Arc<StdMutex<Vec<&'static str>>>;

pub fn event_log() -> EventLog {
    Arc::new(StdMutex::new(Vec::new()))
}

pub struct FakeService {
    store_response: Result<String, StoreError>,
    retrieve_response: RetrieveResult,
    pub store_calls: AtomicUsize,
    pub retrieve_calls: AtomicUsize,
    pub last_store: StdMutex<Option<StoreRequest>>,
    pub last_passcode: StdMutex<Option<String>>,
}

impl FakeService {
    pub fn new(store_response: Result<String, StoreError>, retrieve_response: RetrieveResult) -> Self {
        Self {
            store_response,
            retrieve_response,
            store_calls: AtomicUsize::new(0),
            retrieve_calls: AtomicUsize::new(0),
            last_store: StdMutex::new(None),
            last_passcode: StdMutex::new(None),
        }
    }

    pub fn storing(response: Result<String, StoreError>) -> Self {
        Self::new(
            response,
            RetrieveResult::Failure {
                reason: "unused".into(),
            },
        )
    }

    pub fn retrieving(result: RetrieveResult) -> Self {
        Self::new(Ok("unused".into()), result)
    }

    pub fn store_count(&self) -> usize {
        self.store_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialService for FakeService {
    async fn store(&self, request: StoreRequest) -> Result<String, StoreError> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_store.lock().expect("lock") = Some(request);
        self.store_response.clone()
    }

    async fn retrieve(&self, request: RetrieveRequest) -> RetrieveResult {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_passcode.lock().expect("lock") = Some(request.passcode);
        self.retrieve_response.clone()
    }
}

/// In-memory staging that records writes and can hold a `put` open until
/// released, or fail reads/writes outright.
pub struct RecordingStaging {
    inner: MemoryStagingCache,
    log: EventLog,
    pub puts: AtomicUsize,
    pub gets: AtomicUsize,
    pub removes: AtomicUsize,
    put_gate: Mutex<Option<oneshot::Receiver<()>>>,
    fail_puts: bool,
    fail_gets: bool,
}

impl RecordingStaging {
    pub fn new(log: EventLog) -> Self {
        Self {
            inner: MemoryStagingCache::new(),
            log,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            removes: AtomicUsize::new(0),
            put_gate: Mutex::new(None),
            fail_puts: false,
            fail_gets: false,
        }
    }

    pub fn failing_puts(log: EventLog) -> Self {
        Self {
            fail_puts: true,
            ..Self::new(log)
        }
    }

    pub fn failing_gets(log: EventLog) -> Self {
        Self {
            fail_gets: true,
            ..Self::new(log)
        }
    }

    /// The next `put` will not complete until the returned sender fires.
    pub async fn hold_next_put(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.put_gate.lock().await = Some(rx);
        tx
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst) + self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StagingCache for RecordingStaging {
    async fn put(&self, key: &str, value: String) -> Result<()> {
        let gate = self.put_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_puts {
            return Err(anyhow!("storage quota exceeded"));
        }
        self.inner.put(key, value).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.log.lock().expect("lock").push("staged");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets {
            return Err(anyhow!("storage area unavailable"));
        }
        self.inner.get(key).await
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_if(key, expected).await
    }
}

pub struct RecordingViews {
    log: EventLog,
    pub opened: StdMutex<Vec<ViewRequest>>,
    fail_with: Option<String>,
}

impl RecordingViews {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            opened: StdMutex::new(Vec::new()),
            fail_with: None,
        }
    }

    pub fn failing(log: EventLog, err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::new(log)
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().expect("lock").len()
    }
}

#[async_trait]
impl ViewActivator for RecordingViews {
    async fn open_view(&self, request: &ViewRequest) -> Result<()> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        self.opened.lock().expect("lock").push(request.clone());
        self.log.lock().expect("lock").push("view_opened");
        Ok(())
    }
}

/// Answers every prompt with a fixed reply, optionally waiting for a release
/// signal first.
pub struct ScriptedPrompt {
    answer: Option<String>,
    pub calls: AtomicUsize,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: Option<&str>) -> Self {
        Self {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    pub async fn hold_next_answer(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().await = Some(rx);
        tx
    }
}

#[async_trait]
impl PasscodePrompt for ScriptedPrompt {
    async fn request_passcode(&self, _prompt: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.answer.clone()
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub writes: StdMutex<Vec<String>>,
    fail: bool,
}

impl FakeClipboard {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_write(&self) -> Option<String> {
        self.writes.lock().expect("lock").last().cloned()
    }
}

#[async_trait]
impl Clipboard for FakeClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("document is not focused"));
        }
        self.writes.lock().expect("lock").push(text.to_string());
        Ok(())
    }
}

/// Bundle of fakes wired into a controller.
pub struct Harness {
    pub controller: Arc<RetrievalController>,
    pub service: Arc<FakeService>,
    pub staging: Arc<RecordingStaging>,
    pub views: Arc<RecordingViews>,
    pub prompt: Arc<ScriptedPrompt>,
    pub log: EventLog,
}

impl Harness {
    pub fn build(
        service: FakeService,
        staging: RecordingStaging,
        views: RecordingViews,
        prompt: ScriptedPrompt,
        pages: Arc<dyn ActivePageInspector>,
        log: EventLog,
    ) -> Self {
        let service = Arc::new(service);
        let staging = Arc::new(staging);
        let views = Arc::new(views);
        let prompt = Arc::new(prompt);
        let controller = Arc::new(RetrievalController::new(
            service.clone(),
            staging.clone(),
            views.clone(),
            prompt.clone(),
            pages,
        ));
        Self {
            controller,
            service,
            staging,
            views,
            prompt,
            log,
        }
    }

    pub fn with_service(service: FakeService, passcode: Option<&str>) -> Self {
        let log = event_log();
        Self::build(
            service,
            RecordingStaging::new(log.clone()),
            RecordingViews::new(log.clone()),
            ScriptedPrompt::answering(passcode),
            Arc::new(StaticPageInspector::new(None)),
            log,
        )
    }
}
