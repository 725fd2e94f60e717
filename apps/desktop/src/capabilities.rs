use std::{
    io::{self, BufRead, Read, Write},
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use client_core::{Clipboard, PasscodePrompt, ViewActivator, ViewRequest};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reads the passcode from standard input. End of input counts as a cancel.
///
/// Reads go through the process-wide stdin buffer, so anything typed after the
/// passcode line stays available to the rendering view.
pub struct StdinPasscodePrompt;

#[async_trait]
impl PasscodePrompt for StdinPasscodePrompt {
    async fn request_passcode(&self, prompt: &str) -> Option<String> {
        eprint!("{prompt} ");
        let _ = io::stderr().flush();
        tokio::task::spawn_blocking(|| read_passcode_line(&mut io::stdin().lock()))
            .await
            .ok()
            .flatten()
    }
}

/// Consumes exactly one line from `input`.
pub fn read_passcode_line(input: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

/// Copies whatever is left on `input` into the rendering view's stdin.
pub fn forward_input(input: &mut impl Read, view_stdin: &mut impl Write) -> io::Result<u64> {
    let copied = io::copy(input, view_stdin)?;
    view_stdin.flush()?;
    Ok(copied)
}

/// A passcode supplied up front on the command line.
pub struct FixedPasscode(pub String);

#[async_trait]
impl PasscodePrompt for FixedPasscode {
    async fn request_passcode(&self, _prompt: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Opens the rendering view as a second process of this binary pointed at the
/// same staging database.
pub struct ProcessViewActivator {
    program: PathBuf,
    staging_db: String,
    child: Mutex<Option<Child>>,
}

impl ProcessViewActivator {
    pub fn new(staging_db: impl Into<String>) -> Result<Self> {
        let program = std::env::current_exe().context("failed to locate current executable")?;
        Ok(Self {
            program,
            staging_db: staging_db.into(),
            child: Mutex::new(None),
        })
    }

    /// Waits for a previously opened view to exit. No-op if none was opened.
    pub async fn wait(&self) -> Result<()> {
        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            let status = tokio::task::spawn_blocking(move || child.wait())
                .await
                .context("view wait task panicked")?
                .context("rendering view did not exit cleanly")?;
            debug!(?status, "rendering view exited");
        }
        Ok(())
    }
}

#[async_trait]
impl ViewActivator for ProcessViewActivator {
    async fn open_view(&self, request: &ViewRequest) -> Result<()> {
        let mut slot = self.child.lock().await;
        if let Some(existing) = slot.as_mut() {
            if existing.try_wait()?.is_none() {
                return Err(anyhow!("a {} view is already open", request.location));
            }
        }

        let mut child = Command::new(&self.program)
            .arg("--staging-db")
            .arg(&self.staging_db)
            .arg("view")
            .arg("--cycle")
            .arg(request.cycle_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to launch {}", request.location))?;
        info!(cycle_id = %request.cycle_id, pid = child.id(), "rendering view launched");

        // Detached: a pending terminal read must not hold up process exit.
        if let Some(mut view_stdin) = child.stdin.take() {
            thread::spawn(move || {
                if let Err(err) = forward_input(&mut io::stdin().lock(), &mut view_stdin) {
                    if err.kind() != io::ErrorKind::BrokenPipe {
                        warn!(error = %err, "stopped forwarding input to rendering view");
                    }
                }
            });
        }
        *slot = Some(child);
        Ok(())
    }
}

/// System clipboard. A fresh handle is opened per write.
pub struct SystemClipboard;

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut clipboard = arboard::Clipboard::new()?;
            clipboard.set_text(text)?;
            Ok(())
        })
        .await
        .context("clipboard task panicked")?
    }
}

#[cfg(test)]
#[path = "tests/capabilities_tests.rs"]
mod tests;
