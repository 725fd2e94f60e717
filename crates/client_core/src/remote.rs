use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::Credential,
    protocol::{
        RetrievePasswordsRequest, RetrievePasswordsResponse, SavePasswordRequest,
        SavePasswordResponse, RETRIEVE_PASSWORDS_PATH, SAVE_PASSWORD_PATH,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::{
    CONNECTIVITY_MESSAGE, RETRIEVE_FAILED_MESSAGE, RETRIEVE_SERVER_ERROR_MESSAGE,
    SAVE_FAILED_MESSAGE,
};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SAVED_FALLBACK_MESSAGE: &str = "Password saved.";

pub type StoreRequest = SavePasswordRequest;
pub type RetrieveRequest = RetrievePasswordsRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("credential service unreachable: {detail}")]
    Unreachable { detail: String },
    #[error("credential service rejected the save ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrieveResult {
    Success { credentials: Vec<Credential> },
    Failure { reason: String },
}

#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn store(&self, request: StoreRequest) -> Result<String, StoreError>;
    async fn retrieve(&self, request: RetrieveRequest) -> RetrieveResult;
}

pub struct RemoteClient {
    http: Client,
    server_url: String,
}

impl RemoteClient {
    pub fn new(server_url: &str) -> Result<Self> {
        Self::with_timeout(server_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(server_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(server_url)
            .with_context(|| format!("invalid credential service url '{server_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("credential service url must be http(s): '{server_url}'");
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

/// Reads a JSON body. An empty or malformed body is `Ok(None)`; a body that
/// never fully arrives (including a timeout mid-body) is an error.
async fn read_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, reqwest::Error> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes).ok())
}

fn log_unanswered(err: &reqwest::Error, operation: &str) {
    warn!(error = %err, timeout = err.is_timeout(), operation, "credential service did not answer");
}

fn unreachable_on_save(err: reqwest::Error) -> StoreError {
    log_unanswered(&err, "save");
    StoreError::Unreachable {
        detail: err.to_string(),
    }
}

#[async_trait]
impl CredentialService for RemoteClient {
    async fn store(&self, request: StoreRequest) -> Result<String, StoreError> {
        let response = self
            .http
            .post(self.endpoint(SAVE_PASSWORD_PATH))
            .json(&request)
            .send()
            .await
            .map_err(unreachable_on_save)?;

        let status = response.status();
        let message = read_body::<SavePasswordResponse>(response)
            .await
            .map_err(unreachable_on_save)?
            .and_then(|body| body.message)
            .filter(|message| !message.is_empty());
        debug!(status = status.as_u16(), "save response received");

        if status.is_success() {
            Ok(message.unwrap_or_else(|| SAVED_FALLBACK_MESSAGE.to_string()))
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| SAVE_FAILED_MESSAGE.to_string()),
            })
        }
    }

    async fn retrieve(&self, request: RetrieveRequest) -> RetrieveResult {
        let response = match self
            .http
            .post(self.endpoint(RETRIEVE_PASSWORDS_PATH))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                log_unanswered(&err, "retrieve");
                return RetrieveResult::Failure {
                    reason: CONNECTIVITY_MESSAGE.to_string(),
                };
            }
        };

        let status = response.status();
        let body = match read_body::<RetrievePasswordsResponse>(response).await {
            Ok(body) => body,
            Err(err) => {
                log_unanswered(&err, "retrieve");
                return RetrieveResult::Failure {
                    reason: CONNECTIVITY_MESSAGE.to_string(),
                };
            }
        };
        debug!(status = status.as_u16(), parsed = body.is_some(), "retrieve response received");
        classify_retrieve(status, body)
    }
}

fn classify_retrieve(status: StatusCode, body: Option<RetrievePasswordsResponse>) -> RetrieveResult {
    let message = body
        .as_ref()
        .and_then(|body| body.message.clone())
        .filter(|message| !message.is_empty());

    if !status.is_success() {
        return RetrieveResult::Failure {
            reason: message.unwrap_or_else(|| RETRIEVE_SERVER_ERROR_MESSAGE.to_string()),
        };
    }

    match body {
        Some(RetrievePasswordsResponse {
            success: true,
            passwords,
            ..
        }) => RetrieveResult::Success {
            credentials: passwords.unwrap_or_default(),
        },
        _ => RetrieveResult::Failure {
            reason: message.unwrap_or_else(|| RETRIEVE_FAILED_MESSAGE.to_string()),
        },
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
