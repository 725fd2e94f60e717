use shared::{
    domain::Credential,
    error::{ApiError, ErrorCode},
};
use storage::Storage;
use tracing::{info, warn};

pub const SAVED_MESSAGE: &str = "Password saved successfully!";
pub const MISSING_FIELDS_MESSAGE: &str = "All fields (website, username, password) are required.";
pub const INCORRECT_PASSCODE_MESSAGE: &str = "Incorrect passcode.";
pub const EMPTY_VAULT_MESSAGE: &str = "No saved passwords yet.";

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub unlock_passcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedCredentials {
    pub credentials: Vec<Credential>,
    pub message: Option<String>,
}

pub async fn save_credential(
    ctx: &ApiContext,
    website: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<String, ApiError> {
    let (Some(website), Some(username), Some(password)) = (
        website.filter(|v| !v.is_empty()),
        username.filter(|v| !v.is_empty()),
        password.filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiError::new(ErrorCode::Validation, MISSING_FIELDS_MESSAGE));
    };

    let id = ctx
        .storage
        .insert_credential(&Credential::new(website, username, password))
        .await
        .map_err(internal)?;
    info!(credential_id = id, %website, "credential saved");
    Ok(SAVED_MESSAGE.to_string())
}

pub async fn retrieve_credentials(
    ctx: &ApiContext,
    passcode: Option<&str>,
) -> Result<RetrievedCredentials, ApiError> {
    if passcode != Some(ctx.unlock_passcode.as_str()) {
        warn!("credential retrieval rejected: incorrect passcode");
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            INCORRECT_PASSCODE_MESSAGE,
        ));
    }

    let stored = ctx.storage.list_credentials().await.map_err(internal)?;
    if stored.is_empty() {
        return Ok(RetrievedCredentials {
            credentials: Vec::new(),
            message: Some(EMPTY_VAULT_MESSAGE.to_string()),
        });
    }

    info!(count = stored.len(), "credentials retrieved");
    Ok(RetrievedCredentials {
        credentials: stored.into_iter().map(|row| row.credential).collect(),
        message: None,
    })
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("Database error: {err}"))
}
