use serde::{Deserialize, Serialize};

use crate::domain::Credential;

pub const SAVE_PASSWORD_PATH: &str = "/save_password";
pub const RETRIEVE_PASSWORDS_PATH: &str = "/retrieve_passwords";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavePasswordRequest {
    pub website: String,
    pub username: String,
    pub password: String,
}

impl From<Credential> for SavePasswordRequest {
    fn from(value: Credential) -> Self {
        Self {
            website: value.website,
            username: value.username,
            password: value.password,
        }
    }
}

/// Outcome-only reply: a completed save, or any error from either endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Lenient view of a `/save_password` reply; servers may omit either field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavePasswordResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievePasswordsRequest {
    pub passcode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievePasswordsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passwords: Option<Vec<Credential>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
