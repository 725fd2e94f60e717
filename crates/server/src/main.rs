use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use server_api::{retrieve_credentials, save_credential, ApiContext};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        AckResponse, RetrievePasswordsResponse, RETRIEVE_PASSWORDS_PATH, SAVE_PASSWORD_PATH,
    },
};
use storage::Storage;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{error, info, warn};

mod config;

use config::{load_settings, prepare_database_url};

const MAX_REQUEST_BYTES: usize = 64 * 1024;
const INVALID_JSON_MESSAGE: &str = "Invalid JSON payload";

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

// Fields stay optional so a missing key is a validation error rather than a
// deserialization rejection.
#[derive(Debug, Deserialize)]
struct SavePasswordBody {
    website: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrievePasswordsBody {
    passcode: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        unlock_passcode: settings.unlock_passcode,
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "credential service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(SAVE_PASSWORD_PATH, post(http_save_password))
        .route(RETRIEVE_PASSWORDS_PATH, post(http_retrieve_passwords))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.api.storage.health_check().await {
        Ok(()) => "ok".into_response(),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable").into_response()
        }
    }
}

async fn http_save_password(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SavePasswordBody>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body else {
        return invalid_json();
    };

    match save_credential(
        &state.api,
        req.website.as_deref(),
        req.username.as_deref(),
        req.password.as_deref(),
    )
    .await
    {
        Ok(message) => (StatusCode::CREATED, Json(AckResponse::ok(message))).into_response(),
        Err(err) => failure(err),
    }
}

async fn http_retrieve_passwords(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RetrievePasswordsBody>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body else {
        return invalid_json();
    };

    match retrieve_credentials(&state.api, req.passcode.as_deref()).await {
        Ok(retrieved) => Json(RetrievePasswordsResponse {
            success: true,
            passwords: Some(retrieved.credentials),
            message: retrieved.message,
        })
        .into_response(),
        Err(err) => failure(err),
    }
}

fn invalid_json() -> Response {
    warn!("rejected request with invalid JSON payload");
    (
        StatusCode::BAD_REQUEST,
        Json(AckResponse::error(INVALID_JSON_MESSAGE)),
    )
        .into_response()
}

fn failure(err: ApiError) -> Response {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(message = %err.message, "credential service request failed");
    }
    (status, Json(AckResponse::error(err.message))).into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
