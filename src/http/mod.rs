//! HTTP surface for the select-organisation flow.
//!
//! Thin layer over the use cases: handlers validate nothing beyond what the
//! route shape gives them, forward to the service, and map the error
//! taxonomy onto status codes (validation 400, absent session 404,
//! collaborator failures 502, storage failures 500).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::callback::{self, CallbackClient, CallbackEvent};
use crate::service::{
    CreateSessionRequest, CreateSessionResponse, Error as ServiceError,
    SelectOrganisationService,
};
use crate::session::{
    OrganisationOption, SelectOrganisationPrompt, SelectOrganisationSession,
};
use crate::store::dynamodb;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SelectOrganisationService>,
    pub callbacks: Arc<CallbackClient>,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/select-organisation", post(create_session))
        .route(
            "/{client_id}/{session_key}",
            axum::routing::get(view_session).post(complete_session),
        )
        .with_state(state)
}

/// What the selection UI needs to render a session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    prompt: SelectOrganisationPrompt,
    organisation_options: Vec<OrganisationOption>,
    allow_cancel: bool,
}

/// User decision posted back from the selection UI.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "action")]
enum CompleteSessionRequest {
    Select { organisation_id: Uuid },
    Cancel,
    SignOut,
    Error { message: String },
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let response = state.service.create_session(request).await?;
    Ok(Json(response))
}

async fn view_session(
    State(state): State<AppState>,
    Path((client_id, session_key)): Path<(String, String)>,
) -> Result<Json<SessionView>, ApiError> {
    let session = load_session(&state, &client_id, &session_key).await?;

    Ok(Json(SessionView {
        prompt: session.prompt,
        organisation_options: session.organisation_options,
        allow_cancel: session.allow_cancel,
    }))
}

async fn complete_session(
    State(state): State<AppState>,
    Path((client_id, session_key)): Path<(String, String)>,
    Json(request): Json<CompleteSessionRequest>,
) -> Result<StatusCode, ApiError> {
    let session = load_session(&state, &client_id, &session_key).await?;

    let event = match request {
        CompleteSessionRequest::Select { organisation_id } => {
            let organisation = session
                .organisation_options
                .iter()
                .find(|option| option.id == organisation_id)
                .cloned()
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "organisation is not one of the offered options".to_string(),
                    )
                })?;
            CallbackEvent::Selection { organisation }
        }
        CompleteSessionRequest::Cancel => {
            if !session.allow_cancel {
                return Err(ApiError::BadRequest(
                    "cancelling this selection is not allowed".to_string(),
                ));
            }
            CallbackEvent::Cancel
        }
        CompleteSessionRequest::SignOut => CallbackEvent::SignOut,
        CompleteSessionRequest::Error { message } => CallbackEvent::Error { message },
    };

    // The session stays live until the relying application has accepted the
    // callback; a failed delivery leaves it retrievable.
    state.callbacks.send(&session, &event).await?;
    state.service.invalidate_session(&session_key).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn load_session(
    state: &AppState,
    client_id: &str,
    session_key: &str,
) -> Result<SelectOrganisationSession, ApiError> {
    let session = state
        .service
        .retrieve_session(session_key)
        .await?
        .ok_or(ApiError::NotFound)?;

    // A key presented under the wrong client reads as absent, so session
    // keys cannot be probed across clients.
    if session.client_id != client_id {
        debug!(
            "Session {} does not belong to client {}",
            session_key, client_id
        );
        return Err(ApiError::NotFound);
    }

    Ok(session)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Session not found")]
    NotFound,

    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::InvalidRequest(message) => ApiError::BadRequest(message),
            ServiceError::Store(dynamodb::Error::InvalidSessionKey) => {
                ApiError::BadRequest("session key must not be empty".to_string())
            }
            ServiceError::Store(e) => {
                error!("Session storage failed: {}", e);
                ApiError::Internal("session storage failed".to_string())
            }
            ServiceError::Organisations(e) => {
                error!("Organisation lookup failed: {}", e);
                ApiError::UpstreamUnavailable("organisation lookup failed".to_string())
            }
        }
    }
}

impl From<callback::Error> for ApiError {
    fn from(error: callback::Error) -> Self {
        match error {
            callback::Error::Payload(e) => {
                error!("Failed to build callback payload: {}", e);
                ApiError::Internal("failed to build callback payload".to_string())
            }
            callback::Error::Signing(e) => {
                error!("Failed to sign callback payload: {}", e);
                ApiError::Internal("failed to sign callback payload".to_string())
            }
            callback::Error::Request(_) | callback::Error::Rejected(_) => {
                error!("Callback delivery failed: {}", error);
                ApiError::UpstreamUnavailable("callback delivery failed".to_string())
            }
        }
    }
}

/// Error response format for API errors.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::UpstreamUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "upstream_unavailable")
            }
            ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
