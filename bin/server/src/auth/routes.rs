//! HTTP handlers for the login flow.
//!
//! The handlers stay thin: they decode inbound parameters, hand control to
//! the [`LoginOrchestrator`](super::orchestrator::LoginOrchestrator), and
//! translate its next step into a redirect or JSON response. A state that
//! does not decode is answered with 400 before any identity-provider or
//! database interaction.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use super::AppState;
use super::orchestrator::{CallbackParams, CallbackPurpose, NextStep, OrchestratorError};
use super::redirect::failure_url;
use authgate_identity::ErrorCode;

/// Query parameters for starting a login flow.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Where to send the client when the flow concludes.
    pub return_url: Url,
    /// Base URL of the client application.
    pub fe_url: Url,
    /// When present, answer with a 307 instead of a JSON body.
    pub redirect: Option<String>,
}

/// Query parameters the identity provider sends to callback endpoints.
///
/// Providers also send `iss`, `scope`, and `error_hint`; the flow has no
/// use for them and they are ignored.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// The encoded flow state, round-tripped through the provider.
    pub state: Option<String>,
    /// Authorization code, present unless `error` is.
    pub code: Option<String>,
    /// Error identifier, mutually exclusive with `code`.
    pub error: Option<String>,
    /// Human-oriented error description.
    pub error_description: Option<String>,
}

/// Request body for the terms-acceptance continuation.
#[derive(Debug, Deserialize)]
pub struct AcceptTermsRequest {
    /// The encoded flow state carried through the terms page.
    pub state: String,
    /// Whether the user accepted.
    pub accepted: bool,
}

/// Request body for invalidating an in-flight flow.
#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    /// The encoded flow state of the abandoned flow.
    pub state: String,
}

/// Response carrying the client's next URL.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Where the client continues.
    pub next_url: String,
}

/// Plain success/failure response body.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
}

/// Starts a login flow at the identity provider.
pub async fn login(
    State(app): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AuthError> {
    let next_url = app.orchestrator.start_login(query.return_url, query.fe_url)?;

    if query.redirect.is_some() {
        Ok(Redirect::temporary(next_url.as_str()).into_response())
    } else {
        Ok(Json(LoginResponse {
            next_url: next_url.to_string(),
        })
        .into_response())
    }
}

/// Handles the callback after the plain login leg.
pub async fn login_callback(
    State(app): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AuthError> {
    callback(&app, CallbackPurpose::Login, query).await
}

/// Handles the callback after the secondary-verification leg.
pub async fn verification_callback(
    State(app): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AuthError> {
    callback(&app, CallbackPurpose::Verification, query).await
}

async fn callback(
    app: &AppState,
    purpose: CallbackPurpose,
    query: CallbackQuery,
) -> Result<Response, AuthError> {
    let encoded = query
        .state
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidState)?;

    let flow_state = app
        .codec
        .decode(encoded)
        .map_err(|_| AuthError::InvalidState)?;

    let params = CallbackParams {
        code: query.code,
        error: query.error,
        error_description: query.error_description,
    };

    let step = app
        .orchestrator
        .handle_callback(purpose, flow_state, encoded, &params)
        .await?;

    Ok(redirect_response(step))
}

/// Continues a flow after the client answered the terms page.
///
/// Declining invalidates the captured provider session and hands back the
/// failure URL; accepting re-enters the decision table and, on completion,
/// sets the session cookie alongside the JSON body.
pub async fn accept_terms(
    State(app): State<Arc<AppState>>,
    Json(request): Json<AcceptTermsRequest>,
) -> Result<Response, AuthError> {
    let flow_state = app
        .codec
        .decode(&request.state)
        .map_err(|_| AuthError::InvalidState)?;

    if !request.accepted {
        app.orchestrator.invalidate(&flow_state).await?;
        let next_url = failure_url(&flow_state, ErrorCode::UserAborted);
        return Ok(Json(LoginResponse {
            next_url: next_url.to_string(),
        })
        .into_response());
    }

    let step = app.orchestrator.resume_after_terms(flow_state).await?;

    let body = Json(LoginResponse {
        next_url: step.next_url.to_string(),
    });

    match step.cookie {
        Some(cookie) => Ok((CookieJar::new().add(cookie), body).into_response()),
        None => Ok(body.into_response()),
    }
}

/// Logs out the session named by the cookie.
///
/// Idempotent: an absent, expired, or already-deleted token yields the same
/// cookie-clearing response.
pub async fn logout(
    State(app): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, AuthError> {
    if let Some(cookie) = jar.get(&app.token.cookie_name) {
        app.orchestrator.logout(cookie.value()).await?;
    }

    let clear = app.orchestrator.clear_session_cookie();
    Ok((
        CookieJar::new().add(clear),
        Json(StatusResponse { success: true }),
    )
        .into_response())
}

/// Invalidates an in-flight flow the client gave up on.
pub async fn invalidate(
    State(app): State<Arc<AppState>>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Response, AuthError> {
    let flow_state = app
        .codec
        .decode(&request.state)
        .map_err(|_| AuthError::InvalidState)?;

    if !app.orchestrator.invalidate(&flow_state).await? {
        return Err(AuthError::NothingToInvalidate);
    }

    Ok(Json(StatusResponse { success: true }).into_response())
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

fn redirect_response(step: NextStep) -> Response {
    let redirect = Redirect::temporary(step.next_url.as_str());
    match step.cookie {
        Some(cookie) => (CookieJar::new().add(cookie), redirect).into_response(),
        None => redirect.into_response(),
    }
}

/// Authentication handler errors.
#[derive(Debug)]
pub enum AuthError {
    /// The state parameter was missing, malformed, or forged.
    InvalidState,
    /// A callback carried neither a code nor an error.
    MissingCode,
    /// The flow state lacks data the requested step needs.
    IncompleteState,
    /// There was no captured provider session to invalidate.
    NothingToInvalidate,
    /// Database error.
    Database(String),
    /// Identity provider error outside the recoverable paths.
    Broker(String),
    /// A flow secret failed to decrypt.
    Cipher(String),
}

impl From<OrchestratorError> for AuthError {
    fn from(e: OrchestratorError) -> Self {
        match e {
            OrchestratorError::MissingCode => Self::MissingCode,
            OrchestratorError::IncompleteState => Self::IncompleteState,
            OrchestratorError::Database(e) => Self::Database(e.to_string()),
            OrchestratorError::Broker(e) => Self::Broker(e.to_string()),
            OrchestratorError::Cipher(e) => Self::Cipher(e.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidState => (StatusCode::BAD_REQUEST, "Invalid state"),
            Self::MissingCode => (StatusCode::BAD_REQUEST, "Missing authorization code"),
            Self::IncompleteState => (StatusCode::BAD_REQUEST, "Incomplete flow state"),
            Self::NothingToInvalidate => (StatusCode::BAD_REQUEST, "Nothing to invalidate"),
            Self::Database(msg) => {
                tracing::error!("database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Broker(msg) => {
                tracing::error!("identity provider error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            Self::Cipher(msg) => {
                tracing::error!("cipher error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_map_to_bad_request() {
        for error in [
            AuthError::InvalidState,
            AuthError::MissingCode,
            AuthError::IncompleteState,
            AuthError::NothingToInvalidate,
        ] {
            assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn internal_failures_map_to_500() {
        for error in [
            AuthError::Database("boom".to_string()),
            AuthError::Broker("boom".to_string()),
            AuthError::Cipher("boom".to_string()),
        ] {
            assert_eq!(
                error.into_response().status(),
                StatusCode::INTERNAL_SERVER_ERROR
            );
        }
    }

    #[test]
    fn callback_query_deserializes_provider_error() {
        let query: CallbackQuery = serde_json::from_str(
            r#"{"state": "abc", "error": "access_denied", "error_description": "user_aborted"}"#,
        )
        .expect("deserialize");

        assert_eq!(query.state.as_deref(), Some("abc"));
        assert!(query.code.is_none());
        assert_eq!(query.error_description.as_deref(), Some("user_aborted"));
    }
}
