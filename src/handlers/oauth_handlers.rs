//! Loopback redirect handler for the OAuth sign-in.
//!
//! The authorization server sends the browser back to
//! `http://127.0.0.1:<port>/callback?code=..&state=..`; the handler checks the
//! `state`, hands the code to the waiting sign-in and answers with a short
//! page the user can close.

use crate::{errors::AppError, services::oauth_service::OAuthError};
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

pub type CodeSender = oneshot::Sender<Result<String, OAuthError>>;

/// Shared state of the callback route.
#[derive(Clone)]
pub struct CallbackState {
    /// Anti-forgery value sent with the authorization request.
    pub expected_state: String,

    /// Taken by the first accepted callback.
    pub sender: Arc<Mutex<Option<CodeSender>>>,
}

impl CallbackState {
    pub fn new(expected_state: impl Into<String>, sender: CodeSender) -> Self {
        Self {
            expected_state: expected_state.into(),
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }
}

/// Query params of the redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /callback`
pub async fn oauth_callback(
    State(callback): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.state.as_deref() != Some(callback.expected_state.as_str()) {
        warn!("sign-in callback with unexpected state, ignored");
        return Err(AppError::bad_request("state mismatch"));
    }

    let Some(sender) = callback.sender.lock().await.take() else {
        return Err(AppError::gone("sign-in already completed"));
    };

    if let Some(error) = params.error {
        warn!("authorization refused: {}", error);
        let _ = sender.send(Err(OAuthError::Denied(error.clone())));
        return Err(AppError::bad_request(format!("authorization refused: {error}")));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        let _ = sender.send(Err(OAuthError::MissingCode));
        return Err(AppError::bad_request("missing authorization code"));
    };

    info!("authorization code received");
    let _ = sender.send(Ok(code));
    Ok(Html(
        "<html><body><p>Connexion réussie. Vous pouvez fermer cet onglet.</p></body></html>",
    ))
}
