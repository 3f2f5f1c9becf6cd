//! src/services/oauth_service.rs
//!
//! OAuthService: authorization-code sign-in with PKCE and a loopback
//! redirect. `begin` binds the callback listener and returns the URL to open;
//! `PendingSignIn::finish` waits for the redirect and trades the code for a
//! token grant. Also revokes tokens on sign-out.

use crate::{
    handlers::oauth_handlers::CallbackState,
    models::session::TokenResponse,
    routes::routes::{CALLBACK_PATH, routes},
    services::session_service::TokenRevoker,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::{Client, Url};
use sha2::{Digest, Sha256};
use std::io;
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
pub const SCOPES: &str = "https://www.googleapis.com/auth/drive.file https://www.googleapis.com/auth/drive.metadata.readonly";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authorization refused: {0}")]
    Denied(String),
    #[error("redirect carried no authorization code")]
    MissingCode,
    #[error("sign-in listener stopped before a code arrived")]
    Abandoned,
    #[error("token endpoint answered {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Endpoints and client credentials used for sign-in.
#[derive(Clone, Debug)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    /// Loopback port for the redirect; 0 picks a free one.
    pub redirect_port: u16,
}

#[derive(Clone)]
pub struct OAuthService {
    client: Client,
    settings: OAuthSettings,
}

/// A started sign-in waiting for the browser redirect.
pub struct PendingSignIn {
    /// URL the user must open.
    pub authorize_url: Url,
    pub redirect_uri: String,
    pub state: String,
    verifier: String,
    code_rx: oneshot::Receiver<Result<String, OAuthError>>,
    shutdown_tx: oneshot::Sender<()>,
    service: OAuthService,
}

impl OAuthService {
    pub fn new(settings: OAuthSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Bind the callback listener and build the authorization URL.
    pub async fn begin(&self) -> Result<PendingSignIn, OAuthError> {
        let listener = TcpListener::bind(("127.0.0.1", self.settings.redirect_port)).await?;
        let addr = listener.local_addr()?;
        let redirect_uri = format!("http://{}{}", addr, CALLBACK_PATH);

        let state = Uuid::new_v4().simple().to_string();
        let verifier = code_verifier();
        let authorize_url = Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state.as_str()),
                ("code_challenge", code_challenge(&verifier).as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|err| OAuthError::InvalidUrl(format!("{}: {}", self.settings.auth_url, err)))?;

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = routes().with_state(CallbackState::new(state.clone(), code_tx));
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(err) = result {
                warn!("sign-in listener failed: {}", err);
            }
        });

        info!("waiting for sign-in redirect on {}", redirect_uri);
        Ok(PendingSignIn {
            authorize_url,
            redirect_uri,
            state,
            verifier,
            code_rx,
            shutdown_tx,
            service: self.clone(),
        })
    }

    /// Trade an authorization code for a token grant.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("code_verifier", verifier),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(secret) = self.settings.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        debug!("exchanging authorization code at {}", self.settings.token_url);
        let response = self
            .client
            .post(&self.settings.token_url)
            .form(&form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}

#[async_trait]
impl TokenRevoker for OAuthService {
    async fn revoke(&self, token: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.settings.revoke_url)
            .form(&[("token", token)])
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("revoke endpoint answered {}", response.status());
        }
        debug!("token revoked");
        Ok(())
    }
}

impl PendingSignIn {
    /// Wait for the redirect, stop the listener and exchange the code.
    pub async fn finish(self) -> Result<TokenResponse, OAuthError> {
        let outcome = self.code_rx.await.unwrap_or(Err(OAuthError::Abandoned));
        let _ = self.shutdown_tx.send(());

        let code = outcome?;
        self.service
            .exchange_code(&code, &self.verifier, &self.redirect_uri)
            .await
    }
}

/// 64 characters from the unreserved set, as PKCE requires.
fn code_verifier() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
