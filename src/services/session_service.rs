//! src/services/session_service.rs
//!
//! SessionService: keeps the access token and its expiry in the local store
//! and decides whether the desk may talk to the drive. Expiry is detected
//! lazily: an expired session is signed out the next time it is checked.

use crate::models::session::{SessionState, StoredSession, TokenResponse};
use crate::services::{clock::Clock, local_store::LocalStore, local_store::StoreError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Local-store key of the persisted session record.
pub const TOKEN_STORAGE_KEY: &str = "archiedesk_auth_token";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not persist session: {0}")]
    Store(#[from] StoreError),
}

/// Remote channel able to invalidate a token on sign-out.
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    async fn revoke(&self, token: &str) -> anyhow::Result<()>;
}

pub struct SessionService {
    store: LocalStore,
    clock: Arc<dyn Clock>,
    revoker: Option<Arc<dyn TokenRevoker>>,
    state: SessionState,
}

impl SessionService {
    pub fn new(store: LocalStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            revoker: None,
            state: SessionState::NoSession,
        }
    }

    pub fn with_revoker(mut self, revoker: Arc<dyn TokenRevoker>) -> Self {
        self.revoker = Some(revoker);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Record a fresh token grant and mark the session active.
    pub async fn save(&mut self, grant: &TokenResponse) -> Result<&SessionState, SessionError> {
        let session = StoredSession::from_grant(grant, self.clock.now_ms());
        self.store.set_json(TOKEN_STORAGE_KEY, &session).await?;
        info!(
            "session saved, valid for {} min",
            (grant.expires_in - crate::models::session::EXPIRY_MARGIN_SECS) / 60
        );
        self.state = SessionState::Active(session);
        Ok(&self.state)
    }

    /// Reinstate the persisted session if it is still valid.
    ///
    /// Missing records leave the state untouched; expired, malformed or
    /// unreadable ones are cleaned up through [`Self::sign_out`].
    pub async fn restore(&mut self) -> &SessionState {
        let stored = match self.store.get_json::<StoredSession>(TOKEN_STORAGE_KEY).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("no persisted session");
                return &self.state;
            }
            Err(err) => {
                warn!("unreadable session record, discarding: {}", err);
                self.sign_out().await;
                return &self.state;
            }
        };

        let now = self.clock.now_ms();
        if stored.is_valid_at(now) {
            info!(
                "session restored (valid for another {} min)",
                (stored.expiry - now) / 60_000
            );
            self.state = SessionState::Active(stored);
        } else {
            info!("persisted session expired, cleaning up");
            self.sign_out().await;
        }
        &self.state
    }

    /// True only while a session is active and unexpired.
    pub async fn is_ready(&mut self) -> bool {
        let expired = match &self.state {
            SessionState::Active(session) => !session.is_valid_at(self.clock.now_ms()),
            _ => return false,
        };
        if expired {
            info!("session expired");
            self.sign_out().await;
            return false;
        }
        true
    }

    /// Forget the token locally and revoke it remotely when possible.
    ///
    /// Never fails: store and revocation errors are only logged.
    pub async fn sign_out(&mut self) {
        let token = match &self.state {
            SessionState::Active(session) => Some(session.token.clone()),
            _ => None,
        };

        if let (Some(token), Some(revoker)) = (token, self.revoker.as_ref()) {
            if let Err(err) = revoker.revoke(&token).await {
                warn!("token revocation failed (ignored): {:#}", err);
            }
        }

        if let Err(err) = self.store.remove(TOKEN_STORAGE_KEY).await {
            warn!("could not clear persisted session: {}", err);
        }
        self.state = SessionState::SignedOut;
        debug!("signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use tokio::sync::Mutex;

    const T0: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct RecordingRevoker {
        revoked: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TokenRevoker for RecordingRevoker {
        async fn revoke(&self, token: &str) -> anyhow::Result<()> {
            self.revoked.lock().await.push(token.to_string());
            if self.fail {
                anyhow::bail!("revocation endpoint unreachable");
            }
            Ok(())
        }
    }

    fn grant(expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: "tok-1".into(),
            expires_in,
            token_type: Some("Bearer".into()),
            scope: None,
        }
    }

    async fn setup() -> (LocalStore, Arc<ManualClock>, SessionService) {
        let store = LocalStore::in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        let service = SessionService::new(store.clone(), clock.clone());
        (store, clock, service)
    }

    #[tokio::test]
    async fn saved_session_expires_after_margin() {
        let (store, clock, mut service) = setup().await;
        service.save(&grant(120)).await.unwrap();

        let persisted: StoredSession = store.get_json(TOKEN_STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(persisted.token, "tok-1");
        assert_eq!(persisted.expiry, T0 + 60_000);

        clock.advance_secs(59);
        assert!(service.is_ready().await);

        clock.set(T0 + 61_000);
        assert!(!service.is_ready().await);
        assert_eq!(service.state(), &SessionState::SignedOut);
        assert_eq!(store.get(TOKEN_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn not_ready_without_session() {
        let (_store, _clock, mut service) = setup().await;
        assert!(!service.is_ready().await);
        assert_eq!(service.restore().await, &SessionState::NoSession);
    }

    #[tokio::test]
    async fn restore_reinstates_valid_session() {
        let (store, clock, mut first) = setup().await;
        first.save(&grant(3600)).await.unwrap();

        clock.advance_secs(600);
        let mut second = SessionService::new(store, clock);
        let state = second.restore().await;
        assert_eq!(state.token(), Some("tok-1"));
        assert!(second.is_ready().await);
    }

    #[tokio::test]
    async fn restore_discards_expired_session() {
        let (store, clock, mut first) = setup().await;
        first.save(&grant(120)).await.unwrap();

        clock.advance_secs(61);
        let mut second = SessionService::new(store.clone(), clock);
        assert_eq!(second.restore().await, &SessionState::SignedOut);
        assert_eq!(store.get(TOKEN_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn restore_treats_malformed_record_as_absent() {
        let (store, _clock, mut service) = setup().await;
        store.set(TOKEN_STORAGE_KEY, "not json").await.unwrap();

        assert_eq!(service.restore().await, &SessionState::SignedOut);
        assert_eq!(store.get(TOKEN_STORAGE_KEY).await.unwrap(), None);
        assert!(!service.is_ready().await);
    }

    #[tokio::test]
    async fn sign_out_revokes_best_effort() {
        let (store, _clock, service) = setup().await;
        let revoker = Arc::new(RecordingRevoker {
            fail: true,
            ..Default::default()
        });
        let mut service = service.with_revoker(revoker.clone());

        service.save(&grant(3600)).await.unwrap();
        service.sign_out().await;

        assert_eq!(revoker.revoked.lock().await.as_slice(), ["tok-1".to_string()]);
        assert_eq!(service.state(), &SessionState::SignedOut);
        assert_eq!(store.get(TOKEN_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_without_session_skips_revocation() {
        let (_store, _clock, service) = setup().await;
        let revoker = Arc::new(RecordingRevoker::default());
        let mut service = service.with_revoker(revoker.clone());

        service.sign_out().await;
        assert!(revoker.revoked.lock().await.is_empty());
        assert_eq!(service.state(), &SessionState::SignedOut);
    }
}
