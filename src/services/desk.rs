//! src/services/desk.rs
//!
//! Desk: the application context. Owns the configuration, the session, the
//! drive client and the open document, and is the only place where they
//! meet: the session hands its token to the drive client, a rejected token
//! signs the session out, and a confirmed create records the new file id.

use crate::{
    config::{AppConfig, ConfigError, DriveConfig},
    models::{
        document::Document,
        remote_file::{Folder, RemoteFile},
        session::{SessionState, TokenResponse},
    },
    services::{
        clock::SystemClock,
        drive_service::{DriveError, DriveService, SaveRequest},
        folder_picker::FolderPicker,
        local_store::{LocalStore, StoreError},
        oauth_service::{OAuthError, OAuthService, OAuthSettings},
        session_service::{SessionError, SessionService},
    },
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("no drive configuration found; run `archiedesk config set` first")]
    ConfigMissing,
    #[error("not signed in")]
    NotSignedIn,
    #[error("the drive rejected the session; sign in again")]
    Unauthorized,
    #[error("no document is open")]
    NoDocument,
    #[error(transparent)]
    Drive(#[from] DriveError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

pub type DeskResult<T> = Result<T, DeskError>;

pub struct Desk {
    store: LocalStore,
    config: DriveConfig,
    session: SessionService,
    drive: DriveService,
    document: Option<Document>,
    /// Drive id of the open document; set only once the drive confirmed it.
    current_file_id: Option<String>,
}

impl Desk {
    pub fn new(
        store: LocalStore,
        config: DriveConfig,
        session: SessionService,
        drive: DriveService,
    ) -> Self {
        Self {
            store,
            config,
            session,
            drive,
            document: None,
            current_file_id: None,
        }
    }

    /// Build the production desk from the persisted configuration and
    /// restore any saved session.
    pub async fn bootstrap(app: &AppConfig, store: LocalStore) -> DeskResult<Self> {
        let config = DriveConfig::load(&store)
            .await?
            .ok_or(DeskError::ConfigMissing)?;

        let oauth = Arc::new(OAuthService::new(Self::oauth_settings(app, &config)));
        let session = SessionService::new(store.clone(), Arc::new(SystemClock)).with_revoker(oauth);
        let drive = DriveService::new(app.drive_api_url.clone(), Some(config.api_key.clone()));

        let mut desk = Self::new(store, config, session, drive);
        desk.init().await;
        Ok(desk)
    }

    pub fn oauth_settings(app: &AppConfig, config: &DriveConfig) -> OAuthSettings {
        OAuthSettings {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: app.oauth_auth_url.clone(),
            token_url: app.oauth_token_url.clone(),
            revoke_url: app.oauth_revoke_url.clone(),
            redirect_port: app.redirect_port,
        }
    }

    /// Restore the persisted session and arm the drive client with it.
    pub async fn init(&mut self) -> &SessionState {
        let token = self.session.restore().await.token().map(str::to_owned);
        self.drive.set_token(token);
        self.session.state()
    }

    /// Drop the open document.
    pub fn teardown(&mut self) {
        self.document = None;
        self.current_file_id = None;
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn drive(&self) -> &DriveService {
        &self.drive
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn current_file_id(&self) -> Option<&str> {
        self.current_file_id.as_deref()
    }

    pub async fn complete_sign_in(&mut self, grant: &TokenResponse) -> DeskResult<()> {
        let token = self.session.save(grant).await?.token().map(str::to_owned);
        self.drive.set_token(token);
        info!("signed in");
        Ok(())
    }

    pub async fn sign_out(&mut self) {
        self.session.sign_out().await;
        self.drive.set_token(None);
    }

    /// Session check before any drive call; an expired session is dropped.
    pub async fn is_ready(&mut self) -> bool {
        let ready = self.session.is_ready().await;
        if !ready {
            self.drive.set_token(None);
        }
        ready
    }

    async fn require_ready(&mut self) -> DeskResult<()> {
        if self.is_ready().await {
            Ok(())
        } else {
            Err(DeskError::NotSignedIn)
        }
    }

    /// Store `folder` (or the drive root for `None`) as the documents folder.
    pub async fn set_folder(&mut self, folder: Option<Folder>) -> DeskResult<()> {
        let mut config = self.config.clone();
        match folder {
            Some(folder) => {
                config.folder_id = Some(folder.id);
                config.folder_name = Some(folder.name);
            }
            None => {
                config.folder_id = None;
                config.folder_name = None;
            }
        }
        self.config = config.save(&self.store).await?;
        info!("documents folder set to {}", self.config.folder_label());
        Ok(())
    }

    /// Documents of the configured folder, newest first.
    pub async fn refresh_projects(&mut self) -> DeskResult<Vec<RemoteFile>> {
        self.require_ready().await?;
        let folder = self.config.folder_id.clone();
        let result = self.drive.list_documents(folder.as_deref()).await;
        self.listing_outcome(result).await
    }

    /// Sub-folders of the picker's current folder.
    pub async fn list_folders(&mut self, picker: &FolderPicker) -> DeskResult<Vec<Folder>> {
        self.require_ready().await?;
        let result = picker.load(&self.drive).await;
        self.listing_outcome(result).await
    }

    async fn listing_outcome<T>(&mut self, result: Result<T, DriveError>) -> DeskResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(DriveError::Unauthorized) => {
                warn!("drive rejected the token, signing out");
                self.sign_out().await;
                Err(DeskError::Unauthorized)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Start a new, unsaved document from the template.
    pub fn new_document(&mut self) -> &Document {
        self.current_file_id = None;
        self.document.insert(Document::from_template())
    }

    /// Load a document buffer that did not come from the drive listing,
    /// optionally bound to an existing drive file.
    pub fn load(&mut self, text: impl Into<String>, file_id: Option<String>) -> &Document {
        self.current_file_id = file_id;
        self.document.insert(Document::new(text))
    }

    /// Download a drive document and make it the open one.
    pub async fn open(&mut self, file_id: &str) -> DeskResult<&Document> {
        self.require_ready().await?;
        let content = self.drive.get_content(file_id).await.inspect_err(|err| {
            error!("could not open {}: {}", file_id, err);
        })?;
        self.current_file_id = Some(file_id.to_string());
        Ok(self.document.insert(Document::new(content)))
    }

    /// Replace the open document's text.
    pub fn edit(&mut self, text: impl Into<String>) -> DeskResult<()> {
        self.document
            .as_mut()
            .ok_or(DeskError::NoDocument)?
            .set_text(text);
        Ok(())
    }

    pub fn toggle_obsolete(&mut self) -> DeskResult<bool> {
        Ok(self
            .document
            .as_mut()
            .ok_or(DeskError::NoDocument)?
            .toggle_obsolete())
    }

    /// Upload the open document: update when it has a drive id, create in
    /// the configured folder otherwise.
    pub async fn save(&mut self) -> DeskResult<RemoteFile> {
        self.require_ready().await?;
        let document = self.document.as_ref().ok_or(DeskError::NoDocument)?;
        let meta = document.metadata();
        let request = SaveRequest {
            file_id: self.current_file_id.clone(),
            name: meta.file_name(),
            content: document.text().to_string(),
            parent_folder: self.config.folder_id.clone(),
            properties: Some(meta.properties()),
        };

        info!(
            "saving {} to {}",
            request.name,
            self.config.folder_id.as_deref().unwrap_or("root")
        );
        let saved = self.drive.save(request).await.inspect_err(|err| {
            error!("save failed: {}", err);
        })?;

        if self.current_file_id.is_none() {
            self.current_file_id = Some(saved.id.clone());
        }
        Ok(saved)
    }
}
