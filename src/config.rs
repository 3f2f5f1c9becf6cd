use crate::services::{
    drive_service::DEFAULT_API_URL,
    local_store::{LocalStore, StoreError},
    oauth_service::{DEFAULT_AUTH_URL, DEFAULT_REVOKE_URL, DEFAULT_TOKEN_URL},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use thiserror::Error;
use tracing::warn;

/// Local-store key of the drive configuration record.
pub const CONFIG_STORAGE_KEY: &str = "archiedesk_config_v1";

/// Label shown when documents live at the drive root.
pub const ROOT_FOLDER_LABEL: &str = "Racine (Mon Drive)";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub drive_api_url: String,
    pub oauth_auth_url: String,
    pub oauth_token_url: String,
    pub oauth_revoke_url: String,
    pub redirect_port: u16,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Markdown documents with front-matter, stored in Google Drive")]
pub struct Args {
    /// Local database URL (overrides ARCHIEDESK_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Drive API base URL (overrides ARCHIEDESK_DRIVE_API_URL)
    #[arg(long)]
    pub drive_api_url: Option<String>,

    /// Loopback port for the sign-in redirect (overrides ARCHIEDESK_REDIRECT_PORT)
    #[arg(long)]
    pub redirect_port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show or change the drive configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Sign in through the browser
    Signin,
    /// Forget (and revoke) the current session
    Signout,
    /// Print configuration and session state
    Status,
    /// List documents in the configured folder
    List,
    /// Browse folders; each segment is a folder name, `..` or `/` for the root
    Folders {
        path: Vec<String>,
        /// Store the folder reached as the documents folder
        #[arg(long)]
        select: bool,
    },
    /// Write the new-document template to a file
    New { file: PathBuf },
    /// Download a document into a file
    Open { id: String, file: PathBuf },
    /// Print the header card and body of a local file
    Show { file: PathBuf },
    /// Flip a local file between obsolete and in progress
    Toggle { file: PathBuf },
    /// Upload a local file; updates `--id` when given, creates otherwise
    Save {
        file: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    Show,
    Set {
        #[arg(long)]
        api_key: String,
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: Option<String>,
        #[arg(long)]
        folder_id: Option<String>,
        #[arg(long)]
        folder_name: Option<String>,
    },
    /// Point the desk at a folder (empty id = drive root)
    SetFolder {
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Merge `args` over values looked up with `env`, then defaults.
    pub fn resolve(
        args: Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Command)> {
        let env_port = match env("ARCHIEDESK_REDIRECT_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing ARCHIEDESK_REDIRECT_PORT value `{}`", value))?,
            None => 0,
        };

        let cfg = Self {
            database_url: args
                .database_url
                .or_else(|| env("ARCHIEDESK_DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/archiedesk.db".into()),
            drive_api_url: args
                .drive_api_url
                .or_else(|| env("ARCHIEDESK_DRIVE_API_URL"))
                .unwrap_or_else(|| DEFAULT_API_URL.into()),
            oauth_auth_url: env("ARCHIEDESK_OAUTH_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_AUTH_URL.into()),
            oauth_token_url: env("ARCHIEDESK_OAUTH_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.into()),
            oauth_revoke_url: env("ARCHIEDESK_OAUTH_REVOKE_URL")
                .unwrap_or_else(|| DEFAULT_REVOKE_URL.into()),
            redirect_port: args.redirect_port.unwrap_or(env_port),
        };

        Ok((cfg, args.command))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api key and client id are both required")]
    MissingCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drive credentials and target folder, persisted in the local store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveConfig {
    pub api_key: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

impl DriveConfig {
    /// Read the record; a malformed one counts as missing.
    pub async fn load(store: &LocalStore) -> Result<Option<Self>, StoreError> {
        match store.get_json::<Self>(CONFIG_STORAGE_KEY).await {
            Ok(config) => Ok(config),
            Err(StoreError::Json { source, .. }) => {
                warn!("ignoring malformed configuration record: {}", source);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Trim fields, drop empty optionals and persist.
    pub async fn save(mut self, store: &LocalStore) -> Result<Self, ConfigError> {
        self.api_key = self.api_key.trim().to_string();
        self.client_id = self.client_id.trim().to_string();
        if self.api_key.is_empty() || self.client_id.is_empty() {
            return Err(ConfigError::MissingCredentials);
        }
        self.client_secret = non_empty(self.client_secret);
        self.folder_id = non_empty(self.folder_id);
        self.folder_name = non_empty(self.folder_name);

        store.set_json(CONFIG_STORAGE_KEY, &self).await?;
        Ok(self)
    }

    pub fn folder_label(&self) -> &str {
        self.folder_name.as_deref().unwrap_or(ROOT_FOLDER_LABEL)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn args_override_env_and_defaults() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ARCHIEDESK_DATABASE_URL", "sqlite://env.db"),
            ("ARCHIEDESK_REDIRECT_PORT", "9000"),
            ("ARCHIEDESK_OAUTH_TOKEN_URL", "http://localhost/token"),
        ]);
        let lookup = |name: &str| env.get(name).map(|v| v.to_string());

        let (cfg, cmd) = AppConfig::resolve(parse(&["archiedesk", "list"]), lookup).unwrap();
        assert_eq!(cmd, Command::List);
        assert_eq!(cfg.database_url, "sqlite://env.db");
        assert_eq!(cfg.redirect_port, 9000);
        assert_eq!(cfg.oauth_token_url, "http://localhost/token");
        assert_eq!(cfg.drive_api_url, DEFAULT_API_URL);

        let (cfg, _) = AppConfig::resolve(
            parse(&["archiedesk", "--database-url", "sqlite://cli.db", "--redirect-port", "1", "status"]),
            lookup,
        )
        .unwrap();
        assert_eq!(cfg.database_url, "sqlite://cli.db");
        assert_eq!(cfg.redirect_port, 1);
    }

    #[test]
    fn bad_port_is_reported() {
        let result = AppConfig::resolve(parse(&["archiedesk", "status"]), |name| {
            (name == "ARCHIEDESK_REDIRECT_PORT").then(|| "high".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn parses_folder_path() {
        let args = parse(&["archiedesk", "folders", "Projets", "..", "Archives", "--select"]);
        assert_eq!(
            args.command,
            Command::Folders {
                path: vec!["Projets".into(), "..".into(), "Archives".into()],
                select: true
            }
        );
    }

    #[tokio::test]
    async fn drive_config_round_trip() {
        let store = LocalStore::in_memory().await.unwrap();
        assert_eq!(DriveConfig::load(&store).await.unwrap(), None);

        let saved = DriveConfig {
            api_key: " key ".into(),
            client_id: "client".into(),
            client_secret: None,
            folder_id: Some("".into()),
            folder_name: Some("  ".into()),
        }
        .save(&store)
        .await
        .unwrap();
        assert_eq!(saved.api_key, "key");
        assert_eq!(saved.folder_id, None);
        assert_eq!(saved.folder_label(), ROOT_FOLDER_LABEL);

        let raw = store.get(CONFIG_STORAGE_KEY).await.unwrap().unwrap();
        assert_eq!(raw, r#"{"apiKey":"key","clientId":"client"}"#);
        assert_eq!(DriveConfig::load(&store).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn drive_config_requires_credentials() {
        let store = LocalStore::in_memory().await.unwrap();
        let result = DriveConfig {
            api_key: "key".into(),
            client_id: "   ".into(),
            client_secret: None,
            folder_id: None,
            folder_name: None,
        }
        .save(&store)
        .await;
        assert!(matches!(result, Err(ConfigError::MissingCredentials)));
        assert_eq!(store.get(CONFIG_STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_config_counts_as_missing() {
        let store = LocalStore::in_memory().await.unwrap();
        store.set(CONFIG_STORAGE_KEY, "[1,2").await.unwrap();
        assert_eq!(DriveConfig::load(&store).await.unwrap(), None);
    }
}
