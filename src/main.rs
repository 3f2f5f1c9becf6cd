use anyhow::{Context, Result, bail};
use archiedesk::{
    config::{AppConfig, Command, ConfigCommand, DriveConfig},
    models::{document::Document, remote_file::Folder, session::SessionState},
    services::{
        desk::{Desk, DeskError},
        folder_picker::FolderPicker,
        local_store::LocalStore,
        oauth_service::OAuthService,
    },
};
use std::{path::Path, process::ExitCode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;
    tracing::debug!("Starting archiedesk with config: {:?}", cfg);

    // --- Open local store ---
    let store = LocalStore::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening local store {}", cfg.database_url))?;

    match run(&cfg, store, command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if matches!(err.downcast_ref::<DeskError>(), Some(DeskError::ConfigMissing)) => {
            eprintln!("ArchieDesk is not configured yet.");
            eprintln!("Run: archiedesk config set --api-key <KEY> --client-id <CLIENT_ID>");
            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err),
    }
}

async fn run(cfg: &AppConfig, store: LocalStore, command: Command) -> Result<()> {
    match command {
        Command::Config(ConfigCommand::Show) => match DriveConfig::load(&store).await? {
            Some(config) => {
                println!("api key:   {}", mask(&config.api_key));
                println!("client id: {}", config.client_id);
                println!(
                    "folder:    {} ({})",
                    config.folder_label(),
                    config.folder_id.as_deref().unwrap_or("root")
                );
            }
            None => return Err(DeskError::ConfigMissing.into()),
        },
        Command::Config(ConfigCommand::Set {
            api_key,
            client_id,
            client_secret,
            folder_id,
            folder_name,
        }) => {
            let config = DriveConfig {
                api_key,
                client_id,
                client_secret,
                folder_id,
                folder_name,
            }
            .save(&store)
            .await?;
            println!("configuration saved (folder: {})", config.folder_label());
        }
        Command::Config(ConfigCommand::SetFolder { id, name }) => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let folder = (!id.trim().is_empty()).then(|| Folder {
                name: name.unwrap_or_else(|| id.clone()),
                id,
            });
            desk.set_folder(folder).await?;
            println!("documents folder: {}", desk.config().folder_label());
        }
        Command::Signin => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let oauth = OAuthService::new(Desk::oauth_settings(cfg, desk.config()));
            let pending = oauth.begin().await?;
            println!("Open this URL in your browser to sign in:\n\n  {}\n", pending.authorize_url);
            let grant = pending.finish().await?;
            desk.complete_sign_in(&grant).await?;
            println!("signed in");
        }
        Command::Signout => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            desk.sign_out().await;
            println!("signed out");
        }
        Command::Status => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            println!("folder:  {}", desk.config().folder_label());
            let state = match desk.session_state() {
                SessionState::Active(session) => format!(
                    "signed in until {}",
                    chrono::DateTime::from_timestamp_millis(session.expiry)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| session.expiry.to_string())
                ),
                SessionState::NoSession | SessionState::SignedOut => "signed out".to_string(),
            };
            println!("session: {}", state);
            if !desk.is_ready().await {
                println!("run `archiedesk signin` to connect");
            }
        }
        Command::List => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let files = desk.refresh_projects().await?;
            if files.is_empty() {
                println!("no documents in {}", desk.config().folder_label());
            }
            for file in files {
                let modified = file
                    .modified_time
                    .map(|t| t.format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|| "date inconnue".into());
                println!(
                    "{:<36} {:<30} {:<10} {}",
                    file.id,
                    file.display_name(),
                    file.property("statut").unwrap_or("-"),
                    modified
                );
            }
        }
        Command::Folders { path, select } => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let mut picker = FolderPicker::new();
            for segment in &path {
                match segment.as_str() {
                    ".." => {
                        picker.up();
                        continue;
                    }
                    "/" => {
                        picker.open();
                        continue;
                    }
                    _ => {}
                }
                let children = desk.list_folders(&picker).await?;
                match children.into_iter().find(|f| &f.name == segment) {
                    Some(folder) => picker.enter(folder),
                    None => bail!("no folder named `{}` in {}", segment, picker.current().name),
                }
            }

            println!("{}", picker.breadcrumb().join(" / "));
            for folder in desk.list_folders(&picker).await? {
                println!("  {:<36} {}", folder.id, folder.name);
            }

            if select {
                let selection = (!picker.at_root()).then(|| picker.selection());
                desk.set_folder(selection).await?;
                println!("documents folder: {}", desk.config().folder_label());
            }
        }
        Command::New { file } => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let document = desk.new_document();
            write_new(&file, document.text())?;
            println!("{} created ({})", file.display(), document.file_name());
            desk.teardown();
        }
        Command::Open { id, file } => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            let document = desk.open(&id).await?;
            write_new(&file, document.text())?;
            println!("{} downloaded to {}", id, file.display());
            desk.teardown();
        }
        Command::Show { file } => {
            let document = Document::new(read(&file)?);
            let preview = document.preview();
            if let Some(card) = &preview.card {
                println!("[{}] {} | {}", card.badge, or_dash(&card.id), or_dash(&card.titre_court));
                println!();
            }
            print!("{}", preview.body);
        }
        Command::Toggle { file } => {
            let mut document = Document::new(read(&file)?);
            let obsolete = document.toggle_obsolete();
            std::fs::write(&file, document.text())
                .with_context(|| format!("writing {}", file.display()))?;
            println!(
                "{} is now {}",
                file.display(),
                if obsolete { "OBSOLETE" } else { "EN COURS" }
            );
        }
        Command::Save { file, id } => {
            let mut desk = Desk::bootstrap(cfg, store).await?;
            desk.load(read(&file)?, id);
            let saved = desk.save().await?;
            println!("saved {} as {}", saved.name, saved.id);
            desk.teardown();
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_new(path: &Path, text: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}…")
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
