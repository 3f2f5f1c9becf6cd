//! src/services/drive_service.rs
//!
//! DriveService: request builder for the drive's v3 file API. Every method
//! is a single awaited request: no retries, no timeouts, and errors reach
//! the caller unchanged apart from mapping HTTP 401 to `Unauthorized`.

use crate::models::{
    multipart::{FileMetadata, MARKDOWN_MIME, MultipartRelated},
    remote_file::{FileList, Folder, RemoteFile},
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url, header};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error};

pub const DEFAULT_API_URL: &str = "https://www.googleapis.com";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const ROOT_FOLDER_ID: &str = "root";
pub const DEFAULT_DOCUMENT_NAME: &str = "Nouveau FSA.md";
pub const PAGE_SIZE: u32 = 50;

const DOCUMENT_FIELDS: &str = "files(id, name, modifiedTime, properties)";
const FOLDER_FIELDS: &str = "files(id, name)";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("not signed in")]
    NotSignedIn,
    #[error("access token rejected by the drive")]
    Unauthorized,
    #[error("drive answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid drive url: {0}")]
    InvalidUrl(String),
    #[error("could not encode upload metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type DriveResult<T> = Result<T, DriveError>;

/// Inputs of a create-or-update upload.
#[derive(Clone, Debug, Default)]
pub struct SaveRequest {
    /// Existing file to update; `None` creates a new file.
    pub file_id: Option<String>,
    pub name: String,
    pub content: String,
    /// Folder for new files. Ignored on update.
    pub parent_folder: Option<String>,
    pub properties: Option<BTreeMap<String, String>>,
}

#[derive(Clone)]
pub struct DriveService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    token: Option<String>,
}

impl DriveService {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            token: None,
        }
    }

    /// Install (or clear) the bearer token used by every request.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Markdown documents, newest first, optionally inside one folder.
    pub async fn list_documents(&self, folder_id: Option<&str>) -> DriveResult<Vec<RemoteFile>> {
        let query = documents_query(folder_id);
        debug!("listing documents with q={}", query);
        let files = self
            .list::<RemoteFile>(query, DOCUMENT_FIELDS, "modifiedTime desc")
            .await
            .inspect_err(|err| error!("list_documents failed: {}", err))?;
        Ok(files)
    }

    /// Sub-folders of `parent_id`, by name.
    pub async fn list_folders(&self, parent_id: &str) -> DriveResult<Vec<Folder>> {
        let query = folders_query(parent_id);
        debug!("listing folders with q={}", query);
        let folders = self
            .list::<Folder>(query, FOLDER_FIELDS, "name")
            .await
            .inspect_err(|err| error!("list_folders failed: {}", err))?;
        Ok(folders)
    }

    /// Raw content of a file.
    pub async fn get_content(&self, file_id: &str) -> DriveResult<String> {
        let url = self.url(&["drive", "v3", "files", file_id])?;
        let request = self.authorized(self.client.get(url))?.query(&[("alt", "media")]);
        let response = check(request.send().await?)
            .await
            .inspect_err(|err| error!("get_content({}) failed: {}", file_id, err))?;
        Ok(response.text().await?)
    }

    /// Create the file when `file_id` is absent, update it in place otherwise.
    pub async fn save(&self, request: SaveRequest) -> DriveResult<RemoteFile> {
        let name = if request.name.is_empty() {
            DEFAULT_DOCUMENT_NAME.to_string()
        } else {
            request.name
        };
        let parents = match (&request.file_id, request.parent_folder) {
            (None, Some(folder)) if !folder.is_empty() => Some(vec![folder]),
            _ => None,
        };
        let metadata = FileMetadata {
            name,
            mime_type: MARKDOWN_MIME.to_string(),
            parents,
            properties: request.properties,
        };
        let multipart = MultipartRelated::for_upload(&metadata, &request.content)?;

        let builder = match &request.file_id {
            Some(id) => {
                debug!("updating file {} as {}", id, metadata.name);
                self.client
                    .patch(self.url(&["upload", "drive", "v3", "files", id])?)
            }
            None => {
                debug!("creating file {}", metadata.name);
                self.client
                    .post(self.url(&["upload", "drive", "v3", "files"])?)
            }
        };

        let builder = self
            .authorized(builder)?
            .query(&[("uploadType", "multipart")])
            .header(header::CONTENT_TYPE, multipart.content_type())
            .body(multipart.into_body());

        let response = check(builder.send().await?)
            .await
            .inspect_err(|err| error!("save({}) failed: {}", metadata.name, err))?;
        Ok(response.json::<RemoteFile>().await?)
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        query: String,
        fields: &str,
        order_by: &str,
    ) -> DriveResult<Vec<T>> {
        let url = self.url(&["drive", "v3", "files"])?;
        let page_size = PAGE_SIZE.to_string();
        let request = self.authorized(self.client.get(url))?.query(&[
            ("q", query.as_str()),
            ("fields", fields),
            ("orderBy", order_by),
            ("pageSize", page_size.as_str()),
        ]);
        let response = check(request.send().await?).await?;
        Ok(response.json::<FileList<T>>().await?.files)
    }

    /// `base_url` with `segments` appended, each one percent-encoded.
    fn url(&self, segments: &[&str]) -> DriveResult<Url> {
        let invalid = |reason: String| DriveError::InvalidUrl(format!("{}: {}", self.base_url, reason));
        let mut url = Url::parse(&self.base_url).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("not a base url".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> DriveResult<RequestBuilder> {
        let token = self.token.as_deref().ok_or(DriveError::NotSignedIn)?;
        let builder = builder.bearer_auth(token);
        Ok(match &self.api_key {
            Some(key) => builder.query(&[("key", key.as_str())]),
            None => builder,
        })
    }
}

async fn check(response: Response) -> DriveResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(DriveError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriveError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Quote a value for the drive query language.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn documents_query(folder_id: Option<&str>) -> String {
    let mut query = format!("mimeType = {} and trashed = false", quote(MARKDOWN_MIME));
    if let Some(folder) = folder_id.filter(|f| !f.is_empty()) {
        query.push_str(&format!(" and {} in parents", quote(folder)));
    }
    query
}

pub fn folders_query(parent_id: &str) -> String {
    format!(
        "mimeType = {} and {} in parents and trashed = false",
        quote(FOLDER_MIME),
        quote(parent_id)
    )
}
