//! `multipart/related` request bodies for Drive uploads.
//!
//! Drive's multipart upload expects exactly two parts: the JSON metadata of
//! the file, then its content.

use serde::Serialize;
use std::collections::BTreeMap;

/// Boundary shared by every upload request.
pub const BOUNDARY: &str = "-------314159265358979323846";

pub const MARKDOWN_MIME: &str = "text/markdown";
pub const JSON_MIME: &str = "application/json";

/// Metadata part of an upload.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File name shown in the drive.
    pub name: String,

    /// Always `text/markdown` for documents.
    pub mime_type: String,

    /// Target folder; only meaningful when creating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,

    /// Header fields mirrored as custom file properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

/// One part of a related body.
#[derive(Clone, Debug)]
pub struct Part {
    pub content_type: String,
    pub body: String,
}

/// An ordered list of parts joined under [`BOUNDARY`].
#[derive(Clone, Debug, Default)]
pub struct MultipartRelated {
    parts: Vec<Part>,
}

impl MultipartRelated {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn part(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.parts.push(Part {
            content_type: content_type.into(),
            body: body.into(),
        });
        self
    }

    /// Metadata part followed by the Markdown content part.
    pub fn for_upload(metadata: &FileMetadata, content: &str) -> serde_json::Result<Self> {
        Ok(Self::new()
            .part(JSON_MIME, serde_json::to_string(metadata)?)
            .part(MARKDOWN_MIME, content))
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/related; boundary=\"{BOUNDARY}\"")
    }

    pub fn into_body(self) -> String {
        let delimiter = format!("\r\n--{BOUNDARY}\r\n");
        let mut body = String::new();
        for part in self.parts {
            body.push_str(&delimiter);
            body.push_str("Content-Type: ");
            body.push_str(&part.content_type);
            body.push_str("\r\n\r\n");
            body.push_str(&part.body);
        }
        body.push_str(&format!("\r\n--{BOUNDARY}--"));
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_omits_absent_fields() {
        let meta = FileMetadata {
            name: "A.md".into(),
            mime_type: MARKDOWN_MIME.into(),
            parents: None,
            properties: None,
        };
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"name":"A.md","mimeType":"text/markdown"}"#
        );
    }

    #[test]
    fn upload_body_layout() {
        let mut props = BTreeMap::new();
        props.insert("statut".to_string(), "ACTIF".to_string());
        let meta = FileMetadata {
            name: "A.md".into(),
            mime_type: MARKDOWN_MIME.into(),
            parents: Some(vec!["folder-1".into()]),
            properties: Some(props),
        };

        let multipart = MultipartRelated::for_upload(&meta, "# Hello\n").unwrap();
        assert_eq!(
            multipart.content_type(),
            "multipart/related; boundary=\"-------314159265358979323846\""
        );

        let expected = concat!(
            "\r\n---------314159265358979323846\r\n",
            "Content-Type: application/json\r\n\r\n",
            r#"{"name":"A.md","mimeType":"text/markdown","parents":["folder-1"],"properties":{"statut":"ACTIF"}}"#,
            "\r\n---------314159265358979323846\r\n",
            "Content-Type: text/markdown\r\n\r\n",
            "# Hello\n",
            "\r\n---------314159265358979323846--",
        );
        assert_eq!(multipart.into_body(), expected);
    }
}
