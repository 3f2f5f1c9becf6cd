//! Records returned by the drive's file listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Markdown document stored in the drive.
///
/// Only the listing fields are kept; content is fetched separately.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Drive file identifier.
    pub id: String,

    /// File name, usually `<id>.md`.
    pub name: String,

    /// Last modification reported by the drive.
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,

    /// Header fields mirrored at save time.
    #[serde(default)]
    pub properties: Option<BTreeMap<String, String>>,
}

impl RemoteFile {
    /// Name without the `.md` suffix, as shown on project cards.
    pub fn display_name(&self) -> &str {
        self.name.strip_suffix(".md").unwrap_or(&self.name)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.as_ref()?.get(key).map(String::as_str)
    }
}

/// A drive folder, as listed by the folder picker.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// Envelope of a `files.list` response.
#[derive(Deserialize, Debug)]
pub(crate) struct FileList<T> {
    #[serde(default = "Vec::new")]
    pub files: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_listing_entry() {
        let json = r#"{
            "files": [
                {"id": "f1", "name": "PRJ-1.md", "modifiedTime": "2024-05-01T10:00:00.000Z",
                 "properties": {"statut": "OBSOLETE"}},
                {"id": "f2", "name": "notes"}
            ]
        }"#;
        let list: FileList<RemoteFile> = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 2);
        assert_eq!(list.files[0].display_name(), "PRJ-1");
        assert_eq!(list.files[0].property("statut"), Some("OBSOLETE"));
        assert!(list.files[0].modified_time.is_some());
        assert_eq!(list.files[1].display_name(), "notes");
        assert_eq!(list.files[1].property("statut"), None);
    }

    #[test]
    fn empty_listing_has_no_files() {
        let list: FileList<Folder> = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }
}
