//! Front-matter header model.
//!
//! A document may open with a header block delimited by two lines that are
//! exactly `---`. Inside, each line is `key: value`. Only three keys are
//! modelled (`id`, `titre_court`, `statut`); everything else is kept verbatim
//! in the text and ignored here.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, ops::Range};

pub const HEADER_MARKER: &str = "---";
pub const ID_KEY: &str = "id";
pub const TITLE_KEY: &str = "titre_court";
pub const STATUS_KEY: &str = "statut";

pub const STATUS_ACTIVE: &str = "ACTIF";
pub const STATUS_IN_PROGRESS: &str = "EN COURS";
pub const STATUS_OBSOLETE: &str = "OBSOLETE";

/// File name used when the header carries no `id`.
pub const FALLBACK_FILE_NAME: &str = "FSA_Sans_ID.md";

/// Flat record extracted from a document header.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Storage identifier chosen by the author (not validated).
    pub id: String,

    /// Short display title.
    pub titre_court: String,

    /// Upper-cased status; `ACTIF` when the header has none.
    pub statut: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            id: String::new(),
            titre_court: String::new(),
            statut: STATUS_ACTIVE.to_string(),
        }
    }
}

impl Metadata {
    /// Parse the header of `text`, falling back to defaults for anything
    /// missing.
    ///
    /// When a key appears more than once, the first line carrying a
    /// non-empty value wins. [`Document::toggle_obsolete`] rewrites the same
    /// `statut` line.
    ///
    /// [`Document::toggle_obsolete`]: super::document::Document::toggle_obsolete
    pub fn extract(text: &str) -> Self {
        let mut meta = Self::default();
        let Some(span) = HeaderSpan::locate(text) else {
            return meta;
        };

        let lines: Vec<&str> = text[span.block.clone()].split('\n').collect();
        if let Some(value) = first_value(&lines, ID_KEY) {
            meta.id = value.to_string();
        }
        if let Some(value) = first_value(&lines, TITLE_KEY) {
            meta.titre_court = value.to_string();
        }
        if let Some(value) = status_line(&lines)
            .and_then(|idx| key_value(lines[idx], STATUS_KEY))
            .filter(|v| !v.is_empty())
        {
            meta.statut = value.to_uppercase();
        }
        meta
    }

    pub fn is_obsolete(&self) -> bool {
        self.statut == STATUS_OBSOLETE
    }

    /// Storage file name derived from `id`.
    ///
    /// Every character outside `[A-Za-z0-9_-]` is dropped, so an id made only
    /// of such characters yields the bare `.md`.
    pub fn file_name(&self) -> String {
        if self.id.is_empty() {
            return FALLBACK_FILE_NAME.to_string();
        }
        let safe: String = self
            .id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
            .collect();
        format!("{safe}.md")
    }

    /// Custom properties attached to the remote file so listings can show
    /// header fields without downloading content.
    pub fn properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        if !self.id.is_empty() {
            props.insert(ID_KEY.to_string(), self.id.clone());
        }
        if !self.titre_court.is_empty() {
            props.insert(TITLE_KEY.to_string(), self.titre_court.clone());
        }
        props.insert(STATUS_KEY.to_string(), self.statut.clone());
        props
    }
}

/// Byte offsets of a header block inside a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HeaderSpan {
    /// Lines between the two markers, without the newline before the
    /// closing marker.
    pub block: Range<usize>,

    /// Offset just past the closing `---`.
    pub close_end: usize,
}

impl HeaderSpan {
    /// Find the header at byte 0: an opening `---` line and the first later
    /// line that is exactly `---`.
    pub(crate) fn locate(text: &str) -> Option<Self> {
        let opening = "---\n";
        if !text.starts_with(opening) {
            return None;
        }

        let block_start = opening.len();
        let mut line_start = block_start;
        while line_start <= text.len() {
            let line_end = text[line_start..]
                .find('\n')
                .map(|i| line_start + i)
                .unwrap_or(text.len());
            if &text[line_start..line_end] == HEADER_MARKER {
                let block_end = if line_start == block_start {
                    block_start
                } else {
                    line_start - 1
                };
                return Some(Self {
                    block: block_start..block_end,
                    close_end: line_end,
                });
            }
            if line_end == text.len() {
                break;
            }
            line_start = line_end + 1;
        }
        None
    }
}

/// Match `key : value` with optional surrounding whitespace, returning the
/// trimmed value.
fn first_value<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    lines
        .iter()
        .find_map(|&line| key_value(line, key).filter(|v| !v.is_empty()))
}

/// Index of the header line that holds the status: the first `statut` line
/// with a value, else the first bare `statut:` line.
pub(crate) fn status_line<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    lines
        .iter()
        .position(|line| key_value(line.as_ref(), STATUS_KEY).is_some_and(|v| !v.is_empty()))
        .or_else(|| {
            lines
                .iter()
                .position(|line| key_value(line.as_ref(), STATUS_KEY).is_some())
        })
}

pub(crate) fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(key)?;
    let rest = rest.trim_start().strip_prefix(':')?;
    Some(rest.trim())
}
