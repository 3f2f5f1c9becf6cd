//! Editable document text plus its rendered preview.

use super::metadata::{
    HeaderSpan, Metadata, STATUS_IN_PROGRESS, STATUS_KEY, STATUS_OBSOLETE, key_value,
    status_line,
};
use serde::Serialize;

/// Header prepended by [`Document::toggle_obsolete`] when the text has none.
pub const SYNTHETIC_HEADER: &str = "---\nid: NOUVEAU-FSA\nstatut: OBSOLETE\n---\n";

/// Text loaded by "new document".
pub const NEW_DOCUMENT_TEMPLATE: &str = "---\nid: NOUVEAU-PROJET-001\ntitre_court: \nstatut: EN COURS\n---\n# Nouveau Projet FSA\n\nCommencez à rédiger...\n";

/// Summary card shown above the body when the header names the document.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HeaderCard {
    pub id: String,
    pub titre_court: String,
    /// Upper-cased status; `ACTIF` when the header has none.
    pub badge: String,
    pub obsolete: bool,
}

/// What the preview pane displays.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Preview {
    pub card: Option<HeaderCard>,
    /// Markdown body with the header removed.
    pub body: String,
}

/// In-memory editor buffer.
///
/// Every mutation goes through this type so the preview never drifts from
/// the text.
#[derive(Clone, Debug, Default)]
pub struct Document {
    text: String,
    preview: Preview,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        let mut doc = Self {
            text: text.into(),
            preview: Preview::default(),
        };
        doc.render();
        doc
    }

    pub fn from_template() -> Self {
        Self::new(NEW_DOCUMENT_TEMPLATE)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.render();
    }

    pub fn metadata(&self) -> Metadata {
        Metadata::extract(&self.text)
    }

    pub fn file_name(&self) -> String {
        self.metadata().file_name()
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    /// Text after the header's closing marker line; the whole text when
    /// there is no header.
    pub fn body(&self) -> &str {
        match HeaderSpan::locate(&self.text) {
            Some(span) => {
                let rest = &self.text[span.close_end..];
                rest.strip_prefix('\n').unwrap_or(rest)
            }
            None => &self.text,
        }
    }

    /// Flip the document between obsolete and in progress.
    ///
    /// Returns whether the document is obsolete afterwards.
    pub fn toggle_obsolete(&mut self) -> bool {
        self.text = match HeaderSpan::locate(&self.text) {
            Some(span) => {
                let block = &self.text[span.block.clone()];
                let mut lines: Vec<String> = block.split('\n').map(str::to_owned).collect();

                match status_line(&lines) {
                    Some(idx) => {
                        let current = key_value(&lines[idx], STATUS_KEY).unwrap_or_default();
                        let next = if current.eq_ignore_ascii_case(STATUS_OBSOLETE) {
                            STATUS_IN_PROGRESS
                        } else {
                            STATUS_OBSOLETE
                        };
                        lines[idx] = format!("{STATUS_KEY}: {next}");
                    }
                    None => {
                        while lines.last().is_some_and(|l| l.trim().is_empty()) {
                            lines.pop();
                        }
                        lines.push(format!("{STATUS_KEY}: {STATUS_OBSOLETE}"));
                    }
                }

                format!("---\n{}\n---{}", lines.join("\n"), &self.text[span.close_end..])
            }
            None => format!("{SYNTHETIC_HEADER}{}", self.text),
        };

        self.render();
        self.metadata().is_obsolete()
    }

    /// Rebuild the cached preview from the current text.
    pub fn render(&mut self) {
        let meta = self.metadata();
        let card = (!meta.id.is_empty() || !meta.titre_court.is_empty()).then(|| HeaderCard {
            obsolete: meta.is_obsolete(),
            badge: meta.statut.clone(),
            id: meta.id,
            titre_court: meta.titre_court,
        });

        self.preview = Preview {
            card,
            body: self.body().to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_obsolete_goes_back_to_in_progress() {
        for status in ["OBSOLETE", "obsolete", "Obsolete"] {
            let mut doc = Document::new(format!("---\nid: A\nstatut: {status}\n---\nbody"));
            assert!(!doc.toggle_obsolete());
            assert_eq!(doc.metadata().statut, "EN COURS");
            assert_eq!(doc.text(), "---\nid: A\nstatut: EN COURS\n---\nbody");
        }
    }

    #[test]
    fn toggle_marks_active_document_obsolete() {
        let mut doc = Document::new("---\nid: A\n  statut :  actif\nauteur: x\n---\n\n# T\n");
        assert!(doc.toggle_obsolete());
        assert_eq!(
            doc.text(),
            "---\nid: A\nstatut: OBSOLETE\nauteur: x\n---\n\n# T\n"
        );
    }

    #[test]
    fn toggle_appends_status_when_missing() {
        let mut doc = Document::new("---\nid: A\ntitre_court: T\n\n---\nbody");
        assert!(doc.toggle_obsolete());
        assert_eq!(
            doc.text(),
            "---\nid: A\ntitre_court: T\nstatut: OBSOLETE\n---\nbody"
        );
    }

    #[test]
    fn toggle_fills_empty_header() {
        let mut doc = Document::new("---\n---\nbody");
        assert!(doc.toggle_obsolete());
        assert_eq!(doc.text(), "---\nstatut: OBSOLETE\n---\nbody");
    }

    #[test]
    fn toggle_synthesizes_header_and_keeps_body() {
        for original in ["", "# Titre\n\ntexte", "---\nnot a header", "\n---\nid: X\n---\n"] {
            let mut doc = Document::new(original);
            assert!(doc.toggle_obsolete());
            assert!(doc.text().starts_with(SYNTHETIC_HEADER));
            assert_eq!(doc.body(), original);
            let meta = doc.metadata();
            assert_eq!(meta.id, "NOUVEAU-FSA");
            assert_eq!(meta.statut, "OBSOLETE");
        }
    }

    #[test]
    fn double_toggle_round_trips() {
        for (status, expected) in [("EN COURS", "EN COURS"), ("obsolete", "OBSOLETE")] {
            let mut doc = Document::new(format!("---\nid: A\nstatut: {status}\n---\nx"));
            doc.toggle_obsolete();
            doc.toggle_obsolete();
            assert_eq!(doc.metadata().statut, expected);
        }
    }

    #[test]
    fn active_status_does_not_round_trip() {
        let mut doc = Document::new("---\nstatut: ACTIF\n---\n");
        doc.toggle_obsolete();
        doc.toggle_obsolete();
        assert_eq!(doc.metadata().statut, "EN COURS");
    }

    #[test]
    fn toggle_only_touches_first_status_line() {
        let mut doc = Document::new("---\nstatut: ACTIF\nstatut: OBSOLETE\n---\n");
        assert!(doc.toggle_obsolete());
        assert_eq!(doc.text(), "---\nstatut: OBSOLETE\nstatut: OBSOLETE\n---\n");
    }

    #[test]
    fn toggle_targets_the_line_extraction_reads() {
        let mut doc = Document::new("---\nid: A\nstatut:\nstatut: OBSOLETE\n---\nbody");
        assert!(doc.metadata().is_obsolete());

        assert!(!doc.toggle_obsolete());
        assert_eq!(doc.text(), "---\nid: A\nstatut:\nstatut: EN COURS\n---\nbody");
        assert_eq!(doc.metadata().statut, "EN COURS");
    }

    #[test]
    fn toggle_fills_a_bare_status_line() {
        let mut doc = Document::new("---\nid: A\nstatut:\n---\n");
        assert_eq!(doc.metadata().statut, "ACTIF");
        assert!(doc.toggle_obsolete());
        assert_eq!(doc.text(), "---\nid: A\nstatut: OBSOLETE\n---\n");
    }

    #[test]
    fn template_metadata() {
        let doc = Document::from_template();
        let meta = doc.metadata();
        assert_eq!(meta.id, "NOUVEAU-PROJET-001");
        assert_eq!(meta.titre_court, "");
        assert_eq!(meta.statut, "EN COURS");
        assert_eq!(doc.file_name(), "NOUVEAU-PROJET-001.md");
    }

    #[test]
    fn preview_tracks_mutations() {
        let mut doc = Document::new("# Plain");
        assert_eq!(doc.preview().card, None);
        assert_eq!(doc.preview().body, "# Plain");

        doc.toggle_obsolete();
        let card = doc.preview().card.clone().unwrap();
        assert_eq!(card.id, "NOUVEAU-FSA");
        assert_eq!(card.badge, "OBSOLETE");
        assert!(card.obsolete);
        assert_eq!(doc.preview().body, "# Plain");

        doc.set_text("---\ntitre_court: T\n---\nnew");
        let card = doc.preview().card.clone().unwrap();
        assert_eq!(card.badge, "ACTIF");
        assert!(!card.obsolete);
        assert_eq!(doc.preview().body, "new");
    }
}
