//! Source units: the raw inputs attached to a job.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A single document (pitch deck, one-pager)
    Document,
    /// A spreadsheet or CSV; each row is a candidate
    TabularReference,
}

/// One ingested input owned by a job.
///
/// Immutable after creation except for attaching `parse_output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    #[serde(default)]
    pub id: String,
    pub job_id: JobId,
    /// Submission order, used for deterministic extraction ordering
    pub position: u32,
    pub kind: SourceKind,
    /// Local path or remote URL
    pub location: String,
    #[serde(default)]
    pub parse_output: Option<ParsedDocument>,
}

impl SourceUnit {
    pub fn new(job_id: JobId, position: u32, kind: SourceKind, location: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            job_id,
            position,
            kind,
            location: location.into(),
            parse_output: None,
        }
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        let name = self
            .location
            .rsplit(['/', '\\'])
            .find(|s| !s.is_empty())
            .unwrap_or(&self.location);
        format!("#{} {}", self.position, name)
    }
}

/// Plain text, per-page text and tables recovered from a document blob.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub plain_text: String,
    #[serde(default)]
    pub page_texts: Vec<String>,
    /// Each table is a list of rows of cells
    #[serde(default)]
    pub tables: Vec<Vec<Vec<String>>>,
    /// Hex sha256 of the parsed bytes
    #[serde(default)]
    pub content_sha256: String,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.plain_text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_uses_file_name() {
        let unit = SourceUnit::new(
            JobId::new("j1"),
            2,
            SourceKind::Document,
            "/tmp/decks/acme.pdf",
        );
        assert_eq!(unit.label(), "#2 acme.pdf");

        let sheet = SourceUnit::new(
            JobId::new("j1"),
            0,
            SourceKind::TabularReference,
            "https://docs.google.com/spreadsheets/d/abc/",
        );
        assert_eq!(sheet.label(), "#0 abc");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&SourceKind::TabularReference).unwrap();
        assert_eq!(json, "\"tabular_reference\"");
    }
}
