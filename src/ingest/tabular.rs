//! Tabular sources: CSV files and Google Sheets links, one candidate per row.
//!
//! Headers are matched against a declarative synonym table once per source:
//! exact matches are claimed first across all fields, then substring matches
//! for the fields still unresolved. A column is never claimed twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::document::SharedFetcher;
use crate::constants::tabular as tabular_constants;
use crate::types::{CandidateMetadata, CandidateProfile, FundingAsk, Result, SiftError};

static SHEET_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(tabular_constants::SHEET_ID_PATTERN).expect("sheet id regex is valid")
});

pub type SharedTabularSource = Arc<dyn TabularSource>;

// =============================================================================
// Synonym Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Sector,
    Stage,
    Geography,
    TicketSize,
    Summary,
    Website,
    PdfLink,
    Team,
    Traction,
    Product,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Sector => "sector",
            Self::Stage => "stage",
            Self::Geography => "geography",
            Self::TicketSize => "ticket_size",
            Self::Summary => "summary",
            Self::Website => "website",
            Self::PdfLink => "pdf_link",
            Self::Team => "team",
            Self::Traction => "traction",
            Self::Product => "product",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical field to accepted header aliases, in resolution order.
pub const HEADER_SYNONYMS: &[(Field, &[&str])] = &[
    (
        Field::Name,
        &["name", "company", "startup", "company name", "startup name", "business name"],
    ),
    (
        Field::Sector,
        &["sector", "industry", "vertical", "category", "domain", "market"],
    ),
    (
        Field::Stage,
        &["stage", "funding stage", "round", "series", "investment stage"],
    ),
    (
        Field::Geography,
        &["geography", "location", "region", "country", "city", "market", "geo"],
    ),
    (
        Field::TicketSize,
        &["ticket_size", "ticket size", "funding", "investment", "amount", "raise", "capital"],
    ),
    (
        Field::Summary,
        &["summary", "description", "about", "overview", "pitch", "brief"],
    ),
    (Field::Website, &["website", "url", "link", "web", "site"]),
    (
        Field::PdfLink,
        &["pdf_link", "pdf link", "deck", "pitch deck", "pdf", "document"],
    ),
    (
        Field::Team,
        &["team", "founders", "founder", "ceo", "leadership"],
    ),
    (
        Field::Traction,
        &["traction", "metrics", "revenue", "users", "growth", "customers"],
    ),
    (
        Field::Product,
        &["product", "solution", "service", "offering", "what we do"],
    ),
];

/// Resolved header positions for one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Self {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .collect();
        let mut claimed = vec![false; normalized.len()];
        let mut columns = HashMap::new();

        for (field, aliases) in HEADER_SYNONYMS {
            let hit = normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && aliases.contains(&h.as_str()));
            if let Some((i, _)) = hit {
                claimed[i] = true;
                columns.insert(*field, i);
            }
        }

        for (field, aliases) in HEADER_SYNONYMS {
            if columns.contains_key(field) {
                continue;
            }
            let hit = normalized.iter().enumerate().find(|(i, h)| {
                !claimed[*i]
                    && !h.is_empty()
                    && aliases
                        .iter()
                        .any(|alias| h.contains(alias) || alias.contains(h.as_str()))
            });
            if let Some((i, _)) = hit {
                claimed[i] = true;
                columns.insert(*field, i);
            }
        }

        Self { columns }
    }

    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// =============================================================================
// Rows
// =============================================================================

/// One data row with cells keyed by canonical field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabularRow {
    /// 0-based position among data rows, used for deterministic ordering
    pub index: u32,
    cells: HashMap<Field, String>,
}

impl TabularRow {
    pub fn new(index: u32, cells: HashMap<Field, String>) -> Self {
        Self { index, cells }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.cells
            .get(&field)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan"))
    }

    pub fn name(&self) -> Option<&str> {
        self.get(Field::Name)
    }

    pub fn pdf_link(&self) -> Option<&str> {
        self.get(Field::PdfLink)
    }

    /// Row-derived profile; used alone or as the fallback under a linked deck.
    pub fn to_profile(&self) -> CandidateProfile {
        let text = |f: Field| self.get(f).map(str::to_string);
        let team = self
            .get(Field::Team)
            .map(|t| {
                t.split([';', '\n'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        CandidateProfile {
            name: text(Field::Name).unwrap_or_default(),
            sector: text(Field::Sector),
            stage: text(Field::Stage),
            geography: text(Field::Geography),
            funding_ask: self
                .get(Field::TicketSize)
                .map(FundingAsk::parse)
                .unwrap_or_default(),
            summary: text(Field::Summary),
            product: text(Field::Product),
            website: text(Field::Website),
            metadata: CandidateMetadata {
                team,
                traction: text(Field::Traction),
                claims: Vec::new(),
            },
        }
    }
}

/// Map parsed CSV records (header first) into rows; nameless rows are skipped.
pub fn rows_from_records(records: Vec<Vec<String>>) -> Result<Vec<TabularRow>> {
    let mut iter = records.into_iter();
    let headers = iter
        .next()
        .ok_or_else(|| SiftError::ingest("sheet", "sheet is empty"))?;
    let map = ColumnMap::resolve(&headers);
    if map.column(Field::Name).is_none() {
        return Err(SiftError::ingest(
            "sheet",
            format!("no name column among headers {:?}", headers),
        ));
    }
    debug!(mapped = map.len(), "Resolved sheet headers");

    let mut rows = Vec::new();
    for (index, record) in iter.enumerate() {
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let cells: HashMap<Field, String> = map
            .columns
            .iter()
            .filter_map(|(field, &col)| record.get(col).map(|v| (*field, v.clone())))
            .collect();
        let row = TabularRow::new(index as u32, cells);
        if row.name().is_none() {
            debug!(row = index, "Skipping row without a name");
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

// =============================================================================
// CSV
// =============================================================================

/// RFC-4180 records: quoted fields, doubled quotes, embedded separators and
/// newlines, CRLF or LF line endings.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }
        match ch {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' => record.push(std::mem::take(&mut field).trim().to_string()),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field).trim().to_string());
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field.trim().to_string());
        records.push(record);
    }
    records
}

// =============================================================================
// Sources
// =============================================================================

#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Fetch and map every data row behind `location`
    async fn rows(&self, location: &str) -> Result<Vec<TabularRow>>;
}

/// Google Sheets id from a sharing URL
pub fn sheet_id(location: &str) -> Option<&str> {
    SHEET_ID_RE
        .captures(location)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// CSV download location for a sheet link; other locations pass through.
pub fn export_location(location: &str) -> String {
    match sheet_id(location) {
        Some(id) => tabular_constants::SHEETS_EXPORT_URL.replace("{id}", id),
        None => location.to_string(),
    }
}

/// CSV over the shared fetcher; Google Sheets links are read via CSV export.
pub struct CsvSource {
    fetcher: SharedFetcher,
}

impl CsvSource {
    pub fn new(fetcher: SharedFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl TabularSource for CsvSource {
    async fn rows(&self, location: &str) -> Result<Vec<TabularRow>> {
        let resolved = export_location(location);
        let bytes = self.fetcher.fetch(&resolved).await?;
        let text = String::from_utf8(bytes)
            .map_err(|_| SiftError::ingest(location, "sheet is not UTF-8 CSV"))?;

        let rows = rows_from_records(parse_csv(&text)).map_err(|e| match e {
            SiftError::Ingest { message, .. } => SiftError::ingest(location, message),
            other => other,
        })?;
        info!(location, rows = rows.len(), "Read tabular source");
        Ok(rows)
    }
}
