//! Stage 1: source units to candidate records
//!
//! Units are expanded into work items (one per document, one per tabular
//! row), and items run concurrently under the extraction cap. A failing unit
//! or item is logged and dropped; a failing store write aborts the stage.
//! Survivors are re-sorted by (unit position, row index) before they get
//! their extraction order, so ordering is independent of completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::agents::{ExtractionAgent, ExtractionInput};
use crate::config::PipelineConfig;
use crate::ingest::{
    CsvSource, HttpFileFetcher, PdfParser, SharedFetcher, SharedParser, SharedTabularSource,
    TabularRow, parse_blocking,
};
use crate::storage::JobRepository;
use crate::types::{
    CandidateProfile, CandidateRecord, JobId, ParsedDocument, Result, SiftError, SourceKind,
    SourceUnit,
};

/// Collaborators Stage 1 reads sources through
#[derive(Clone)]
pub struct Ingestors {
    pub fetcher: SharedFetcher,
    pub parser: SharedParser,
    pub tabular: SharedTabularSource,
}

impl Ingestors {
    /// HTTP/local fetcher, PDF parser and CSV reader sharing one fetcher
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let fetcher: SharedFetcher = Arc::new(HttpFileFetcher::new(Duration::from_secs(
            config.fetch_timeout_secs,
        ))?);
        Ok(Self {
            tabular: Arc::new(CsvSource::new(fetcher.clone())),
            parser: Arc::new(PdfParser),
            fetcher,
        })
    }
}

enum WorkItem {
    Document(SourceUnit),
    Row {
        unit_id: String,
        position: u32,
        label: String,
        row: TabularRow,
    },
}

struct Extracted {
    position: u32,
    row: u32,
    source_unit_id: String,
    profile: CandidateProfile,
}

pub struct ExtractionStage<'a> {
    pub repo: &'a JobRepository,
    pub agent: &'a ExtractionAgent,
    pub ingestors: &'a Ingestors,
    pub concurrency: usize,
}

/// Store failures end the stage; anything else only drops the item.
fn absorb<T>(result: Result<T>, what: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ SiftError::StoreWrite { .. }) => Err(e),
        Err(e) => {
            warn!(item = what, error = %e, "Dropping source item");
            Ok(None)
        }
    }
}

impl ExtractionStage<'_> {
    pub async fn run(&self, job_id: &JobId, units: Vec<SourceUnit>) -> Result<Vec<CandidateRecord>> {
        let unit_count = units.len();
        let cap = self.concurrency.max(1);

        let expanded: Vec<(String, Result<Vec<WorkItem>>)> = stream::iter(units)
            .map(|unit| async move {
                let label = unit.label();
                (label, self.expand(unit).await)
            })
            .buffer_unordered(cap)
            .collect()
            .await;

        let mut items = Vec::new();
        for (label, result) in expanded {
            if let Some(unit_items) = absorb(result, &label)? {
                items.extend(unit_items);
            }
        }
        debug!(units = unit_count, items = items.len(), "Expanded source units");

        let results: Vec<(String, Result<Extracted>)> = stream::iter(items)
            .map(|item| async move {
                let label = item.label();
                (label, self.extract(item).await)
            })
            .buffer_unordered(cap)
            .collect()
            .await;

        let mut extracted = Vec::new();
        for (label, result) in results {
            if let Some(item) = absorb(result, &label)? {
                extracted.push(item);
            }
        }

        if extracted.is_empty() {
            return Err(SiftError::NoCandidatesExtracted { units: unit_count });
        }

        extracted.sort_by_key(|e| (e.position, e.row));
        let mut candidates = Vec::with_capacity(extracted.len());
        for (order, item) in extracted.into_iter().enumerate() {
            let record = CandidateRecord {
                id: Default::default(),
                job_id: job_id.clone(),
                source_unit_id: Some(item.source_unit_id),
                extraction_order: order as u32,
                profile: item.profile,
                relevance: None,
            };
            candidates.push(self.repo.insert_candidate(&record).await?);
        }

        info!(
            job_id = %job_id,
            units = unit_count,
            candidates = candidates.len(),
            "Extraction complete"
        );
        Ok(candidates)
    }

    async fn expand(&self, unit: SourceUnit) -> Result<Vec<WorkItem>> {
        match unit.kind {
            SourceKind::Document => Ok(vec![WorkItem::Document(unit)]),
            SourceKind::TabularReference => {
                let rows = self.ingestors.tabular.rows(&unit.location).await?;
                let label = unit.label();
                Ok(rows
                    .into_iter()
                    .map(|row| WorkItem::Row {
                        unit_id: unit.id.clone(),
                        position: unit.position,
                        label: format!("{} row {}", label, row.index + 1),
                        row,
                    })
                    .collect())
            }
        }
    }

    async fn extract(&self, item: WorkItem) -> Result<Extracted> {
        match item {
            WorkItem::Document(unit) => {
                let label = unit.label();
                let parsed = self.parsed_output(&unit).await?;
                let profile = self
                    .agent
                    .extract(ExtractionInput {
                        label: &label,
                        text: &parsed.plain_text,
                        tables: &parsed.tables,
                    })
                    .await?;
                Ok(Extracted {
                    position: unit.position,
                    row: 0,
                    source_unit_id: unit.id,
                    profile,
                })
            }
            WorkItem::Row {
                unit_id,
                position,
                label,
                row,
            } => {
                let row_profile = row.to_profile();
                let profile = match row.pdf_link() {
                    Some(link) => match self.linked_profile(link, &label).await {
                        Ok(linked) => linked.merged_over(row_profile),
                        Err(e) => {
                            warn!(item = %label, link, error = %e, "Linked document failed, keeping row data");
                            row_profile
                        }
                    },
                    None => row_profile,
                };
                Ok(Extracted {
                    position,
                    row: row.index,
                    source_unit_id: unit_id,
                    profile,
                })
            }
        }
    }

    /// Parse output for a document unit, computed once and cached on the unit
    async fn parsed_output(&self, unit: &SourceUnit) -> Result<ParsedDocument> {
        if let Some(parsed) = &unit.parse_output {
            return Ok(parsed.clone());
        }
        let bytes = self.ingestors.fetcher.fetch(&unit.location).await?;
        let parsed = parse_blocking(self.ingestors.parser.clone(), bytes)
            .await
            .map_err(|e| e.into_extraction(unit.label()))?;
        self.repo.attach_parse_output(&unit.id, &parsed).await?;
        Ok(parsed)
    }

    async fn linked_profile(&self, link: &str, label: &str) -> Result<CandidateProfile> {
        let bytes = self.ingestors.fetcher.fetch(link).await?;
        let parsed = parse_blocking(self.ingestors.parser.clone(), bytes).await?;
        self.agent
            .extract(ExtractionInput {
                label,
                text: &parsed.plain_text,
                tables: &parsed.tables,
            })
            .await
    }
}

impl WorkItem {
    fn label(&self) -> String {
        match self {
            Self::Document(unit) => unit.label(),
            Self::Row { label, .. } => label.clone(),
        }
    }
}
