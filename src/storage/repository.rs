//! Typed access to pipeline records over any [`RecordStore`].
//!
//! Every write path maps failures to `StoreWrite`, which the orchestrator
//! treats as fatal for the job.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::storage::record::{Fields, Filter, Record, SharedStore, Table};
use crate::types::{
    Assessment, CandidateId, CandidateRecord, Job, JobId, JobStatus, ParsedDocument, Progress,
    RelevanceScore, Result, ResultExt, ResultSet, SiftError, SourceUnit,
};

#[derive(Clone)]
pub struct JobRepository {
    store: SharedStore,
}

fn encode<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(SiftError::Storage(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn decode<T: DeserializeOwned>(record: Record) -> Result<T> {
    let mut fields = record.fields;
    fields.insert("id".to_string(), Value::String(record.id));
    Ok(serde_json::from_value(Value::Object(fields))?)
}

fn patch(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

impl JobRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    async fn insert<T: Serialize + DeserializeOwned>(&self, table: Table, value: &T) -> Result<T> {
        let fields = encode(value).store_context(table.as_str())?;
        let record = self
            .store
            .insert(table, fields)
            .await
            .store_context(table.as_str())?;
        decode(record)
    }

    async fn select<T: DeserializeOwned>(&self, table: Table, filter: &Filter) -> Result<Vec<T>> {
        self.store
            .select(table, filter)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<()> {
        self.store
            .update(table, id, fields)
            .await
            .store_context(table.as_str())
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    pub async fn create_job(&self, job: &Job) -> Result<Job> {
        self.insert(Table::Jobs, job).await
    }

    pub async fn load_job(&self, job_id: &JobId) -> Result<Job> {
        self.select::<Job>(Table::Jobs, &Filter::eq("id", job_id.as_str()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SiftError::JobNotFound(job_id.to_string()))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        self.select(Table::Jobs, &Filter::all()).await
    }

    /// A stored terminal status is final. Writing the same terminal status
    /// again is skipped; moving away from it is refused.
    async fn status_writable(&self, job_id: &JobId, next: JobStatus) -> Result<bool> {
        let stored = self.load_job(job_id).await?.status;
        if !stored.is_terminal() {
            return Ok(true);
        }
        if stored == next {
            return Ok(false);
        }
        match stored {
            JobStatus::Cancelled => Err(SiftError::Cancelled(job_id.to_string())),
            _ => Err(SiftError::InvalidTransition {
                from: stored.to_string(),
                to: next.to_string(),
            }),
        }
    }

    /// Write status and progress together
    pub async fn write_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        progress: &Progress,
    ) -> Result<()> {
        if !self.status_writable(job_id, status).await? {
            return Ok(());
        }
        self.update(
            Table::Jobs,
            job_id.as_str(),
            patch(json!({
                "status": status,
                "progress": progress,
                "updated_at": Utc::now(),
            })),
        )
        .await
    }

    pub async fn write_progress(&self, job_id: &JobId, progress: &Progress) -> Result<()> {
        self.update(
            Table::Jobs,
            job_id.as_str(),
            patch(json!({ "progress": progress, "updated_at": Utc::now() })),
        )
        .await
    }

    pub async fn write_failure(&self, job_id: &JobId, error_log: &str) -> Result<()> {
        if !self.status_writable(job_id, JobStatus::Failed).await? {
            return Ok(());
        }
        self.update(
            Table::Jobs,
            job_id.as_str(),
            patch(json!({
                "status": JobStatus::Failed,
                "error_log": error_log,
                "updated_at": Utc::now(),
            })),
        )
        .await
    }

    /// Mark an out-of-process cancel request; the owning orchestrator acts on it.
    pub async fn request_cancel(&self, job_id: &JobId) -> Result<()> {
        self.update(
            Table::Jobs,
            job_id.as_str(),
            patch(json!({ "cancel_requested": true, "updated_at": Utc::now() })),
        )
        .await
    }

    // =========================================================================
    // Source Units
    // =========================================================================

    pub async fn add_source_unit(&self, unit: &SourceUnit) -> Result<SourceUnit> {
        self.insert(Table::SourceUnits, unit).await
    }

    pub async fn source_units(&self, job_id: &JobId) -> Result<Vec<SourceUnit>> {
        let mut units: Vec<SourceUnit> = self
            .select(Table::SourceUnits, &Filter::eq("job_id", job_id.as_str()))
            .await?;
        units.sort_by_key(|u| u.position);
        Ok(units)
    }

    pub async fn attach_parse_output(&self, unit_id: &str, parsed: &ParsedDocument) -> Result<()> {
        self.update(
            Table::SourceUnits,
            unit_id,
            patch(json!({ "parse_output": parsed })),
        )
        .await
    }

    // =========================================================================
    // Candidates
    // =========================================================================

    pub async fn insert_candidate(&self, candidate: &CandidateRecord) -> Result<CandidateRecord> {
        self.insert(Table::Candidates, candidate).await
    }

    pub async fn candidates(&self, job_id: &JobId) -> Result<Vec<CandidateRecord>> {
        let mut candidates: Vec<CandidateRecord> = self
            .select(Table::Candidates, &Filter::eq("job_id", job_id.as_str()))
            .await?;
        candidates.sort_by_key(|c| c.extraction_order);
        Ok(candidates)
    }

    /// Attach the filtering annotation; extraction fields are left untouched.
    pub async fn set_relevance(
        &self,
        candidate_id: &CandidateId,
        relevance: &RelevanceScore,
    ) -> Result<()> {
        self.update(
            Table::Candidates,
            candidate_id.as_str(),
            patch(json!({ "relevance": relevance })),
        )
        .await
    }

    // =========================================================================
    // Assessments & Results
    // =========================================================================

    pub async fn insert_assessment(&self, assessment: &Assessment) -> Result<Assessment> {
        self.insert(Table::Assessments, assessment).await
    }

    pub async fn assessments(&self, job_id: &JobId) -> Result<Vec<Assessment>> {
        self.select(Table::Assessments, &Filter::eq("job_id", job_id.as_str()))
            .await
    }

    pub async fn insert_result_set(&self, results: &ResultSet) -> Result<ResultSet> {
        self.insert(Table::ResultSets, results).await
    }

    pub async fn result_set(&self, job_id: &JobId) -> Result<Option<ResultSet>> {
        Ok(self
            .select::<ResultSet>(Table::ResultSets, &Filter::eq("job_id", job_id.as_str()))
            .await?
            .into_iter()
            .last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, MemoryStore};
    use crate::types::{
        CandidateMetadata, CandidateProfile, FundingAsk, InvestmentThesis, SourceKind,
    };
    use proptest::prelude::*;
    use std::sync::Arc;

    fn memory_repo() -> (Arc<MemoryStore>, JobRepository) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), JobRepository::new(store))
    }

    fn sample_candidate(job_id: &JobId, order: u32, name: &str) -> CandidateRecord {
        CandidateRecord {
            id: CandidateId::default(),
            job_id: job_id.clone(),
            source_unit_id: Some("unit-1".to_string()),
            extraction_order: order,
            profile: CandidateProfile {
                name: name.to_string(),
                sector: Some("Fintech".to_string()),
                stage: Some("Seed".to_string()),
                geography: None,
                funding_ask: FundingAsk {
                    min: Some(500.0),
                    max: None,
                },
                summary: Some("Payments for SMBs".to_string()),
                product: None,
                website: Some("https://example.com".to_string()),
                metadata: CandidateMetadata {
                    team: vec!["Ana (CEO)".to_string()],
                    traction: Some("$40k MRR".to_string()),
                    claims: vec!["2x conversion".to_string()],
                },
            },
            relevance: None,
        }
    }

    #[tokio::test]
    async fn test_job_lifecycle_writes() {
        let (_, repo) = memory_repo();
        let job = repo
            .create_job(&Job::new(InvestmentThesis::default()))
            .await
            .unwrap();
        assert!(!job.id.is_empty());

        let progress = Progress {
            stage: JobStatus::Parsing,
            percent: 10,
            message: "Parsing".to_string(),
        };
        repo.write_status(&job.id, JobStatus::Parsing, &progress)
            .await
            .unwrap();
        repo.request_cancel(&job.id).await.unwrap();

        let loaded = repo.load_job(&job.id).await.unwrap();
        assert_eq!(loaded.status, JobStatus::Parsing);
        assert_eq!(loaded.progress, progress);
        assert!(loaded.cancel_requested);
        assert_eq!(loaded.thesis, job.thesis);

        repo.write_failure(&job.id, "NoCandidatesExtracted: none")
            .await
            .unwrap();
        let failed = repo.load_job(&job.id).await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, progress);
        assert_eq!(failed.error_log.as_deref(), Some("NoCandidatesExtracted: none"));
    }

    #[tokio::test]
    async fn test_terminal_status_is_never_overwritten() {
        let (_, repo) = memory_repo();
        let job = repo
            .create_job(&Job::new(InvestmentThesis::default()))
            .await
            .unwrap();
        let progress = |stage| Progress {
            stage,
            percent: 10,
            message: String::new(),
        };
        repo.write_status(&job.id, JobStatus::Cancelled, &progress(JobStatus::Cancelled))
            .await
            .unwrap();

        let err = repo
            .write_status(&job.id, JobStatus::Parsing, &progress(JobStatus::Parsing))
            .await
            .unwrap_err();
        assert!(matches!(err, SiftError::Cancelled(_)));
        assert!(matches!(
            repo.write_failure(&job.id, "late").await,
            Err(SiftError::Cancelled(_))
        ));
        repo.write_status(&job.id, JobStatus::Cancelled, &progress(JobStatus::Cancelled))
            .await
            .unwrap();

        let stored = repo.load_job(&job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.error_log.is_none());
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let (_, repo) = memory_repo();
        let err = repo.load_job(&JobId::new("nope")).await.unwrap_err();
        assert!(matches!(err, SiftError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_candidate_round_trip_through_sqlite() {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let repo = JobRepository::new(Arc::new(db));
        let job_id = JobId::new("job-1");

        let inserted = repo
            .insert_candidate(&sample_candidate(&job_id, 0, "Acme Pay"))
            .await
            .unwrap();
        let loaded = repo.candidates(&job_id).await.unwrap();
        assert_eq!(loaded, vec![inserted]);
    }

    #[tokio::test]
    async fn test_relevance_annotation_keeps_profile() {
        let (_, repo) = memory_repo();
        let job_id = JobId::new("job-1");
        let inserted = repo
            .insert_candidate(&sample_candidate(&job_id, 0, "Acme Pay"))
            .await
            .unwrap();

        let relevance = RelevanceScore {
            score: 0.8,
            rationale: "Fits fintech focus".to_string(),
            matches: vec!["sector".to_string()],
            mismatches: vec![],
        };
        repo.set_relevance(&inserted.id, &relevance).await.unwrap();

        let loaded = repo.candidates(&job_id).await.unwrap().remove(0);
        assert_eq!(loaded.profile, inserted.profile);
        assert_eq!(loaded.relevance, Some(relevance));
    }

    #[tokio::test]
    async fn test_source_units_sorted_by_position_and_parse_cached() {
        let (_, repo) = memory_repo();
        let job_id = JobId::new("j");
        for (pos, loc) in [(1, "b.pdf"), (0, "a.pdf")] {
            repo.add_source_unit(&SourceUnit::new(job_id.clone(), pos, SourceKind::Document, loc))
                .await
                .unwrap();
        }
        let units = repo.source_units(&job_id).await.unwrap();
        assert_eq!(units[0].location, "a.pdf");

        let parsed = ParsedDocument {
            plain_text: "hello".to_string(),
            ..Default::default()
        };
        repo.attach_parse_output(&units[0].id, &parsed).await.unwrap();
        let units = repo.source_units(&job_id).await.unwrap();
        assert_eq!(units[0].parse_output.as_ref(), Some(&parsed));
        assert_eq!(units[1].parse_output, None);
    }

    #[tokio::test]
    async fn test_write_failures_are_store_write_errors() {
        let (store, repo) = memory_repo();
        store.fail_writes_to(Table::Candidates);
        let err = repo
            .insert_candidate(&sample_candidate(&JobId::new("j"), 0, "X"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StoreWriteError");
    }

    proptest! {
        #[test]
        fn prop_candidate_round_trip(
            name in "[A-Za-z][A-Za-z0-9 ]{0,20}",
            order in 0u32..1000,
            min in proptest::option::of(0.0f64..1.0e6),
            claims in proptest::collection::vec("[a-z ]{1,12}", 0..4),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let (_, repo) = memory_repo();
                let job_id = JobId::new("job");
                let mut candidate = sample_candidate(&job_id, order, &name);
                candidate.profile.funding_ask.min = min;
                candidate.profile.metadata.claims = claims.clone();

                // Serialize through JSON text as the SQLite store does
                let inserted = repo.insert_candidate(&candidate).await.unwrap();
                let text = serde_json::to_string(&inserted).unwrap();
                let reloaded: CandidateRecord = serde_json::from_str(&text).unwrap();
                let selected = repo.candidates(&job_id).await.unwrap().remove(0);

                assert_eq!(&reloaded, &inserted);
                assert_eq!(&selected, &inserted);
                assert_eq!(selected.profile, candidate.profile);
            });
        }
    }
}
