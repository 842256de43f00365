//! Generic record store contract
//!
//! The pipeline only needs three operations: insert a record and get its id,
//! patch a record by id, and select records by equality on top-level fields.
//! Records are JSON objects; ids are assigned by the store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::types::{Result, SiftError};

/// Record payload: top-level field name to JSON value
pub type Fields = Map<String, Value>;

/// Shared record store handle
pub type SharedStore = Arc<dyn RecordStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Jobs,
    SourceUnits,
    Candidates,
    Assessments,
    ResultSets,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Jobs,
        Table::SourceUnits,
        Table::Candidates,
        Table::Assessments,
        Table::ResultSets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::SourceUnits => "source_units",
            Self::Candidates => "candidates",
            Self::Assessments => "assessments",
            Self::ResultSets => "result_sets",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

/// Conjunction of top-level equality predicates. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(key, value)
    }

    pub fn and(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((key.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Match against a record; `id` is addressable like any other field.
    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(key, expected)| {
            if key == "id" {
                expected.as_str() == Some(record.id.as_str())
            } else {
                record.fields.get(key).unwrap_or(&Value::Null) == expected
            }
        })
    }

    /// Field names must be plain identifiers; they are embedded in SQL JSON paths.
    pub fn validate(&self) -> Result<()> {
        for (key, _) in &self.clauses {
            let valid = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(SiftError::Storage(format!("invalid filter field '{}'", key)));
            }
        }
        Ok(())
    }
}

/// Generic record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record; any `id` in `fields` is replaced by a store-assigned one.
    async fn insert(&self, table: Table, fields: Fields) -> Result<Record>;

    /// Shallow-merge `fields` into an existing record (last writer wins per key).
    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<()>;

    /// Records matching `filter`, in insertion order.
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>>;
}

/// Merge `patch` into `target` key by key.
pub(crate) fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        if key != "id" {
            target.insert(key, value);
        }
    }
}
