//! In-memory record store
//!
//! Same semantics as the SQLite store, kept in a `DashMap` per table. Used for
//! dry runs and tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use crate::storage::record::{Fields, Filter, Record, RecordStore, Table, merge_fields};
use crate::types::{Result, SiftError};

#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<Table, Vec<Record>>,
    failing: DashSet<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert/update on `table` fail.
    pub fn fail_writes_to(&self, table: Table) {
        self.failing.insert(table);
    }

    pub fn len(&self, table: Table) -> usize {
        self.tables.get(&table).map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }

    fn check_writable(&self, table: Table) -> Result<()> {
        if self.failing.contains(&table) {
            Err(SiftError::Storage(format!("{} is not writable", table)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: Table, mut fields: Fields) -> Result<Record> {
        self.check_writable(table)?;
        fields.remove("id");
        let record = Record {
            id: uuid::Uuid::new_v4().to_string(),
            fields,
        };
        self.tables.entry(table).or_default().push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<()> {
        self.check_writable(table)?;
        let mut rows = self.tables.entry(table).or_default();
        let record = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| SiftError::Storage(format!("no {} record with id {}", table, id)))?;
        merge_fields(&mut record.fields, fields);
        Ok(())
    }

    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>> {
        filter.validate()?;
        Ok(self
            .tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}
