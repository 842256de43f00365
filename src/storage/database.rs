//! Database Layer with Connection Pooling and Safe Transactions
//!
//! SQLite-backed [`RecordStore`] featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - Panic-safe transactions with automatic rollback
//! - Version-tracked migrations
//! - WAL mode for optimal read/write performance
//!
//! Each table stores one JSON document per row; blocking SQLite calls run on
//! tokio's blocking pool so the scheduler never stalls on disk I/O.

use std::path::Path;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use crate::constants;
use crate::storage::record::{Fields, Filter, Record, RecordStore, Table, merge_fields};
use crate::types::{Result, SiftError};

const SCHEMA: &str = include_str!("schema.sql");

/// Current schema version for migration tracking
const SCHEMA_VERSION: u32 = 1;

/// Migration definitions
struct Migration {
    version: u32,
    description: &'static str,
    up: &'static str,
}

/// Applied in order to databases created by older builds
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Index records by job",
    up: "CREATE INDEX IF NOT EXISTS idx_candidates_job ON candidates(json_extract(data, '$.job_id'));
         CREATE INDEX IF NOT EXISTS idx_source_units_job ON source_units(json_extract(data, '$.job_id'));",
}];

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 2;
    const MAX_POOL_SIZE: u32 = 16;

    /// clamp(cores, MIN, MAX): the pipeline is I/O bound on the backend, not on SQLite
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        let max_size = cores.clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE);
        Self {
            max_size,
            min_idle: 1,
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open database with connection pooling at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    /// Open database with custom pool configuration.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| SiftError::Storage(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool })
    }

    /// Open an in-memory database for testing or temporary use.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| SiftError::Storage(format!("Failed to create in-memory pool: {}", e)))?;

        Ok(Self { pool })
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA busy_timeout = {};
            "#,
            constants::storage::BUSY_TIMEOUT_MS
        ))?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            SiftError::Storage(format!("Failed to acquire database connection: {}", e))
        })
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        let current_version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        conn.execute_batch(SCHEMA)?;
        drop(conn);

        self.migrate(current_version)?;
        Ok(())
    }

    fn migrate(&self, current_version: u32) -> Result<()> {
        let conn = self.conn()?;

        for migration in MIGRATIONS {
            if migration.version > current_version {
                conn.execute_batch(migration.up).map_err(|e| {
                    SiftError::Storage(format!(
                        "Failed to apply migration {}: {}: {}",
                        migration.version, migration.description, e
                    ))
                })?;

                tracing::debug!(
                    "Applied migration {}: {}",
                    migration.version,
                    migration.description
                );
            }
        }

        if current_version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    /// Get a raw connection for advanced operations.
    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.conn()
    }

    /// Execute a closure inside a transaction; rolled back on error or panic.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&tx)));

        match result {
            Ok(Ok(value)) => {
                tx.commit()?;
                Ok(value)
            }
            // Rolled back on drop
            Ok(Err(e)) => Err(e),
            Err(panic_payload) => {
                let panic_msg = panic_payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "Unknown panic".to_string());

                tracing::error!("Transaction panicked: {}", panic_msg);
                Err(SiftError::Storage(format!(
                    "Transaction panicked: {}",
                    panic_msg
                )))
            }
        }
    }

    // =========================================================================
    // Blocking Record Operations
    // =========================================================================

    fn insert_blocking(&self, table: Table, mut fields: Fields) -> Result<Record> {
        fields.remove("id");
        let id = uuid::Uuid::new_v4().to_string();
        let data = serde_json::to_string(&fields)?;
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                table
            ),
            params![id, data, now],
        )?;

        Ok(Record { id, fields })
    }

    fn update_blocking(&self, table: Table, id: &str, patch: Fields) -> Result<()> {
        self.transaction(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    &format!("SELECT data FROM {} WHERE id = ?1", table),
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(existing) = existing else {
                return Err(SiftError::Storage(format!("no {} record with id {}", table, id)));
            };

            let mut fields: Fields = serde_json::from_str(&existing)?;
            merge_fields(&mut fields, patch);

            conn.execute(
                &format!(
                    "UPDATE {} SET data = ?1, updated_at = ?2 WHERE id = ?3",
                    table
                ),
                params![
                    serde_json::to_string(&fields)?,
                    chrono::Utc::now().to_rfc3339(),
                    id
                ],
            )?;
            Ok(())
        })
    }

    fn select_blocking(&self, table: Table, filter: &Filter) -> Result<Vec<Record>> {
        filter.validate()?;

        let mut sql = format!("SELECT id, data FROM {}", table);
        let mut bindings: Vec<rusqlite::types::Value> = Vec::new();

        for (i, (key, value)) in filter.clauses().iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            let column = if key == "id" {
                "id".to_string()
            } else {
                format!("json_extract(data, '$.{}')", key)
            };
            match to_sql_value(value) {
                Some(bound) => {
                    bindings.push(bound);
                    sql.push_str(&format!("{} = ?{}", column, bindings.len()));
                }
                None => sql.push_str(&format!("{} IS NULL", column)),
            }
        }
        sql.push_str(" ORDER BY seq");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bindings.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, data) = row?;
            let fields: Fields = serde_json::from_str(&data)?;
            records.push(Record { id, fields });
        }
        Ok(records)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Database) -> Result<T> + Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || op(db))
            .await
            .map_err(|e| SiftError::Storage(format!("storage task failed: {}", e)))?
    }
}

/// SQL binding for a JSON filter value; `None` means compare with `IS NULL`.
fn to_sql_value(value: &Value) -> Option<rusqlite::types::Value> {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Sql::Integer(i64::from(*b))),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Sql::Integer(i),
            None => Sql::Real(n.as_f64().unwrap_or_default()),
        }),
        Value::String(s) => Some(Sql::Text(s.clone())),
        other => Some(Sql::Text(other.to_string())),
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn insert(&self, table: Table, fields: Fields) -> Result<Record> {
        self.blocking(move |db| db.insert_blocking(table, fields))
            .await
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |db| db.update_blocking(table, &id, fields))
            .await
    }

    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Record>> {
        let filter = filter.clone();
        self.blocking(move |db| db.select_blocking(table, &filter))
            .await
    }
}
