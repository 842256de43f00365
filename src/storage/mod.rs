//! Persistence: the generic record store contract, its SQLite and in-memory
//! implementations, and the typed repository the pipeline talks to.

pub mod database;
pub mod memory;
pub mod record;
pub mod repository;

pub use database::{Database, PoolConfig};
pub use memory::MemoryStore;
pub use record::{Fields, Filter, Record, RecordStore, SharedStore, Table};
pub use repository::JobRepository;
