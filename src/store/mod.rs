//! Store collaborator: the persistence interface the CRUD executor calls.
//!
//! Rows travel as JSON objects keyed by column name. Every call is independent;
//! implementations acquire whatever handle they need per call and release it on
//! every exit path.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::TableSchema;
use crate::error::StoreError;
use crate::pagination::PageWindow;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row, keyed by column name.
pub type Record = Map<String, Value>;

/// Equality constraint on one column, e.g. a child's foreign key.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter {
            column: column.into(),
            value: value.into(),
        }
    }

    fn matches(&self, row: &Record) -> bool {
        row.get(&self.column).is_some_and(|v| v == &self.value)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Point lookup by primary key.
    async fn fetch(&self, table: &TableSchema, id: i64) -> Result<Option<Record>, StoreError>;

    /// Rows matching `filter`, ordered by primary key, restricted to `window`.
    async fn list(
        &self,
        table: &TableSchema,
        filter: Option<&Filter>,
        window: PageWindow,
    ) -> Result<Vec<Record>, StoreError>;

    /// Number of rows matching `filter` (all rows when None).
    async fn count(&self, table: &TableSchema, filter: Option<&Filter>) -> Result<u64, StoreError>;

    /// Insert one row and return it as stored (server-assigned id included).
    async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Record, StoreError>;

    /// Overwrite the given columns of one row. None when the id is absent.
    async fn update(&self, table: &TableSchema, id: i64, changes: &Record) -> Result<Option<Record>, StoreError>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}
