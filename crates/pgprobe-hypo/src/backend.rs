//! What-if index capability

use async_trait::async_trait;
use pgprobe_core::Result;
use serde::{Deserialize, Serialize};

/// A registered hypothetical index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypoIndexHandle {
    /// Object id assigned by the backend
    pub oid: i64,
    /// Index name as it appears in `Index Name` of later plans
    pub name: String,
}

impl HypoIndexHandle {
    /// Returns true if a plan's `Index Name` refers to this index.
    ///
    /// hypopg names its indexes `<oid>method_table_columns`, so the oid
    /// marker alone is enough.
    pub fn is_named_by(&self, index_name: &str) -> bool {
        index_name == self.name || index_name.contains(&format!("<{}>", self.oid))
    }
}

/// A database that can plan queries against indexes that do not exist.
///
/// Implementations must scope hypothetical indexes to the session they were
/// created in.
#[async_trait]
pub trait HypoIndexBackend: Send + Sync {
    /// EXPLAIN (FORMAT JSON) without executing
    async fn explain(&self, sql: &str) -> Result<serde_json::Value>;

    /// Registers `ddl` (a `CREATE INDEX` statement) as a hypothetical index
    async fn create_hypothetical_index(&self, ddl: &str) -> Result<HypoIndexHandle>;

    async fn drop_hypothetical_index(&self, handle: &HypoIndexHandle) -> Result<()>;
}
