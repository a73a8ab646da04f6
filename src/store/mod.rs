//! Reading Store port and its adapters.
//!
//! The pipeline and the query service only see [`ReadingStore`]; the binary
//! picks the adapter (`STORE_BACKEND=postgres|memory`) at startup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{errors::StoreError, models::Reading};

mod memory;
mod postgres;

pub use memory::MemoryReadingStore;
pub use postgres::PgReadingStore;

// ---

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Insert a new reading and return it with its store-generated id.
    async fn save(&self, reading: Reading) -> Result<Reading, StoreError>;

    async fn exists_by_object_id(&self, object_id: i64) -> Result<bool, StoreError>;

    async fn exists_by_object_id_and_timestamp(
        &self,
        object_id: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn find_all(&self) -> Result<Vec<Reading>, StoreError>;

    /// Most recent reading by timestamp; readings without one sort last.
    async fn find_latest_by_timestamp(&self) -> Result<Option<Reading>, StoreError>;

    /// Remove every reading, returning how many were deleted.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}

pub type SharedStore = Arc<dyn ReadingStore>;
