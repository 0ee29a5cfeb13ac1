//! # Entity Store
//!
//! The document-store seam. Ships own *embedded records* (Energy Point
//! tokens among them), and the allocator only ever talks to the store in
//! three bulk shapes: create many, patch many, list by type.
//!
//! ## Record Shape
//!
//! ```text
//! EmbeddedRecord { _id, name, type, system: { ...free-form JSON... } }
//! RecordPatch    { _id, system: { ...fields to overwrite... } }
//! ```
//!
//! Patches are shallow merges: every top-level key in the patch's `system`
//! object replaces the same key on the stored record, everything else is
//! left alone.
//!
//! ## Implementations
//!
//! ```text
//! memory.rs      — InMemoryEntityStore, RwLock<HashMap>, insertion ordered
//! persistent.rs  — SledEntityStore, sled trees + atomic batches
//! ```

mod memory;
mod persistent;

pub use memory::InMemoryEntityStore;
pub use persistent::SledEntityStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur inside an entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("invalid id {0:?}: {1}")]
    InvalidId(String, &'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Record Types
// ---------------------------------------------------------------------------

/// Store-assigned identifier of an embedded record.
pub type RecordId = String;

/// Request to create one embedded record. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub system: Value,
}

/// Partial update of one embedded record's `system` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub system: Value,
}

/// A persisted record attached to a parent entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedRecord {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub system: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddedRecord {
    /// Materializes a creation request with a freshly minted id.
    pub fn from_spec(spec: RecordSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            record_type: spec.record_type,
            system: spec.system,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a patch's `system` payload to this record.
    pub fn apply(&mut self, system: &Value) {
        merge_system(&mut self.system, system);
        self.updated_at = Utc::now();
    }
}

/// Shallow-merges `patch` into `target`.
///
/// Object into object overwrites key by key; any other combination replaces
/// the target wholesale.
pub fn merge_system(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Embedded-record CRUD over a document store.
///
/// Each call is a single attempt. Implementations either apply a bulk call
/// completely or reject it; the allocator never retries.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Creates one record per spec under `parent`, returning them with ids.
    async fn create_embedded_records(
        &self,
        parent: &str,
        specs: Vec<RecordSpec>,
    ) -> StoreResult<Vec<EmbeddedRecord>>;

    /// Applies every patch to the record with the matching id.
    ///
    /// Unknown ids reject the whole call with [`StoreError::NotFound`].
    async fn update_embedded_records(
        &self,
        parent: &str,
        patches: Vec<RecordPatch>,
    ) -> StoreResult<()>;

    /// Lists all records of `record_type` under `parent`, in store order.
    async fn list_embedded_records_by_type(
        &self,
        parent: &str,
        record_type: &str,
    ) -> StoreResult<Vec<EmbeddedRecord>>;
}
