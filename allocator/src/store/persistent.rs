//! # SledEntityStore — Persistent Document Store
//!
//! A sled-backed implementation of both [`EntityStore`] and
//! [`CrewDirectory`], used by the admin tool to keep ships, their crews and
//! their Energy Point tokens on disk.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                       | Value                  |
//! |------------|---------------------------|------------------------|
//! | `ships`    | `ship_id` (UTF-8)         | `json(Ship)`           |
//! | `records`  | `parent \0 record_id`     | `json(EmbeddedRecord)` |
//! | `crew`     | `ship_id \0 crew_id`      | `json(CrewMember)`     |
//! | `entities` | `entity_id` (UTF-8)       | `json(EntityRecord)`   |
//!
//! Values are JSON rather than bincode because record `system` payloads are
//! schemaless `serde_json::Value`s.
//!
//! ## Atomicity
//!
//! Bulk creates and bulk updates land as one sled `Batch`: either every
//! record in the call is written or none is.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::{Batch, Db, Tree};

use super::{EmbeddedRecord, EntityStore, RecordPatch, RecordSpec, StoreError, StoreResult};
use crate::crew::{CrewDirectory, CrewMember, EntityRecord};
use crate::token::Ship;

/// Separator between the parent id and the child id in composite keys.
const KEY_SEPARATOR: u8 = 0x00;

fn composite_key(parent: &str, child: &str) -> Vec<u8> {
    let mut key = parent_prefix(parent);
    key.extend_from_slice(child.as_bytes());
    key
}

fn parent_prefix(parent: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(parent.len() + 1);
    prefix.extend_from_slice(parent.as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix
}

/// Ids become key components, so they may not contain the separator.
fn check_id(id: &str) -> StoreResult<()> {
    if id.as_bytes().contains(&KEY_SEPARATOR) {
        return Err(StoreError::InvalidId(id.to_string(), "contains a NUL byte"));
    }
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// SledEntityStore
// ---------------------------------------------------------------------------

/// Persistent ship, crew and token storage.
///
/// Cloning is cheap: sled handles are reference counted, and every clone
/// sees the same data.
#[derive(Debug, Clone)]
pub struct SledEntityStore {
    db: Db,
    ships: Tree,
    records: Tree,
    crew: Tree,
    entities: Tree,
}

impl SledEntityStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a throwaway store that is removed when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            ships: db.open_tree("ships")?,
            records: db.open_tree("records")?,
            crew: db.open_tree("crew")?,
            entities: db.open_tree("entities")?,
            db,
        })
    }

    // -- Ship operations ----------------------------------------------------

    /// Persist (insert or replace) a ship.
    pub fn put_ship(&self, ship: &Ship) -> StoreResult<()> {
        check_id(&ship.id)?;
        self.ships.insert(ship.id.as_bytes(), encode(ship)?)?;
        Ok(())
    }

    /// Retrieve a ship by id.
    pub fn get_ship(&self, id: &str) -> StoreResult<Option<Ship>> {
        self.ships.get(id.as_bytes())?.map(|b| decode(&b)).transpose()
    }

    fn require_ship(&self, id: &str) -> StoreResult<()> {
        if self.ships.contains_key(id.as_bytes())? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("parent entity {id}")))
        }
    }

    // -- Crew operations ----------------------------------------------------

    /// Adds (or replaces) a crew member on a ship.
    pub fn enlist(&self, ship_id: &str, member: &CrewMember) -> StoreResult<()> {
        self.require_ship(ship_id)?;
        check_id(&member.id)?;
        self.crew
            .insert(composite_key(ship_id, &member.id), encode(member)?)?;
        Ok(())
    }

    /// Removes a crew member from a ship. Returns whether they were aboard.
    pub fn discharge(&self, ship_id: &str, crew_id: &str) -> StoreResult<bool> {
        Ok(self.crew.remove(composite_key(ship_id, crew_id))?.is_some())
    }

    /// Persist the permission-bearing entity behind a crew member.
    pub fn put_entity(&self, entity: &EntityRecord) -> StoreResult<()> {
        check_id(&entity.id)?;
        self.entities.insert(entity.id.as_bytes(), encode(entity)?)?;
        Ok(())
    }

    fn read_crew(&self, ship_id: &str) -> StoreResult<Vec<CrewMember>> {
        self.crew
            .scan_prefix(parent_prefix(ship_id))
            .map(|entry| {
                let (_key, value) = entry?;
                decode(&value)
            })
            .collect()
    }

    /// Retrieve the entity behind a crew member, if one was stored.
    pub fn get_entity(&self, id: &str) -> StoreResult<Option<EntityRecord>> {
        self.entities
            .get(id.as_bytes())?
            .map(|b| decode(&b))
            .transpose()
    }

    // -- Record operations --------------------------------------------------

    fn create_records(&self, parent: &str, specs: Vec<RecordSpec>) -> StoreResult<Vec<EmbeddedRecord>> {
        self.require_ship(parent)?;

        let created: Vec<EmbeddedRecord> = specs.into_iter().map(EmbeddedRecord::from_spec).collect();
        let mut batch = Batch::default();
        for record in &created {
            batch.insert(composite_key(parent, &record.id), encode(record)?);
        }
        self.records.apply_batch(batch)?;
        self.db.flush()?;

        Ok(created)
    }

    fn update_records(&self, parent: &str, patches: Vec<RecordPatch>) -> StoreResult<()> {
        self.require_ship(parent)?;

        // Patches to the same record stack on each other, as they would in memory.
        let mut pending: HashMap<Vec<u8>, EmbeddedRecord> = HashMap::new();
        for patch in &patches {
            let key = composite_key(parent, &patch.id);
            let record = match pending.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let bytes = self
                        .records
                        .get(entry.key())?
                        .ok_or_else(|| StoreError::NotFound(format!("record {}", patch.id)))?;
                    entry.insert(decode(&bytes)?)
                }
            };
            record.apply(&patch.system);
        }

        let mut batch = Batch::default();
        for (key, record) in &pending {
            batch.insert(key.as_slice(), encode(record)?);
        }
        self.records.apply_batch(batch)?;
        self.db.flush()?;

        Ok(())
    }

    fn list_records(&self, parent: &str, record_type: &str) -> StoreResult<Vec<EmbeddedRecord>> {
        self.require_ship(parent)?;

        let mut records = Vec::new();
        for entry in self.records.scan_prefix(parent_prefix(parent)) {
            let (_key, value) = entry?;
            let record: EmbeddedRecord = decode(&value)?;
            if record.record_type == record_type {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Runs a blocking sled operation off the async executor.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(SledEntityStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    // -- Utility operations -------------------------------------------------

    /// Number of embedded records of any type stored under `parent`.
    pub fn record_count(&self, parent: &str) -> usize {
        self.records.scan_prefix(parent_prefix(parent)).count()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SledEntityStore {
    async fn create_embedded_records(
        &self,
        parent: &str,
        specs: Vec<RecordSpec>,
    ) -> StoreResult<Vec<EmbeddedRecord>> {
        let parent = parent.to_string();
        self.blocking(move |store| store.create_records(&parent, specs))
            .await
    }

    async fn update_embedded_records(
        &self,
        parent: &str,
        patches: Vec<RecordPatch>,
    ) -> StoreResult<()> {
        let parent = parent.to_string();
        self.blocking(move |store| store.update_records(&parent, patches))
            .await
    }

    async fn list_embedded_records_by_type(
        &self,
        parent: &str,
        record_type: &str,
    ) -> StoreResult<Vec<EmbeddedRecord>> {
        let parent = parent.to_string();
        let record_type = record_type.to_string();
        self.blocking(move |store| store.list_records(&parent, &record_type))
            .await
    }
}

#[async_trait]
impl CrewDirectory for SledEntityStore {
    async fn crew_for_ship(&self, ship_id: &str) -> StoreResult<Vec<CrewMember>> {
        let ship_id = ship_id.to_string();
        self.blocking(move |store| store.read_crew(&ship_id)).await
    }

    async fn entity_by_id(&self, id: &str) -> StoreResult<Option<EntityRecord>> {
        let id = id.to_string();
        self.blocking(move |store| store.get_entity(&id)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
