//! In-memory entity store backed by `RwLock<HashMap>`.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{EmbeddedRecord, EntityStore, RecordPatch, RecordSpec, StoreError, StoreResult};

/// In-memory document store.
///
/// Parents must be registered with [`add_parent`](Self::add_parent) before
/// records can be attached to them. Records are kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    /// Embedded records keyed by parent entity id.
    parents: RwLock<HashMap<String, Vec<EmbeddedRecord>>>,
}

impl InMemoryEntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a parent entity. Registering twice keeps existing records.
    pub fn add_parent(&self, parent: &str) {
        self.parents.write().entry(parent.to_string()).or_default();
    }

    /// Number of records (of any type) attached to `parent`.
    pub fn record_count(&self, parent: &str) -> usize {
        self.parents.read().get(parent).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create_embedded_records(
        &self,
        parent: &str,
        specs: Vec<RecordSpec>,
    ) -> StoreResult<Vec<EmbeddedRecord>> {
        let mut parents = self.parents.write();
        let records = parents
            .get_mut(parent)
            .ok_or_else(|| StoreError::NotFound(format!("parent entity {parent}")))?;

        let created: Vec<EmbeddedRecord> = specs.into_iter().map(EmbeddedRecord::from_spec).collect();
        records.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update_embedded_records(
        &self,
        parent: &str,
        patches: Vec<RecordPatch>,
    ) -> StoreResult<()> {
        let mut parents = self.parents.write();
        let records = parents
            .get_mut(parent)
            .ok_or_else(|| StoreError::NotFound(format!("parent entity {parent}")))?;

        // Validate every id first so a bad patch set leaves nothing half-applied.
        let known: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        if let Some(missing) = patches.iter().find(|p| !known.contains(p.id.as_str())) {
            return Err(StoreError::NotFound(format!("record {}", missing.id)));
        }

        let index: HashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        for patch in &patches {
            records[index[&patch.id]].apply(&patch.system);
        }
        Ok(())
    }

    async fn list_embedded_records_by_type(
        &self,
        parent: &str,
        record_type: &str,
    ) -> StoreResult<Vec<EmbeddedRecord>> {
        let parents = self.parents.read();
        let records = parents
            .get(parent)
            .ok_or_else(|| StoreError::NotFound(format!("parent entity {parent}")))?;

        Ok(records
            .iter()
            .filter(|r| r.record_type == record_type)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(record_type: &str) -> RecordSpec {
        RecordSpec {
            name: "Energy Point".into(),
            record_type: record_type.into(),
            system: json!({ "active": false, "holder": "ship-1" }),
        }
    }

    #[tokio::test]
    async fn create_requires_registered_parent() {
        let store = InMemoryEntityStore::new();
        let result = store
            .create_embedded_records("ship-1", vec![spec("epToken")])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_filters_by_type_in_insertion_order() {
        let store = InMemoryEntityStore::new();
        store.add_parent("ship-1");
        let created = store
            .create_embedded_records(
                "ship-1",
                vec![spec("epToken"), spec("weapon"), spec("epToken")],
            )
            .await
            .unwrap();

        let tokens = store
            .list_embedded_records_by_type("ship-1", "epToken")
            .await
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].id, created[0].id);
        assert_eq!(tokens[1].id, created[2].id);
        assert_eq!(store.record_count("ship-1"), 3);
    }

    #[tokio::test]
    async fn update_merges_system_fields() {
        let store = InMemoryEntityStore::new();
        store.add_parent("ship-1");
        let created = store
            .create_embedded_records("ship-1", vec![spec("epToken")])
            .await
            .unwrap();

        store
            .update_embedded_records(
                "ship-1",
                vec![RecordPatch {
                    id: created[0].id.clone(),
                    system: json!({ "holder": "crew-1" }),
                }],
            )
            .await
            .unwrap();

        let tokens = store
            .list_embedded_records_by_type("ship-1", "epToken")
            .await
            .unwrap();
        assert_eq!(tokens[0].system, json!({ "active": false, "holder": "crew-1" }));
    }

    #[tokio::test]
    async fn repeated_patches_to_one_record_all_apply() {
        let store = InMemoryEntityStore::new();
        store.add_parent("ship-1");
        let created = store
            .create_embedded_records("ship-1", vec![spec("epToken")])
            .await
            .unwrap();
        let id = created[0].id.clone();

        store
            .update_embedded_records(
                "ship-1",
                vec![
                    RecordPatch {
                        id: id.clone(),
                        system: json!({ "active": true }),
                    },
                    RecordPatch {
                        id,
                        system: json!({ "holder": "crew-x" }),
                    },
                ],
            )
            .await
            .unwrap();

        let tokens = store
            .list_embedded_records_by_type("ship-1", "epToken")
            .await
            .unwrap();
        assert_eq!(tokens[0].system, json!({ "active": true, "holder": "crew-x" }));
    }

    #[tokio::test]
    async fn unknown_record_rejects_whole_update() {
        let store = InMemoryEntityStore::new();
        store.add_parent("ship-1");
        let created = store
            .create_embedded_records("ship-1", vec![spec("epToken")])
            .await
            .unwrap();

        let result = store
            .update_embedded_records(
                "ship-1",
                vec![
                    RecordPatch {
                        id: created[0].id.clone(),
                        system: json!({ "active": true }),
                    },
                    RecordPatch {
                        id: "ghost".into(),
                        system: json!({ "active": true }),
                    },
                ],
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        let tokens = store
            .list_embedded_records_by_type("ship-1", "epToken")
            .await
            .unwrap();
        assert_eq!(tokens[0].system["active"], json!(false));
    }

    #[test]
    fn add_parent_twice_keeps_records() {
        let store = InMemoryEntityStore::new();
        store.add_parent("ship-1");
        store
            .parents
            .write()
            .get_mut("ship-1")
            .unwrap()
            .push(EmbeddedRecord::from_spec(spec("epToken")));
        store.add_parent("ship-1");
        assert_eq!(store.record_count("ship-1"), 1);
    }
}
