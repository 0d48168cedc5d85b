use parking_lot::RwLock;
use shoplist_crdt::{Crdt, ShoppingList};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// CRDT-merges `incoming` into `existing` and returns the resulting
/// record, the core of every backend's read-modify-write `save` (spec
/// §4.2). Non-CRDT bookkeeping fields take the incoming write's value
/// where it specifies one, since those reflect *this* write's context
/// (is it a replica write? a hinted-handoff hand-back?) rather than CRDT
/// state that both sides must agree on.
fn merge_records(mut existing: Record, incoming: Record) -> Record {
    existing.list.merge(&incoming.list);
    existing.name = incoming.name.or(existing.name);
    existing.logical_clock = existing.logical_clock.max(incoming.logical_clock);
    existing.is_replica = incoming.is_replica;
    existing.replica_id = incoming.replica_id.or(existing.replica_id);
    existing.intended_server_hash = incoming
        .intended_server_hash
        .or(existing.intended_server_hash);
    existing
}

#[cfg(feature = "persistent-storage")]
pub mod sled_store;

#[cfg(feature = "persistent-storage")]
pub use sled_store::SledStore;

/// Errors raised by a `ShoppingListStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("list not found: {uuid}")]
    NotFound { uuid: String },

    #[error("crdt serialization error: {0}")]
    Crdt(#[from] shoplist_crdt::CrdtError),

    #[cfg(feature = "persistent-storage")]
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A persisted shopping list and the bookkeeping a server needs around it:
/// whether this copy is a replica of data owned by another node, and — for
/// hinted handoff — the hash of the server this record is actually meant
/// for while that server is unreachable.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub uuid: String,
    pub name: Option<String>,
    pub list: ShoppingList,
    pub logical_clock: u64,
    pub is_replica: bool,
    /// Which successor slot (1..=REPLICA_COUNT) this copy occupies when
    /// `is_replica` is true; `None` for a primary copy (spec §4.4.5).
    pub replica_id: Option<u8>,
    pub intended_server_hash: Option<String>,
}

impl Record {
    pub fn new(list: ShoppingList) -> Self {
        Self {
            uuid: list.uuid.clone(),
            name: list.name.clone(),
            logical_clock: list.clock,
            list,
            is_replica: false,
            replica_id: None,
            intended_server_hash: None,
        }
    }

    pub fn replica_of(list: ShoppingList, replica_id: u8) -> Self {
        let mut r = Self::new(list);
        r.is_replica = true;
        r.replica_id = Some(replica_id);
        r
    }

    /// Mark this record as a hint held on behalf of an unreachable server.
    pub fn hinted_for(mut self, server_hash: impl Into<String>) -> Self {
        self.intended_server_hash = Some(server_hash.into());
        self
    }
}

/// A materialized row of a list's item table, the shape the client-facing
/// display layer reads (spec §4.1's `MaterializedItem`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedItem {
    pub list_uuid: String,
    pub item_name: String,
    pub qty_needed: u64,
    pub qty_acquired: u64,
    pub position: u32,
}

/// Storage contract shared by every backend (in-memory for tests/dev,
/// sled for durable single-node deployments). Every method takes `&self`:
/// interior mutability is the implementation's job, not the caller's.
pub trait ShoppingListStore: Send + Sync {
    fn save(&self, record: Record) -> StorageResult<()>;

    fn get(&self, uuid: &str) -> StorageResult<Option<Record>>;

    fn get_all(&self) -> StorageResult<Vec<Record>>;

    fn get_all_non_replica(&self) -> StorageResult<Vec<Record>>;

    fn get_all_replicas(&self) -> StorageResult<Vec<Record>>;

    /// Records held as hints for a server that was unreachable at write
    /// time (spec §4.4.5 hinted handoff).
    fn get_all_not_sent(&self) -> StorageResult<Vec<Record>>;

    fn delete(&self, uuid: &str) -> StorageResult<()>;

    /// Clear a record's hinted-handoff marker once it has been delivered.
    fn clear_hint(&self, uuid: &str) -> StorageResult<()> {
        if let Some(mut record) = self.get(uuid)? {
            record.intended_server_hash = None;
            self.save(record)?;
        }
        Ok(())
    }

    /// The materialized `ShoppingListItem` rows for `uuid`, rebuilt from
    /// the stored CRDT's `get_visible_items()` rather than from any
    /// separately-maintained table (spec §3.2/§6.3: the CRDT blob is the
    /// sole authority, this projection is rebuildable on every read).
    /// `position` is assigned by sorted item name, since the CRDT itself
    /// carries no ordering for display.
    fn materialized_view(&self, uuid: &str) -> StorageResult<Vec<MaterializedItem>> {
        let Some(record) = self.get(uuid)? else {
            return Ok(Vec::new());
        };
        Ok(record
            .list
            .get_visible_items()
            .into_iter()
            .enumerate()
            .map(|(position, (item_name, view))| MaterializedItem {
                list_uuid: uuid.to_string(),
                item_name,
                qty_needed: view.needed,
                qty_acquired: view.acquired,
                position: position as u32,
            })
            .collect())
    }
}

/// In-memory store backed by a single `RwLock<HashMap>`, the storage
/// equivalent of the index/cache pattern used throughout this mesh.
/// Intended for tests and for nodes that accept losing state on restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<String, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShoppingListStore for MemoryStore {
    /// Read-modify-write under the map's exclusive write guard: an
    /// existing record for this uuid is CRDT-merged with the incoming one
    /// rather than replaced, so concurrent `save`s on the same uuid always
    /// converge to their merge regardless of arrival order (spec §4.2).
    #[instrument(skip(self, record), fields(uuid = %record.uuid))]
    fn save(&self, mut record: Record) -> StorageResult<()> {
        debug!(clock = record.logical_clock, "saving record");
        let mut guard = self.records.write();
        if let Some(existing) = guard.get(&record.uuid) {
            record = merge_records(existing.clone(), record);
        }
        guard.insert(record.uuid.clone(), record);
        Ok(())
    }

    fn get(&self, uuid: &str) -> StorageResult<Option<Record>> {
        Ok(self.records.read().get(uuid).cloned())
    }

    fn get_all(&self) -> StorageResult<Vec<Record>> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn get_all_non_replica(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| !r.is_replica)
            .cloned()
            .collect())
    }

    fn get_all_replicas(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.is_replica)
            .cloned()
            .collect())
    }

    fn get_all_not_sent(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.intended_server_hash.is_some())
            .cloned()
            .collect())
    }

    fn delete(&self, uuid: &str) -> StorageResult<()> {
        if self.records.write().remove(uuid).is_none() {
            warn!(uuid, "delete of unknown record requested");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist_crdt::ActorId;

    fn list(uuid: &str) -> ShoppingList {
        let mut l = ShoppingList::new(uuid);
        l.add_item(&ActorId::new("actor"), "Bread", 1, 0);
        l
    }

    #[test]
    fn save_then_get_round_trips() {
        let store = MemoryStore::new();
        store.save(Record::new(list("L1"))).unwrap();

        let record = store.get("L1").unwrap().unwrap();
        assert_eq!(record.uuid, "L1");
        assert!(!record.is_replica);
    }

    #[test]
    fn get_of_missing_uuid_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn replica_and_non_replica_filters_partition_correctly() {
        let store = MemoryStore::new();
        store.save(Record::new(list("owned"))).unwrap();
        store.save(Record::replica_of(list("copy"), 1)).unwrap();

        let owned = store.get_all_non_replica().unwrap();
        let replicas = store.get_all_replicas().unwrap();

        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].uuid, "owned");
        assert_eq!(replicas.len(), 1);
        assert_eq!(replicas[0].uuid, "copy");
    }

    #[test]
    fn hinted_records_are_found_by_not_sent_query() {
        let store = MemoryStore::new();
        store
            .save(Record::new(list("hint")).hinted_for("abcd1234"))
            .unwrap();
        store.save(Record::new(list("plain"))).unwrap();

        let hinted = store.get_all_not_sent().unwrap();
        assert_eq!(hinted.len(), 1);
        assert_eq!(hinted[0].uuid, "hint");
    }

    #[test]
    fn clear_hint_removes_the_marker_without_touching_the_list() {
        let store = MemoryStore::new();
        store
            .save(Record::new(list("hint")).hinted_for("abcd1234"))
            .unwrap();

        store.clear_hint("hint").unwrap();

        let record = store.get("hint").unwrap().unwrap();
        assert!(record.intended_server_hash.is_none());
        assert!(store.get_all_not_sent().unwrap().is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.save(Record::new(list("L1"))).unwrap();
        store.delete("L1").unwrap();
        store.delete("L1").unwrap();
        assert!(store.get("L1").unwrap().is_none());
    }

    #[test]
    fn materialized_view_matches_get_visible_items_clamped() {
        let store = MemoryStore::new();
        let mut l = list("L1");
        l.update_needed(&ActorId::new("actor"), "Bread", -5);
        store.save(Record::new(l)).unwrap();

        let rows = store.materialized_view("L1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].item_name, "Bread");
        assert_eq!(rows[0].qty_needed, 0);
        assert_eq!(rows[0].qty_acquired, 0);
    }

    #[test]
    fn materialized_view_of_missing_list_is_empty_not_error() {
        let store = MemoryStore::new();
        assert!(store.materialized_view("nope").unwrap().is_empty());
    }

    #[test]
    fn saving_twice_overwrites_rather_than_duplicates() {
        let store = MemoryStore::new();
        let mut l = list("L1");
        store.save(Record::new(l.clone())).unwrap();

        l.add_item(&ActorId::new("actor"), "Milk", 1, 0);
        store.save(Record::new(l)).unwrap();

        assert_eq!(store.get_all().unwrap().len(), 1);
        let record = store.get("L1").unwrap().unwrap();
        assert_eq!(record.list.get_visible_items().len(), 2);
    }
}
