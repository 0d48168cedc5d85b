use crate::{Record, ShoppingListStore, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use shoplist_crdt::ShoppingList;
use std::path::Path;
use tracing::{debug, info, instrument};

/// On-disk mirror of `Record`; `ShoppingList` round-trips through its own
/// JSON representation so the wire format and the storage format stay
/// identical, per spec §4.1's canonical CRDT json shape.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    name: Option<String>,
    list_json: String,
    logical_clock: u64,
    is_replica: bool,
    replica_id: Option<u8>,
    intended_server_hash: Option<String>,
}

impl StoredRecord {
    fn from_record(record: &Record) -> StorageResult<Self> {
        Ok(Self {
            name: record.name.clone(),
            list_json: record.list.to_json()?,
            logical_clock: record.logical_clock,
            is_replica: record.is_replica,
            replica_id: record.replica_id,
            intended_server_hash: record.intended_server_hash.clone(),
        })
    }

    fn into_record(self, uuid: String) -> StorageResult<Record> {
        let list = ShoppingList::from_json(&self.list_json)?;
        Ok(Record {
            uuid,
            name: self.name,
            list,
            logical_clock: self.logical_clock,
            is_replica: self.is_replica,
            replica_id: self.replica_id,
            intended_server_hash: self.intended_server_hash,
        })
    }
}

/// Durable, embedded key-value backed store. One tree, keyed by list uuid.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    #[instrument(skip(path))]
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        info!(path = %path.as_ref().display(), "opening sled storage tree");
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn decode(uuid: &str, bytes: sled::IVec) -> StorageResult<Record> {
        let stored: StoredRecord = serde_json::from_slice(&bytes)?;
        stored.into_record(uuid.to_string())
    }
}

impl ShoppingListStore for SledStore {
    /// Same read-modify-write merge contract as `MemoryStore`, implemented
    /// against sled's single-key compare-and-swap instead of a lock guard.
    fn save(&self, mut record: Record) -> StorageResult<()> {
        debug!(uuid = %record.uuid, "persisting record to sled");
        if let Some(existing) = self.get(&record.uuid)? {
            record = crate::merge_records(existing, record);
        }
        let stored = StoredRecord::from_record(&record)?;
        let bytes = serde_json::to_vec(&stored)?;
        self.db.insert(record.uuid.as_bytes(), bytes)?;
        Ok(())
    }

    fn get(&self, uuid: &str) -> StorageResult<Option<Record>> {
        match self.db.get(uuid.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(uuid, bytes)?)),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> StorageResult<Vec<Record>> {
        self.db
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                let uuid = String::from_utf8_lossy(&key).into_owned();
                Self::decode(&uuid, value)
            })
            .collect()
    }

    fn get_all_non_replica(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| !r.is_replica)
            .collect())
    }

    fn get_all_replicas(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.is_replica)
            .collect())
    }

    fn get_all_not_sent(&self) -> StorageResult<Vec<Record>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.intended_server_hash.is_some())
            .collect())
    }

    fn delete(&self, uuid: &str) -> StorageResult<()> {
        self.db.remove(uuid.as_bytes())?;
        Ok(())
    }
}
