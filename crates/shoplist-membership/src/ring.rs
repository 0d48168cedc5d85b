use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest used as a node or key's ring coordinate.
///
/// Plain `String` comparison is correct here: SHA-256 hex digests sort
/// lexicographically in the same order as the underlying big-endian
/// integer, so `Ord` on this type is `Ord` on the ring.
pub fn hash_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn server_hash(port: u16) -> String {
    hash_hex(&format!("server_{port}"))
}

pub fn key_hash(list_uuid: &str) -> String {
    hash_hex(list_uuid)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub port: u16,
    pub hash: String,
}

impl ServerEntry {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            hash: server_hash(port),
        }
    }
}

/// Ordered by ring coordinate (`hash`), not by port: the whole point of
/// this type is to be sorted into ring position, and `#[derive(Ord)]`
/// would compare `port` first since it is declared before `hash`. `port`
/// only breaks ties in the (practically impossible) case of a hash
/// collision, so the order stays a total order even then.
impl PartialOrd for ServerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash.cmp(&other.hash).then_with(|| self.port.cmp(&other.port))
    }
}

/// A sorted snapshot of the server set, the view needed to resolve ring
/// placement for a write or read. Built fresh from a `MembershipView` on
/// every dispatch decision rather than kept incrementally sorted.
#[derive(Debug, Clone, Default)]
pub struct Ring {
    sorted: Vec<ServerEntry>,
}

impl Ring {
    pub fn new(mut servers: Vec<ServerEntry>) -> Self {
        servers.sort();
        Self { sorted: servers }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn servers(&self) -> &[ServerEntry] {
        &self.sorted
    }

    /// Index of the first server with `hash >= key`, wrapping to 0 when
    /// every server's hash is less than the key.
    pub fn primary_index(&self, key: &str) -> Option<usize> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(
            self.sorted
                .iter()
                .position(|s| s.hash.as_str() >= key)
                .unwrap_or(0),
        )
    }

    pub fn primary_for(&self, list_uuid: &str) -> Option<&ServerEntry> {
        self.primary_index(&key_hash(list_uuid))
            .map(|i| &self.sorted[i])
    }

    /// The `count` ring positions starting at `primary_index + 1`, the
    /// successors that hold asynchronous replicas.
    pub fn replica_positions(&self, primary_index: usize, count: usize) -> Vec<usize> {
        let n = self.sorted.len();
        if n <= 1 {
            return Vec::new();
        }
        (1..=count.min(n - 1))
            .map(|offset| (primary_index + offset) % n)
            .collect()
    }

    /// Up to `count` ring positions starting at `start`, walked clockwise,
    /// for read fan-out (spec §4.4.2).
    pub fn walk_from(&self, start: usize, count: usize) -> Vec<&ServerEntry> {
        let n = self.sorted.len();
        if n == 0 {
            return Vec::new();
        }
        (0..count.min(n))
            .map(|offset| &self.sorted[(start + offset) % n])
            .collect()
    }

    /// The server a record is actually meant to live on: its ring primary
    /// for a primary copy, or the `replica_id`-th successor for a replica
    /// (spec §4.4.5).
    pub fn intended_server(&self, list_uuid: &str, replica_id: Option<u8>) -> Option<&ServerEntry> {
        let primary_index = self.primary_index(&key_hash(list_uuid))?;
        match replica_id {
            None => Some(&self.sorted[primary_index]),
            Some(id) => {
                let n = self.sorted.len();
                Some(&self.sorted[(primary_index + id as usize) % n])
            }
        }
    }
}
