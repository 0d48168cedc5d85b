use crate::error::{AdminError, AdminResult};
use std::path::{Path, PathBuf};

/// Base ports and naming scheme for a from-scratch cluster (spec §6.2),
/// matching the bootstrap tool's `Server_1..5` / `Proxy_1..2` convention.
pub const SERVER_BASE_PORT: u16 = 5555;
pub const PROXY_BASE_PORT: u16 = 6000;
pub const PROXY_PORT_INCREMENT: u16 = 2;
pub const INITIAL_SERVER_COUNT: u16 = 5;
pub const INITIAL_PROXY_COUNT: u16 = 2;

/// One `name:port` line from `known_servers.txt` / `known_proxies.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPeer {
    pub name: String,
    pub port: u16,
}

impl KnownPeer {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self { name: name.into(), port }
    }

    fn to_line(&self) -> String {
        format!("{}:{}\n", self.name, self.port)
    }
}

fn parse_line(path: &Path, line: &str) -> AdminResult<KnownPeer> {
    let (name, port) = line.split_once(':').ok_or_else(|| AdminError::MalformedPeerLine {
        path: path.to_path_buf(),
        line: line.to_string(),
    })?;
    let port: u16 = port.parse().map_err(|_| AdminError::MalformedPeerLine {
        path: path.to_path_buf(),
        line: line.to_string(),
    })?;
    Ok(KnownPeer { name: name.to_string(), port })
}

/// Reads a `name:port`-per-line topology file. Returns an empty list if
/// the file does not exist yet (the first `initial-setup` run).
pub fn read_peers(path: &Path) -> AdminResult<Vec<KnownPeer>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| AdminError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_line(path, line))
        .collect()
}

pub fn write_peers(path: &Path, peers: &[KnownPeer]) -> AdminResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AdminError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let body: String = peers.iter().map(KnownPeer::to_line).collect();
    std::fs::write(path, body).map_err(|e| AdminError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn append_peer(path: &Path, peer: &KnownPeer) -> AdminResult<()> {
    let mut peers = read_peers(path)?;
    peers.push(peer.clone());
    write_peers(path, &peers)
}

/// Removes every entry named `name`, returning the port it occupied if
/// one was found (spec §4.4.7: the topology file is rewritten once the
/// target server acknowledges its own removal).
pub fn remove_peer_by_name(path: &Path, name: &str) -> AdminResult<Option<u16>> {
    let peers = read_peers(path)?;
    let removed_port = peers.iter().find(|p| p.name == name).map(|p| p.port);
    if removed_port.is_some() {
        let remaining: Vec<KnownPeer> = peers.into_iter().filter(|p| p.name != name).collect();
        write_peers(path, &remaining)?;
    }
    Ok(removed_port)
}

pub fn find_port_by_name(path: &Path, name: &str) -> AdminResult<u16> {
    read_peers(path)?
        .into_iter()
        .find(|p| p.name == name)
        .map(|p| p.port)
        .ok_or_else(|| AdminError::UnknownServer {
            name: name.to_string(),
            path: path.to_path_buf(),
        })
}

/// Builds the `Server_1..N` topology for a from-scratch cluster.
pub fn initial_servers(count: u16) -> Vec<KnownPeer> {
    (1..=count)
        .map(|i| KnownPeer::new(format!("Server_{i}"), SERVER_BASE_PORT + i - 1))
        .collect()
}

/// Builds the `Proxy_1..N` topology for a from-scratch cluster.
pub fn initial_proxies(count: u16) -> Vec<KnownPeer> {
    (1..=count)
        .map(|i| KnownPeer::new(format!("Proxy_{i}"), PROXY_BASE_PORT + PROXY_PORT_INCREMENT * i - 1))
        .collect()
}

/// Picks the next `Server_N` name/port pair to append for `add-server`,
/// continuing the sequence already present in `known_servers.txt`.
pub fn next_server(existing: &[KnownPeer]) -> KnownPeer {
    let next_id = existing.len() as u16 + 1;
    KnownPeer::new(format!("Server_{next_id}"), SERVER_BASE_PORT + next_id - 1)
}
