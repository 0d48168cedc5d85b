use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cluster config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("malformed known-peers line {line:?} in {path}")]
    MalformedPeerLine { path: PathBuf, line: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// CLI surface for the proxy binary (spec §6.2).
#[derive(Debug, Parser)]
#[command(name = "shoplist-proxy", about = "Stateless ring router fronting the shoplist server mesh")]
pub struct ProxyArgs {
    /// Port this node's ROUTER socket listens on; its PUB socket binds
    /// `port + 1` (spec §6.1).
    #[arg(long)]
    pub port: u16,

    #[arg(long)]
    pub servers: Option<PathBuf>,

    #[arg(long)]
    pub proxies: Option<PathBuf>,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(skip)]
    pub cluster: ClusterConfig,
}

/// Tunables for the proxy's dispatch behavior, defaulting to the spec's
/// nominal values (spec §4.4.1/§4.4.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub gossip_interval_ms: u64,
    pub gossip_fanout: usize,
    pub next_number: usize,
    pub successful_reads: usize,
    pub max_retry_attempts: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            gossip_interval_ms: 500,
            gossip_fanout: 2,
            next_number: 5,
            successful_reads: 2,
            max_retry_attempts: 3,
        }
    }
}

impl ClusterConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

/// A `name:port` entry from `known_servers.txt` / `known_proxies.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPeer {
    pub name: String,
    pub port: u16,
}

pub fn load_known_peers(path: &Path) -> ConfigResult<Vec<KnownPeer>> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, port) = line.split_once(':').ok_or_else(|| ConfigError::MalformedPeerLine {
                path: path.to_path_buf(),
                line: line.to_string(),
            })?;
            let port: u16 = port.parse().map_err(|_| ConfigError::MalformedPeerLine {
                path: path.to_path_buf(),
                line: line.to_string(),
            })?;
            Ok(KnownPeer {
                name: name.to_string(),
                port,
            })
        })
        .collect()
}
