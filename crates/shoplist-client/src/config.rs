use clap::Parser;
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

    #[error("malformed known-peers line {line:?} in {path}")]
    MalformedPeerLine { path: PathBuf, line: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// CLI surface for the client daemon binary. The interactive list editor
/// itself is an external collaborator (spec §1); this binary runs only
/// the background sync machinery — subscriber and heartbeat — that an
/// interactive frontend would sit on top of.
#[derive(Debug, Parser)]
#[command(name = "shoplist-client", about = "Offline-capable shopping-list client sync daemon")]
pub struct ClientArgs {
    /// Path to a newline-delimited `name:port` file of known proxies.
    #[arg(long)]
    pub proxies: PathBuf,

    /// Directory the local store persists under.
    #[arg(long, default_value = "./client-data")]
    pub data_dir: PathBuf,

    /// This device's stable actor id, threaded into every CRDT edit
    /// (spec §9: must be stable per edit origin, never the list's uuid).
    #[arg(long)]
    pub actor_id: String,
}

pub fn load_known_ports(path: &Path) -> ConfigResult<Vec<u16>> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (_name, port) = line.split_once(':').ok_or_else(|| ConfigError::MalformedPeerLine {
                path: path.to_path_buf(),
                line: line.to_string(),
            })?;
            port.parse().map_err(|_| ConfigError::MalformedPeerLine {
                path: path.to_path_buf(),
                line: line.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_known_ports_reads_the_port_half_of_each_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Proxy_1:6000").unwrap();
        writeln!(file, "Proxy_2:6002").unwrap();
        assert_eq!(load_known_ports(file.path()).unwrap(), vec![6000, 6002]);
    }
}
