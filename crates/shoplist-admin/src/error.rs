use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed known-peers line {line:?} in {path}")]
    MalformedPeerLine { path: PathBuf, line: String },

    #[error("server {name:?} not found in {path}")]
    UnknownServer { name: String, path: PathBuf },

    #[error("network error: {0}")]
    Net(#[from] shoplist_net::NetError),

    #[error("protocol error: {0}")]
    Proto(#[from] shoplist_proto::ProtoError),

    #[error("{port} did not acknowledge removal after {attempts} attempts")]
    RemovalUnacknowledged { port: u16, attempts: u32 },
}

pub type AdminResult<T> = Result<T, AdminError>;
