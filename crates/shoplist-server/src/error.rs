use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("storage error: {0}")]
    Storage(#[from] shoplist_storage::StorageError),

    #[error("crdt error: {0}")]
    Crdt(#[from] shoplist_crdt::CrdtError),

    #[error("network error: {0}")]
    Net(#[from] shoplist_net::NetError),

    #[error("protocol error: {0}")]
    Proto(#[from] shoplist_proto::ProtoError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

pub type ServerResult<T> = Result<T, ServerError>;
