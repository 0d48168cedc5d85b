use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("storage error: {0}")]
    Storage(#[from] shoplist_storage::StorageError),

    #[error("crdt error: {0}")]
    Crdt(#[from] shoplist_crdt::CrdtError),

    #[error("network error: {0}")]
    Net(#[from] shoplist_net::NetError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("no proxy in the known-proxies list acknowledged the request")]
    AllProxiesFailed,
}

pub type ClientResult<T> = Result<T, ClientError>;
