use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("network error: {0}")]
    Net(#[from] shoplist_net::NetError),

    #[error("protocol error: {0}")]
    Proto(#[from] shoplist_proto::ProtoError),

    #[error("crdt error: {0}")]
    Crdt(#[from] shoplist_crdt::CrdtError),

    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("ring has no servers to dispatch to")]
    EmptyRing,
}

pub type ProxyResult<T> = Result<T, ProxyError>;
