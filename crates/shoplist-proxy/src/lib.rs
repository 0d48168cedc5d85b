pub mod config;
pub mod error;
pub mod handler;
pub mod read_path;
pub mod state;
pub mod write_path;

pub use config::{ClusterConfig, ConfigError, KnownPeer, ProxyArgs};
pub use error::{ProxyError, ProxyResult};
pub use handler::ProxyHandler;
pub use read_path::{dispatch_read, ReadOutcome};
pub use state::ProxyState;
pub use write_path::{dispatch_write, WriteOutcome};
