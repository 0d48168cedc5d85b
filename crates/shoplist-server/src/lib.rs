pub mod config;
pub mod error;
pub mod handler;
pub mod repair;
pub mod replication;
pub mod state;

pub use config::{ClusterConfig, ConfigError, KnownPeer, ServerArgs};
pub use error::{ServerError, ServerResult};
pub use handler::ServerHandler;
pub use repair::run_repair_loop;
pub use replication::send_replica;
pub use state::ServerState;
