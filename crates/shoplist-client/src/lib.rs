pub mod communicator;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod subscriber;

pub use communicator::Communicator;
pub use config::{load_known_ports, ClientArgs, ConfigError};
pub use error::{ClientError, ClientResult};
pub use heartbeat::run_heartbeat;
pub use subscriber::run_subscriber;
