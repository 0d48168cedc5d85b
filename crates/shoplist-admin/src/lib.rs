pub mod error;
pub mod remove_server;
pub mod topology;

pub use error::{AdminError, AdminResult};
pub use remove_server::remove_server;
