pub mod addr;
pub mod backoff;
pub mod codec;
pub mod dealer;
pub mod gossip_transport;
pub mod router;
pub mod pubsub;

pub use addr::{bind_addr, loopback_addr, pub_port};
pub use backoff::{retry_with_backoff, Backoff};
pub use codec::{FrameConnection, NetError, NetResult};
pub use dealer::send_request;
pub use gossip_transport::TcpGossipTransport;
pub use pubsub::{PublisherServer, SubscriberClient};
pub use router::{RequestHandler, RouterServer};
