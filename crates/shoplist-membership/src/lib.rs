pub mod gossip;
pub mod ring;
pub mod view;

pub use gossip::{gossip_tick, handle_incoming_gossip, run_gossip_loop, GossipTransport, GOSSIP_FANOUT, GOSSIP_INTERVAL};
pub use ring::{hash_hex, key_hash, server_hash, Ring, ServerEntry};
pub use view::{reconcile, MembershipView, ReconcileOutcome};
