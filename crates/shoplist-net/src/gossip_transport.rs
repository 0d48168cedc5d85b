use crate::addr::loopback_addr;
use shoplist_membership::{GossipTransport, MembershipView};
use shoplist_proto::{Frame, GossipPayload, MessageType};
use tracing::debug;

/// Wires `shoplist-membership`'s transport-agnostic gossip tick to this
/// mesh's actual wire layer: one DEALER-style request per peer, carrying
/// the local view as a `GOSSIP` or `GOSSIP_INTRODUCTION` frame (spec §4.3).
///
/// The reply is not awaited for correctness — gossip is fire-and-forget,
/// so a peer that is slow or down simply misses this tick and is caught
/// up by a later one — but `send_request`'s own retry/backoff still
/// applies to the single round-trip attempted here.
pub struct TcpGossipTransport {
    node_kind: &'static str,
}

impl TcpGossipTransport {
    pub fn new(node_kind: &'static str) -> Self {
        Self { node_kind }
    }
}

#[async_trait::async_trait]
impl GossipTransport for TcpGossipTransport {
    async fn send_gossip(&self, peer_port: u16, view: &MembershipView, is_introduction: bool) {
        let msg_type = if is_introduction {
            MessageType::GossipIntroduction
        } else {
            MessageType::Gossip
        };
        let payload = GossipPayload {
            servers: view.servers.iter().map(|s| s.port).collect(),
            proxies: view.proxies.iter().copied().collect(),
            hash_ring_version: view.version,
        };
        let Ok(frame) = Frame::new(msg_type, payload) else {
            return;
        };
        match crate::send_request(loopback_addr(peer_port), &frame).await {
            Ok(_) => debug!(kind = self.node_kind, peer_port, "gossip delivered"),
            Err(e) => debug!(kind = self.node_kind, peer_port, error = %e, "gossip delivery failed"),
        }
    }
}
