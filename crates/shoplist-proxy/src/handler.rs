use crate::read_path::{dispatch_read, ReadOutcome};
use crate::state::ProxyState;
use crate::write_path::{dispatch_write, WriteOutcome};
use async_trait::async_trait;
use shoplist_crdt::ShoppingList;
use shoplist_membership::handle_incoming_gossip;
use shoplist_net::RequestHandler;
use shoplist_proto::{
    EmptyPayload, Frame, GossipPayload, MessageType, RequestFullListPayload, ShoppingListPayload,
};
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Dispatches every inbound request frame this proxy's router accepts:
/// client writes/reads (spec §4.4.1/§4.4.2) and membership gossip
/// (spec §4.3). The proxy holds no list data of its own.
pub struct ProxyHandler {
    pub state: ProxyState,
}

#[async_trait]
impl RequestHandler for ProxyHandler {
    async fn handle(&self, peer: SocketAddr, request: Frame) -> Frame {
        debug!(?peer, msg_type = ?request.msg_type, "proxy dispatching request");
        match request.msg_type {
            MessageType::SentFullList => self.handle_write(request).await,
            MessageType::RequestFullList => self.handle_read(request).await,
            MessageType::Gossip | MessageType::GossipIntroduction => {
                self.handle_gossip(request).await
            }
            other => {
                warn!(?other, "proxy has no handler for this message type");
                empty(MessageType::SentFullListNack)
            }
        }
    }
}

fn ack(msg_type: MessageType, list: &ShoppingList) -> Frame {
    let json = list.to_json().unwrap_or_default();
    Frame::new(msg_type, ShoppingListPayload { shopping_list: json })
        .expect("ShoppingListPayload always serializes")
}

/// Construct an empty-payload frame. Used both for genuine `_NACK` replies
/// and for `Gossip`, whose ack carries no payload of its own.
fn empty(msg_type: MessageType) -> Frame {
    Frame::new(msg_type, EmptyPayload {}).expect("EmptyPayload always serializes")
}

impl ProxyHandler {
    async fn handle_write(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<ShoppingListPayload>() else {
            return empty(MessageType::SentFullListNack);
        };
        let Ok(list) = ShoppingList::from_json(&payload.shopping_list) else {
            return empty(MessageType::SentFullListNack);
        };

        match dispatch_write(&self.state, &list).await {
            WriteOutcome::Acked(merged) => ack(MessageType::SentFullListAck, &merged),
            WriteOutcome::Nacked => empty(MessageType::SentFullListNack),
        }
    }

    async fn handle_read(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<RequestFullListPayload>() else {
            return empty(MessageType::RequestFullListNack);
        };

        match dispatch_read(&self.state, &payload.list_id).await {
            ReadOutcome::Acked(merged) => ack(MessageType::RequestFullListAck, &merged),
            ReadOutcome::Nacked => empty(MessageType::RequestFullListNack),
        }
    }

    async fn handle_gossip(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<GossipPayload>() else {
            return empty(MessageType::Gossip);
        };

        let mut incoming = shoplist_membership::MembershipView::new();
        incoming.version = payload.hash_ring_version;
        incoming.proxies = payload.proxies.into_iter().collect();
        incoming.servers = payload
            .servers
            .into_iter()
            .map(shoplist_membership::ServerEntry::new)
            .collect();

        handle_incoming_gossip(&self.state.membership, self.state.port, &incoming).await;
        empty(MessageType::Gossip)
    }
}
