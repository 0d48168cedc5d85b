use crate::replication::send_replica;
use crate::state::ServerState;
use async_trait::async_trait;
use shoplist_crdt::{Crdt, ShoppingList};
use shoplist_membership::handle_incoming_gossip;
use shoplist_net::RequestHandler;
use shoplist_proto::{
    EmptyPayload, Frame, GossipPayload, HintedHandoffPayload, MessageType, ReplicaPayload,
    RequestFullListPayload, ShoppingListPayload,
};
use shoplist_storage::Record;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Dispatches every inbound request frame this node's router accepts (spec
/// §4.4.3/§4.4.4/§4.4.5/§4.3/§4.4.7). One instance is shared across the
/// whole worker pool; all mutation goes through `ServerState`'s interior
/// synchronization.
pub struct ServerHandler {
    pub state: ServerState,
}

#[async_trait]
impl RequestHandler for ServerHandler {
    async fn handle(&self, peer: SocketAddr, request: Frame) -> Frame {
        debug!(?peer, msg_type = ?request.msg_type, "handling request");
        match request.msg_type {
            MessageType::RequestFullList => self.handle_request_full_list(request).await,
            MessageType::SentFullList => self.handle_sent_full_list(request).await,
            MessageType::Replica => self.handle_replica(request).await,
            MessageType::HintedHandoff => self.handle_hinted_handoff(request).await,
            MessageType::Gossip | MessageType::GossipIntroduction => {
                self.handle_gossip(request).await
            }
            MessageType::RemoveServer => self.handle_remove_server(),
            other => {
                warn!(?other, "no handler registered for this message type");
                empty(MessageType::RequestFullListNack)
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
/// and for message types (`ReplicaAck`, `HintedHandoffAck`, `Gossip`) whose
/// ack carries no payload of its own.
fn empty(msg_type: MessageType) -> Frame {
    Frame::new(msg_type, EmptyPayload {}).expect("EmptyPayload always serializes")
}

impl ServerHandler {
    /// Spec §4.4.4: return the stored CRDT, primary or replica copy,
    /// whichever is local. Quorum across servers is the proxy's job.
    async fn handle_request_full_list(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<RequestFullListPayload>() else {
            return empty(MessageType::RequestFullListNack);
        };
        match self.state.storage.get(&payload.list_id) {
            Ok(Some(record)) => ack(MessageType::RequestFullListAck, &record.list),
            Ok(None) => empty(MessageType::RequestFullListNack),
            Err(e) => {
                warn!(error = %e, "storage read failed");
                empty(MessageType::RequestFullListNack)
            }
        }
    }

    /// Spec §4.4.3: merge the incoming write into local storage, fire off
    /// asynchronous replication, and ack with the merged CRDT.
    async fn handle_sent_full_list(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<ShoppingListPayload>() else {
            return empty(MessageType::SentFullListNack);
        };
        let Ok(incoming) = ShoppingList::from_json(&payload.shopping_list) else {
            return empty(MessageType::SentFullListNack);
        };

        if let Err(e) = self.state.storage.save(Record::new(incoming.clone())) {
            warn!(error = %e, "failed to persist sent full list");
            return empty(MessageType::SentFullListNack);
        }

        let merged = match self.state.storage.get(&incoming.uuid) {
            Ok(Some(record)) => record.list,
            _ => incoming,
        };

        let state = self.state.clone();
        let for_replication = merged.clone();
        tokio::spawn(async move {
            send_replica(&state, &for_replication).await;
        });

        ack(MessageType::SentFullListAck, &merged)
    }

    /// Spec §4.4.3's receiving side: a peer server handing this node a
    /// replica copy. Stored with `is_replica=true` so repair (§4.4.5) and
    /// the replica/non-replica storage queries see it correctly.
    async fn handle_replica(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<ReplicaPayload>() else {
            return empty(MessageType::SentFullListNack);
        };
        let Ok(list) = ShoppingList::from_json(&payload.replica_list) else {
            return empty(MessageType::SentFullListNack);
        };

        if let Err(e) = self
            .state
            .storage
            .save(Record::replica_of(list, payload.replica_id))
        {
            warn!(error = %e, "failed to persist replica");
            return empty(MessageType::SentFullListNack);
        }

        empty(MessageType::ReplicaAck)
    }

    /// Spec §4.4.5: absorb hinted-handoff lists this node is the intended
    /// home for. Main and replica lists merge the same way; the sender
    /// already decided which bucket each list belongs in.
    async fn handle_hinted_handoff(&self, request: Frame) -> Frame {
        let Ok(payload) = request.payload_as::<HintedHandoffPayload>() else {
            return empty(MessageType::HintedHandoffAck);
        };

        for json in &payload.main_lists {
            if let Ok(list) = ShoppingList::from_json(json) {
                if let Err(e) = self.state.storage.save(Record::new(list)) {
                    warn!(error = %e, "failed to absorb handed-off main list");
                }
            }
        }
        for (json, replica_id) in &payload.replica_lists {
            if let Ok(list) = ShoppingList::from_json(json) {
                if let Err(e) = self.state.storage.save(Record::replica_of(list, *replica_id)) {
                    warn!(error = %e, "failed to absorb handed-off replica list");
                }
            }
        }

        empty(MessageType::HintedHandoffAck)
    }

    /// Spec §4.3: fold an incoming gossip/introduction payload into the
    /// shared membership view. No reply payload carries meaning on this
    /// message type; an empty ack just confirms receipt.
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

    /// Spec §4.4.7: ack then exit. The process actually terminates after
    /// the reply has been written back to the admin caller, since the
    /// ack itself must reach the wire before the process disappears.
    fn handle_remove_server(&self) -> Frame {
        let reply = empty(MessageType::RemoveServerAck);
        tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            std::process::exit(0);
        });
        reply
    }
}
