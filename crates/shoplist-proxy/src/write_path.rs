use crate::state::ProxyState;
use shoplist_crdt::ShoppingList;
use shoplist_membership::{key_hash, Ring};
use shoplist_net::loopback_addr;
use shoplist_proto::{Frame, MessageType, ShoppingListPayload};
use tracing::{debug, warn};

/// Outcome of a proxy write dispatch (spec §4.4.1).
pub enum WriteOutcome {
    Acked(ShoppingList),
    Nacked,
}

/// `SENT_FULL_LIST` dispatch: walk the ring clockwise starting at the
/// list's primary, trying one server at a time until one acks. Publishes
/// `LIST_UPDATE` on the success path so subscribed clients learn of the
/// write without polling.
pub async fn dispatch_write(state: &ProxyState, list: &ShoppingList) -> WriteOutcome {
    let snapshot = state.membership.read().await.servers.clone();
    let ring = Ring::new(snapshot.into_iter().collect());

    let Some(start) = ring.primary_index(&key_hash(&list.uuid)) else {
        warn!(uuid = %list.uuid, "write dispatch found no servers on the ring");
        return WriteOutcome::Nacked;
    };

    let n = ring.len();
    let Ok(request_json) = list.to_json() else {
        return WriteOutcome::Nacked;
    };

    for offset in 0..n {
        let server = &ring.servers()[(start + offset) % n];
        let Ok(frame) = Frame::new(
            MessageType::SentFullList,
            ShoppingListPayload {
                shopping_list: request_json.clone(),
            },
        ) else {
            continue;
        };

        match shoplist_net::send_request(loopback_addr(server.port), &frame).await {
            Ok(reply) if reply.msg_type == MessageType::SentFullListAck => {
                let Ok(payload) = reply.payload_as::<ShoppingListPayload>() else {
                    continue;
                };
                let Ok(merged) = ShoppingList::from_json(&payload.shopping_list) else {
                    continue;
                };
                debug!(port = server.port, uuid = %list.uuid, "write acked");
                publish_update(state, &merged).await;
                return WriteOutcome::Acked(merged);
            }
            Ok(_) => {
                debug!(port = server.port, uuid = %list.uuid, "write nacked, trying next server");
            }
            Err(e) => {
                warn!(port = server.port, error = %e, "write attempt failed, trying next server");
            }
        }
    }

    WriteOutcome::Nacked
}

async fn publish_update(state: &ProxyState, merged: &ShoppingList) {
    let Ok(json) = merged.to_json() else { return };
    let Ok(frame) = Frame::new(
        MessageType::ListUpdate,
        ShoppingListPayload { shopping_list: json },
    ) else {
        return;
    };
    state.publisher.publish(frame).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist_membership::ServerEntry;
    use shoplist_net::{PublisherServer, RequestHandler, RouterServer};
    use shoplist_proto::EmptyPayload;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct AlwaysAck;
    #[async_trait::async_trait]
    impl RequestHandler for AlwaysAck {
        async fn handle(&self, _peer: SocketAddr, request: Frame) -> Frame {
            let payload: ShoppingListPayload = request.payload_as().unwrap();
            Frame::new(MessageType::SentFullListAck, payload).unwrap()
        }
    }

    struct AlwaysNack;
    #[async_trait::async_trait]
    impl RequestHandler for AlwaysNack {
        async fn handle(&self, _peer: SocketAddr, _request: Frame) -> Frame {
            Frame::new(MessageType::SentFullListNack, EmptyPayload {}).unwrap()
        }
    }

    async fn spawn_server<H: RequestHandler + 'static>(handler: H) -> (u16, CancellationToken) {
        let server = RouterServer::bind("127.0.0.1:0", 2).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            server.serve(Arc::new(handler), shutdown_clone).await;
        });
        (port, shutdown)
    }

    async fn proxy_state_with_servers(ports: &[u16]) -> ProxyState {
        let shutdown = CancellationToken::new();
        let (publisher, _addr, _h) = PublisherServer::bind("127.0.0.1:0", shutdown).await.unwrap();
        let state = ProxyState::new(9999, Arc::new(publisher), crate::config::ClusterConfig::default());
        let mut view = state.membership.write().await;
        for &port in ports {
            view.servers.insert(ServerEntry::new(port));
        }
        drop(view);
        state
    }

    #[tokio::test]
    async fn write_dispatch_acks_and_returns_merged_list_from_first_live_server() {
        let (port, _shutdown) = spawn_server(AlwaysAck).await;
        let state = proxy_state_with_servers(&[port]).await;

        let list = ShoppingList::new("L1");
        let outcome = dispatch_write(&state, &list).await;
        assert!(matches!(outcome, WriteOutcome::Acked(_)));
    }

    #[tokio::test]
    async fn write_dispatch_falls_through_nacking_servers_to_the_next_ring_position() {
        let (nack_port, _s1) = spawn_server(AlwaysNack).await;
        let (ack_port, _s2) = spawn_server(AlwaysAck).await;
        let state = proxy_state_with_servers(&[nack_port, ack_port]).await;

        let list = ShoppingList::new("L1");
        let outcome = dispatch_write(&state, &list).await;
        assert!(matches!(outcome, WriteOutcome::Acked(_)));
    }

    #[tokio::test]
    async fn write_dispatch_nacks_when_no_server_is_reachable() {
        let shutdown = CancellationToken::new();
        let (publisher, _addr, _h) = PublisherServer::bind("127.0.0.1:0", shutdown).await.unwrap();
        let state = ProxyState::new(9999, Arc::new(publisher), crate::config::ClusterConfig::default());

        let list = ShoppingList::new("L1");
        let outcome = dispatch_write(&state, &list).await;
        assert!(matches!(outcome, WriteOutcome::Nacked));
    }
}
