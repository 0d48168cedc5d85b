use crate::state::ProxyState;
use shoplist_crdt::{Crdt, ShoppingList};
use shoplist_membership::{key_hash, Ring};
use shoplist_net::loopback_addr;
use shoplist_proto::{Frame, MessageType, RequestFullListPayload, ShoppingListPayload};
use tracing::{debug, warn};

pub enum ReadOutcome {
    Acked(ShoppingList),
    Nacked,
}

/// `REQUEST_FULL_LIST` dispatch: walk up to `next_number` ring positions
/// starting at the list's primary, collecting successful reads until
/// `successful_reads` have arrived, then merge them (spec §4.4.2). Merge
/// order does not matter — `ShoppingList::merge` is commutative.
pub async fn dispatch_read(state: &ProxyState, list_id: &str) -> ReadOutcome {
    let snapshot = state.membership.read().await.servers.clone();
    let ring = Ring::new(snapshot.into_iter().collect());

    let Some(start) = ring.primary_index(&key_hash(list_id)) else {
        warn!(list_id, "read dispatch found no servers on the ring");
        return ReadOutcome::Nacked;
    };

    let candidates = ring.walk_from(start, state.cluster.next_number);
    let mut collected: Vec<ShoppingList> = Vec::new();

    for server in candidates {
        if collected.len() >= state.cluster.successful_reads {
            break;
        }

        let Ok(frame) = Frame::new(
            MessageType::RequestFullList,
            RequestFullListPayload {
                list_id: list_id.to_string(),
            },
        ) else {
            continue;
        };

        match shoplist_net::send_request(loopback_addr(server.port), &frame).await {
            Ok(reply) if reply.msg_type == MessageType::RequestFullListAck => {
                let Ok(payload) = reply.payload_as::<ShoppingListPayload>() else {
                    continue;
                };
                let Ok(list) = ShoppingList::from_json(&payload.shopping_list) else {
                    continue;
                };
                debug!(port = server.port, list_id, "read succeeded");
                collected.push(list);
            }
            Ok(_) => {
                debug!(port = server.port, list_id, "read nacked");
            }
            Err(e) => {
                warn!(port = server.port, error = %e, "read attempt failed");
            }
        }
    }

    if collected.len() < state.cluster.successful_reads {
        return ReadOutcome::Nacked;
    }

    let mut merged = collected.remove(0);
    for other in &collected {
        merged.merge(other);
    }
    ReadOutcome::Acked(merged)
}
