use shoplist_net::loopback_addr;
use crate::state::ServerState;
use shoplist_crdt::ShoppingList;
use shoplist_membership::{key_hash, Ring};
use shoplist_proto::{Frame, MessageType, ReplicaPayload};
use tracing::{debug, warn};

/// Walks the ring clockwise from the primary's successor and attempts to
/// place `replica_count` distinct acknowledged copies, `replica_id` 1..N
/// (spec §4.4.3's `send_replica`). Failures here are not re-queued; the
/// hinted-handoff repair loop (§4.4.5) reconciles them on its next tick.
pub async fn send_replica(state: &ServerState, list: &ShoppingList) {
    let snapshot = state.membership.read().await.servers.clone();
    let ring = Ring::new(snapshot.into_iter().collect());

    let Some(primary_index) = ring.primary_index(&key_hash(&list.uuid)) else {
        return;
    };
    let positions = ring.replica_positions(primary_index, state.cluster.replica_count);

    let mut replica_id: u8 = 1;
    for position in positions {
        let server = &ring.servers()[position];
        if try_send_replica(server.port, list, replica_id).await {
            debug!(port = server.port, replica_id, uuid = %list.uuid, "replica placed");
        } else {
            warn!(port = server.port, replica_id, uuid = %list.uuid, "replica attempt failed, deferring to repair loop");
        }
        replica_id += 1;
    }
}

async fn try_send_replica(port: u16, list: &ShoppingList, replica_id: u8) -> bool {
    let Ok(replica_json) = list.to_json() else {
        return false;
    };
    let Ok(frame) = Frame::new(
        MessageType::Replica,
        ReplicaPayload {
            replica_list: replica_json,
            replica_id,
        },
    ) else {
        return false;
    };

    match shoplist_net::send_request(loopback_addr(port), &frame).await {
        Ok(reply) => reply.msg_type == MessageType::ReplicaAck,
        Err(_) => false,
    }
}
