use shoplist_net::loopback_addr;
use crate::state::ServerState;
use shoplist_crdt::ShoppingList;
use shoplist_membership::Ring;
use shoplist_proto::{Frame, HintedHandoffPayload, MessageType};
use shoplist_storage::Record;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Spec §4.4.5: every `repair_interval_secs` (nominal 10s), scan local
/// storage and hand off any record whose ring-intended home is no longer
/// this node. Runs until `shutdown` is cancelled.
pub async fn run_repair_loop(state: ServerState, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_secs(state.cluster.repair_interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                repair_tick(&state).await;
            }
            _ = shutdown.cancelled() => {
                debug!("repair loop shutting down");
                break;
            }
        }
    }
}

async fn repair_tick(state: &ServerState) {
    let snapshot = state.membership.read().await.servers.clone();
    let ring = Ring::new(snapshot.into_iter().collect());
    if ring.is_empty() {
        return;
    }

    let records = match state.storage.get_all() {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "repair tick could not scan storage");
            return;
        }
    };

    // destination port -> (main_lists json, replica_lists (json, replica_id))
    let mut hints: HashMap<u16, (Vec<String>, Vec<(String, u8)>)> = HashMap::new();
    let mut handed_off: Vec<String> = Vec::new();

    for record in records {
        let replica_id = extract_replica_id(&record);
        let Some(intended) = ring.intended_server(&record.uuid, replica_id) else {
            continue;
        };
        if intended.port == state.port {
            continue;
        }

        let Ok(json) = record.list.to_json() else {
            continue;
        };
        let entry = hints.entry(intended.port).or_default();
        if record.is_replica {
            entry.1.push((json, replica_id.unwrap_or(1)));
        } else {
            entry.0.push(json);
        }
        handed_off.push(record.uuid.clone());
    }

    for (port, (main_lists, replica_lists)) in hints {
        if main_lists.is_empty() && replica_lists.is_empty() {
            continue;
        }
        let uuids = records_for(&main_lists, &replica_lists);
        if send_handoff(port, main_lists, replica_lists).await {
            for uuid in uuids {
                if let Err(e) = state.storage.delete(&uuid) {
                    warn!(error = %e, uuid, "failed to drop handed-off record");
                }
            }
        }
    }
}

/// `(list, replica_id)` slot this record's ring placement is computed
/// against. Primary copies carry no replica id; replicas carry the
/// successor slot `send_replica` assigned them (spec §4.4.5).
fn extract_replica_id(record: &Record) -> Option<u8> {
    if record.is_replica {
        record.replica_id.or(Some(1))
    } else {
        None
    }
}

fn records_for(main_lists: &[String], replica_lists: &[(String, u8)]) -> Vec<String> {
    main_lists
        .iter()
        .chain(replica_lists.iter().map(|(json, _)| json))
        .filter_map(|json| ShoppingList::from_json(json).ok())
        .map(|list| list.uuid)
        .collect()
}

async fn send_handoff(port: u16, main_lists: Vec<String>, replica_lists: Vec<(String, u8)>) -> bool {
    let Ok(frame) = Frame::new(
        MessageType::HintedHandoff,
        HintedHandoffPayload {
            main_lists,
            replica_lists,
        },
    ) else {
        return false;
    };

    match shoplist_net::send_request(loopback_addr(port), &frame).await {
        Ok(reply) => reply.msg_type == MessageType::HintedHandoffAck,
        Err(_) => false,
    }
}
