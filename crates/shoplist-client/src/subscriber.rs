use shoplist_crdt::ShoppingList;
use shoplist_net::{loopback_addr, pub_port, SubscriberClient};
use shoplist_proto::{MessageType, ShoppingListPayload};
use shoplist_storage::{Record, ShoppingListStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Background subscriber (spec §4.4.6): one long-lived connection per
/// known proxy's PUB port. Every `LIST_UPDATE` frame is merged straight
/// into local storage — `save` already CRDT-merges, so out-of-order or
/// duplicate deliveries are harmless.
pub async fn run_subscriber(
    proxy_port: u16,
    storage: Arc<dyn ShoppingListStore>,
    shutdown: CancellationToken,
) {
    let addr = loopback_addr(pub_port(proxy_port));
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let mut client = match SubscriberClient::connect(&addr).await {
            Ok(c) => c,
            Err(e) => {
                warn!(proxy_port, error = %e, "subscriber connect failed, retrying in 5s");
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(5)) => continue,
                    _ = shutdown.cancelled() => return,
                }
            }
        };
        debug!(proxy_port, "subscriber connected");

        loop {
            tokio::select! {
                frame = client.recv() => {
                    match frame {
                        Ok(frame) if frame.msg_type == MessageType::ListUpdate => {
                            if let Err(e) = apply_update(&storage, &frame) {
                                warn!(proxy_port, error = %e, "failed to apply list update");
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(proxy_port, error = %e, "subscriber connection lost, reconnecting");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

fn apply_update(
    storage: &Arc<dyn ShoppingListStore>,
    frame: &shoplist_proto::Frame,
) -> Result<(), String> {
    let payload: ShoppingListPayload = frame.payload_as().map_err(|e| e.to_string())?;
    let list = ShoppingList::from_json(&payload.shopping_list).map_err(|e| e.to_string())?;
    let mut record = Record::new(list.clone());
    record.logical_clock = list.clock;
    storage.save(record).map_err(|e| e.to_string())
}
