use rand::seq::SliceRandom;
use shoplist_crdt::{Crdt, ShoppingList};
use shoplist_net::loopback_addr;
use shoplist_proto::{Frame, MessageType, RequestFullListPayload, ShoppingListPayload};
use shoplist_storage::{Record, ShoppingListStore, StorageResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// One DEALER-per-proxy, fail-over communicator (spec §4.4.6). Every
/// method shuffles the known proxy set and tries each in turn; a `_NACK`
/// from one proxy moves on to the next rather than retrying it, since a
/// NACK already means that proxy exhausted its own ring fail-over.
#[derive(Clone)]
pub struct Communicator {
    pub proxies: Vec<u16>,
    pub storage: Arc<dyn ShoppingListStore>,
}

impl Communicator {
    pub fn new(proxies: Vec<u16>, storage: Arc<dyn ShoppingListStore>) -> Self {
        Self { proxies, storage }
    }

    fn shuffled_proxies(&self) -> Vec<u16> {
        let mut ports = self.proxies.clone();
        ports.shuffle(&mut rand::thread_rng());
        ports
    }

    /// `send_full_list`: push the local CRDT to any live proxy. On ack,
    /// the merged CRDT replaces local state and `not_sent` clears, per
    /// spec §5's ordering guarantee ("the client observes the merged CRDT
    /// returned by the proxy before local not_sent is cleared").
    pub async fn send_full_list(&self, list: &ShoppingList) -> StorageResult<Option<ShoppingList>> {
        let Ok(json) = list.to_json() else {
            return Ok(None);
        };

        for port in self.shuffled_proxies() {
            let Ok(frame) = Frame::new(
                MessageType::SentFullList,
                ShoppingListPayload {
                    shopping_list: json.clone(),
                },
            ) else {
                continue;
            };

            match shoplist_net::send_request(loopback_addr(port), &frame).await {
                Ok(reply) if reply.msg_type == MessageType::SentFullListAck => {
                    let Ok(payload) = reply.payload_as::<ShoppingListPayload>() else {
                        continue;
                    };
                    let Ok(merged) = ShoppingList::from_json(&payload.shopping_list) else {
                        continue;
                    };
                    debug!(port, uuid = %list.uuid, "send_full_list acked");
                    let mut record = Record::new(merged.clone());
                    record.logical_clock = merged.clock;
                    self.storage.save(record)?;
                    return Ok(Some(merged));
                }
                Ok(_) => debug!(port, uuid = %list.uuid, "proxy nacked send_full_list, trying next"),
                Err(e) => warn!(port, error = %e, "proxy unreachable for send_full_list"),
            }
        }

        // Every proxy failed: persist with the not-sent marker so the
        // heartbeat loop retries later (spec §4.4.6/§7).
        self.storage
            .save(Record::new(list.clone()).hinted_for("client-not-sent"))?;
        Ok(None)
    }

    /// `request_full_list`: fail over across proxies until one acks,
    /// storing (merging) the result locally.
    pub async fn request_full_list(&self, list_id: &str) -> StorageResult<Option<ShoppingList>> {
        for port in self.shuffled_proxies() {
            let Ok(frame) = Frame::new(
                MessageType::RequestFullList,
                RequestFullListPayload {
                    list_id: list_id.to_string(),
                },
            ) else {
                continue;
            };

            match shoplist_net::send_request(loopback_addr(port), &frame).await {
                Ok(reply) if reply.msg_type == MessageType::RequestFullListAck => {
                    let Ok(payload) = reply.payload_as::<ShoppingListPayload>() else {
                        continue;
                    };
                    let Ok(list) = ShoppingList::from_json(&payload.shopping_list) else {
                        continue;
                    };
                    debug!(port, list_id, "request_full_list acked");
                    self.storage.save(Record::new(list.clone()))?;
                    return Ok(Some(list));
                }
                Ok(_) => debug!(port, list_id, "proxy nacked request_full_list, trying next"),
                Err(e) => warn!(port, error = %e, "proxy unreachable for request_full_list"),
            }
        }
        Ok(None)
    }
}
