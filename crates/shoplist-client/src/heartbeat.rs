use crate::communicator::Communicator;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Retries every `not_sent` record on a fixed interval until a proxy acks
/// it (spec §4.4.6/§7). Each tick is a full drain attempt: a record that
/// fails again just sits in storage, still flagged, for the next tick.
pub async fn run_heartbeat(communicator: Communicator, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {}
            _ = shutdown.cancelled() => return,
        }

        let pending = match communicator.storage.get_all_not_sent() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "heartbeat failed to list not-sent records");
                continue;
            }
        };

        if pending.is_empty() {
            continue;
        }
        debug!(count = pending.len(), "retrying not-sent records");

        for record in pending {
            match communicator.send_full_list(&record.list).await {
                Ok(Some(_)) => {
                    if let Err(e) = communicator.storage.clear_hint(&record.uuid) {
                        warn!(uuid = %record.uuid, error = %e, "failed to clear not-sent marker");
                    }
                }
                Ok(None) => debug!(uuid = %record.uuid, "not-sent record still undeliverable"),
                Err(e) => warn!(uuid = %record.uuid, error = %e, "heartbeat retry errored"),
            }
        }
    }
}
