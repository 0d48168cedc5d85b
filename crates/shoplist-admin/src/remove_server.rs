use crate::error::{AdminError, AdminResult};
use shoplist_net::{loopback_addr, send_request};
use shoplist_proto::{EmptyPayload, Frame, MessageType};
use tracing::info;

/// Drives the `REMOVE_SERVER` / `REMOVE_SERVER_ACK` handshake of spec
/// §4.4.7 against the server listening on `target_port`.
///
/// The 3-attempt, 1s→2s→4s→8s backoff is `shoplist-net`'s standard
/// schedule (spec §5), the same one every other mesh round-trip uses, so
/// this just delegates to `send_request` rather than re-implementing it.
pub async fn remove_server(target_port: u16) -> AdminResult<()> {
    let request = Frame::new(MessageType::RemoveServer, EmptyPayload {})
        .expect("EmptyPayload always serializes");

    info!(port = target_port, "sending REMOVE_SERVER");
    let reply = send_request(loopback_addr(target_port), &request).await?;

    match reply.msg_type {
        MessageType::RemoveServerAck => {
            info!(port = target_port, "server acknowledged removal");
            Ok(())
        }
        other => {
            tracing::warn!(port = target_port, ?other, "unexpected reply to REMOVE_SERVER");
            Err(AdminError::RemovalUnacknowledged {
                port: target_port,
                attempts: 3,
            })
        }
    }
}
