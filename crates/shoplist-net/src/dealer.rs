use crate::backoff::Backoff;
use crate::codec::{FrameConnection, NetError, NetResult};
use shoplist_proto::Frame;
use tracing::{debug, warn};

/// DEALER-socket equivalent: sends one request and waits for one reply,
/// opening a brand-new TCP connection per attempt (spec §5: "a fresh
/// ephemeral socket is opened per outbound request to avoid interleaving").
///
/// Retries up to 3 times with the mesh-wide 1000/2000/4000/8000ms backoff.
/// A semantic `_NACK` reply is still a successful round-trip from this
/// layer's point of view — callers distinguish ACK from NACK themselves
/// and must not retry the same peer on a NACK (spec §7).
pub async fn send_request(addr: impl ToString, request: &Frame) -> NetResult<Frame> {
    let addr = addr.to_string();
    let mut backoff = Backoff::default();
    let mut last_err = NetError::Timeout;

    while !backoff.exhausted() {
        let timeout = backoff.next_timeout();
        match tokio::time::timeout(timeout, attempt(&addr, request)).await {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(e)) => {
                warn!(addr = %addr, error = %e, "request attempt failed");
                last_err = e;
            }
            Err(_) => {
                debug!(addr = %addr, ?timeout, "request attempt timed out");
                last_err = NetError::Timeout;
            }
        }
    }

    Err(last_err)
}

async fn attempt(addr: &str, request: &Frame) -> NetResult<Frame> {
    let mut conn = FrameConnection::connect(addr).await?;
    conn.send(request).await?;
    conn.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist_proto::{EmptyPayload, MessageType};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_request_succeeds_against_a_live_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = crate::codec::FrameConnection::new(stream);
            let request = conn.recv().await.unwrap();
            conn.send(&request).await.unwrap();
        });

        let request = Frame::new(MessageType::RequestFullList, EmptyPayload {}).unwrap();
        let reply = send_request(addr.to_string(), &request).await.unwrap();
        assert_eq!(reply.msg_type, MessageType::RequestFullList);
    }

    #[tokio::test]
    async fn send_request_fails_after_retries_against_a_dead_address() {
        // Port 1 is reserved/unassigned and should refuse the connection
        // immediately on every platform this runs on.
        let request = Frame::new(MessageType::RequestFullList, EmptyPayload {}).unwrap();
        let result = send_request("127.0.0.1:1", &request).await;
        assert!(result.is_err());
    }
}
