use crate::codec::{FrameConnection, NetResult};
use async_trait::async_trait;
use shoplist_proto::Frame;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A single request/reply exchange: a client opens a fresh connection,
/// sends one `Frame`, and waits for exactly one `Frame` back before
/// closing, which is the DEALER-socket contract this mesh relies on.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, peer: SocketAddr, request: Frame) -> Frame;
}

/// ROUTER-socket equivalent: accepts inbound connections and dispatches
/// each one-shot request to a fixed-size worker pool so the accept loop
/// itself never blocks on handler work (spec §5).
pub struct RouterServer {
    listener: TcpListener,
    pool_size: usize,
}

impl RouterServer {
    pub async fn bind(addr: impl tokio::net::ToSocketAddrs, pool_size: usize) -> NetResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            pool_size,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop and worker pool until `shutdown` is cancelled.
    /// Each worker pulls one accepted socket at a time off `inbox`, so at
    /// most `pool_size` requests are handled concurrently regardless of
    /// how many connections are queued.
    pub async fn serve<H>(self, handler: Arc<H>, shutdown: CancellationToken)
    where
        H: RequestHandler + 'static,
    {
        let (tx, rx) = async_channel(self.pool_size * 4);

        for worker_id in 0..self.pool_size {
            let rx = rx.clone();
            let handler = handler.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, handler, shutdown).await;
            });
        }

        let listener = self.listener;
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            if tx.send((stream, peer)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!("router accept loop shutting down");
                    break;
                }
            }
        }
    }
}

async fn worker_loop<H>(
    worker_id: usize,
    rx: async_channel::Receiver<(TcpStream, SocketAddr)>,
    handler: Arc<H>,
    shutdown: CancellationToken,
) where
    H: RequestHandler + 'static,
{
    loop {
        tokio::select! {
            next = rx.recv() => {
                let Ok((stream, peer)) = next else { break };
                if let Err(e) = handle_one(stream, peer, handler.as_ref()).await {
                    error!(worker_id, peer = %peer, error = %e, "request handling failed");
                }
            }
            _ = shutdown.cancelled() => {
                debug!(worker_id, "worker shutting down");
                break;
            }
        }
    }
}

async fn handle_one(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &impl RequestHandler,
) -> NetResult<()> {
    let mut conn = FrameConnection::new(stream);
    let request = conn.recv().await?;
    debug!(?peer, msg_type = ?request.msg_type, "dispatching request");
    let response = handler.handle(peer, request).await;
    conn.send(&response).await?;
    Ok(())
}

fn async_channel(
    capacity: usize,
) -> (
    async_channel::Sender<(TcpStream, SocketAddr)>,
    async_channel::Receiver<(TcpStream, SocketAddr)>,
) {
    async_channel::bounded(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoplist_proto::{EmptyPayload, MessageType};

    struct EchoHandler;

    #[async_trait]
    impl RequestHandler for EchoHandler {
        async fn handle(&self, _peer: SocketAddr, request: Frame) -> Frame {
            request
        }
    }

    #[tokio::test]
    async fn server_echoes_requests_through_the_worker_pool() {
        let server = RouterServer::bind("127.0.0.1:0", 2).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = CancellationToken::new();

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            server.serve(Arc::new(EchoHandler), shutdown_clone).await;
        });

        let mut client = FrameConnection::connect(addr).await.unwrap();
        let sent = Frame::new(MessageType::Gossip, EmptyPayload {}).unwrap();
        client.send(&sent).await.unwrap();
        let reply = client.recv().await.unwrap();

        assert_eq!(reply.msg_type, MessageType::Gossip);
        shutdown.cancel();
    }
}
