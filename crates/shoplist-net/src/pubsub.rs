use crate::codec::NetResult;
use futures::SinkExt;
use shoplist_proto::Frame;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// PUB-socket equivalent. Port convention: a node that listens on `P` for
/// DEALER traffic binds `P+1` here (spec §6.1, proxies only).
///
/// Publishing is fire-and-forget: updates are best-effort state-based
/// samples, so a subscriber whose send buffer is full just misses one
/// (spec §5 — "drops are tolerable").
pub struct PublisherServer {
    subscribers: Arc<RwLock<Vec<mpsc::Sender<Frame>>>>,
}

impl PublisherServer {
    pub async fn bind(
        addr: impl tokio::net::ToSocketAddrs,
        shutdown: CancellationToken,
    ) -> NetResult<(Self, std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let subscribers = Arc::new(RwLock::new(Vec::new()));
        let accept_subscribers = subscribers.clone();

        let handle = tokio::spawn(async move {
            accept_loop(listener, accept_subscribers, shutdown).await;
        });

        Ok((Self { subscribers }, local_addr, handle))
    }

    /// Broadcast `frame` to every currently connected subscriber.
    pub async fn publish(&self, frame: Frame) {
        let subs = self.subscribers.read().await;
        for sub in subs.iter() {
            if sub.try_send(frame.clone()).is_err() {
                debug!("subscriber channel full or closed, dropping update");
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

async fn accept_loop(
    listener: TcpListener,
    subscribers: Arc<RwLock<Vec<mpsc::Sender<Frame>>>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(?peer, "subscriber connected");
                        let (tx, rx) = mpsc::channel(32);
                        subscribers.write().await.push(tx);
                        tokio::spawn(forward_to_subscriber(stream, rx));
                    }
                    Err(e) => warn!(error = %e, "pub accept failed"),
                }
            }
            _ = shutdown.cancelled() => {
                debug!("publisher accept loop shutting down");
                break;
            }
        }
    }
}

async fn forward_to_subscriber(stream: TcpStream, mut rx: mpsc::Receiver<Frame>) {
    let mut writer = FramedWrite::new(stream, LengthDelimitedCodec::new());
    while let Some(frame) = rx.recv().await {
        let Ok(bytes) = frame.to_bytes() else { continue };
        if writer.send(bytes.into()).await.is_err() {
            break;
        }
    }
}

/// SUB-socket equivalent: one long-lived connection to a proxy's PUB
/// port. Topic filtering happens client-side, since every published
/// message already carries its full `list.uuid` payload (spec §4.4.6).
pub struct SubscriberClient {
    conn: crate::codec::FrameConnection,
}

impl SubscriberClient {
    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> NetResult<Self> {
        Ok(Self {
            conn: crate::codec::FrameConnection::connect(addr).await?,
        })
    }

    pub async fn recv(&mut self) -> NetResult<Frame> {
        self.conn.recv().await
    }
}
