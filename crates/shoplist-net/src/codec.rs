use futures::{SinkExt, StreamExt};
use shoplist_proto::Frame;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Proto(#[from] shoplist_proto::ProtoError),

    #[error("operation timed out")]
    Timeout,
}

pub type NetResult<T> = Result<T, NetError>;

/// A single TCP connection framed as length-prefixed `Frame` JSON
/// documents. Used on both ends: servers hold one per inbound connection,
/// clients open a fresh one per outbound request (spec §5: "a fresh
/// ephemeral socket is opened per outbound request to avoid interleaving").
pub struct FrameConnection {
    inner: Framed<TcpStream, LengthDelimitedCodec>,
}

impl FrameConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            inner: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    pub async fn connect(addr: impl tokio::net::ToSocketAddrs) -> NetResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true).ok();
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, frame: &Frame) -> NetResult<()> {
        let bytes = frame.to_bytes()?;
        self.inner.send(bytes.into()).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> NetResult<Frame> {
        match self.inner.next().await {
            Some(Ok(bytes)) => Ok(Frame::from_bytes(&bytes)?),
            Some(Err(e)) => Err(NetError::Io(e)),
            None => Err(NetError::ConnectionClosed),
        }
    }
}
