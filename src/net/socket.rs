//! The abstract network byte stream (spec §6) and its one shipped backend.
//!
//! Spec §6 treats the socket backend as an external collaborator: "a
//! concrete backend is not part of the design." [`AsyncByteStream`] is that
//! seam; [`TokioStream`] is the crate's only implementation, kept to this
//! one file so [`super::peer::PeerStateMachine`] and [`super::multiplexer::Multiplexer`]
//! never name `tokio::net::TcpStream` directly (SPEC_FULL §6).

// Layer 1: Standard library imports
use std::io::ErrorKind;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// Layer 3: Internal module imports
use crate::error::IoError;

/// The byte-stream contract the remoting layer consumes (spec §6): `open_stream`/
/// `connect`/`accept` live one level up (at the [`super::multiplexer::Multiplexer`]),
/// this trait only covers the per-connection read/write/close surface.
#[async_trait]
pub trait AsyncByteStream: Send {
    /// Reads at least one byte into `buf`, returning the count read, or
    /// `Ok(0)` at EOF.
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Writes as much of `buf` as the backend accepts in one call.
    async fn write_some(&mut self, buf: &[u8]) -> Result<usize, IoError>;

    /// Closes the stream. Best-effort; errors are not actionable once the
    /// caller has decided to tear down the connection.
    async fn close(&mut self);
}

fn classify(err: std::io::Error) -> IoError {
    match err.kind() {
        ErrorKind::WouldBlock => IoError::WouldBlock,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => IoError::Reset,
        ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe => IoError::ConnectionClosed,
        _ => IoError::Other(err.to_string()),
    }
}

/// Tokio-backed [`AsyncByteStream`] over a TCP connection.
pub struct TokioStream {
    inner: TcpStream,
}

impl TokioStream {
    pub fn new(inner: TcpStream) -> Self {
        TokioStream { inner }
    }

    pub async fn connect(addr: std::net::SocketAddr) -> Result<Self, IoError> {
        let inner = TcpStream::connect(addr).await.map_err(classify)?;
        Ok(TokioStream { inner })
    }

    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.inner.peer_addr().ok()
    }
}

#[async_trait]
impl AsyncByteStream for TokioStream {
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, IoError> {
        self.inner.read(buf).await.map_err(classify)
    }

    async fn write_some(&mut self, buf: &[u8]) -> Result<usize, IoError> {
        self.inner.write(buf).await.map_err(classify)
    }

    async fn close(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}
