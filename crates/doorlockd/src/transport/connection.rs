//! Transport abstraction for the request server

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Server-side listener
#[async_trait]
pub trait RequestTransport: Send + Sync {
    /// The stream type for this transport
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Accept an incoming connection, with a printable peer description
    async fn accept(&self) -> Result<(Self::Stream, String)>;

    /// Clean up resources (e.g., delete socket file on Unix)
    async fn cleanup(&self) -> Result<()>;
}
