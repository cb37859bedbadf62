//! TCP transport

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{DaemonError, Result};

use super::connection::RequestTransport;

/// TCP listener
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to `host:port`
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DaemonError::Transport(format!("Failed to bind {}: {}", addr, e)))?;
        Ok(Self { listener })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl RequestTransport for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> Result<(Self::Stream, String)> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| DaemonError::Transport(format!("Accept failed: {}", e)))?;
        Ok((stream, peer.to_string()))
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
