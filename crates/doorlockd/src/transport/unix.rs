//! Unix domain socket transport

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{DaemonError, Result};

use super::connection::RequestTransport;

/// Unix domain socket listener
pub struct UnixTransport {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl UnixTransport {
    /// Bind to `path`, replacing a stale socket file
    pub async fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)
            .map_err(|e| DaemonError::Transport(format!("Failed to bind socket: {}", e)))?;

        Ok(Self {
            listener,
            socket_path: path.to_path_buf(),
        })
    }
}

#[async_trait]
impl RequestTransport for UnixTransport {
    type Stream = UnixStream;

    async fn accept(&self) -> Result<(Self::Stream, String)> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| DaemonError::Transport(format!("Accept failed: {}", e)))?;
        Ok((stream, format!("unix:{}", self.socket_path.display())))
    }

    async fn cleanup(&self) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        Ok(())
    }
}
