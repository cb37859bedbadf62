//! Request client implementation

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use doorlock_core::{ActionRequest, Response};

use crate::config::ListenAddr;
use crate::error::{DaemonError, Result};

use super::types::decode_reply;

/// Client for the daemon's request listener
pub struct DoorClient {
    addr: ListenAddr,
}

impl DoorClient {
    pub fn new(addr: ListenAddr) -> Self {
        Self { addr }
    }

    /// Send an action request and get its outcome
    pub async fn request(&self, request: &ActionRequest) -> Result<Response> {
        let payload = serde_json::to_string(request)?;
        self.send_raw(&payload).await
    }

    /// Send an arbitrary single-line payload
    pub async fn send_raw(&self, payload: &str) -> Result<Response> {
        if payload.contains('\n') {
            return Err(DaemonError::Transport(
                "Payload must fit on a single line".to_string(),
            ));
        }

        match &self.addr {
            ListenAddr::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(connect_error)?;
                exchange(stream, payload).await
            }
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(connect_error)?;
                exchange(stream, payload).await
            }
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => Err(DaemonError::Transport(
                "Unix sockets are not supported on this platform".to_string(),
            )),
        }
    }
}

fn connect_error(e: std::io::Error) -> DaemonError {
    if e.kind() == std::io::ErrorKind::NotFound
        || e.kind() == std::io::ErrorKind::ConnectionRefused
    {
        DaemonError::Transport("Daemon not running".to_string())
    } else {
        DaemonError::Transport(format!("Failed to connect: {}", e))
    }
}

async fn exchange<S>(stream: S, payload: &str) -> Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(DaemonError::Transport(
            "Connection closed without a reply".to_string(),
        ));
    }

    decode_reply(&line)
}
