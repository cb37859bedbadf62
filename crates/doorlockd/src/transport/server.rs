//! Request server implementation

use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use doorlock_core::{Logic, Response};

use crate::error::{DaemonError, Result};

use super::connection::RequestTransport;
use super::types::Reply;

/// Longest accepted request line, excluding the line terminator
const MAX_REQUEST_LEN: usize = 4096;

/// Hands every received payload to the authorization engine
pub struct RequestServer {
    logic: Arc<Logic>,
}

impl RequestServer {
    pub fn new(logic: Arc<Logic>) -> Self {
        Self { logic }
    }

    /// Serve an already bound transport.
    ///
    /// Stops accepting when `shutdown` changes; connections already being
    /// handled run to completion.
    pub async fn serve<T>(&self, transport: T, mut shutdown: watch::Receiver<bool>) -> Result<()>
    where
        T: RequestTransport,
    {
        info!("Request server listening");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                accepted = transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection from {}", peer);
                        let logic = Arc::clone(&self.logic);

                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, logic).await {
                                error!("Connection error from {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
        }

        info!("Request server stopped accepting connections");
        transport.cleanup().await
    }
}

/// Handle a single connection: one reply line per request line.
///
/// A line longer than `MAX_REQUEST_LEN` is answered with `NotJson` and the
/// connection is closed.
async fn handle_connection<S>(stream: S, logic: Arc<Logic>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        let read = (&mut reader)
            .take(MAX_REQUEST_LEN as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            break;
        }

        if line.len() > MAX_REQUEST_LEN && !line.ends_with(b"\n") {
            warn!("Request exceeds {} bytes, closing connection", MAX_REQUEST_LEN);
            send_reply(&mut writer, &Reply::from(Response::NotJson)).await?;
            break;
        }

        let response = match std::str::from_utf8(&line) {
            Ok(text) => {
                let payload = text.trim_end_matches(['\r', '\n']);
                if payload.trim().is_empty() {
                    line.clear();
                    continue;
                }
                logic.process(payload).await
            }
            Err(_) => Response::NotJson,
        };

        send_reply(&mut writer, &Reply::from(response)).await?;
        line.clear();
    }

    Ok(())
}

/// Send a reply over the socket
async fn send_reply<W>(writer: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(reply).map_err(DaemonError::from)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TcpTransport;
    use doorlock_core::{
        IdentityTemplate, LogicConfig, SimulatedDoor, StaticVerifier, TokenManager,
    };
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpStream;

    async fn start() -> (std::net::SocketAddr, Arc<Logic>, watch::Sender<bool>) {
        let tokens = TokenManager::new(
            "https://door/?t=",
            Arc::new(doorlock_core::LogSink),
        );
        let logic = Arc::new(
            Logic::with_token_manager(
                LogicConfig {
                    token_timeout: Duration::from_secs(60),
                    identity_template: IdentityTemplate::parse("uid=%s").unwrap(),
                    web_prefix: "https://door/?t=".to_string(),
                },
                tokens,
                Box::new(SimulatedDoor::default()),
                Arc::new(StaticVerifier::new().with_user("uid=alice", "secret")),
            )
            .unwrap(),
        );

        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = RequestServer::new(Arc::clone(&logic));
        tokio::spawn(async move { server.serve(transport, shutdown_rx).await });

        (addr, logic, shutdown_tx)
    }

    async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> serde_json::Value {
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_one_reply_per_line() {
        let (addr, logic, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        writer.write_all(b"hello\n").await.unwrap();
        assert_eq!(read_reply(&mut reader).await["code"], 4);

        let token = logic.current_token().await.to_hex();
        let request = serde_json::json!({
            "action": "unlock",
            "ip": "127.0.0.1",
            "user": "alice",
            "password": "secret",
            "token": token,
        });
        writer
            .write_all(format!("{}\r\n", request).as_bytes())
            .await
            .unwrap();
        let reply = read_reply(&mut reader).await;
        assert_eq!(reply["code"], 0);
        assert_eq!(reply["response"], "Success");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_not_json() {
        let (addr, _logic, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        writer.write_all(b"{\xff\xfe}\n").await.unwrap();
        assert_eq!(read_reply(&mut reader).await["response"], "NotJson");
    }

    #[tokio::test]
    async fn test_oversized_line_closes_connection() {
        let (addr, _logic, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        writer
            .write_all(&vec![b'a'; MAX_REQUEST_LEN + 1])
            .await
            .unwrap();
        assert_eq!(read_reply(&mut reader).await["response"], "NotJson");

        let mut rest = String::new();
        assert_eq!(reader.read_line(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_longest_line_is_processed() {
        let (addr, _logic, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);

        let mut line = vec![b' '; MAX_REQUEST_LEN - 2];
        line.extend_from_slice(b"{}\n");
        writer.write_all(&line).await.unwrap();
        assert_eq!(read_reply(&mut reader).await["response"], "JsonError");

        // The connection stays usable
        writer.write_all(b"hello\n").await.unwrap();
        assert_eq!(read_reply(&mut reader).await["response"], "NotJson");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (addr, _logic, shutdown) = start().await;
        shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Either the connect is refused or the socket is closed unanswered
        if let Ok(mut stream) = TcpStream::connect(addr).await {
            stream.write_all(b"hello\n").await.ok();
            let mut buf = Vec::new();
            let read = tokio::time::timeout(Duration::from_secs(1), stream.read_to_end(&mut buf))
                .await;
            assert!(matches!(read, Ok(Ok(0)) | Ok(Err(_))));
        }
    }
}
