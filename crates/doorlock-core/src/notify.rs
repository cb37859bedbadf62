//! Token display notifications
//!
//! Every rotation hands the new token to a [`NotificationSink`] so it can be
//! shown out-of-band, typically as a scannable code next to the door.

use std::thread;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Receives each newly generated token
pub trait NotificationSink: Send + Sync {
    /// Publish a new token and the full URL embedding it
    fn publish(&self, token_hex: &str, url: &str) -> Result<()>;
}

/// A single published token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub token_hex: String,
    pub url: String,
}

/// Sink that only writes the token URL to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, token_hex: &str, url: &str) -> Result<()> {
        info!(token = %token_hex, "Token URL: {}", url);
        Ok(())
    }
}

/// Sink that fans publications out to subscribers
pub struct BroadcastSink {
    tx: broadcast::Sender<Publication>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future publications
    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.tx.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, token_hex: &str, url: &str) -> Result<()> {
        // No subscribers is not an error
        let _ = self.tx.send(Publication {
            token_hex: token_hex.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }
}

/// Moves a slow sink off the caller's path.
///
/// `publish` only enqueues; a dedicated thread forwards each publication to
/// the wrapped sink in order. Errors from the wrapped sink are logged there.
/// The thread exits once the `DeferredSink` is dropped and the queue drains.
pub struct DeferredSink {
    tx: mpsc::UnboundedSender<Publication>,
}

impl DeferredSink {
    /// Start the publisher thread for `inner`
    pub fn spawn<S>(inner: S) -> Result<Self>
    where
        S: NotificationSink + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Publication>();

        thread::Builder::new()
            .name("token-publisher".to_string())
            .spawn(move || {
                while let Some(publication) = rx.blocking_recv() {
                    if let Err(e) = inner.publish(&publication.token_hex, &publication.url) {
                        warn!("Deferred token publication failed: {}", e);
                    }
                }
                debug!("Token publisher stopped");
            })
            .map_err(|e| Error::Notification(format!("Failed to start publisher: {}", e)))?;

        Ok(Self { tx })
    }
}

impl NotificationSink for DeferredSink {
    fn publish(&self, token_hex: &str, url: &str) -> Result<()> {
        self.tx
            .send(Publication {
                token_hex: token_hex.to_string(),
                url: url.to_string(),
            })
            .map_err(|_| Error::Notification("Token publisher has stopped".to_string()))
    }
}
