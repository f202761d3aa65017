//! Event sources feeding a recording session.
//!
//! An [`EventSource`] delivers typed lifecycle events one at a time, in the
//! order the browser emitted them. [`CdpEventSource`] reads from a live
//! DevTools connection; [`ChannelEventSource`] replays events pushed onto an
//! in-process channel.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use netwatch_browser::network::REQUIRED_DOMAINS;
use netwatch_browser::{decode_event, resolve_target, BrowserError, CdpClient};
use netwatch_types::{LifecycleEvent, NetwatchError};

/// Ordered stream of lifecycle events plus the subscribe/unsubscribe RPCs.
#[async_trait]
pub trait EventSource: Send {
    /// Start event delivery (enable the relevant browser domains).
    async fn subscribe(&mut self) -> Result<(), NetwatchError>;

    /// Wait for the next event. `None` means the source has closed.
    ///
    /// Must be cancel-safe: the session races it against a stop signal.
    async fn next_event(&mut self) -> Option<LifecycleEvent>;

    /// Stop event delivery.
    async fn unsubscribe(&mut self) -> Result<(), NetwatchError>;
}

fn source_error(e: BrowserError) -> NetwatchError {
    NetwatchError::SourceError(e.to_string())
}

// ---------------------------------------------------------------------------
// CDP
// ---------------------------------------------------------------------------

/// Lifecycle events decoded from a DevTools page connection.
pub struct CdpEventSource {
    client: CdpClient,
}

impl CdpEventSource {
    /// Resolve `target` (id or `ws://` URL) on `port` and connect to it.
    pub async fn connect(port: u16, target: &str) -> Result<Self, NetwatchError> {
        let ws_url = resolve_target(port, target).await.map_err(source_error)?;
        let client = CdpClient::connect(&ws_url).await.map_err(source_error)?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: CdpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for CdpEventSource {
    async fn subscribe(&mut self) -> Result<(), NetwatchError> {
        for domain in REQUIRED_DOMAINS {
            self.client
                .enable_domain(domain)
                .await
                .map_err(source_error)?;
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<LifecycleEvent> {
        loop {
            let raw = self.client.recv_event().await?;
            match decode_event(&raw) {
                Ok(Some(event)) => return Some(event),
                Ok(None) => continue,
                Err(e) => {
                    warn!(method = %raw.method, error = %e, "skipping malformed event");
                }
            }
        }
    }

    async fn unsubscribe(&mut self) -> Result<(), NetwatchError> {
        let mut first_err = None;
        for domain in REQUIRED_DOMAINS {
            if let Err(e) = self.client.disable_domain(domain).await {
                debug!(domain, error = %e, "failed to disable domain");
                first_err.get_or_insert(source_error(e));
            }
        }
        self.client.close().await;
        first_err.map_or(Ok(()), Err)
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Events pushed by an in-process producer.
///
/// Delivery is gated on `subscribe()`: until then `next_event()` waits,
/// mirroring a browser that emits nothing before its domains are enabled.
pub struct ChannelEventSource {
    rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    subscribed: bool,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<LifecycleEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx,
                subscribed: false,
            },
        )
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn subscribe(&mut self) -> Result<(), NetwatchError> {
        self.subscribed = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<LifecycleEvent> {
        if !self.subscribed {
            std::future::pending::<()>().await;
        }
        self.rx.recv().await
    }

    async fn unsubscribe(&mut self) -> Result<(), NetwatchError> {
        self.subscribed = false;
        self.rx.close();
        Ok(())
    }
}
