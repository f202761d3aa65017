//! Low-level CDP (Chrome DevTools Protocol) WebSocket client.
//!
//! Connects to a page target's DevTools WebSocket and provides JSON-RPC
//! command/response correlation. Every message without an `id` is an event
//! and is forwarded, in arrival order, onto a single unbounded channel; the
//! recorder drains that channel from one task, so events are never
//! processed concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

/// Default timeout for a single CDP command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A CDP event received from the browser.
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// The event method name (e.g. "Network.requestWillBeSent").
    pub method: String,
    /// The event parameters.
    pub params: Value,
}

/// A CDP command to send to the browser.
#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand {
    id: u64,
    method: String,
    params: Value,
}

/// A CDP response from the browser.
#[derive(Debug, Clone)]
pub struct CdpResponse {
    /// The command ID this response correlates to.
    pub id: u64,
    /// The result value on success.
    pub result: Option<Value>,
    /// The error object on failure.
    pub error: Option<CdpResponseError>,
}

/// Error object in a CDP response.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// CdpClient
// ---------------------------------------------------------------------------

/// CDP client owning one WebSocket connection to a page target.
pub struct CdpClient {
    /// Auto-incrementing command ID counter.
    next_id: AtomicU64,
    /// Commands awaiting responses: id -> oneshot sender.
    pending: PendingMap,
    /// WebSocket write half, shared between concurrent commands.
    writer: Mutex<WsSink>,
    /// Ordered event stream fed by the reader task.
    event_rx: mpsc::UnboundedReceiver<CdpEvent>,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools WebSocket endpoint of the form
    /// `ws://localhost:{port}/devtools/page/{target_id}`.
    pub async fn connect(ws_url: &str) -> Result<Self, BrowserError> {
        tracing::info!(url = ws_url, "connecting to Chrome DevTools WebSocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = ws_stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_handle = tokio::spawn(read_loop(reader, Arc::clone(&pending), event_tx));

        tracing::info!(url = ws_url, "CDP WebSocket connection established");

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            event_rx,
            reader_handle,
        })
    }

    /// Send a CDP command and wait for its response.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_command_with_timeout(method, params, COMMAND_TIMEOUT)
            .await
    }

    /// Send a CDP command with a custom timeout.
    pub async fn send_command_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let cmd = CdpCommand {
            id,
            method: method.to_string(),
            params,
        };

        let json = serde_json::to_string(&cmd).map_err(|e| BrowserError::Protocol {
            detail: format!("failed to serialize command: {e}"),
        })?;

        tracing::debug!(id, method, "sending CDP command");

        // Register before sending so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self
            .writer
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::Protocol {
                detail: format!("failed to send WebSocket message: {e}"),
            });
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BrowserError::Protocol {
                    detail: "response channel closed unexpectedly".to_string(),
                })
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(BrowserError::Timeout {
                    method: method.to_string(),
                    duration: timeout,
                });
            }
        };

        if let Some(err) = response.error {
            return Err(BrowserError::CdpError {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Receive the next CDP event in delivery order.
    ///
    /// Returns `None` once the WebSocket has closed and every buffered event
    /// has been drained. Cancel-safe.
    pub async fn recv_event(&mut self) -> Option<CdpEvent> {
        self.event_rx.recv().await
    }

    /// Enable a CDP domain (e.g. "Network", "Page") so it starts emitting events.
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Disable a CDP domain, stopping its events.
    pub async fn disable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send_command(&format!("{domain}.disable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Close the WebSocket and stop the reader task.
    pub async fn close(&self) {
        if let Err(e) = self.writer.lock().await.close().await {
            tracing::debug!(error = %e, "error while closing CDP WebSocket");
        }
        self.reader_handle.abort();
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Background task that reads WebSocket messages and dispatches them.
///
/// Messages with an `id` are responses to pending commands; messages with a
/// `method` and no `id` are events.
async fn read_loop(
    mut reader: SplitStream<WsStream>,
    pending: PendingMap,
    event_tx: mpsc::UnboundedSender<CdpEvent>,
) {
    while let Some(msg_result) = reader.next().await {
        let msg = match msg_result {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "WebSocket read error, stopping reader");
                break;
            }
        };

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(b) => match String::from_utf8(b.to_vec()) {
                Ok(s) => s,
                Err(_) => continue,
            },
            Message::Close(_) => {
                tracing::info!("WebSocket closed by remote");
                break;
            }
            _ => continue,
        };

        let json: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse CDP message as JSON");
                continue;
            }
        };

        if let Some(response) = parse_cdp_response(&json) {
            match pending.lock().await.remove(&response.id) {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => tracing::debug!(id = response.id, "response for unknown command ID"),
            }
        } else if let Some(event) = parse_cdp_event(&json) {
            if event_tx.send(event).is_err() {
                // Receiver dropped: the client is gone.
                break;
            }
        }
    }

    // Fail every in-flight command when the connection drops.
    for (id, tx) in pending.lock().await.drain() {
        let _ = tx.send(CdpResponse {
            id,
            result: None,
            error: Some(CdpResponseError {
                code: -1,
                message: "WebSocket connection closed".to_string(),
                data: None,
            }),
        });
    }
}

// ---------------------------------------------------------------------------
// CDP protocol helpers
// ---------------------------------------------------------------------------

/// Parse a CDP response JSON into its components.
pub fn parse_cdp_response(json: &Value) -> Option<CdpResponse> {
    let id = json.get("id")?.as_u64()?;
    Some(CdpResponse {
        id,
        result: json.get("result").cloned(),
        error: json
            .get("error")
            .and_then(|e| serde_json::from_value(e.clone()).ok()),
    })
}

/// Parse a CDP event JSON into its components.
pub fn parse_cdp_event(json: &Value) -> Option<CdpEvent> {
    if json.get("id").is_some() {
        return None;
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(CdpEvent { method, params })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_routes_by_presence_of_id() {
        let reply = serde_json::json!({ "id": 3, "method": "Network.enable", "result": {} });
        assert_eq!(parse_cdp_response(&reply).map(|r| r.id), Some(3));
        assert!(parse_cdp_event(&reply).is_none());

        let event = serde_json::json!({ "method": "Page.frameNavigated", "params": { "frame": {} } });
        assert!(parse_cdp_response(&event).is_none());
        assert_eq!(parse_cdp_event(&event).unwrap().method, "Page.frameNavigated");
    }

    #[test]
    fn refused_enable_surfaces_cdp_error() {
        let reply = serde_json::json!({
            "id": 9,
            "error": { "code": -32000, "message": "Not allowed" }
        });
        let err = parse_cdp_response(&reply).unwrap().error.unwrap();
        assert_eq!((err.code, err.message.as_str()), (-32000, "Not allowed"));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let err = match CdpClient::connect("ws://127.0.0.1:1/devtools/page/nope").await {
            Ok(_) => panic!("connection to port 1 should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, BrowserError::ConnectionFailed { .. }));
    }
}
