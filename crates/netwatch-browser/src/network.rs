//! Decoding of DevTools network and navigation events.
//!
//! Only five event kinds matter to the recorder:
//!
//! | CDP method | lifecycle event |
//! |---|---|
//! | `Network.requestWillBeSent` | `RequestStarted` |
//! | `Network.responseReceived` | `ResponseReceived` |
//! | `Network.loadingFinished` | `LoadFinished` |
//! | `Network.loadingFailed` | `LoadFailed` |
//! | `Page.frameNavigated` (main frame) | `NavigationOccurred` |
//!
//! Everything else decodes to `None`.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use netwatch_types::{
    Initiator, LifecycleEvent, LoadFailed, LoadFinished, RequestStarted, ResourceTiming,
    ResponseReceived,
};

use crate::cdp::CdpEvent;
use crate::error::BrowserError;

/// DevTools domains the recorder enables before listening.
pub const REQUIRED_DOMAINS: [&str; 2] = ["Network", "Page"];

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestWillBeSent {
    request_id: String,
    request: WireRequest,
    timestamp: f64,
    #[serde(rename = "type")]
    resource_type: Option<String>,
    initiator: Option<WireInitiator>,
}

#[derive(Deserialize)]
struct WireRequest {
    url: String,
    method: String,
}

#[derive(Deserialize)]
struct WireInitiator {
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponseReceived {
    request_id: String,
    timestamp: f64,
    response: WireResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    status: u16,
    mime_type: Option<String>,
    protocol: Option<String>,
    #[serde(default)]
    headers: HashMap<String, Value>,
    #[serde(default)]
    encoded_data_length: f64,
    timing: Option<ResourceTiming>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadingFinished {
    request_id: String,
    timestamp: f64,
    #[serde(default)]
    encoded_data_length: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadingFailed {
    request_id: String,
    timestamp: f64,
    error_text: String,
}

#[derive(Deserialize)]
struct FrameNavigated {
    frame: WireFrame,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFrame {
    parent_id: Option<String>,
    #[serde(default)]
    url: String,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a raw CDP event into a lifecycle event.
///
/// Returns `Ok(None)` for events the recorder does not track, including
/// subframe navigations. Returns an error when a tracked event is malformed.
pub fn decode_event(event: &CdpEvent) -> Result<Option<LifecycleEvent>, BrowserError> {
    let decoded = match event.method.as_str() {
        "Network.requestWillBeSent" => {
            let p: RequestWillBeSent = params(event)?;
            LifecycleEvent::RequestStarted(RequestStarted {
                request_id: p.request_id,
                timestamp: p.timestamp,
                url: p.request.url,
                method: p.request.method,
                resource_type: p.resource_type,
                initiator: p.initiator.map(|i| Initiator {
                    kind: i.kind,
                    url: i.url.filter(|u| !u.is_empty()),
                }),
            })
        }
        "Network.responseReceived" => {
            let p: WireResponseReceived = params(event)?;
            LifecycleEvent::ResponseReceived(ResponseReceived {
                request_id: p.request_id,
                timestamp: p.timestamp,
                status: p.response.status,
                mime_type: p.response.mime_type,
                protocol: p.response.protocol,
                headers: stringify_headers(p.response.headers),
                encoded_data_length: p.response.encoded_data_length,
                timing: p.response.timing,
            })
        }
        "Network.loadingFinished" => {
            let p: LoadingFinished = params(event)?;
            LifecycleEvent::LoadFinished(LoadFinished {
                request_id: p.request_id,
                timestamp: p.timestamp,
                encoded_data_length: p.encoded_data_length,
            })
        }
        "Network.loadingFailed" => {
            let p: LoadingFailed = params(event)?;
            LifecycleEvent::LoadFailed(LoadFailed {
                request_id: p.request_id,
                timestamp: p.timestamp,
                error_text: p.error_text,
            })
        }
        "Page.frameNavigated" => {
            let p: FrameNavigated = params(event)?;
            if p.frame.parent_id.is_some() {
                return Ok(None);
            }
            LifecycleEvent::NavigationOccurred { url: p.frame.url }
        }
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

fn params<T: DeserializeOwned>(event: &CdpEvent) -> Result<T, BrowserError> {
    T::deserialize(&event.params).map_err(|e| BrowserError::Protocol {
        detail: format!("malformed {} event: {e}", event.method),
    })
}

/// Header values are strings in practice; anything else is rendered as JSON.
fn stringify_headers(headers: HashMap<String, Value>) -> BTreeMap<String, String> {
    headers
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect()
}
