//! DevTools target discovery.
//!
//! Chrome lists its debuggable targets at `http://127.0.0.1:{port}/json/list`.
//! A capture is addressed either by one of those target ids or directly by a
//! `ws://` URL.

use serde::Deserialize;

use crate::error::BrowserError;

/// One entry from the DevTools `/json/list` endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Absent when another client is already attached to the target.
    pub web_socket_debugger_url: Option<String>,
}

/// Resolve a capture target to a DevTools WebSocket URL.
///
/// `target` may already be a `ws://`/`wss://` URL, in which case it is used
/// as-is. Otherwise it is looked up by id on the local DevTools endpoint.
pub async fn resolve_target(port: u16, target: &str) -> Result<String, BrowserError> {
    if is_websocket_url(target) {
        return Ok(target.to_string());
    }

    let list_url = format!("http://127.0.0.1:{port}/json/list");
    tracing::debug!(url = %list_url, target, "querying DevTools targets");

    let targets: Vec<TargetInfo> = reqwest::get(&list_url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| BrowserError::ConnectionFailed {
            url: list_url.clone(),
            reason: e.to_string(),
        })?
        .json()
        .await
        .map_err(|e| BrowserError::Protocol {
            detail: format!("unexpected /json/list payload: {e}"),
        })?;

    select_target(&targets, target, port)
}

/// Pick the WebSocket URL for `target` out of a `/json/list` response.
pub fn select_target(
    targets: &[TargetInfo],
    target: &str,
    port: u16,
) -> Result<String, BrowserError> {
    let info = targets
        .iter()
        .find(|t| t.id == target)
        .ok_or_else(|| BrowserError::TargetNotFound {
            target: target.to_string(),
            port,
        })?;

    Ok(info
        .web_socket_debugger_url
        .clone()
        .unwrap_or_else(|| format!("ws://127.0.0.1:{port}/devtools/page/{}", info.id)))
}

fn is_websocket_url(target: &str) -> bool {
    target.starts_with("ws://") || target.starts_with("wss://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Vec<TargetInfo> {
        serde_json::from_value(serde_json::json!([
            {
                "description": "",
                "devtoolsFrontendUrl": "/devtools/inspector.html?ws=127.0.0.1:9222/devtools/page/AAA",
                "id": "AAA",
                "title": "Example",
                "type": "page",
                "url": "https://example.com/",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/AAA"
            },
            {
                "id": "BBB",
                "title": "Attached elsewhere",
                "type": "page",
                "url": "https://example.org/"
            }
        ]))
        .unwrap()
    }

    #[test]
    fn selects_debugger_url_by_id() {
        let url = select_target(&targets(), "AAA", 9222).unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/page/AAA");
    }

    #[test]
    fn falls_back_to_conventional_url() {
        let url = select_target(&targets(), "BBB", 9333).unwrap();
        assert_eq!(url, "ws://127.0.0.1:9333/devtools/page/BBB");
    }

    #[test]
    fn unknown_target_is_reported() {
        let err = select_target(&targets(), "CCC", 9222).unwrap_err();
        assert!(matches!(err, BrowserError::TargetNotFound { ref target, port: 9222 } if target == "CCC"));
    }

    #[tokio::test]
    async fn websocket_url_passes_through() {
        let url = resolve_target(9222, "ws://10.0.0.2:9222/devtools/page/X")
            .await
            .unwrap();
        assert_eq!(url, "ws://10.0.0.2:9222/devtools/page/X");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connection_failure() {
        let err = resolve_target(1, "AAA").await.unwrap_err();
        assert!(matches!(err, BrowserError::ConnectionFailed { .. }));
    }
}
