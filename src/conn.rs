use hyper::HeaderMap;
use hyper::header;
use std::fmt::Display;

/// How a request intends to use its connection, deduced from headers
/// before the first middleware runs.
///
/// The classification drives panic-severity triage and write-deadline
/// handling; it never looks at the path, the extension or the query
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnKind {
    /// An ordinary request/response exchange.
    Http,
    /// A server-sent-events stream (`Accept: text/event-stream`).
    Sse,
    /// A WebSocket upgrade (`Connection: Upgrade` + `Upgrade: websocket`).
    WebSocket,
}

impl ConnKind {
    /// Whether the connection is expected to outlive a normal exchange.
    pub fn is_streaming(&self) -> bool {
        matches!(self, ConnKind::Sse | ConnKind::WebSocket)
    }
}

impl Display for ConnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnKind::Http => "HTTP",
            ConnKind::Sse => "SSE",
            ConnKind::WebSocket => "WebSocket",
        };
        write!(f, "{}", name)
    }
}

/// Classifies a request from its headers alone.
pub(crate) fn classify(headers: &HeaderMap) -> ConnKind {
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if connection.trim().eq_ignore_ascii_case("upgrade")
        && upgrade.trim().eq_ignore_ascii_case("websocket")
    {
        return ConnKind::WebSocket;
    }

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if accept
        .to_ascii_lowercase()
        .contains(mime::TEXT_EVENT_STREAM.as_ref())
    {
        return ConnKind::Sse;
    }

    ConnKind::Http
}
