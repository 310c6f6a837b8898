//! Peer wire protocol parsing
//!
//! The line transport speaks newline-delimited JSON:
//!
//! ```text
//! -> {"id":1,"method":"weather.fetch"}
//! <- {"id":1,"result":{"high":20.0,"low":10.0,"icon":"<base64>"}}
//! <- {"id":2,"error":"no data"}
//! <- {"event":"weather.changed","params":{"icon":"<base64>"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;
use sunface_core::prelude::*;
use sunface_core::{FetchOutcome, PeerEvent, RequestId, WeatherSnapshot};

/// Method name of a fetch request
pub const FETCH_METHOD: &str = "weather.fetch";

/// Event name of a peer-initiated snapshot change
pub const PUSH_EVENT: &str = "weather.changed";

/// A parsed inbound line from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    Response { id: RequestId, outcome: FetchOutcome },
    Push(WeatherSnapshot),
}

impl From<PeerMessage> for PeerEvent {
    fn from(msg: PeerMessage) -> Self {
        match msg {
            PeerMessage::Response { id, outcome } => PeerEvent::Response { id, outcome },
            PeerMessage::Push(snapshot) => PeerEvent::Push(snapshot),
        }
    }
}

/// Raw shapes accepted on the wire
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInbound {
    Response {
        id: RequestId,
        #[serde(default)]
        result: Option<WeatherSnapshot>,
        #[serde(default)]
        error: Option<serde_json::Value>,
    },
    Event {
        event: String,
        #[serde(default)]
        params: WeatherSnapshot,
    },
}

/// Outbound request line
#[derive(Debug, Serialize)]
struct RawRequest<'a> {
    id: RequestId,
    method: &'a str,
}

/// Parse one line from the peer.
///
/// Blank lines and unknown events yield `Ok(None)`. A line that is not a
/// response or event is an [`Error::Protocol`].
pub fn parse_peer_message(line: &str) -> Result<Option<PeerMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let msg = match serde_json::from_str::<RawInbound>(line) {
        Ok(RawInbound::Response { id, result, error }) => {
            let outcome = match error {
                Some(err) => FetchOutcome::NoData {
                    message: error_message(err),
                },
                None => FetchOutcome::Snapshot(result.unwrap_or_default()),
            };
            Some(PeerMessage::Response { id, outcome })
        }
        Ok(RawInbound::Event { event, params }) if event == PUSH_EVENT => {
            Some(PeerMessage::Push(params))
        }
        Ok(RawInbound::Event { event, .. }) => {
            debug!("Ignoring unknown peer event: {}", event);
            None
        }
        Err(e) => {
            return Err(Error::protocol(format!("unparseable line ({}): {}", e, line)));
        }
    };
    Ok(msg)
}

fn error_message(err: serde_json::Value) -> String {
    match err {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Build a fetch request line (without trailing newline)
pub fn encode_request(id: RequestId) -> String {
    let request = RawRequest {
        id,
        method: FETCH_METHOD,
    };
    serde_json::to_string(&request).unwrap_or_else(|_| format!(r#"{{"id":{id}}}"#))
}

/// Build a response line, as the peer would send it
pub fn encode_response(id: RequestId, outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Snapshot(snapshot) => json!({ "id": id, "result": snapshot }),
        FetchOutcome::NoData { message } => json!({ "id": id, "error": message }),
    }
    .to_string()
}

/// Build a push line, as the peer would send it
pub fn encode_push(snapshot: &WeatherSnapshot) -> String {
    json!({ "event": PUSH_EVENT, "params": snapshot }).to_string()
}

/// Parse a fetch request line, as the peer would receive it
pub fn parse_request(line: &str) -> Option<RequestId> {
    #[derive(Deserialize)]
    struct Incoming {
        id: RequestId,
        method: String,
    }

    serde_json::from_str::<Incoming>(line.trim())
        .ok()
        .filter(|req| req.method == FETCH_METHOD)
        .map(|req| req.id)
}
