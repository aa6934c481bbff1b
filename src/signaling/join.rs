use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::completion::Completion;
use crate::signaling::signaling_error::SignalingError;
use crate::transport::TransportError;

/// Body of `POST {base}/join/{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinRequest {
    #[serde(skip)]
    pub base_url: Url,
    pub room_id: String,
}

impl JoinRequest {
    #[must_use]
    pub fn new(base_url: Url, room_id: impl Into<String>) -> Self {
        Self {
            base_url,
            room_id: room_id.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> String {
        with_segments(&self.base_url, &["join", self.room_id.as_str()]).into()
    }
}

/// What a successful join hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResponse {
    pub room_id: String,
    pub client_id: String,
    pub is_initiator: bool,
    pub wss_url: String,
    /// Messages the other peer left in the room before we arrived.
    pub messages: Vec<String>,
}

pub type JoinResult = Result<JoinResponse, SignalingError>;

/// Performs the room-join handshake off the caller's thread.
pub trait JoinClient: Send {
    fn join(&mut self, request: JoinRequest, done: Completion<JoinResult>);
}

#[derive(Debug, Deserialize)]
struct RawJoin {
    result: String,
    #[serde(default)]
    params: Option<RawParams>,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    is_initiator: Value,
    #[serde(default)]
    wss_url: String,
    client_id: String,
    room_id: String,
    #[serde(default)]
    messages: Vec<String>,
}

/// Interprets the rendezvous reply body.
///
/// # Errors
/// [`SignalingError::JoinFailure`] for a non-`SUCCESS` result or missing
/// params, [`SignalingError::Parse`] for undecodable JSON.
pub fn parse_join_response(body: &str) -> JoinResult {
    let raw: RawJoin = serde_json::from_str(body)?;
    if raw.result != "SUCCESS" {
        return Err(SignalingError::JoinFailure(format!(
            "server answered {}",
            raw.result
        )));
    }
    let Some(p) = raw.params else {
        return Err(SignalingError::JoinFailure("response has no params".into()));
    };
    let is_initiator = match &p.is_initiator {
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        Value::Bool(b) => *b,
        other => {
            return Err(SignalingError::Parse(format!(
                "is_initiator has unexpected value {other}"
            )));
        }
    };
    if p.client_id.is_empty() || p.room_id.is_empty() {
        return Err(SignalingError::JoinFailure(
            "response is missing client_id or room_id".into(),
        ));
    }
    Ok(JoinResponse {
        room_id: p.room_id,
        client_id: p.client_id,
        is_initiator,
        wss_url: p.wss_url,
        messages: p.messages,
    })
}

/// `https://{server}` unless `server` already names a scheme.
///
/// # Errors
/// [`TransportError::BadUrl`] when the result is not an `http`/`https` URL.
pub fn base_url(server: &str) -> Result<Url, TransportError> {
    let server = server.trim();
    let url = if server.contains("://") {
        Url::parse(server)?
    } else {
        Url::parse(&format!("https://{server}"))?
    };
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(TransportError::BadUrl(format!(
            "{server}: rendezvous server must be http or https"
        )));
    }
    Ok(url)
}

/// Where the initiator posts its outbound messages.
#[must_use]
pub fn message_url(base_url: &Url, room_id: &str, client_id: &str) -> String {
    with_segments(base_url, &["message", room_id, client_id]).into()
}

/// Appends `segments` to the path of `base`, percent-encoding each one.
fn with_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
