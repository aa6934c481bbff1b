use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{EngineError, IceCandidate, SdpKind, SessionDescription};
use crate::signaling::signaling_error::SignalingError;

/// Messages exchanged with the remote peer through the rendezvous service.
///
/// Wire shape is a flat JSON object tagged by `type`:
/// `{"type":"offer","sdp":..}`, `{"type":"candidate","label":0,"id":"audio","candidate":..}`,
/// `{"type":"bye"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    #[serde(rename = "candidate")]
    IceCandidate {
        #[serde(rename = "id")]
        mid: String,
        #[serde(rename = "label")]
        mline_index: u32,
        candidate: String,
    },
    Bye,
}

/// Result of decoding an inbound payload that was well-formed JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Message(SignalingMessage),
    /// Valid object with a `type` nobody handles.
    Unknown(String),
}

const KNOWN_TYPES: [&str; 4] = ["offer", "answer", "candidate", "bye"];

impl SignalingMessage {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "candidate",
            Self::Bye => "bye",
        }
    }

    /// # Errors
    /// Only if serde_json fails on a plain struct, which it does not in practice.
    pub fn encode(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses one inbound payload.
    ///
    /// # Errors
    /// [`SignalingError::Parse`] when the text is not a JSON object, lacks
    /// `type`, or a known type is missing a required field.
    pub fn decode(text: &str) -> Result<Decoded, SignalingError> {
        let value: Value = serde_json::from_str(text)?;
        Self::decode_value(value)
    }

    /// # Errors
    /// See [`decode`](Self::decode).
    pub fn decode_value(value: Value) -> Result<Decoded, SignalingError> {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err(SignalingError::Parse("missing \"type\"".into()));
        };
        if !KNOWN_TYPES.contains(&kind) {
            return Ok(Decoded::Unknown(kind.to_owned()));
        }
        Ok(Decoded::Message(serde_json::from_value(value)?))
    }

    #[must_use]
    pub fn from_description(desc: &SessionDescription) -> Self {
        let sdp = desc.sdp().to_owned();
        match desc.kind() {
            SdpKind::Offer => Self::Offer { sdp },
            SdpKind::Answer => Self::Answer { sdp },
        }
    }

    #[must_use]
    pub fn from_candidate(c: &IceCandidate) -> Self {
        Self::IceCandidate {
            mid: c.mid.clone(),
            mline_index: c.mline_index,
            candidate: c.candidate.clone(),
        }
    }

    /// Typed description for offer/answer messages, `None` for the rest.
    ///
    /// # Errors
    /// [`EngineError::Parse`] when the SDP body is not usable.
    pub fn to_description(&self) -> Option<Result<SessionDescription, EngineError>> {
        match self {
            Self::Offer { sdp } => Some(SessionDescription::parse(SdpKind::Offer, sdp.as_str())),
            Self::Answer { sdp } => Some(SessionDescription::parse(SdpKind::Answer, sdp.as_str())),
            _ => None,
        }
    }
}
