use std::fmt;

use crate::engine::EngineError;
use crate::transport::TransportError;

/// Failures surfaced by the signaling path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// The rendezvous service refused or garbled the join.
    JoinFailure(String),
    /// Malformed inbound JSON or SDP.
    Parse(String),
    Transport(TransportError),
    /// The engine rejected a description.
    Negotiation(EngineError),
    /// Unknown or out-of-order message.
    ProtocolViolation(String),
    /// Operation not legal in the current state.
    InvalidState(&'static str),
    Timeout(&'static str),
}

impl SignalingError {
    /// Short heading shown above the message in the UI.
    #[must_use]
    pub fn caption(&self) -> &'static str {
        match self {
            Self::JoinFailure(_) => "Join failed",
            Self::Parse(_) => "Bad message",
            Self::Transport(_) => "Connection error",
            Self::Negotiation(_) => "Negotiation failed",
            Self::ProtocolViolation(_) => "Protocol error",
            Self::InvalidState(_) => "Not allowed now",
            Self::Timeout(_) => "Timed out",
        }
    }
}

impl fmt::Display for SignalingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinFailure(e) => write!(f, "join failure: {e}"),
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Transport(e) => write!(f, "transport failure: {e}"),
            Self::Negotiation(e) => write!(f, "negotiation failure: {e}"),
            Self::ProtocolViolation(e) => write!(f, "protocol violation: {e}"),
            Self::InvalidState(op) => write!(f, "{op} is not valid in the current state"),
            Self::Timeout(what) => write!(f, "{what} timed out"),
        }
    }
}

impl std::error::Error for SignalingError {}

impl From<TransportError> for SignalingError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
