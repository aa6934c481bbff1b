use std::fmt;

use super::engine_error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer or answer. The SDP body is opaque apart from a sanity check
/// that it starts with a version line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    kind: SdpKind,
    sdp: String,
}

impl SessionDescription {
    /// # Errors
    /// [`EngineError::Parse`] when `sdp` is empty or does not open with `v=`.
    pub fn parse(kind: SdpKind, sdp: impl Into<String>) -> Result<Self, EngineError> {
        let sdp = sdp.into();
        let first = sdp.lines().map(str::trim).find(|l| !l.is_empty());
        match first {
            Some(line) if line.starts_with("v=") => Ok(Self { kind, sdp }),
            Some(_) => Err(EngineError::Parse(format!(
                "{kind} does not start with a version line"
            ))),
            None => Err(EngineError::Parse(format!("empty {kind}"))),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SdpKind {
        self.kind
    }

    #[must_use]
    pub fn sdp(&self) -> &str {
        &self.sdp
    }

    /// Same body relabelled as an answer. Used by loopback sessions, where
    /// the local offer is fed straight back as the remote answer.
    #[must_use]
    pub fn as_answer(&self) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: self.sdp.clone(),
        }
    }
}

/// A remote or local ICE candidate as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub mid: String,
    pub mline_index: u32,
    pub candidate: String,
}

impl IceCandidate {
    /// # Errors
    /// [`EngineError::Parse`] when the candidate line is empty.
    pub fn new(
        mid: impl Into<String>,
        mline_index: u32,
        candidate: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let candidate = candidate.into();
        if candidate.trim().is_empty() {
            return Err(EngineError::Parse("empty candidate line".into()));
        }
        Ok(Self {
            mid: mid.into(),
            mline_index,
            candidate,
        })
    }
}
