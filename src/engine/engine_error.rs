use std::fmt;

/// Failure reported by the transport engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The description or candidate text could not be parsed.
    Parse(String),
    /// Parsed fine but the engine refused to apply it.
    Rejected(String),
    /// No peer connection exists (closed or never created).
    Unavailable,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "parse error: {e}"),
            Self::Rejected(e) => write!(f, "rejected by engine: {e}"),
            Self::Unavailable => write!(f, "engine unavailable"),
        }
    }
}

impl std::error::Error for EngineError {}
