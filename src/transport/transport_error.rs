use std::{fmt, io};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel has not connected yet.
    NotConnected,
    /// Nothing could be written right now; retry on the next pump.
    WouldBlock,
    Closed,
    Timeout,
    Io(String),
    Tls(String),
    Http(String),
    WebSocket(String),
    BadUrl(String),
    /// The rendezvous service answered but refused the message.
    Rejected(String),
}

impl TransportError {
    /// True for conditions that go away by trying again later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::NotConnected)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::Closed => write!(f, "channel closed"),
            Self::Timeout => write!(f, "timed out"),
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Tls(e) => write!(f, "TLS error: {e}"),
            Self::Http(e) => write!(f, "HTTP error: {e}"),
            Self::WebSocket(e) => write!(f, "WebSocket error: {e}"),
            Self::BadUrl(e) => write!(f, "bad URL: {e}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => Self::WouldBlock,
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(e: url::ParseError) -> Self {
        Self::BadUrl(e.to_string())
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(e: tungstenite::Error) -> Self {
        use tungstenite::Error as WsError;
        match e {
            WsError::Io(io) => io.into(),
            WsError::ConnectionClosed | WsError::AlreadyClosed => Self::Closed,
            WsError::WriteBufferFull(_) => Self::WouldBlock,
            WsError::Tls(t) => Self::Tls(t.to_string()),
            WsError::Url(u) => Self::BadUrl(u.to_string()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}
