use std::fmt;

use crate::transport::transport_error::TransportError;

/// Which channel carries a Session's outbound signaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredTransport {
    RequestResponse,
    Duplex,
}

impl fmt::Display for PreferredTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestResponse => write!(f, "request/response"),
            Self::Duplex => write!(f, "duplex"),
        }
    }
}

/// Something an endpoint observed since the last [`TransportEndpoint::service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One complete inbound text payload.
    Message(String),
    ConnectionChanged(bool),
    /// A send that was accepted earlier failed for good.
    SendFailed(TransportError),
    /// Payloads accepted by `send` that never left before the channel died,
    /// oldest first.
    Unsent(Vec<String>),
}

/// One signaling channel carrying opaque text payloads.
pub trait TransportEndpoint: Send {
    fn kind(&self) -> PreferredTransport;

    fn is_open(&self) -> bool;

    /// Accepts a payload for delivery.
    ///
    /// # Errors
    /// [`TransportError::NotConnected`] / [`TransportError::Closed`] when the
    /// channel cannot take payloads; callers queue and retry later.
    fn send(&mut self, payload: String) -> Result<(), TransportError>;

    /// Non-blocking pump. Drives pending I/O and returns what happened.
    fn service(&mut self) -> Vec<TransportEvent>;

    fn close(&mut self);
}
