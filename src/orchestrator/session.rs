use std::fmt;

use crate::completion::Generation;
use crate::transport::PreferredTransport;

/// Peer id meaning "not known yet" / "relay did not say".
pub const UNSET_PEER: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Idle,
    Joining,
    Registered,
    Negotiating,
    Streaming,
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Joining => "Joining",
            Self::Registered => "Registered",
            Self::Negotiating => "Negotiating",
            Self::Streaming => "Streaming",
            Self::Closing => "Closing",
        };
        f.write_str(s)
    }
}

/// The one live peer session.
#[derive(Debug, Clone)]
pub struct Session {
    pub room_id: String,
    pub client_id: String,
    pub peer_id: i64,
    pub is_initiator: bool,
    pub state: SessionState,
    /// Fixed at join time from the initiator role.
    pub preferred_transport: PreferredTransport,
    pub loopback: bool,
    pub generation: Generation,
    pub wss_url: String,
    /// Base URL of the rendezvous service.
    pub base_url: String,
    /// Join-time messages, replayed after the first duplex registration.
    pub initial_messages: Vec<String>,
    pub offer_requested: bool,
    pub duplex_established: bool,
    /// Generation token of the duplex connect in flight, if any.
    pub duplex_attempt: Option<Generation>,
    pub duplex_retries_left: u32,
}

impl Session {
    #[must_use]
    pub fn preferred_for(is_initiator: bool) -> PreferredTransport {
        if is_initiator {
            PreferredTransport::RequestResponse
        } else {
            PreferredTransport::Duplex
        }
    }

    /// `UNSET_PEER` always passes, as does anything while no peer is bound.
    #[must_use]
    pub fn accepts_peer(&self, peer_id: i64) -> bool {
        peer_id == UNSET_PEER || self.peer_id == UNSET_PEER || self.peer_id == peer_id
    }

    /// Binds the Session to the first concrete peer id it hears from.
    pub fn bind_peer(&mut self, peer_id: i64) {
        if self.peer_id == UNSET_PEER && peer_id != UNSET_PEER {
            self.peer_id = peer_id;
        }
    }
}
