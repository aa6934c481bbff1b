/// A room participant as shown in the peer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub client_id: String,
    pub room_id: String,
    pub is_self: bool,
}

/// Front-end the orchestrator drives. Implementations must not block.
pub trait UiSink: Send {
    fn switch_to_connect_ui(&mut self);
    fn switch_to_peer_list_ui(&mut self, peers: &[PeerInfo]);
    fn switch_to_streaming_ui(&mut self);
    fn show_error(&mut self, caption: &str, text: &str);
}
