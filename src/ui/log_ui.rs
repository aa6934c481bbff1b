use std::sync::Arc;

use crate::log::LogSink;
use crate::ui::ui_sink::{PeerInfo, UiSink};
use crate::{sink_error, sink_info};

/// Headless front-end: every screen change and error becomes a log line.
pub struct LogUi {
    log: Arc<dyn LogSink>,
}

impl LogUi {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self { log }
    }
}

impl UiSink for LogUi {
    fn switch_to_connect_ui(&mut self) {
        sink_info!(self.log, "[UI] connect screen");
    }

    fn switch_to_peer_list_ui(&mut self, peers: &[PeerInfo]) {
        let names: Vec<&str> = peers.iter().map(|p| p.client_id.as_str()).collect();
        sink_info!(self.log, "[UI] peer list: {}", names.join(", "));
    }

    fn switch_to_streaming_ui(&mut self) {
        sink_info!(self.log, "[UI] streaming");
    }

    fn show_error(&mut self, caption: &str, text: &str) {
        sink_error!(self.log, "[UI] {}: {}", caption, text);
    }
}
