//! The front-end collaborator.
pub mod log_ui;
pub mod ui_sink;

pub use log_ui::LogUi;
pub use ui_sink::{PeerInfo, UiSink};
