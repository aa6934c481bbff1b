//! The narrow interface to the external real-time transport engine.
pub mod description;
pub mod engine_error;
pub mod flow;
pub mod notifier;
pub mod peer_engine;

pub use description::{IceCandidate, SdpKind, SessionDescription};
pub use engine_error::EngineError;
pub use flow::{DataFlow, FlowConfig, FlowKind, FlowTable, PayloadHandler};
pub use notifier::EngineNotifier;
pub use peer_engine::{DescriptionResult, FlowIo, PeerEngine};
