//! Session lifecycle: join, transport selection, offer/answer, teardown.
pub mod events;
pub mod orchestrator_c;
pub mod runtime;
pub mod session;

pub use events::OrchestratorEvent;
pub use orchestrator_c::{OrchestratorDeps, SignalingOrchestrator};
pub use runtime::{Runtime, RuntimeCommand};
pub use session::{Session, SessionState, UNSET_PEER};
