use crate::completion::Completion;
use crate::engine::{
    description::{IceCandidate, SessionDescription},
    engine_error::EngineError,
    flow::{FlowConfig, FlowKind},
    notifier::EngineNotifier,
};

pub type DescriptionResult = Result<SessionDescription, EngineError>;

/// Negotiation half of the real-time transport engine.
///
/// Offer/answer creation is asynchronous: the engine completes the handle
/// whenever it is done, from any thread. Everything else is synchronous.
pub trait PeerEngine: Send {
    /// Called once per Session before any other call.
    fn attach(&mut self, notifier: EngineNotifier);

    fn create_offer(&mut self, done: Completion<DescriptionResult>);

    fn create_answer(&mut self, done: Completion<DescriptionResult>);

    /// # Errors
    /// [`EngineError::Rejected`] when the engine refuses the description.
    fn set_local_description(&mut self, desc: &SessionDescription) -> Result<(), EngineError>;

    /// # Errors
    /// [`EngineError::Parse`] for an unparsable body, [`EngineError::Rejected`]
    /// when it is out of order or incompatible.
    fn set_remote_description(&mut self, desc: &SessionDescription) -> Result<(), EngineError>;

    /// # Errors
    /// Any [`EngineError`]; callers treat candidate failures as non-fatal.
    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), EngineError>;

    /// Asks the engine to create a flow. Readiness is reported later
    /// through [`EngineNotifier::flow_state`].
    fn open_flow(&mut self, kind: FlowKind, config: &FlowConfig) -> bool;

    /// Drops the peer connection and every flow.
    fn close(&mut self);
}

/// Data half of the engine, shared with the shaper thread.
pub trait FlowIo: Send + Sync {
    fn send(&self, kind: FlowKind, data: &[u8]) -> bool;
    fn buffered_bytes(&self, kind: FlowKind) -> u64;
    fn is_flow_open(&self, kind: FlowKind) -> bool;
}
