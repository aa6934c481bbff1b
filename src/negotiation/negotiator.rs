use std::sync::Arc;

use crate::completion::Completion;
use crate::engine::{
    DescriptionResult, EngineError, EngineNotifier, FlowKind, IceCandidate, PeerEngine,
    SdpKind, SessionDescription,
};
use crate::log::LogSink;
use crate::negotiation::candidate_buffer::CandidateBuffer;
use crate::signaling::SignalingError;
use crate::{sink_debug, sink_info, sink_warn};

/// What happened to a remote candidate handed to the negotiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Held until the remote description is applied.
    Buffered,
    Applied,
    /// The engine refused it; logged and dropped.
    Skipped,
}

/// Enforces local/remote description ordering and holds early candidates.
pub struct SessionDescriptionNegotiator {
    engine: Box<dyn PeerEngine>,
    candidates: CandidateBuffer,
    has_local: bool,
    has_remote: bool,
    loopback: bool,
    log: Arc<dyn LogSink>,
}

impl SessionDescriptionNegotiator {
    pub fn new(engine: Box<dyn PeerEngine>, log: Arc<dyn LogSink>) -> Self {
        Self {
            engine,
            candidates: CandidateBuffer::new(),
            has_local: false,
            has_remote: false,
            loopback: false,
            log,
        }
    }

    /// Starts a fresh Session on the engine.
    pub fn begin(&mut self, notifier: EngineNotifier, loopback: bool) {
        self.candidates = CandidateBuffer::new();
        self.has_local = false;
        self.has_remote = false;
        self.loopback = loopback;
        self.engine.attach(notifier);
    }

    /// Asks the engine to open every flow kind with its default config.
    pub fn open_flows(&mut self) {
        for kind in FlowKind::ALL {
            if !self.engine.open_flow(kind, &kind.default_config()) {
                sink_warn!(self.log, "[Negotiator] engine refused to open flow {}", kind);
            }
        }
    }

    pub fn create_offer(&mut self, done: Completion<DescriptionResult>) {
        sink_debug!(self.log, "[Negotiator] creating offer");
        self.engine.create_offer(done);
    }

    pub fn create_answer(&mut self, done: Completion<DescriptionResult>) {
        sink_debug!(self.log, "[Negotiator] creating answer");
        self.engine.create_answer(done);
    }

    /// Finishes a create request: sets the description as local and returns
    /// it for transmission. In loopback an offer is applied straight back as
    /// the remote answer and nothing is returned.
    ///
    /// # Errors
    /// [`SignalingError::Negotiation`] when creation or application failed;
    /// negotiation state is left as it was.
    pub fn on_description_created(
        &mut self,
        result: DescriptionResult,
    ) -> Result<Option<SessionDescription>, SignalingError> {
        let desc = result.map_err(SignalingError::Negotiation)?;
        self.engine
            .set_local_description(&desc)
            .map_err(SignalingError::Negotiation)?;
        self.has_local = true;
        sink_info!(self.log, "[Negotiator] local {} set", desc.kind());

        if self.loopback && desc.kind() == SdpKind::Offer {
            self.apply_remote_description(&desc.as_answer())?;
            return Ok(None);
        }
        Ok(Some(desc))
    }

    /// Applies the remote description, then flushes buffered candidates in
    /// arrival order. Candidates the engine refuses are logged and skipped.
    ///
    /// # Errors
    /// [`SignalingError::Parse`] for an unparsable description,
    /// [`SignalingError::Negotiation`] when the engine rejects it.
    pub fn apply_remote_description(
        &mut self,
        desc: &SessionDescription,
    ) -> Result<(), SignalingError> {
        self.engine
            .set_remote_description(desc)
            .map_err(|e| match e {
                EngineError::Parse(msg) => SignalingError::Parse(msg),
                other => SignalingError::Negotiation(other),
            })?;
        self.has_remote = true;
        sink_info!(self.log, "[Negotiator] remote {} applied", desc.kind());

        let pending = self.candidates.drain();
        if !pending.is_empty() {
            sink_debug!(self.log, "[Negotiator] flushing {} buffered candidates", pending.len());
        }
        for candidate in pending {
            self.apply_candidate(&candidate);
        }
        Ok(())
    }

    /// Buffers the candidate until a remote description exists, otherwise
    /// applies it right away.
    pub fn add_remote_candidate(&mut self, candidate: IceCandidate) -> CandidateOutcome {
        if !self.has_remote {
            if self.candidates.push(candidate) {
                return CandidateOutcome::Buffered;
            }
            sink_warn!(self.log, "[Negotiator] candidate after buffer retired, dropping");
            return CandidateOutcome::Skipped;
        }
        if self.apply_candidate(&candidate) {
            CandidateOutcome::Applied
        } else {
            CandidateOutcome::Skipped
        }
    }

    fn apply_candidate(&mut self, candidate: &IceCandidate) -> bool {
        match self.engine.add_ice_candidate(candidate) {
            Ok(()) => true,
            Err(e) => {
                sink_warn!(
                    self.log,
                    "[Negotiator] skipping candidate {}/{}: {}",
                    candidate.mid,
                    candidate.mline_index,
                    e
                );
                false
            }
        }
    }

    #[must_use]
    pub fn has_local(&self) -> bool {
        self.has_local
    }

    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.has_remote
    }

    /// Both descriptions are in place.
    #[must_use]
    pub fn is_negotiated(&self) -> bool {
        self.has_local && self.has_remote
    }

    #[must_use]
    pub fn buffered_candidates(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.loopback
    }

    /// Drops the peer connection and forgets negotiation state.
    pub fn close(&mut self) {
        self.engine.close();
        self.candidates = CandidateBuffer::new();
        self.has_local = false;
        self.has_remote = false;
        self.loopback = false;
    }
}
