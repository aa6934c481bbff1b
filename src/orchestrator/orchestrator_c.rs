use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use url::Url;

use crate::completion::{Completion, Generation};
use crate::engine::{
    DescriptionResult, EngineNotifier, FlowKind, FlowTable, IceCandidate,
    PayloadHandler, PeerEngine, SdpKind, SessionDescription,
};
use crate::log::LogSink;
use crate::negotiation::SessionDescriptionNegotiator;
use crate::orchestrator::{
    events::OrchestratorEvent,
    session::{Session, SessionState, UNSET_PEER},
};
use crate::settings::SignalingSettings;
use crate::shaper::SessionGate;
use crate::signaling::{
    Decoded, HttpJoinClient, JoinClient, JoinRequest, JoinResponse, JoinResult, ROOM_ID_LEN, SignalingError,
    SignalingMessage,
    envelope::{self, Unwrapped},
    generate_room_id,
    join::{base_url, message_url},
};
use crate::transport::{
    DuplexResult, MessageQueue, NetTransportFactory, PreferredTransport, TransportEndpoint,
    TransportError, TransportEvent, TransportFactory,
};
use crate::ui::{PeerInfo, UiSink};
use crate::{sink_debug, sink_error, sink_info, sink_trace, sink_warn};

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    pub join_client: Box<dyn JoinClient>,
    pub transports: Box<dyn TransportFactory>,
    pub engine: Box<dyn PeerEngine>,
    pub ui: Box<dyn UiSink>,
    /// Source for generated room IDs.
    pub rng: Box<dyn RngCore + Send>,
}

impl OrchestratorDeps {
    /// HTTPS join, HTTPS/WSS transports and an OS-seeded room-ID source.
    ///
    /// # Errors
    /// [`TransportError`] when the configured TLS roots are unusable.
    pub fn networked(
        settings: &SignalingSettings,
        engine: Box<dyn PeerEngine>,
        ui: Box<dyn UiSink>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            join_client: Box::new(HttpJoinClient::new(
                settings.join_timeout,
                settings.ca_file.as_deref(),
                Arc::clone(&log),
            )?),
            transports: Box::new(NetTransportFactory::new(settings, log)?),
            engine,
            ui,
            rng: Box::new(StdRng::from_entropy()),
        })
    }
}

struct PendingJoin {
    deadline: Instant,
    base_url: Url,
}

/// Room join, signaling transport selection and the offer/answer lifecycle
/// of one Session at a time.
///
/// Single-threaded: every mutation happens inside a method call or inside
/// [`poll`](Self::poll), which drains completions posted by collaborators,
/// pumps the transports and enforces deadlines. Completions are tagged with
/// a generation; anything tagged for a Session that is gone is dropped.
pub struct SignalingOrchestrator {
    settings: SignalingSettings,
    join_client: Box<dyn JoinClient>,
    transports: Box<dyn TransportFactory>,
    negotiator: SessionDescriptionNegotiator,
    ui: Box<dyn UiSink>,
    rng: Box<dyn RngCore + Send>,
    log: Arc<dyn LogSink>,

    tx: Sender<OrchestratorEvent>,
    rx: Receiver<OrchestratorEvent>,
    generation: Generation,

    room_id: Option<String>,
    joining: Option<PendingJoin>,
    session: Option<Session>,
    duplex: Option<Box<dyn TransportEndpoint>>,
    duplex_deadline: Option<Instant>,
    request_response: Option<Box<dyn TransportEndpoint>>,
    queue: MessageQueue,
    flows: FlowTable,
    gate: SessionGate,
}

impl SignalingOrchestrator {
    pub fn new(settings: SignalingSettings, deps: OrchestratorDeps, log: Arc<dyn LogSink>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            room_id: settings.room_id.clone(),
            settings,
            join_client: deps.join_client,
            transports: deps.transports,
            negotiator: SessionDescriptionNegotiator::new(deps.engine, Arc::clone(&log)),
            ui: deps.ui,
            rng: deps.rng,
            log,
            tx,
            rx,
            generation: 0,
            joining: None,
            session: None,
            duplex: None,
            duplex_deadline: None,
            request_response: None,
            queue: MessageQueue::new(),
            flows: FlowTable::new(),
            gate: SessionGate::new(),
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> SessionState {
        match (&self.session, &self.joining) {
            (Some(s), _) => s.state,
            (None, Some(_)) => SessionState::Joining,
            (None, None) => SessionState::Idle,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Predicate the bulk shaper polls.
    #[must_use]
    pub fn gate(&self) -> SessionGate {
        self.gate.clone()
    }

    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn buffered_candidates(&self) -> usize {
        self.negotiator.buffered_candidates()
    }

    #[must_use]
    pub fn is_flow_open(&self, kind: FlowKind) -> bool {
        self.flows.is_open(kind)
    }

    /// Inbound payloads on `kind` go to `handler` from now on, across Sessions.
    pub fn register_payload_handler(&mut self, kind: FlowKind, handler: PayloadHandler) {
        self.flows.register_handler(kind, handler);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Starts the room-join handshake against `server`.
    ///
    /// The room ID already assigned is reused; otherwise the configured one,
    /// otherwise a random one. Calling this while a join or Session is in
    /// progress for an assigned room does nothing.
    ///
    /// # Errors
    /// [`SignalingError::InvalidState`] when not `Idle` and no room is assigned.
    pub fn join(&mut self, server: &str) -> Result<(), SignalingError> {
        if self.state() != SessionState::Idle {
            if self.room_id.is_some() {
                sink_debug!(self.log, "[Signaling] join ignored, room already assigned");
                return Ok(());
            }
            return Err(SignalingError::InvalidState("join"));
        }
        let base = base_url(server)?;

        let room_id = match &self.room_id {
            Some(r) => r.clone(),
            None => {
                let r = generate_room_id(&mut *self.rng, ROOM_ID_LEN);
                self.room_id = Some(r.clone());
                r
            }
        };
        let generation = self.next_generation();
        let request = JoinRequest::new(base, room_id);
        sink_info!(self.log, "[Signaling] joining room {} via {}", request.room_id, request.url());

        self.joining = Some(PendingJoin {
            deadline: Instant::now() + self.settings.join_timeout,
            base_url: request.base_url.clone(),
        });
        let done = self.completion(generation, |generation, result: JoinResult| {
            OrchestratorEvent::JoinCompleted { generation, result }
        });
        self.join_client.join(request, done);
        Ok(())
    }

    /// Self-test Session: the local offer is applied back as the answer and
    /// nothing touches the network.
    ///
    /// # Errors
    /// [`SignalingError::InvalidState`] unless `Idle`.
    pub fn start_loopback(&mut self) -> Result<(), SignalingError> {
        if self.state() != SessionState::Idle {
            return Err(SignalingError::InvalidState("loopback"));
        }
        let generation = self.next_generation();
        self.negotiator
            .begin(EngineNotifier::new(generation, self.tx.clone()), true);
        self.flows.clear_flows();
        self.session = Some(Session {
            room_id: "loopback".into(),
            client_id: "loopback".into(),
            peer_id: UNSET_PEER,
            is_initiator: true,
            state: SessionState::Negotiating,
            preferred_transport: Session::preferred_for(true),
            loopback: true,
            generation,
            wss_url: String::new(),
            base_url: String::new(),
            initial_messages: Vec::new(),
            offer_requested: true,
            duplex_established: false,
            duplex_attempt: None,
            duplex_retries_left: 0,
        });
        sink_info!(self.log, "[Signaling] loopback session started");
        self.negotiator.open_flows();
        let done = self.description_completion(generation);
        self.negotiator.create_offer(done);
        Ok(())
    }

    /// Leaves the room: best-effort `bye`, then full teardown. Cancels a
    /// pending join.
    ///
    /// # Errors
    /// [`SignalingError::InvalidState`] when already `Idle`.
    pub fn disconnect(&mut self) -> Result<(), SignalingError> {
        if self.session.is_none() {
            if self.joining.take().is_some() {
                self.next_generation();
                sink_info!(self.log, "[Signaling] join cancelled");
                return Ok(());
            }
            return Err(SignalingError::InvalidState("disconnect"));
        }
        if let Some(s) = self.session.as_mut() {
            s.state = SessionState::Closing;
        }
        self.send_bye_best_effort();
        self.teardown();
        Ok(())
    }

    /// Sends one message to the peer over the Session's preferred transport.
    /// On the duplex path it is queued while the channel is down.
    ///
    /// # Errors
    /// [`SignalingError::InvalidState`] without a Session,
    /// [`SignalingError::Transport`] when the request/response path fails (the
    /// Session is torn down first).
    pub fn send_signaling_message(&mut self, msg: &SignalingMessage) -> Result<(), SignalingError> {
        let Some(s) = self.session.as_ref() else {
            return Err(SignalingError::InvalidState("send"));
        };
        if s.loopback {
            sink_trace!(self.log, "[Signaling] loopback, not sending {}", msg.type_name());
            return Ok(());
        }
        let preferred = s.preferred_transport;
        let encoded = msg.encode()?;
        sink_debug!(self.log, "[Signaling] -> {} via {}", msg.type_name(), preferred);

        match preferred {
            PreferredTransport::RequestResponse => {
                let sent = match self.request_response.as_mut() {
                    Some(ep) => ep.send(encoded),
                    None => Err(TransportError::NotConnected),
                };
                if let Err(e) = sent {
                    let err = SignalingError::Transport(e);
                    self.fail_session(err.clone());
                    return Err(err);
                }
            }
            PreferredTransport::Duplex => {
                let frame = envelope::send_frame(&encoded)?;
                self.send_or_queue(frame);
            }
        }
        Ok(())
    }

    /// Handles one payload relayed from the peer.
    ///
    /// Malformed payloads are rejected without touching the Session; unknown
    /// types and messages from a foreign peer are logged and ignored.
    ///
    /// # Errors
    /// [`SignalingError::Parse`] for malformed payloads,
    /// [`SignalingError::InvalidState`] without a Session,
    /// [`SignalingError::ProtocolViolation`] during loopback,
    /// [`SignalingError::Negotiation`] when the engine rejects a description.
    pub fn on_inbound_message(&mut self, peer_id: i64, payload: &str) -> Result<(), SignalingError> {
        let Some(s) = self.session.as_ref() else {
            sink_warn!(self.log, "[Signaling] inbound message without a session, dropping");
            return Err(SignalingError::InvalidState("inbound message"));
        };
        if s.loopback {
            sink_warn!(self.log, "[Signaling] network message during loopback, dropping");
            return Err(SignalingError::ProtocolViolation(
                "network message during loopback".into(),
            ));
        }

        let msg = match SignalingMessage::decode(payload) {
            Ok(Decoded::Message(m)) => m,
            Ok(Decoded::Unknown(kind)) => {
                sink_warn!(self.log, "[Signaling] ignoring message of unknown type {:?}", kind);
                return Ok(());
            }
            Err(e) => {
                sink_warn!(self.log, "[Signaling] dropping malformed payload: {}", e);
                return Err(e);
            }
        };

        if !s.accepts_peer(peer_id) {
            sink_warn!(
                self.log,
                "[Signaling] ignoring {} from peer {} (session peer is {})",
                msg.type_name(),
                peer_id,
                s.peer_id
            );
            return Ok(());
        }
        sink_debug!(self.log, "[Signaling] <- {}", msg.type_name());

        match msg {
            SignalingMessage::Offer { .. } | SignalingMessage::Answer { .. } => {
                let desc = match msg.to_description() {
                    Some(Ok(d)) => d,
                    Some(Err(e)) => {
                        sink_warn!(self.log, "[Signaling] dropping unusable {}: {}", msg.type_name(), e);
                        return Err(SignalingError::Parse(e.to_string()));
                    }
                    None => return Ok(()),
                };
                self.on_remote_description(peer_id, &desc)
            }
            SignalingMessage::IceCandidate {
                mid,
                mline_index,
                candidate,
            } => {
                let candidate = IceCandidate::new(mid, mline_index, candidate)
                    .map_err(|e| SignalingError::Parse(e.to_string()))?;
                let _outcome = self.negotiator.add_remote_candidate(candidate);
                sink_debug!(self.log, "[Signaling] remote candidate {:?}", _outcome);
                Ok(())
            }
            SignalingMessage::Bye => {
                sink_info!(self.log, "[Signaling] peer left the room");
                if let Some(s) = self.session.as_mut() {
                    s.state = SessionState::Closing;
                }
                self.teardown();
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Event loop
    // ------------------------------------------------------------------

    /// Drains pending completions, pumps transports, checks deadlines.
    /// Returns how many completions were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = self.drain_events();
        self.service_transports();
        handled += self.drain_events();
        self.check_deadlines(Instant::now());
        handled
    }

    /// Like [`poll`](Self::poll) but first waits up to `timeout` for a completion.
    pub fn poll_timeout(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => {
                self.handle_event(ev);
                1 + self.poll()
            }
            Err(_) => self.poll(),
        }
    }

    /// Fails a join or duplex connect whose deadline is before `now`.
    pub fn check_deadlines(&mut self, now: Instant) {
        if self.joining.as_ref().is_some_and(|j| now >= j.deadline) {
            self.joining = None;
            self.next_generation();
            self.report(&SignalingError::Timeout("join"));
        }
        if self.duplex_deadline.is_some_and(|d| now >= d) {
            self.duplex_deadline = None;
            if let Some(s) = self.session.as_mut() {
                s.duplex_attempt = None;
            }
            self.fail_session(SignalingError::Timeout("duplex connect"));
        }
    }

    fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(ev) = self.rx.try_recv() {
            self.handle_event(ev);
            handled += 1;
        }
        handled
    }

    fn handle_event(&mut self, ev: OrchestratorEvent) {
        sink_trace!(self.log, "[Signaling] event {:?}", ev);
        match ev {
            OrchestratorEvent::JoinCompleted { generation, result } => {
                self.on_join_completed(generation, result);
            }
            OrchestratorEvent::DuplexConnected { generation, result } => {
                self.on_duplex_result(generation, result);
            }
            OrchestratorEvent::DescriptionCreated { generation, result } => {
                self.on_description_created(generation, result);
            }
            OrchestratorEvent::LocalCandidate {
                generation,
                candidate,
            } => self.on_local_candidate(generation, candidate),
            OrchestratorEvent::FlowState {
                generation,
                kind,
                open,
            } => {
                if self.is_current(generation) {
                    sink_info!(self.log, "[Signaling] flow {} {}", kind, if open { "open" } else { "closed" });
                    self.flows.set_open(kind, open);
                }
            }
            OrchestratorEvent::RemoteFlow { generation, label } => {
                self.on_remote_flow(generation, &label);
            }
            OrchestratorEvent::FlowPayload {
                generation,
                kind,
                data,
            } => self.on_flow_payload(generation, kind, &data),
        }
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    fn on_join_completed(&mut self, generation: Generation, result: JoinResult) {
        if self.joining.is_none() || generation != self.generation {
            sink_debug!(self.log, "[Signaling] dropping stale join result");
            return;
        }
        let Some(pending) = self.joining.take() else {
            return;
        };
        match result {
            Ok(resp) => self.start_session(generation, resp, pending.base_url),
            Err(e) => self.report(&e),
        }
    }

    fn start_session(&mut self, generation: Generation, resp: JoinResponse, base: Url) {
        let is_initiator = resp.is_initiator;
        sink_info!(
            self.log,
            "[Signaling] joined room {} as {} (initiator: {})",
            resp.room_id,
            resp.client_id,
            is_initiator
        );
        self.room_id = Some(resp.room_id.clone());
        self.negotiator
            .begin(EngineNotifier::new(generation, self.tx.clone()), false);
        self.flows.clear_flows();

        let post_url = message_url(&base, &resp.room_id, &resp.client_id);
        self.ui.switch_to_peer_list_ui(&[PeerInfo {
            client_id: resp.client_id.clone(),
            room_id: resp.room_id.clone(),
            is_self: true,
        }]);
        self.session = Some(Session {
            room_id: resp.room_id,
            client_id: resp.client_id,
            peer_id: UNSET_PEER,
            is_initiator,
            state: SessionState::Registered,
            preferred_transport: Session::preferred_for(is_initiator),
            loopback: false,
            generation,
            wss_url: resp.wss_url,
            base_url: base.into(),
            initial_messages: resp.messages,
            offer_requested: false,
            duplex_established: false,
            duplex_attempt: None,
            duplex_retries_left: self.settings.duplex_retry_budget,
        });

        if is_initiator {
            match self.transports.request_response(&post_url) {
                Ok(ep) => self.request_response = Some(ep),
                Err(e) => {
                    self.fail_session(SignalingError::Transport(e));
                    return;
                }
            }
            self.negotiator.open_flows();
        }
        self.connect_duplex();
    }

    fn connect_duplex(&mut self) {
        let token = self.next_generation();
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.wss_url.is_empty() {
            self.fail_session(SignalingError::Transport(TransportError::BadUrl(
                "join response carried no wss_url".into(),
            )));
            return;
        }
        s.duplex_attempt = Some(token);
        let url = s.wss_url.clone();
        self.duplex_deadline = Some(Instant::now() + self.settings.connect_timeout);
        sink_debug!(self.log, "[Signaling] connecting duplex channel to {}", url);
        let done = self.completion(token, |generation, result: DuplexResult| {
            OrchestratorEvent::DuplexConnected { generation, result }
        });
        self.transports.connect_duplex(&url, done);
    }

    fn on_duplex_result(&mut self, generation: Generation, result: DuplexResult) {
        let expected = self.session.as_ref().and_then(|s| s.duplex_attempt);
        if expected != Some(generation) {
            sink_debug!(self.log, "[Signaling] dropping stale duplex connect result");
            if let Ok(mut ep) = result {
                ep.close();
            }
            return;
        }
        self.duplex_deadline = None;
        if let Some(s) = self.session.as_mut() {
            s.duplex_attempt = None;
        }
        match result {
            Ok(ep) => {
                self.duplex = Some(ep);
                self.on_duplex_connected();
            }
            Err(e) => self.on_duplex_lost(SignalingError::Transport(e)),
        }
    }

    /// Registration frame first, then the backlog oldest first, then the
    /// join-time messages, then (initiator, first time only) the offer.
    fn on_duplex_connected(&mut self) {
        let budget = self.settings.duplex_retry_budget;
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let first = !s.duplex_established;
        s.duplex_established = true;
        s.duplex_retries_left = budget;
        let register = envelope::register_frame(&s.room_id, &s.client_id);
        let (room_id, client_id) = (s.room_id.clone(), s.client_id.clone());

        let register = match register {
            Ok(f) => f,
            Err(e) => {
                self.fail_session(e);
                return;
            }
        };
        sink_info!(self.log, "[Signaling] duplex up, registering {} in {}", client_id, room_id);
        if let Some(d) = self.duplex.as_mut() {
            if let Err(e) = d.send(register) {
                sink_warn!(self.log, "[Signaling] registration not sent: {}", e);
            }
        }

        let flushed = self.flush_queue();
        if flushed > 0 {
            sink_info!(self.log, "[Signaling] flushed {} queued messages", flushed);
        }

        if first {
            let initial = self
                .session
                .as_mut()
                .map(|s| std::mem::take(&mut s.initial_messages))
                .unwrap_or_default();
            for payload in initial {
                if let Err(e) = self.on_inbound_message(UNSET_PEER, &payload) {
                    sink_warn!(self.log, "[Signaling] initial message rejected: {}", e);
                }
            }
        }

        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.is_initiator && !s.offer_requested {
            s.offer_requested = true;
            if s.state < SessionState::Negotiating {
                s.state = SessionState::Negotiating;
            }
            let generation = s.generation;
            let done = self.description_completion(generation);
            self.negotiator.create_offer(done);
        }
    }

    fn on_duplex_lost(&mut self, err: SignalingError) {
        if let Some(mut d) = self.duplex.take() {
            d.close();
        }
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.duplex_retries_left == 0 {
            self.fail_session(err);
            return;
        }
        s.duplex_retries_left -= 1;
        sink_warn!(
            self.log,
            "[Signaling] duplex channel down ({}), reconnecting, {} retries left",
            err,
            s.duplex_retries_left
        );
        self.connect_duplex();
    }

    fn on_remote_description(
        &mut self,
        peer_id: i64,
        desc: &SessionDescription,
    ) -> Result<(), SignalingError> {
        match self.negotiator.apply_remote_description(desc) {
            Ok(()) => {}
            Err(SignalingError::Parse(m)) => {
                sink_warn!(self.log, "[Signaling] remote {} did not parse: {}", desc.kind(), m);
                return Err(SignalingError::Parse(m));
            }
            Err(e) => {
                self.fail_session(e.clone());
                return Err(e);
            }
        }
        let Some(s) = self.session.as_mut() else {
            return Ok(());
        };
        s.bind_peer(peer_id);

        match desc.kind() {
            SdpKind::Offer => {
                if s.state < SessionState::Negotiating {
                    s.state = SessionState::Negotiating;
                }
                if s.state == SessionState::Streaming {
                    sink_info!(self.log, "[Signaling] renegotiating on new offer");
                }
                let generation = s.generation;
                let done = self.description_completion(generation);
                self.negotiator.create_answer(done);
            }
            SdpKind::Answer => {
                if self.negotiator.is_negotiated() {
                    self.enter_streaming();
                } else if s.state < SessionState::Negotiating {
                    s.state = SessionState::Negotiating;
                }
            }
        }
        Ok(())
    }

    fn on_description_created(&mut self, generation: Generation, result: DescriptionResult) {
        if !self.is_current(generation) {
            sink_debug!(self.log, "[Signaling] dropping stale description");
            return;
        }
        let desc = match result {
            Ok(d) => d,
            Err(e) => {
                self.report(&SignalingError::Negotiation(e));
                return;
            }
        };
        match self.negotiator.on_description_created(Ok(desc)) {
            Ok(Some(local)) => {
                let msg = SignalingMessage::from_description(&local);
                if let Err(e) = self.send_signaling_message(&msg) {
                    sink_warn!(self.log, "[Signaling] local {} not sent: {}", local.kind(), e);
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.fail_session(e);
                return;
            }
        }
        if self.negotiator.is_negotiated() {
            self.enter_streaming();
        }
    }

    fn on_local_candidate(&mut self, generation: Generation, candidate: IceCandidate) {
        if !self.is_current(generation) {
            return;
        }
        if self.negotiator.is_loopback() {
            let _outcome = self.negotiator.add_remote_candidate(candidate);
            sink_trace!(self.log, "[Signaling] loopback candidate {:?}", _outcome);
            return;
        }
        if let Err(e) = self.send_signaling_message(&SignalingMessage::from_candidate(&candidate)) {
            sink_warn!(self.log, "[Signaling] local candidate not sent: {}", e);
        }
    }

    fn on_remote_flow(&mut self, generation: Generation, label: &str) {
        if !self.is_current(generation) {
            return;
        }
        match FlowKind::from_label(label) {
            Some(kind) => {
                sink_debug!(self.log, "[Signaling] peer announced flow {}", kind);
                if self.flows.get(kind).is_none() {
                    self.flows.set_open(kind, false);
                }
            }
            None => {
                sink_warn!(self.log, "[Signaling] peer announced unknown flow {:?}", label);
            }
        }
    }

    fn on_flow_payload(&mut self, generation: Generation, kind: FlowKind, data: &Bytes) {
        if !self.is_current(generation) {
            return;
        }
        if !self.flows.dispatch(kind, data) {
            sink_trace!(self.log, "[Signaling] {} bytes on {} with no handler", data.len(), kind);
        }
    }

    // ------------------------------------------------------------------
    // Transports
    // ------------------------------------------------------------------

    fn service_transports(&mut self) {
        let events = self
            .duplex
            .as_mut()
            .map(|d| d.service())
            .unwrap_or_default();
        for ev in events {
            self.on_duplex_event(ev);
        }

        let events = self
            .request_response
            .as_mut()
            .map(|ep| ep.service())
            .unwrap_or_default();
        for ev in events {
            if let TransportEvent::SendFailed(e) = ev
                && self.request_response.is_some()
            {
                self.fail_session(SignalingError::Transport(e));
            }
        }
    }

    fn on_duplex_event(&mut self, ev: TransportEvent) {
        if self.session.is_none() {
            return;
        }
        match ev {
            TransportEvent::Message(text) => match envelope::unwrap_inbound(&text) {
                Ok(Unwrapped::Payload(payload)) => {
                    if let Err(_e) = self.on_inbound_message(UNSET_PEER, &payload) {
                        sink_debug!(self.log, "[Signaling] inbound payload rejected: {}", _e);
                    }
                }
                Ok(Unwrapped::RelayError(e)) => {
                    sink_warn!(self.log, "[Signaling] relay reported error: {}", e);
                }
                Err(e) => {
                    sink_warn!(self.log, "[Signaling] unreadable relay frame: {}", e);
                }
            },
            TransportEvent::Unsent(frames) => {
                let frames: Vec<String> = frames
                    .into_iter()
                    .filter(|f| !envelope::is_register_frame(f))
                    .collect();
                if !frames.is_empty() {
                    sink_warn!(self.log, "[Signaling] requeueing {} unsent messages", frames.len());
                    self.queue.requeue_front(frames);
                }
            }
            TransportEvent::ConnectionChanged(true) => {}
            TransportEvent::ConnectionChanged(false) if self.duplex.is_some() => {
                self.on_duplex_lost(SignalingError::Transport(TransportError::Closed));
            }
            TransportEvent::SendFailed(e) if self.duplex.is_some() => {
                self.on_duplex_lost(SignalingError::Transport(e));
            }
            TransportEvent::ConnectionChanged(false) | TransportEvent::SendFailed(_) => {}
        }
    }

    /// Sends straight away when the duplex channel is up and nothing older
    /// is waiting, otherwise appends to the queue.
    fn send_or_queue(&mut self, frame: String) {
        if self.queue.is_empty() {
            if let Some(d) = self.duplex.as_mut().filter(|d| d.is_open()) {
                match d.send(frame.clone()) {
                    Ok(()) => return,
                    Err(e) => sink_warn!(self.log, "[Signaling] duplex send failed ({}), queueing", e),
                }
            }
        }
        sink_debug!(self.log, "[Signaling] duplex not ready, queueing ({} waiting)", self.queue.len() + 1);
        self.queue.push(frame);
    }

    fn flush_queue(&mut self) -> usize {
        let Some(d) = self.duplex.as_mut() else {
            return 0;
        };
        let mut flushed = 0;
        while d.is_open() {
            let Some(frame) = self.queue.pop_front() else {
                break;
            };
            if let Err(e) = d.send(frame.clone()) {
                sink_warn!(self.log, "[Signaling] flush interrupted: {}", e);
                self.queue.requeue_front(vec![frame]);
                break;
            }
            flushed += 1;
        }
        flushed
    }

    fn send_bye_best_effort(&mut self) {
        let Some(preferred) = self
            .session
            .as_ref()
            .filter(|s| !s.loopback)
            .map(|s| s.preferred_transport)
        else {
            return;
        };
        let sent = match preferred {
            PreferredTransport::RequestResponse => self.send_bye_request_response(),
            PreferredTransport::Duplex => self.send_bye_duplex(),
        };
        if let Err(_e) = sent {
            sink_debug!(self.log, "[Signaling] bye not delivered: {}", _e);
        }
    }

    fn send_bye_request_response(&mut self) -> Result<(), SignalingError> {
        let bye = SignalingMessage::Bye.encode()?;
        let ep = self
            .request_response
            .as_mut()
            .ok_or(TransportError::NotConnected)?;
        Ok(ep.send(bye)?)
    }

    fn send_bye_duplex(&mut self) -> Result<(), SignalingError> {
        let frame = envelope::send_frame(&SignalingMessage::Bye.encode()?)?;
        let d = self
            .duplex
            .as_mut()
            .filter(|d| d.is_open())
            .ok_or(TransportError::NotConnected)?;
        Ok(d.send(frame)?)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    fn enter_streaming(&mut self) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if s.state == SessionState::Streaming {
            return;
        }
        s.state = SessionState::Streaming;
        self.gate.set(true);
        sink_info!(self.log, "[Signaling] session in room {} is streaming", s.room_id);
        self.ui.switch_to_streaming_ui();
    }

    fn teardown(&mut self) {
        let Some(s) = self.session.take() else {
            return;
        };
        self.next_generation();
        self.gate.set(false);
        self.negotiator.close();
        if let Some(mut d) = self.duplex.take() {
            d.close();
        }
        if let Some(mut ep) = self.request_response.take() {
            ep.close();
        }
        if !self.queue.is_empty() {
            sink_warn!(
                self.log,
                "[Signaling] dropping {} undelivered messages for room {}",
                self.queue.len(),
                s.room_id
            );
            self.queue.clear();
        }
        self.flows.clear_flows();
        self.duplex_deadline = None;
        sink_info!(self.log, "[Signaling] left room {}", s.room_id);
        self.ui.switch_to_connect_ui();
    }

    /// Surfaces `err` and routes cleanup through [`disconnect`](Self::disconnect).
    fn fail_session(&mut self, err: SignalingError) {
        self.report(&err);
        if self.session.is_some() {
            let _ = self.disconnect();
        }
    }

    fn report(&mut self, err: &SignalingError) {
        sink_error!(self.log, "[Signaling] {}", err);
        self.ui.show_error(err.caption(), &err.to_string());
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn next_generation(&mut self) -> Generation {
        self.generation += 1;
        self.generation
    }

    fn is_current(&self, generation: Generation) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.generation == generation)
    }

    fn completion<T>(
        &self,
        generation: Generation,
        wrap: fn(Generation, T) -> OrchestratorEvent,
    ) -> Completion<T> {
        Completion::new(generation, self.tx.clone(), wrap)
    }

    fn description_completion(&self, generation: Generation) -> Completion<DescriptionResult> {
        self.completion(generation, |generation, result: DescriptionResult| {
            OrchestratorEvent::DescriptionCreated { generation, result }
        })
    }
}
