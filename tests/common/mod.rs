#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;

use roomlink::completion::Completion;
use roomlink::engine::{
    DescriptionResult, EngineError, EngineNotifier, FlowConfig, FlowIo, FlowKind, IceCandidate,
    PeerEngine, SdpKind, SessionDescription,
};
use roomlink::log::MemoryLogSink;
use roomlink::orchestrator::{OrchestratorDeps, SignalingOrchestrator};
use roomlink::settings::SignalingSettings;
use roomlink::signaling::{JoinClient, JoinRequest, JoinResponse, JoinResult, SignalingMessage};
use roomlink::transport::{
    DuplexResult, PreferredTransport, TransportEndpoint, TransportError, TransportEvent,
    TransportFactory,
};
use roomlink::ui::{PeerInfo, UiSink};

pub const OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";
pub const ANSWER_SDP: &str = "v=0\r\no=- 2 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";
pub const WSS_URL: &str = "wss://relay.test/ws";
pub const CLIENT_ID: &str = "c1";

// ---------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct EngineState {
    pub notifier: Option<EngineNotifier>,
    pub attached: usize,
    pub offers_created: usize,
    pub answers_created: usize,
    pub local: Vec<SessionDescription>,
    pub remote: Vec<SessionDescription>,
    pub candidates: Vec<IceCandidate>,
    pub flows_opened: Vec<(FlowKind, FlowConfig)>,
    pub closed: usize,
    pub reject_remote: bool,
    /// Hold offer/answer completions in `deferred` instead of completing.
    pub defer_descriptions: bool,
    pub deferred: Vec<(SdpKind, Completion<DescriptionResult>)>,
}

/// Completes offer/answer requests straight away unless told to defer.
pub struct FakeEngine(pub Arc<Mutex<EngineState>>);

impl FakeEngine {
    fn describe(&self, kind: SdpKind, sdp: &str, done: Completion<DescriptionResult>) {
        let mut s = self.0.lock().unwrap();
        if s.defer_descriptions {
            s.deferred.push((kind, done));
            return;
        }
        drop(s);
        done.complete(SessionDescription::parse(kind, sdp));
    }
}

impl PeerEngine for FakeEngine {
    fn attach(&mut self, notifier: EngineNotifier) {
        let mut s = self.0.lock().unwrap();
        s.notifier = Some(notifier);
        s.attached += 1;
    }

    fn create_offer(&mut self, done: Completion<DescriptionResult>) {
        self.0.lock().unwrap().offers_created += 1;
        self.describe(SdpKind::Offer, OFFER_SDP, done);
    }

    fn create_answer(&mut self, done: Completion<DescriptionResult>) {
        self.0.lock().unwrap().answers_created += 1;
        self.describe(SdpKind::Answer, ANSWER_SDP, done);
    }

    fn set_local_description(&mut self, desc: &SessionDescription) -> Result<(), EngineError> {
        self.0.lock().unwrap().local.push(desc.clone());
        Ok(())
    }

    fn set_remote_description(&mut self, desc: &SessionDescription) -> Result<(), EngineError> {
        let mut s = self.0.lock().unwrap();
        if s.reject_remote {
            return Err(EngineError::Rejected("incompatible".into()));
        }
        s.remote.push(desc.clone());
        Ok(())
    }

    fn add_ice_candidate(&mut self, candidate: &IceCandidate) -> Result<(), EngineError> {
        self.0.lock().unwrap().candidates.push(candidate.clone());
        Ok(())
    }

    fn open_flow(&mut self, kind: FlowKind, config: &FlowConfig) -> bool {
        self.0.lock().unwrap().flows_opened.push((kind, *config));
        true
    }

    fn close(&mut self) {
        self.0.lock().unwrap().closed += 1;
    }
}

/// Flow side that accepts everything and never buffers.
#[derive(Default)]
pub struct FakeFlowIo {
    pub sent_bytes: Mutex<u64>,
}

impl FlowIo for FakeFlowIo {
    fn send(&self, _kind: FlowKind, data: &[u8]) -> bool {
        *self.sent_bytes.lock().unwrap() += data.len() as u64;
        true
    }

    fn buffered_bytes(&self, _kind: FlowKind) -> u64 {
        0
    }

    fn is_flow_open(&self, _kind: FlowKind) -> bool {
        true
    }
}

// ---------------------------------------------------------------------
// Join client
// ---------------------------------------------------------------------

pub type PendingJoins = Arc<Mutex<Vec<(JoinRequest, Completion<JoinResult>)>>>;

/// Holds join requests until the test completes them.
pub struct FakeJoinClient(pub PendingJoins);

impl JoinClient for FakeJoinClient {
    fn join(&mut self, request: JoinRequest, done: Completion<JoinResult>) {
        self.0.lock().unwrap().push((request, done));
    }
}

// ---------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------

#[derive(Default)]
pub struct EndpointState {
    pub sent: Vec<String>,
    pub open: bool,
    pub closed: bool,
    pub fail_sends: bool,
    /// Returned by the next `service`.
    pub events: Vec<TransportEvent>,
}

pub struct FakeEndpoint {
    kind: PreferredTransport,
    state: Arc<Mutex<EndpointState>>,
}

impl FakeEndpoint {
    pub fn new(kind: PreferredTransport) -> (Self, Arc<Mutex<EndpointState>>) {
        let state = Arc::new(Mutex::new(EndpointState {
            open: true,
            ..EndpointState::default()
        }));
        (
            Self {
                kind,
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl TransportEndpoint for FakeEndpoint {
    fn kind(&self) -> PreferredTransport {
        self.kind
    }

    fn is_open(&self) -> bool {
        let s = self.state.lock().unwrap();
        s.open && !s.closed
    }

    fn send(&mut self, payload: String) -> Result<(), TransportError> {
        let mut s = self.state.lock().unwrap();
        if s.closed || !s.open {
            return Err(TransportError::NotConnected);
        }
        if s.fail_sends {
            return Err(TransportError::Io("broken pipe".into()));
        }
        s.sent.push(payload);
        Ok(())
    }

    fn service(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.state.lock().unwrap().events)
    }

    fn close(&mut self) {
        let mut s = self.state.lock().unwrap();
        s.closed = true;
        s.open = false;
    }
}

#[derive(Default)]
pub struct TransportState {
    pub post_urls: Vec<String>,
    pub posts: Vec<Arc<Mutex<EndpointState>>>,
    pub duplex_urls: Vec<String>,
    pub pending_duplex: Vec<Completion<DuplexResult>>,
    pub fail_request_response: bool,
}

pub struct FakeTransports(pub Arc<Mutex<TransportState>>);

impl TransportFactory for FakeTransports {
    fn request_response(&mut self, url: &str) -> Result<Box<dyn TransportEndpoint>, TransportError> {
        let mut s = self.0.lock().unwrap();
        s.post_urls.push(url.to_owned());
        if s.fail_request_response {
            return Err(TransportError::Http("no route".into()));
        }
        let (ep, state) = FakeEndpoint::new(PreferredTransport::RequestResponse);
        s.posts.push(state);
        Ok(Box::new(ep))
    }

    fn connect_duplex(&mut self, url: &str, done: Completion<DuplexResult>) {
        let mut s = self.0.lock().unwrap();
        s.duplex_urls.push(url.to_owned());
        s.pending_duplex.push(done);
    }
}

// ---------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCall {
    Connect,
    PeerList(Vec<PeerInfo>),
    Streaming,
    Error(String, String),
}

pub struct RecordingUi(pub Arc<Mutex<Vec<UiCall>>>);

impl UiSink for RecordingUi {
    fn switch_to_connect_ui(&mut self) {
        self.0.lock().unwrap().push(UiCall::Connect);
    }

    fn switch_to_peer_list_ui(&mut self, peers: &[PeerInfo]) {
        self.0.lock().unwrap().push(UiCall::PeerList(peers.to_vec()));
    }

    fn switch_to_streaming_ui(&mut self) {
        self.0.lock().unwrap().push(UiCall::Streaming);
    }

    fn show_error(&mut self, caption: &str, text: &str) {
        self.0
            .lock()
            .unwrap()
            .push(UiCall::Error(caption.to_owned(), text.to_owned()));
    }
}

// ---------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------

/// Orchestrator wired to fakes, plus handles on everything they recorded.
pub struct Harness {
    pub orch: SignalingOrchestrator,
    pub engine: Arc<Mutex<EngineState>>,
    pub joins: PendingJoins,
    pub transports: Arc<Mutex<TransportState>>,
    pub ui: Arc<Mutex<Vec<UiCall>>>,
    pub log: Arc<MemoryLogSink>,
}

pub fn settings() -> SignalingSettings {
    SignalingSettings {
        server: "rooms.test".into(),
        ..SignalingSettings::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(settings())
    }

    pub fn with_settings(settings: SignalingSettings) -> Self {
        let engine = Arc::new(Mutex::new(EngineState::default()));
        let joins: PendingJoins = Arc::new(Mutex::new(Vec::new()));
        let transports = Arc::new(Mutex::new(TransportState::default()));
        let ui = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::new(MemoryLogSink::new());

        let deps = OrchestratorDeps {
            join_client: Box::new(FakeJoinClient(Arc::clone(&joins))),
            transports: Box::new(FakeTransports(Arc::clone(&transports))),
            engine: Box::new(FakeEngine(Arc::clone(&engine))),
            ui: Box::new(RecordingUi(Arc::clone(&ui))),
            rng: Box::new(StdRng::seed_from_u64(7)),
        };
        let orch = SignalingOrchestrator::new(settings, deps, log.clone());
        Self {
            orch,
            engine,
            joins,
            transports,
            ui,
            log,
        }
    }

    /// Completes the oldest pending join as a success.
    pub fn complete_join(&mut self, is_initiator: bool, messages: Vec<String>) {
        let (request, done) = self.joins.lock().unwrap().remove(0);
        done.complete(Ok(JoinResponse {
            room_id: request.room_id,
            client_id: CLIENT_ID.into(),
            is_initiator,
            wss_url: WSS_URL.into(),
            messages,
        }));
        self.orch.poll();
    }

    /// Join, then complete it. Leaves the Session `Registered`.
    pub fn register(&mut self, is_initiator: bool) {
        self.orch.join("rooms.test").unwrap();
        self.complete_join(is_initiator, Vec::new());
    }

    /// Completes the oldest pending duplex connect with a fresh endpoint.
    pub fn connect_duplex(&mut self) -> Arc<Mutex<EndpointState>> {
        let done = self.transports.lock().unwrap().pending_duplex.remove(0);
        let (ep, state) = FakeEndpoint::new(PreferredTransport::Duplex);
        done.complete(Ok(Box::new(ep)));
        self.orch.poll();
        state
    }

    pub fn fail_duplex(&mut self, err: TransportError) {
        let done = self.transports.lock().unwrap().pending_duplex.remove(0);
        done.complete(Err(err));
        self.orch.poll();
    }

    pub fn pending_duplex(&self) -> usize {
        self.transports.lock().unwrap().pending_duplex.len()
    }

    pub fn notifier(&self) -> EngineNotifier {
        self.engine.lock().unwrap().notifier.clone().unwrap()
    }

    pub fn ui_calls(&self) -> Vec<UiCall> {
        self.ui.lock().unwrap().clone()
    }

    pub fn room(&self) -> String {
        self.orch.room_id().unwrap().to_owned()
    }
}

pub fn offer_json() -> String {
    SignalingMessage::Offer {
        sdp: OFFER_SDP.into(),
    }
    .encode()
    .unwrap()
}

pub fn answer_json() -> String {
    SignalingMessage::Answer {
        sdp: ANSWER_SDP.into(),
    }
    .encode()
    .unwrap()
}

pub fn candidate_json(line: &str) -> String {
    SignalingMessage::IceCandidate {
        mid: "0".into(),
        mline_index: 0,
        candidate: line.into(),
    }
    .encode()
    .unwrap()
}
