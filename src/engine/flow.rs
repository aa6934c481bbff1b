use std::collections::HashMap;
use std::fmt;

/// Logical byte streams multiplexed over the peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Kv,
    Mesh,
    BulkTest,
    Control,
}

impl FlowKind {
    pub const ALL: [Self; 4] = [Self::Kv, Self::Mesh, Self::BulkTest, Self::Control];

    /// Label used when the flow is announced to the remote side.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Kv => "kv",
            Self::Mesh => "mesh",
            Self::BulkTest => "bulk",
            Self::Control => "ctrl",
        }
    }

    /// Maps a remote-announced label back to a kind, case-insensitively.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(label))
    }

    /// Per-kind channel parameters.
    #[must_use]
    pub fn default_config(self) -> FlowConfig {
        match self {
            // mesh gossip tolerates loss, everything else must arrive
            Self::Mesh => FlowConfig {
                ordered: false,
                max_retransmits: Some(0),
            },
            Self::Kv | Self::BulkTest | Self::Control => FlowConfig {
                ordered: true,
                max_retransmits: None,
            },
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub ordered: bool,
    /// `None` means fully reliable.
    pub max_retransmits: Option<u16>,
}

/// Orchestrator-side view of one flow. Buffered bytes are never stored
/// here; they are queried from the engine when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFlow {
    pub kind: FlowKind,
    pub is_open: bool,
}

pub type PayloadHandler = Box<dyn FnMut(&[u8]) + Send>;

/// Flows of the current Session plus the payload handlers registered for
/// each kind. Handlers outlive Sessions; flows do not.
#[derive(Default)]
pub struct FlowTable {
    flows: HashMap<FlowKind, DataFlow>,
    handlers: HashMap<FlowKind, PayloadHandler>,
}

impl FlowTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the engine's report that a flow opened or closed.
    pub fn set_open(&mut self, kind: FlowKind, open: bool) {
        self.flows
            .entry(kind)
            .and_modify(|f| f.is_open = open)
            .or_insert(DataFlow {
                kind,
                is_open: open,
            });
    }

    #[must_use]
    pub fn get(&self, kind: FlowKind) -> Option<DataFlow> {
        self.flows.get(&kind).copied()
    }

    #[must_use]
    pub fn is_open(&self, kind: FlowKind) -> bool {
        self.flows.get(&kind).is_some_and(|f| f.is_open)
    }

    pub fn register_handler(&mut self, kind: FlowKind, handler: PayloadHandler) {
        self.handlers.insert(kind, handler);
    }

    /// Hands `data` to the handler for `kind`. Returns false when nobody
    /// listens on that kind.
    pub fn dispatch(&mut self, kind: FlowKind, data: &[u8]) -> bool {
        match self.handlers.get_mut(&kind) {
            Some(h) => {
                h(data);
                true
            }
            None => false,
        }
    }

    /// Forgets all flows; handlers stay registered.
    pub fn clear_flows(&mut self) {
        self.flows.clear();
    }
}

impl fmt::Debug for FlowTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowTable")
            .field("flows", &self.flows)
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
