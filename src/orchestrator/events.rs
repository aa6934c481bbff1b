use std::fmt;

use bytes::Bytes;

use crate::completion::Generation;
use crate::engine::{DescriptionResult, FlowKind, IceCandidate};
use crate::signaling::JoinResult;
use crate::transport::DuplexResult;

/// Everything that reaches the orchestrator from other threads. Each event
/// carries the generation it was issued under; events from an older
/// generation are discarded.
pub enum OrchestratorEvent {
    JoinCompleted {
        generation: Generation,
        result: JoinResult,
    },
    DescriptionCreated {
        generation: Generation,
        result: DescriptionResult,
    },
    DuplexConnected {
        generation: Generation,
        result: DuplexResult,
    },
    LocalCandidate {
        generation: Generation,
        candidate: IceCandidate,
    },
    FlowState {
        generation: Generation,
        kind: FlowKind,
        open: bool,
    },
    RemoteFlow {
        generation: Generation,
        label: String,
    },
    FlowPayload {
        generation: Generation,
        kind: FlowKind,
        data: Bytes,
    },
}

impl OrchestratorEvent {
    #[must_use]
    pub fn generation(&self) -> Generation {
        match self {
            Self::JoinCompleted { generation, .. }
            | Self::DescriptionCreated { generation, .. }
            | Self::DuplexConnected { generation, .. }
            | Self::LocalCandidate { generation, .. }
            | Self::FlowState { generation, .. }
            | Self::RemoteFlow { generation, .. }
            | Self::FlowPayload { generation, .. } => *generation,
        }
    }

    /// Short variant name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinCompleted { .. } => "JoinCompleted",
            Self::DescriptionCreated { .. } => "DescriptionCreated",
            Self::DuplexConnected { .. } => "DuplexConnected",
            Self::LocalCandidate { .. } => "LocalCandidate",
            Self::FlowState { .. } => "FlowState",
            Self::RemoteFlow { .. } => "RemoteFlow",
            Self::FlowPayload { .. } => "FlowPayload",
        }
    }
}

impl fmt::Debug for OrchestratorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.name())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
