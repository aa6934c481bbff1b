use std::sync::mpsc::Sender;

use bytes::Bytes;

use crate::completion::Generation;
use crate::engine::{description::IceCandidate, flow::FlowKind};
use crate::orchestrator::events::OrchestratorEvent;

/// Callback surface the engine uses to report things nobody asked for:
/// gathered local candidates, flows opening or closing, inbound payloads.
///
/// A fresh notifier is attached for every Session; reports carry that
/// Session's generation.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    generation: Generation,
    tx: Sender<OrchestratorEvent>,
}

impl EngineNotifier {
    pub(crate) fn new(generation: Generation, tx: Sender<OrchestratorEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        let _ = self.tx.send(OrchestratorEvent::LocalCandidate {
            generation: self.generation,
            candidate,
        });
    }

    pub fn flow_state(&self, kind: FlowKind, open: bool) {
        let _ = self.tx.send(OrchestratorEvent::FlowState {
            generation: self.generation,
            kind,
            open,
        });
    }

    /// Remote side announced a flow by label; unknown labels are ignored by
    /// the orchestrator.
    pub fn remote_flow(&self, label: &str) {
        let _ = self.tx.send(OrchestratorEvent::RemoteFlow {
            generation: self.generation,
            label: label.to_owned(),
        });
    }

    pub fn flow_payload(&self, kind: FlowKind, data: Bytes) {
        let _ = self.tx.send(OrchestratorEvent::FlowPayload {
            generation: self.generation,
            kind,
            data,
        });
    }
}
