use std::fmt;
use std::sync::mpsc::Sender;

use crate::orchestrator::events::OrchestratorEvent;

/// Identifies one Session lifetime. Bumped on every join attempt and on
/// every teardown so late completions can be recognised and dropped.
pub type Generation = u64;

/// One-shot reply slot handed to a collaborator doing asynchronous work
/// (join request, offer/answer creation, duplex connect).
///
/// Completing posts an [`OrchestratorEvent`] tagged with the generation that
/// was current when the work started. Completing after the orchestrator is
/// gone is harmless.
pub struct Completion<T> {
    generation: Generation,
    tx: Sender<OrchestratorEvent>,
    wrap: fn(Generation, T) -> OrchestratorEvent,
}

impl<T> Completion<T> {
    pub(crate) fn new(
        generation: Generation,
        tx: Sender<OrchestratorEvent>,
        wrap: fn(Generation, T) -> OrchestratorEvent,
    ) -> Self {
        Self {
            generation,
            tx,
            wrap,
        }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn complete(self, value: T) {
        let _ = self.tx.send((self.wrap)(self.generation, value));
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
