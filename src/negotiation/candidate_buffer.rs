use crate::engine::IceCandidate;

/// Remote candidates that arrived before the remote description.
///
/// Drained exactly once, in arrival order. Anything pushed after the drain
/// is a caller bug and is refused.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    items: Vec<IceCandidate>,
    drained: bool,
}

impl CandidateBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the buffer was already drained for this Session.
    pub fn push(&mut self, candidate: IceCandidate) -> bool {
        if self.drained {
            return false;
        }
        self.items.push(candidate);
        true
    }

    /// Hands out everything buffered, oldest first, and retires the buffer.
    pub fn drain(&mut self) -> Vec<IceCandidate> {
        self.drained = true;
        std::mem::take(&mut self.items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.drained
    }
}
