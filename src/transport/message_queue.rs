use std::collections::VecDeque;

/// Outbound payloads waiting for the duplex channel, oldest first.
#[derive(Debug, Default, Clone)]
pub struct MessageQueue {
    items: VecDeque<String>,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: String) {
        self.items.push_back(payload);
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Puts payloads that an endpoint gave back ahead of everything queued,
    /// keeping their relative order.
    pub fn requeue_front(&mut self, payloads: Vec<String>) {
        for p in payloads.into_iter().rev() {
            self.items.push_front(p);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
