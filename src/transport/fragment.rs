use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::log::LogSink;
use crate::sink_warn;

/// One wire frame of a possibly larger payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub data: Bytes,
    /// Set on the last frame of a payload.
    pub is_final: bool,
}

/// Splits `payload` into frames of at most `max_frame` bytes. An empty
/// payload still yields one (final, empty) frame.
#[must_use]
pub fn fragment(payload: &[u8], max_frame: usize) -> Vec<Fragment> {
    let max_frame = max_frame.max(1);
    if payload.is_empty() {
        return vec![Fragment {
            data: Bytes::new(),
            is_final: true,
        }];
    }
    let total = payload.len().div_ceil(max_frame);
    payload
        .chunks(max_frame)
        .enumerate()
        .map(|(i, c)| Fragment {
            data: Bytes::copy_from_slice(c),
            is_final: i + 1 == total,
        })
        .collect()
}

/// Concatenates inbound fragments until a final one arrives.
///
/// A payload growing past `max_bytes` is dropped as a whole: everything up
/// to and including its final fragment is discarded and the drop is logged.
pub struct Reassembler {
    buf: BytesMut,
    max_bytes: usize,
    discarding: bool,
    log: Arc<dyn LogSink>,
}

impl Reassembler {
    pub fn new(max_bytes: usize, log: Arc<dyn LogSink>) -> Self {
        Self {
            buf: BytesMut::new(),
            max_bytes,
            discarding: false,
            log,
        }
    }

    /// Feeds one fragment; returns the complete payload once the final
    /// fragment is in.
    pub fn push(&mut self, frag: Fragment) -> Option<String> {
        if self.discarding {
            if frag.is_final {
                self.discarding = false;
            }
            return None;
        }
        if self.buf.len() + frag.data.len() > self.max_bytes {
            sink_warn!(
                self.log,
                "[Reassembly] payload exceeds {} bytes, discarding {} buffered bytes",
                self.max_bytes,
                self.buf.len() + frag.data.len()
            );
            self.buf.clear();
            self.discarding = !frag.is_final;
            return None;
        }
        self.buf.extend_from_slice(&frag.data);
        if !frag.is_final {
            return None;
        }
        let whole = self.buf.split().freeze();
        match String::from_utf8(whole.to_vec()) {
            Ok(text) => Some(text),
            Err(e) => {
                sink_warn!(self.log, "[Reassembly] dropping non UTF-8 payload: {}", e);
                None
            }
        }
    }

    /// Bytes held for an unfinished payload.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}
