use std::collections::VecDeque;
use std::sync::Arc;

use crate::log::LogSink;
use crate::transport::{
    endpoint::{PreferredTransport, TransportEndpoint, TransportEvent},
    fragment::{Fragment, Reassembler, fragment},
    transport_error::TransportError,
};
use crate::{sink_debug, sink_trace, sink_warn};

/// Upper bound on inbound frames handled per pump so a chatty peer cannot
/// starve the caller's loop.
const MAX_READS_PER_SERVICE: usize = 64;

/// Non-blocking frame I/O underneath a [`DuplexEndpoint`].
pub trait FrameLink: Send {
    /// Queues one frame.
    ///
    /// # Errors
    /// [`TransportError::WouldBlock`] when the frame was not taken and must be
    /// offered again; anything else is fatal for the link.
    fn write_fragment(&mut self, frag: &Fragment) -> Result<(), TransportError>;

    /// # Errors
    /// Same contract as [`write_fragment`](Self::write_fragment).
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Next inbound frame, or `None` if nothing is ready yet.
    ///
    /// # Errors
    /// Any error means the link is gone.
    fn read_fragment(&mut self) -> Result<Option<Fragment>, TransportError>;

    fn close(&mut self);
}

struct Outgoing {
    payload: String,
    frames: VecDeque<Fragment>,
}

/// Persistent socket endpoint. All I/O happens inside [`send`] and
/// [`service`]; there is no thread of its own.
///
/// Frames a link cannot take yet stay at the head of the outbound queue and
/// are retried on the next pump, so payload order is never disturbed. When
/// the link dies, payloads that did not fully leave are handed back through
/// [`TransportEvent::Unsent`], ahead of the disconnect notice.
///
/// [`send`]: TransportEndpoint::send
/// [`service`]: TransportEndpoint::service
pub struct DuplexEndpoint<L: FrameLink> {
    link: Option<L>,
    max_frame: usize,
    outbound: VecDeque<Outgoing>,
    reassembler: Reassembler,
    pending_events: Vec<TransportEvent>,
    log: Arc<dyn LogSink>,
}

impl<L: FrameLink> DuplexEndpoint<L> {
    pub fn new(link: L, max_frame: usize, max_reassembly: usize, log: Arc<dyn LogSink>) -> Self {
        Self {
            link: Some(link),
            max_frame,
            outbound: VecDeque::new(),
            reassembler: Reassembler::new(max_reassembly, Arc::clone(&log)),
            pending_events: Vec::new(),
            log,
        }
    }

    /// Payloads accepted but not yet fully written.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.outbound.len()
    }

    fn pump_writes(&mut self) -> Result<(), TransportError> {
        let Some(link) = self.link.as_mut() else {
            return Err(TransportError::Closed);
        };
        while let Some(head) = self.outbound.front_mut() {
            while let Some(frame) = head.frames.front() {
                match link.write_fragment(frame) {
                    Ok(()) => {
                        head.frames.pop_front();
                    }
                    Err(TransportError::WouldBlock) => {
                        sink_trace!(self.log, "[Duplex] link busy, retrying on next pump");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
            self.outbound.pop_front();
        }
        match link.flush() {
            Ok(()) | Err(TransportError::WouldBlock) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn fail(&mut self, err: &TransportError) {
        sink_warn!(self.log, "[Duplex] link lost: {}", err);
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.reassembler.reset();
        let unsent: Vec<String> = self.outbound.drain(..).map(|o| o.payload).collect();
        if !unsent.is_empty() {
            self.pending_events.push(TransportEvent::Unsent(unsent));
        }
        self.pending_events.push(TransportEvent::ConnectionChanged(false));
    }
}

impl<L: FrameLink> TransportEndpoint for DuplexEndpoint<L> {
    fn kind(&self) -> PreferredTransport {
        PreferredTransport::Duplex
    }

    fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn send(&mut self, payload: String) -> Result<(), TransportError> {
        if self.link.is_none() {
            return Err(TransportError::Closed);
        }
        let frames = fragment(payload.as_bytes(), self.max_frame).into();
        self.outbound.push_back(Outgoing { payload, frames });
        if let Err(e) = self.pump_writes() {
            self.fail(&e);
        }
        Ok(())
    }

    fn service(&mut self) -> Vec<TransportEvent> {
        if self.link.is_some() {
            if let Err(e) = self.pump_writes() {
                self.fail(&e);
            }
        }
        let mut reads = 0;
        while reads < MAX_READS_PER_SERVICE {
            let Some(link) = self.link.as_mut() else {
                break;
            };
            match link.read_fragment() {
                Ok(Some(frag)) => {
                    reads += 1;
                    if let Some(text) = self.reassembler.push(frag) {
                        self.pending_events.push(TransportEvent::Message(text));
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.fail(&e);
                    break;
                }
            }
        }
        std::mem::take(&mut self.pending_events)
    }

    fn close(&mut self) {
        if self.link.is_none() {
            return;
        }
        if let Err(_e) = self.pump_writes() {
            sink_debug!(self.log, "[Duplex] final flush failed: {}", _e);
        }
        if !self.outbound.is_empty() {
            sink_warn!(
                self.log,
                "[Duplex] closing with {} payloads not written",
                self.outbound.len()
            );
        }
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.outbound.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::MemoryLogSink;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Wire {
        written: Vec<Fragment>,
        inbound: VecDeque<Result<Fragment, TransportError>>,
        busy_writes: usize,
        fail_writes: bool,
        closed: bool,
    }

    #[derive(Clone, Default)]
    struct FakeLink(Arc<Mutex<Wire>>);

    impl FrameLink for FakeLink {
        fn write_fragment(&mut self, frag: &Fragment) -> Result<(), TransportError> {
            let mut w = self.0.lock().unwrap();
            if w.fail_writes {
                return Err(TransportError::Io("broken pipe".into()));
            }
            if w.busy_writes > 0 {
                w.busy_writes -= 1;
                return Err(TransportError::WouldBlock);
            }
            w.written.push(frag.clone());
            Ok(())
        }
        fn flush(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
        fn read_fragment(&mut self) -> Result<Option<Fragment>, TransportError> {
            self.0.lock().unwrap().inbound.pop_front().transpose()
        }
        fn close(&mut self) {
            self.0.lock().unwrap().closed = true;
        }
    }

    fn endpoint(link: &FakeLink, max_frame: usize) -> DuplexEndpoint<FakeLink> {
        DuplexEndpoint::new(link.clone(), max_frame, 1024, Arc::new(MemoryLogSink::new()))
    }

    fn written_text(link: &FakeLink) -> String {
        let w = link.0.lock().unwrap();
        w.written
            .iter()
            .map(|f| String::from_utf8(f.data.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn large_payload_goes_out_in_bounded_frames() {
        let link = FakeLink::default();
        let mut ep = endpoint(&link, 4);
        ep.send("0123456789".into()).unwrap();

        let w = link.0.lock().unwrap();
        assert_eq!(w.written.len(), 3);
        assert!(w.written.iter().all(|f| f.data.len() <= 4));
        assert!(w.written[2].is_final && !w.written[1].is_final);
    }

    #[test]
    fn busy_link_retries_without_reordering() {
        let link = FakeLink::default();
        link.0.lock().unwrap().busy_writes = 2;
        let mut ep = endpoint(&link, 64);

        ep.send("first".into()).unwrap();
        ep.send("second".into()).unwrap();
        assert_eq!(ep.backlog(), 2);

        ep.service();
        assert_eq!(ep.backlog(), 0);
        assert_eq!(written_text(&link), "firstsecond");
    }

    #[test]
    fn inbound_fragments_are_reassembled() {
        let link = FakeLink::default();
        {
            let mut w = link.0.lock().unwrap();
            w.inbound.push_back(Ok(Fragment {
                data: Bytes::from_static(b"{\"type\":"),
                is_final: false,
            }));
            w.inbound.push_back(Ok(Fragment {
                data: Bytes::from_static(b"\"bye\"}"),
                is_final: true,
            }));
        }
        let mut ep = endpoint(&link, 64);
        assert_eq!(
            ep.service(),
            vec![TransportEvent::Message(r#"{"type":"bye"}"#.into())]
        );
    }

    #[test]
    fn dead_link_hands_back_unsent_payloads() {
        let link = FakeLink::default();
        link.0.lock().unwrap().busy_writes = 2;
        let mut ep = endpoint(&link, 64);
        ep.send("a".into()).unwrap();
        ep.send("b".into()).unwrap();

        link.0.lock().unwrap().fail_writes = true;
        let events = ep.service();

        assert!(!ep.is_open());
        assert!(link.0.lock().unwrap().closed);
        assert_eq!(
            events,
            vec![
                TransportEvent::Unsent(vec!["a".into(), "b".into()]),
                TransportEvent::ConnectionChanged(false),
            ]
        );
        assert_eq!(ep.send("c".into()), Err(TransportError::Closed));
    }

    #[test]
    fn read_error_reports_disconnect() {
        let link = FakeLink::default();
        link.0
            .lock()
            .unwrap()
            .inbound
            .push_back(Err(TransportError::Closed));
        let mut ep = endpoint(&link, 64);
        assert_eq!(ep.service(), vec![TransportEvent::ConnectionChanged(false)]);
        assert!(ep.service().is_empty());
    }
}
