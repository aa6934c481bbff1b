use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::constants::RATE_REPORT_INTERVAL;
use super::credit_bucket::CreditBucket;
use super::session_gate::SessionGate;
use crate::engine::{FlowIo, FlowKind};
use crate::log::LogSink;
use crate::settings::ShaperSettings;
use crate::{sink_debug, sink_info, sink_warn};

/// Why a tick stopped sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStop {
    /// Less than one chunk of credit left.
    Credit,
    /// The flow's send buffer reached the cap.
    Backpressure,
    /// Session or flow not open; credit kept.
    Closed,
    /// The engine refused a chunk.
    SendFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub chunks_sent: usize,
    pub stopped_by: TickStop,
}

/// Paces fixed-size chunks onto one flow at a target rate.
///
/// Each tick accrues credit for the elapsed time, then sends while there is
/// a chunk of credit, the flow's buffered amount is under the cap, and the
/// flow is open. It only reads session state through [`SessionGate`] and
/// [`FlowIo`] and never touches negotiation.
pub struct BulkTrafficShaper {
    bucket: CreditBucket,
    chunk: Bytes,
    buffered_cap: u64,
    kind: FlowKind,
    io: Arc<dyn FlowIo>,
    gate: SessionGate,
    window_start: Instant,
    window_bytes: u64,
    total_bytes: u64,
    log: Arc<dyn LogSink>,
}

impl BulkTrafficShaper {
    pub fn new(
        settings: &ShaperSettings,
        kind: FlowKind,
        io: Arc<dyn FlowIo>,
        gate: SessionGate,
        log: Arc<dyn LogSink>,
        now: Instant,
    ) -> Self {
        Self {
            bucket: CreditBucket::new(settings.target_bytes_per_sec(), settings.credit_cap, now),
            chunk: Bytes::from(vec![0u8; settings.chunk_bytes.max(1)]),
            buffered_cap: settings.buffered_cap,
            kind,
            io,
            gate,
            window_start: now,
            window_bytes: 0,
            total_bytes: 0,
            log,
        }
    }

    /// One control-loop step at `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        self.bucket.tick_at(now);
        let report = self.drain();
        self.maybe_report(now);
        report
    }

    fn drain(&mut self) -> TickReport {
        let chunk_len = self.chunk.len();
        let mut chunks_sent = 0;
        if !self.gate.is_open() || !self.io.is_flow_open(self.kind) {
            return TickReport {
                chunks_sent,
                stopped_by: TickStop::Closed,
            };
        }
        let stopped_by = loop {
            if !self.bucket.has(chunk_len) {
                break TickStop::Credit;
            }
            if self.io.buffered_bytes(self.kind) >= self.buffered_cap {
                break TickStop::Backpressure;
            }
            if !self.io.send(self.kind, &self.chunk) {
                sink_warn!(self.log, "[Shaper] {} flow refused a {} byte chunk", self.kind, chunk_len);
                break TickStop::SendFailed;
            }
            self.bucket.spend(chunk_len);
            chunks_sent += 1;
        };
        let sent = (chunks_sent * chunk_len) as u64;
        self.window_bytes += sent;
        self.total_bytes += sent;
        TickReport {
            chunks_sent,
            stopped_by,
        }
    }

    fn maybe_report(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < RATE_REPORT_INTERVAL {
            return;
        }
        let mbps = (self.window_bytes as f64 * 8.0) / elapsed.as_secs_f64() / 1e6;
        sink_info!(
            self.log,
            "[Shaper] {:.1} Mbps on {} (target {:.1}), buffered {} bytes, credit {:.0} bytes",
            mbps,
            self.kind,
            self.bucket.target_bytes_per_sec() * 8.0 / 1e6,
            self.io.buffered_bytes(self.kind),
            self.bucket.credit_bytes()
        );
        self.window_start = now;
        self.window_bytes = 0;
    }

    #[must_use]
    pub fn credit_bytes(&self) -> f64 {
        self.bucket.credit_bytes()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// The shaper running on its own thread at a fixed interval.
pub struct ShaperWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
    log: Arc<dyn LogSink>,
}

impl ShaperWorker {
    /// # Errors
    /// If the thread cannot be spawned.
    pub fn spawn(
        mut shaper: BulkTrafficShaper,
        interval: Duration,
        log: Arc<dyn LogSink>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("bulk-shaper".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    shaper.tick_at(Instant::now());
                }
                shaper.total_bytes()
            })?;
        sink_info!(log, "[Shaper] started, tick every {:?}", interval);
        Ok(Self {
            stop,
            handle: Some(handle),
            log,
        })
    }

    /// Stops the loop and waits for it. Returns the bytes sent overall.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return 0;
        };
        match handle.join() {
            Ok(total) => {
                sink_info!(self.log, "[Shaper] stopped after {} bytes", total);
                total
            }
            Err(_) => {
                sink_warn!(self.log, "[Shaper] worker panicked");
                0
            }
        }
    }
}

impl Drop for ShaperWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            sink_debug!(self.log, "[Shaper] stopping on drop");
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::sync::Mutex;

    /// Buffered grows by whatever is sent and never drains.
    struct PipeIo {
        open: AtomicBool,
        buffered: Mutex<u64>,
        sends: Mutex<usize>,
    }

    impl PipeIo {
        fn new(open: bool, buffered: u64) -> Arc<Self> {
            Arc::new(Self {
                open: AtomicBool::new(open),
                buffered: Mutex::new(buffered),
                sends: Mutex::new(0),
            })
        }
    }

    impl FlowIo for PipeIo {
        fn send(&self, _kind: FlowKind, data: &[u8]) -> bool {
            *self.buffered.lock().unwrap() += data.len() as u64;
            *self.sends.lock().unwrap() += 1;
            true
        }
        fn buffered_bytes(&self, _kind: FlowKind) -> u64 {
            *self.buffered.lock().unwrap()
        }
        fn is_flow_open(&self, _kind: FlowKind) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    fn settings(bytes_per_sec: f64, chunk: usize, cap: u64) -> ShaperSettings {
        ShaperSettings {
            target_mbps: bytes_per_sec * 8.0 / 1e6,
            chunk_bytes: chunk,
            buffered_cap: cap,
            pump_interval: Duration::from_millis(10),
            credit_cap: None,
        }
    }

    fn shaper(s: &ShaperSettings, io: Arc<PipeIo>, t0: Instant) -> BulkTrafficShaper {
        let gate = SessionGate::new();
        gate.set(true);
        BulkTrafficShaper::new(s, FlowKind::BulkTest, io, gate, Arc::new(NoopLogSink), t0)
    }

    #[test]
    fn ten_chunks_in_ten_milliseconds() {
        let t0 = Instant::now();
        let io = PipeIo::new(true, 0);
        let mut sh = shaper(&settings(1_000_000.0, 1000, 1 << 30), io.clone(), t0);

        let r = sh.tick_at(t0 + Duration::from_millis(10));
        assert_eq!(r.chunks_sent, 10);
        assert_eq!(r.stopped_by, TickStop::Credit);
        assert_eq!(sh.credit_bytes(), 0.0);
        assert_eq!(*io.sends.lock().unwrap(), 10);
    }

    #[test]
    fn nothing_sent_at_the_cap() {
        let t0 = Instant::now();
        let io = PipeIo::new(true, 5000);
        let mut sh = shaper(&settings(1_000_000.0, 1000, 5000), io.clone(), t0);

        let r = sh.tick_at(t0 + Duration::from_millis(10));
        assert_eq!(r.chunks_sent, 0);
        assert_eq!(r.stopped_by, TickStop::Backpressure);
        assert_eq!(sh.credit_bytes(), 10_000.0);
    }

    #[test]
    fn one_chunk_just_below_the_cap() {
        let t0 = Instant::now();
        let io = PipeIo::new(true, 4999);
        let mut sh = shaper(&settings(1_000_000.0, 1000, 5000), io.clone(), t0);

        let r = sh.tick_at(t0 + Duration::from_millis(10));
        assert_eq!(r.chunks_sent, 1);
        assert_eq!(r.stopped_by, TickStop::Backpressure);
    }

    #[test]
    fn closed_flow_keeps_accruing() {
        let t0 = Instant::now();
        let io = PipeIo::new(false, 0);
        let mut sh = shaper(&settings(1_000_000.0, 1000, 1 << 30), io.clone(), t0);

        let r = sh.tick_at(t0 + Duration::from_millis(10));
        assert_eq!((r.chunks_sent, r.stopped_by), (0, TickStop::Closed));
        assert_eq!(sh.credit_bytes(), 10_000.0);

        io.open.store(true, Ordering::SeqCst);
        let r = sh.tick_at(t0 + Duration::from_millis(20));
        assert_eq!(r.chunks_sent, 20);
    }

    #[test]
    fn closed_gate_blocks_open_flow() {
        let t0 = Instant::now();
        let io = PipeIo::new(true, 0);
        let gate = SessionGate::new();
        let mut sh = BulkTrafficShaper::new(
            &settings(1_000_000.0, 1000, 1 << 30),
            FlowKind::BulkTest,
            io.clone(),
            gate,
            Arc::new(NoopLogSink),
            t0,
        );
        assert_eq!(
            sh.tick_at(t0 + Duration::from_millis(10)).stopped_by,
            TickStop::Closed
        );
        assert_eq!(*io.sends.lock().unwrap(), 0);
    }

    #[test]
    fn worker_sends_until_stopped() {
        let io = PipeIo::new(true, 0);
        let sh = shaper(&settings(10_000_000.0, 1000, u64::MAX), io.clone(), Instant::now());
        let worker = ShaperWorker::spawn(sh, Duration::from_millis(2), Arc::new(NoopLogSink)).unwrap();
        thread::sleep(Duration::from_millis(50));
        let total = worker.stop();
        assert!(total > 0);
        assert_eq!(total, *io.sends.lock().unwrap() as u64 * 1000);
    }
}
