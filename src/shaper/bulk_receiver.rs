use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::log::LogSink;
use crate::sink_info;

/// Counts bytes arriving on the bulk flow and logs the rate once per period.
pub struct BulkReceiver {
    period: Duration,
    window_start: Instant,
    window_bytes: u64,
    total_bytes: u64,
    log: Arc<dyn LogSink>,
}

impl BulkReceiver {
    pub fn new(period: Duration, log: Arc<dyn LogSink>, now: Instant) -> Self {
        Self {
            period,
            window_start: now,
            window_bytes: 0,
            total_bytes: 0,
            log,
        }
    }

    /// Records `len` bytes received at `now`. Returns the window's Mbps when
    /// a period has just closed.
    pub fn on_payload_at(&mut self, len: usize, now: Instant) -> Option<f64> {
        self.window_bytes += len as u64;
        self.total_bytes += len as u64;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.period || elapsed.is_zero() {
            return None;
        }
        let mbps = (self.window_bytes as f64 * 8.0) / elapsed.as_secs_f64() / 1e6;
        sink_info!(
            self.log,
            "[Receiver] {:.2} Mbps ({} bytes in {:?}, {} total)",
            mbps,
            self.window_bytes,
            elapsed,
            self.total_bytes
        );
        self.window_start = now;
        self.window_bytes = 0;
        Some(mbps)
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::{LogLevel, MemoryLogSink};

    #[test]
    fn reports_once_per_period() {
        let t0 = Instant::now();
        let log = Arc::new(MemoryLogSink::new());
        let mut rx = BulkReceiver::new(Duration::from_secs(1), log.clone(), t0);

        assert_eq!(rx.on_payload_at(62_500, t0 + Duration::from_millis(500)), None);
        let mbps = rx
            .on_payload_at(62_500, t0 + Duration::from_secs(1))
            .unwrap();
        assert!((mbps - 1.0).abs() < 1e-9);
        assert!(log.contains(LogLevel::Info, "[Receiver] 1.00 Mbps"));

        assert_eq!(rx.on_payload_at(10, t0 + Duration::from_millis(1500)), None);
        assert_eq!(rx.total_bytes(), 125_010);
    }
}
