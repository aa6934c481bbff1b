use std::time::{Duration, Instant};

use super::constants::{ACCRUAL_DIVISOR, MICROS_PER_BYTE, MILLIS_PER_BYTE};

/// Token bucket counted in bytes, fixed point.
///
/// Accrual is exact: the sub-micro-byte remainder of every tick is carried
/// into the next one, so no credit is lost to rounding however short the
/// ticks are. Stored credit is unbounded unless a cap is given.
#[derive(Debug, Clone)]
pub struct CreditBucket {
    target_milli_bps: u128,
    credit_micro: u128,
    residue: u128,
    cap_micro: Option<u128>,
    last_tick: Instant,
}

impl CreditBucket {
    /// `cap` limits stored credit to that much time worth of target rate.
    /// A NaN or negative rate accrues nothing; an infinite one saturates.
    #[must_use]
    pub fn new(target_bytes_per_sec: f64, cap: Option<Duration>, now: Instant) -> Self {
        let rate = if target_bytes_per_sec.is_nan() {
            0.0
        } else {
            target_bytes_per_sec.max(0.0)
        };
        // float to int casts saturate
        let target_milli_bps = (rate * MILLIS_PER_BYTE).round() as u128;
        let cap_micro =
            cap.map(|c| target_milli_bps.saturating_mul(c.as_nanos()) / ACCRUAL_DIVISOR);
        Self {
            target_milli_bps,
            credit_micro: 0,
            residue: 0,
            cap_micro,
            last_tick: now,
        }
    }

    /// Accrues credit for the time since the previous tick. A `now` earlier
    /// than the previous tick accrues nothing.
    pub fn tick_at(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_tick);
        self.last_tick = self.last_tick.max(now);
        self.accrue(dt);
    }

    /// Adds `dt` worth of credit.
    pub fn accrue(&mut self, dt: Duration) {
        let scaled = self
            .target_milli_bps
            .saturating_mul(dt.as_nanos())
            .saturating_add(self.residue);
        self.credit_micro = self.credit_micro.saturating_add(scaled / ACCRUAL_DIVISOR);
        self.residue = scaled % ACCRUAL_DIVISOR;
        if let Some(cap) = self.cap_micro {
            if self.credit_micro > cap {
                self.credit_micro = cap;
                self.residue = 0;
            }
        }
    }

    #[must_use]
    pub fn has(&self, bytes: usize) -> bool {
        self.credit_micro >= (bytes as u128).saturating_mul(MICROS_PER_BYTE)
    }

    /// Takes `bytes` of credit if available.
    pub fn spend(&mut self, bytes: usize) -> bool {
        let cost = (bytes as u128).saturating_mul(MICROS_PER_BYTE);
        if self.credit_micro < cost {
            return false;
        }
        self.credit_micro -= cost;
        true
    }

    #[must_use]
    pub fn credit_bytes(&self) -> f64 {
        self.credit_micro as f64 / MICROS_PER_BYTE as f64
    }

    #[must_use]
    pub fn target_bytes_per_sec(&self) -> f64 {
        self.target_milli_bps as f64 / MILLIS_PER_BYTE
    }
}
