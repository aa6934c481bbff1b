use std::time::Duration;

/// Credit is counted in millionths of a byte.
pub const MICROS_PER_BYTE: u128 = 1_000_000;
/// Target rate is stored in thousandths of a byte per second.
pub const MILLIS_PER_BYTE: f64 = 1_000.0;
/// milli-B/s * ns / this = micro-bytes.
pub const ACCRUAL_DIVISOR: u128 = 1_000_000;
/// How often the shaper and the receiver log their throughput.
pub const RATE_REPORT_INTERVAL: Duration = Duration::from_secs(1);
