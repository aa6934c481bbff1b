//! Leveled logging through an injected [`LogSink`].
//!
//! The `sink_*!` macros are feature gated (`log-trace` .. `log-error`); a
//! disabled level expands to `()` so its arguments are never formatted.
pub mod log_level;
pub mod log_macros;
pub mod log_msg;
pub mod log_sink;
pub mod logger;
pub mod logger_handle;
pub mod memory_log_sink;
pub mod noop_log_sink;

pub use log_level::LogLevel;
pub use log_sink::LogSink;
pub use logger::Logger;
pub use logger_handle::LoggerHandle;
pub use memory_log_sink::MemoryLogSink;
pub use noop_log_sink::NoopLogSink;
