use std::sync::mpsc::{SyncSender, TrySendError};

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink};

/// Cloneable producer side of the [`Logger`](crate::log::Logger).
///
/// Never blocks: when the worker falls behind and the queue is full the
/// line is dropped.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: SyncSender<LogMsg>,
}

impl LoggerHandle {
    /// Enqueues one line.
    ///
    /// # Errors
    /// `TrySendError::Full` when the queue is at capacity and
    /// `TrySendError::Disconnected` once the worker has exited.
    pub fn try_log(
        &self,
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.tx.try_send(LogMsg::new(level, text, target))
    }
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}
