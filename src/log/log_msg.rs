use chrono::{DateTime, Local};

use crate::log::log_level::LogLevel;

/// One queued log line, stamped when it was produced rather than when the
/// worker gets to write it.
#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: LogLevel,
    pub at: DateTime<Local>,
    pub text: String,
    /// Usually `module_path!()` of the caller.
    pub target: &'static str,
}

impl LogMsg {
    pub fn new(level: LogLevel, text: impl Into<String>, target: &'static str) -> Self {
        Self {
            level,
            at: Local::now(),
            text: text.into(),
            target,
        }
    }

    /// `[LEVEL] 2025-01-01 12:00:00.000 target | text`
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {} {} | {}",
            self.level,
            self.at.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.target,
            self.text
        )
    }
}
