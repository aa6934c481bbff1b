use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, SyncSender, TrySendError},
    thread::{self, JoinHandle},
};

use crate::{
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
    settings::LogSettings,
};

/// Lines written between explicit flushes.
#[cfg(feature = "log-debug")]
const FLUSH_EVERY: u32 = 100;
#[cfg(not(feature = "log-debug"))]
const FLUSH_EVERY: u32 = 1_000;

/// After this many lines fail to reach the UI channel a summary line is sent.
const UI_DROP_REPORT: usize = 10;

/// Per-process file logger fed through a bounded queue.
///
/// A single `logger-worker` thread owns the file. It also forwards every
/// Warn/Error line, and one in `sample_every` of the rest, to a second
/// bounded channel that a front-end can drain with [`Logger::try_recv_ui`].
pub struct Logger {
    handle: LoggerHandle,
    ui_rx: Receiver<String>,
    file_path: PathBuf,
    _worker: Option<JoinHandle<()>>,
}

impl Logger {
    /// Starts the logger in the directory named by `settings`, or in `logs/`
    /// next to the executable when none is configured.
    #[must_use]
    pub fn start(settings: &LogSettings, cap: usize, ui_cap: usize, sample_every: u32) -> Self {
        let dir = settings
            .log_path
            .as_deref()
            .map_or_else(default_log_dir, expand_home);
        Self::start_in_dir(
            dir,
            settings.log_filename.as_deref(),
            cap,
            ui_cap,
            sample_every,
        )
    }

    /// Creates `dir` if needed and starts writing
    /// `{app}-{YYYYmmdd_HHMMSS}-pid{N}.log` inside it.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        ui_cap: usize,
        sample_every: u32,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let pid = std::process::id();
        let fname = match app_name {
            Some(name) => format!("{name}-{stamp}-pid{pid}.log"),
            None => format!("roomlink-{stamp}-pid{pid}.log"),
        };
        let file_path = dir.join(fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap);
        let (ui_tx, ui_rx) = mpsc::sync_channel::<String>(ui_cap);
        let sample_every = sample_every.max(1);

        let path_for_worker = file_path.clone();
        let worker = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || run_worker(&path_for_worker, &rx, &ui_tx, sample_every))
            .ok();

        Self {
            handle: LoggerHandle { tx },
            ui_rx,
            file_path,
            _worker: worker,
        }
    }

    /// Non-blocking enqueue; see [`LoggerHandle::try_log`].
    ///
    /// # Errors
    /// Returns the rejected message when the queue is full or closed.
    pub fn try_log(
        &self,
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// One sampled line for a UI log pane, if any is waiting.
    #[must_use]
    pub fn try_recv_ui(&self) -> Option<String> {
        self.ui_rx.try_recv().ok()
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn run_worker(path: &Path, rx: &Receiver<LogMsg>, ui_tx: &SyncSender<String>, sample_every: u32) {
    let mut out = BufWriter::new(open_writer(path));
    let mut written: u32 = 0;
    let mut sampled: u32 = 0;
    let mut ui_dropped: usize = 0;

    while let Ok(m) = rx.recv() {
        let _ = writeln!(out, "{}", m.to_line());
        written = written.wrapping_add(1);
        if written % FLUSH_EVERY == 0 {
            let _ = out.flush();
        }

        let forward = m.level.is_problem() || {
            sampled = sampled.wrapping_add(1);
            sampled % sample_every == 0
        };
        if forward && ui_tx.try_send(format!("[{}] {}", m.level, m.text)).is_err() {
            ui_dropped += 1;
        }
        if ui_dropped >= UI_DROP_REPORT {
            let _ = ui_tx.try_send(format!("(logger) UI queue dropped {ui_dropped} lines"));
            ui_dropped = 0;
        }
    }

    let _ = out.flush();
}

/// Target file, then a temp-dir fallback, then a sink. Never panics.
fn open_writer(path: &Path) -> Box<dyn Write + Send> {
    let open = |p: &Path| OpenOptions::new().create(true).append(true).open(p);
    if let Ok(f) = open(path) {
        return Box::new(f);
    }
    match open(&std::env::temp_dir().join("roomlink-fallback.log")) {
        Ok(f) => Box::new(f),
        Err(_) => Box::new(io::sink()),
    }
}

fn default_log_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}

fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"))
        .or_else(|| (path == "~").then_some(""));
    match (rest, std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn warn_lines_always_reach_ui_channel() {
        let dir = std::env::temp_dir().join(format!("roomlink-logtest-{}", std::process::id()));
        let logger = Logger::start_in_dir(&dir, Some("unit"), 16, 16, 1_000);

        logger.try_log(LogLevel::Debug, "sampled away", "t").unwrap();
        logger.try_log(LogLevel::Warn, "duplex dropped", "t").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut got = None;
        while Instant::now() < deadline {
            if let Some(line) = logger.try_recv_ui() {
                got = Some(line);
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got.as_deref(), Some("[WARN] duplex dropped"));
        assert!(logger.file_path().starts_with(&dir));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home("~/logs"), PathBuf::from(home).join("logs"));
        }
        assert_eq!(expand_home("/var/log"), PathBuf::from("/var/log"));
    }
}
