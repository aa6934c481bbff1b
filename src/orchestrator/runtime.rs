use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::engine::{FlowIo, FlowKind};
use crate::log::LogSink;
use crate::orchestrator::orchestrator_c::SignalingOrchestrator;
use crate::settings::ClientSettings;
use crate::shaper::{BulkReceiver, BulkTrafficShaper, ShaperWorker};
use crate::{sink_debug, sink_info, sink_warn};

/// Requests a front-end posts to the [`Runtime`] worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCommand {
    /// Join a room on the given server; empty means the configured one.
    Join(String),
    StartLoopback,
    Disconnect,
    StartBulk,
    StopBulk,
    Shutdown,
}

/// Worker thread owning the orchestrator. Commands are handled first, then
/// the orchestrator is polled for at most one service interval.
pub struct Runtime {
    tx: Sender<RuntimeCommand>,
    handle: Option<JoinHandle<()>>,
    log: Arc<dyn LogSink>,
}

impl Runtime {
    /// Registers a [`BulkReceiver`] on the bulk flow and starts the worker.
    ///
    /// # Errors
    /// If the thread cannot be spawned.
    pub fn spawn(
        mut orchestrator: SignalingOrchestrator,
        settings: ClientSettings,
        io: Arc<dyn FlowIo>,
        log: Arc<dyn LogSink>,
    ) -> io::Result<Self> {
        let mut receiver = BulkReceiver::new(
            settings.receiver.log_period,
            Arc::clone(&log),
            Instant::now(),
        );
        orchestrator.register_payload_handler(
            FlowKind::BulkTest,
            Box::new(move |data: &[u8]| {
                receiver.on_payload_at(data.len(), Instant::now());
            }),
        );

        let (tx, rx) = mpsc::channel();
        let worker = RuntimeLoop {
            orchestrator,
            settings,
            io,
            bulk: None,
            log: Arc::clone(&log),
        };
        let handle = thread::Builder::new()
            .name("signaling-runtime".into())
            .spawn(move || worker.run(&rx))?;
        Ok(Self {
            tx,
            handle: Some(handle),
            log,
        })
    }

    /// Queues `cmd`. Returns false once the worker has exited.
    pub fn send(&self, cmd: RuntimeCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }

    /// Leaves any room, stops the shaper and joins the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.tx.send(RuntimeCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            sink_warn!(self.log, "[Runtime] worker panicked");
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

struct RuntimeLoop {
    orchestrator: SignalingOrchestrator,
    settings: ClientSettings,
    io: Arc<dyn FlowIo>,
    bulk: Option<ShaperWorker>,
    log: Arc<dyn LogSink>,
}

impl RuntimeLoop {
    fn run(mut self, rx: &Receiver<RuntimeCommand>) {
        sink_info!(self.log, "[Runtime] started");
        if self.settings.signaling.loopback {
            self.handle(RuntimeCommand::StartLoopback);
        }
        'outer: loop {
            loop {
                match rx.try_recv() {
                    Ok(cmd) => {
                        if !self.handle(cmd) {
                            break 'outer;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.handle(RuntimeCommand::Shutdown);
                        break 'outer;
                    }
                }
            }
            self.orchestrator
                .poll_timeout(self.settings.signaling.service_interval);
        }
        sink_info!(self.log, "[Runtime] stopped");
    }

    /// Returns false on shutdown.
    fn handle(&mut self, cmd: RuntimeCommand) -> bool {
        sink_debug!(self.log, "[Runtime] command {:?}", cmd);
        let result = match cmd {
            RuntimeCommand::Join(server) => {
                let server = if server.is_empty() {
                    self.settings.signaling.server.clone()
                } else {
                    server
                };
                self.orchestrator.join(&server)
            }
            RuntimeCommand::StartLoopback => self.orchestrator.start_loopback(),
            RuntimeCommand::Disconnect => {
                self.stop_bulk();
                self.orchestrator.disconnect()
            }
            RuntimeCommand::StartBulk => {
                self.start_bulk();
                Ok(())
            }
            RuntimeCommand::StopBulk => {
                self.stop_bulk();
                Ok(())
            }
            RuntimeCommand::Shutdown => {
                self.stop_bulk();
                let _ = self.orchestrator.disconnect();
                return false;
            }
        };
        if let Err(e) = result {
            sink_warn!(self.log, "[Runtime] command failed: {}", e);
        }
        true
    }

    fn start_bulk(&mut self) {
        if self.bulk.is_some() {
            sink_debug!(self.log, "[Runtime] bulk sender already running");
            return;
        }
        let shaper = BulkTrafficShaper::new(
            &self.settings.shaper,
            FlowKind::BulkTest,
            Arc::clone(&self.io),
            self.orchestrator.gate(),
            Arc::clone(&self.log),
            Instant::now(),
        );
        match ShaperWorker::spawn(shaper, self.settings.shaper.pump_interval, Arc::clone(&self.log)) {
            Ok(worker) => self.bulk = Some(worker),
            Err(e) => sink_warn!(self.log, "[Runtime] could not start bulk sender: {}", e),
        }
    }

    fn stop_bulk(&mut self) {
        if let Some(worker) = self.bulk.take() {
            let total = worker.stop();
            sink_info!(self.log, "[Runtime] bulk sender stopped, {} bytes sent", total);
        }
    }
}
