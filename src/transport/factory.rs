use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use rustls::ClientConfig;

use crate::completion::Completion;
use crate::log::LogSink;
use crate::settings::SignalingSettings;
use crate::transport::{
    duplex_endpoint::DuplexEndpoint,
    endpoint::TransportEndpoint,
    http_endpoint::{HttpPoster, RequestResponseEndpoint},
    tls,
    transport_error::TransportError,
    ws_link::WsLink,
};
use crate::{sink_info, sink_warn};

pub type DuplexResult = Result<Box<dyn TransportEndpoint>, TransportError>;

/// Builds the two kinds of signaling endpoint for a Session.
pub trait TransportFactory: Send {
    /// Endpoint posting every payload to `url`.
    ///
    /// # Errors
    /// [`TransportError`] if the endpoint cannot be set up.
    fn request_response(&mut self, url: &str) -> Result<Box<dyn TransportEndpoint>, TransportError>;

    /// Starts connecting the duplex channel; the outcome arrives through `done`.
    fn connect_duplex(&mut self, url: &str, done: Completion<DuplexResult>);
}

/// HTTPS posts and WebSocket duplex channels.
pub struct NetTransportFactory {
    http: Client,
    tls: Option<Arc<ClientConfig>>,
    connect_timeout: Duration,
    max_frame: usize,
    max_reassembly: usize,
    log: Arc<dyn LogSink>,
}

impl NetTransportFactory {
    /// # Errors
    /// [`TransportError::Tls`] when `ca_file` is configured but unusable.
    pub fn new(settings: &SignalingSettings, log: Arc<dyn LogSink>) -> Result<Self, TransportError> {
        let ca_file = settings.ca_file.as_deref();
        Ok(Self {
            http: tls::http_client(settings.join_timeout, ca_file)?,
            tls: tls::client_config(ca_file)?,
            connect_timeout: settings.connect_timeout,
            max_frame: settings.max_frame_bytes,
            max_reassembly: settings.max_reassembly_bytes,
            log,
        })
    }
}

impl TransportFactory for NetTransportFactory {
    fn request_response(&mut self, url: &str) -> Result<Box<dyn TransportEndpoint>, TransportError> {
        let poster = HttpPoster::new(self.http.clone());
        let ep = RequestResponseEndpoint::spawn(url.to_owned(), Box::new(poster), Arc::clone(&self.log))?;
        Ok(Box::new(ep))
    }

    fn connect_duplex(&mut self, url: &str, done: Completion<DuplexResult>) {
        let url = url.to_owned();
        let tls = self.tls.clone();
        let timeout = self.connect_timeout;
        let (max_frame, max_reassembly) = (self.max_frame, self.max_reassembly);
        let log = Arc::clone(&self.log);

        let spawned = thread::Builder::new()
            .name("duplex-connect".into())
            .spawn(move || {
                let link = WsLink::connect(&url, timeout, tls, max_reassembly, Arc::clone(&log));
                let result = link.map(|link| {
                    sink_info!(log, "[Duplex] connected to {}", url);
                    Box::new(DuplexEndpoint::new(link, max_frame, max_reassembly, Arc::clone(&log)))
                        as Box<dyn TransportEndpoint>
                });
                if let Err(e) = &result {
                    sink_warn!(log, "[Duplex] connect to {} failed: {}", url, e);
                }
                done.complete(result);
            });
        if let Err(e) = spawned {
            sink_warn!(self.log, "[Duplex] could not spawn connect thread: {}", e);
        }
    }
}
