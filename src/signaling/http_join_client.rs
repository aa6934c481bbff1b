use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::completion::Completion;
use crate::log::LogSink;
use crate::signaling::{
    join::{JoinClient, JoinRequest, JoinResult, parse_join_response},
    signaling_error::SignalingError,
};
use crate::transport::{TransportError, tls};
use crate::{sink_debug, sink_warn};

/// Join handshake over HTTPS. Each call runs on its own short-lived thread
/// so the orchestrator loop keeps servicing a live Session meanwhile.
pub struct HttpJoinClient {
    http: Client,
    log: Arc<dyn LogSink>,
}

impl HttpJoinClient {
    /// # Errors
    /// [`TransportError`] if the TLS roots or the HTTP client cannot be built.
    pub fn new(
        timeout: Duration,
        ca_file: Option<&str>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            http: tls::http_client(timeout, ca_file)?,
            log,
        })
    }
}

impl JoinClient for HttpJoinClient {
    fn join(&mut self, request: JoinRequest, done: Completion<JoinResult>) {
        let http = self.http.clone();
        let log = Arc::clone(&self.log);
        let spawned = thread::Builder::new()
            .name("join-request".into())
            .spawn(move || {
                let url = request.url();
                sink_debug!(log, "[Join] POST {}", url);
                let result = post_join(&http, &url, &request);
                if let Err(e) = &result {
                    sink_warn!(log, "[Join] {} failed: {}", url, e);
                }
                done.complete(result);
            });
        if let Err(e) = spawned {
            sink_warn!(self.log, "[Join] could not spawn request thread: {}", e);
        }
    }
}

fn post_join(http: &Client, url: &str, request: &JoinRequest) -> JoinResult {
    let resp = http.post(url).json(request).send().map_err(|e| {
        if e.is_timeout() {
            SignalingError::Timeout("join request")
        } else {
            SignalingError::JoinFailure(e.to_string())
        }
    })?;
    let status = resp.status();
    let body = resp
        .text()
        .map_err(|e| SignalingError::JoinFailure(e.to_string()))?;
    if !status.is_success() {
        return Err(SignalingError::JoinFailure(format!("HTTP {status}")));
    }
    parse_join_response(&body)
}
