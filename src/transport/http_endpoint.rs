use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::log::LogSink;
use crate::transport::{
    endpoint::{PreferredTransport, TransportEndpoint, TransportEvent},
    transport_error::TransportError,
};
use crate::{sink_debug, sink_error};

/// One request per payload against a fixed URL.
pub trait MessagePoster: Send {
    /// # Errors
    /// Any [`TransportError`]; the endpoint treats every failure as final.
    fn post(&self, url: &str, body: &str) -> Result<(), TransportError>;
}

/// Posts over HTTPS and accepts a 2xx whose body is either empty, not JSON,
/// or JSON with `"result":"SUCCESS"`.
pub struct HttpPoster {
    http: Client,
}

impl HttpPoster {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl MessagePoster for HttpPoster {
    fn post(&self, url: &str, body: &str) -> Result<(), TransportError> {
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Http(format!("HTTP {status}")));
        }
        let text = resp.text()?;
        if let Ok(v) = serde_json::from_str::<Value>(&text) {
            if let Some(result) = v.get("result").and_then(Value::as_str) {
                if result != "SUCCESS" {
                    return Err(TransportError::Rejected(result.to_owned()));
                }
            }
        }
        Ok(())
    }
}

/// Request/response signaling channel. Payloads are posted in order by a
/// dedicated sender thread; the first failure closes the endpoint and is
/// reported by the next [`service`](TransportEndpoint::service).
pub struct RequestResponseEndpoint {
    tx: Option<Sender<String>>,
    failures: Receiver<TransportError>,
    failed: bool,
}

impl RequestResponseEndpoint {
    /// # Errors
    /// [`TransportError::Io`] if the sender thread cannot be started.
    pub fn spawn(
        url: String,
        poster: Box<dyn MessagePoster>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::channel::<String>();
        let (fail_tx, failures) = mpsc::channel();

        thread::Builder::new()
            .name("signaling-post".into())
            .spawn(move || {
                while let Ok(body) = rx.recv() {
                    match poster.post(&url, &body) {
                        Ok(()) => sink_debug!(log, "[Post] {} bytes to {}", body.len(), url),
                        Err(e) => {
                            sink_error!(log, "[Post] to {} failed: {}", url, e);
                            let _ = fail_tx.send(e);
                            break;
                        }
                    }
                }
            })
            .map_err(TransportError::from)?;

        Ok(Self {
            tx: Some(tx),
            failures,
            failed: false,
        })
    }
}

impl TransportEndpoint for RequestResponseEndpoint {
    fn kind(&self) -> PreferredTransport {
        PreferredTransport::RequestResponse
    }

    fn is_open(&self) -> bool {
        self.tx.is_some() && !self.failed
    }

    fn send(&mut self, payload: String) -> Result<(), TransportError> {
        if self.failed {
            return Err(TransportError::Closed);
        }
        let Some(tx) = &self.tx else {
            return Err(TransportError::Closed);
        };
        tx.send(payload).map_err(|_| TransportError::Closed)
    }

    fn service(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(e) = self.failures.try_recv() {
            self.failed = true;
            events.push(TransportEvent::SendFailed(e));
        }
        events
    }

    /// Stops accepting payloads. Already accepted ones are still posted.
    fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl MessagePoster for Recorder {
        fn post(&self, _url: &str, body: &str) -> Result<(), TransportError> {
            if self.fail_on == Some(body) {
                return Err(TransportError::Rejected("ERROR".into()));
            }
            self.seen.lock().unwrap().push(body.to_owned());
            Ok(())
        }
    }

    fn wait_until(mut f: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !f() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn posts_in_submission_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ep = RequestResponseEndpoint::spawn(
            "https://r/message/a/b".into(),
            Box::new(Recorder {
                seen: Arc::clone(&seen),
                fail_on: None,
            }),
            Arc::new(NoopLogSink),
        )
        .unwrap();
        for i in 0..20 {
            ep.send(format!("m{i}")).unwrap();
        }
        wait_until(|| seen.lock().unwrap().len() == 20);
        let expected: Vec<_> = (0..20).map(|i| format!("m{i}")).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
        assert!(ep.service().is_empty());
    }

    #[test]
    fn first_failure_closes_the_endpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut ep = RequestResponseEndpoint::spawn(
            "u".into(),
            Box::new(Recorder {
                seen: Arc::clone(&seen),
                fail_on: Some("bad"),
            }),
            Arc::new(NoopLogSink),
        )
        .unwrap();
        ep.send("bad".into()).unwrap();

        let mut events = Vec::new();
        wait_until(|| {
            events.extend(ep.service());
            !events.is_empty()
        });
        assert_eq!(
            events,
            vec![TransportEvent::SendFailed(TransportError::Rejected("ERROR".into()))]
        );
        assert!(!ep.is_open());
        assert_eq!(ep.send("later".into()), Err(TransportError::Closed));
    }
}
