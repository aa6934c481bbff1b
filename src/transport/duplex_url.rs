use url::{Host, Url};

use crate::transport::transport_error::TransportError;

/// Parsed `ws://` / `wss://` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplexUrl {
    pub secure: bool,
    pub host: String,
    pub port: u16,
    /// Path plus query, as sent in the upgrade request.
    pub path: String,
}

impl DuplexUrl {
    /// # Errors
    /// [`TransportError::BadUrl`] for other schemes or anything [`Url`] rejects.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let bad = |why: &str| TransportError::BadUrl(format!("{raw}: {why}"));
        let url = Url::parse(raw).map_err(|e| bad(&e.to_string()))?;
        let secure = match url.scheme() {
            "wss" => true,
            "ws" => false,
            _ => return Err(bad("scheme must be ws or wss")),
        };
        let host = match url.host() {
            Some(Host::Domain(d)) if !d.is_empty() => d.to_owned(),
            Some(Host::Ipv4(a)) => a.to_string(),
            Some(Host::Ipv6(a)) => a.to_string(),
            _ => return Err(bad("missing host")),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| bad("missing port"))?;
        let path = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_owned(),
        };
        Ok(Self {
            secure,
            host,
            port,
            path,
        })
    }
}
