use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::blocking::Client;
use rustls::{ClientConfig, RootCertStore, pki_types::CertificateDer};
use rustls_pemfile::certs;

use crate::transport::transport_error::TransportError;

static PROVIDER: Once = Once::new();

/// Makes ring the process-wide rustls provider, once.
pub fn ensure_crypto_provider() {
    PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Root store that trusts ONLY the CA(s) in `path`.
///
/// # Errors
/// [`TransportError::Tls`] if the file is unreadable or holds no certificate.
pub fn pinned_root_store(path: &str) -> Result<RootCertStore, TransportError> {
    let file = File::open(path)
        .map_err(|e| TransportError::Tls(format!("opening CA file {path}: {e}")))?;
    let mut reader = BufReader::new(file);

    let ca_certs: Vec<CertificateDer<'static>> = certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| TransportError::Tls(format!("invalid CA PEM: {e}")))?;

    if ca_certs.is_empty() {
        return Err(TransportError::Tls(format!(
            "{path} did not contain any certificates"
        )));
    }

    let mut root_store = RootCertStore::empty();
    for cert in ca_certs {
        root_store
            .add(cert)
            .map_err(|e| TransportError::Tls(format!("bad CA cert: {e}")))?;
    }
    Ok(root_store)
}

/// Client config pinned to `ca_file`, or `None` to use the bundled web roots.
///
/// # Errors
/// See [`pinned_root_store`].
pub fn client_config(ca_file: Option<&str>) -> Result<Option<Arc<ClientConfig>>, TransportError> {
    ensure_crypto_provider();
    let Some(path) = ca_file else {
        return Ok(None);
    };
    let config = ClientConfig::builder()
        .with_root_certificates(pinned_root_store(path)?)
        .with_no_client_auth();
    Ok(Some(Arc::new(config)))
}

/// Blocking HTTPS client shared by the join handshake and message posts.
///
/// # Errors
/// [`TransportError::Tls`] / [`TransportError::Http`] if it cannot be built.
pub fn http_client(timeout: Duration, ca_file: Option<&str>) -> Result<Client, TransportError> {
    let mut builder = Client::builder().timeout(timeout);
    if let Some(config) = client_config(ca_file)? {
        builder = builder.use_preconfigured_tls(ClientConfig::clone(&config));
    }
    Ok(builder.build()?)
}
