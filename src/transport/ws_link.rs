use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rustls::ClientConfig;
use tungstenite::protocol::WebSocketConfig;
use tungstenite::protocol::frame::Frame;
use tungstenite::protocol::frame::coding::{Data, OpCode};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Connector, HandshakeError, Message, WebSocket};

use crate::log::LogSink;
use crate::sink_warn;
use crate::transport::{
    duplex_endpoint::FrameLink, duplex_url::DuplexUrl, fragment::Fragment,
    transport_error::TransportError,
};

/// WebSocket connection used as a [`FrameLink`]. Outbound payloads are sent
/// as explicit text/continuation frames; inbound messages arrive whole from
/// tungstenite and are surfaced as single final fragments.
///
/// tungstenite reassembles inbound messages itself, so the reassembly bound
/// is enforced here through its message and frame limits.
pub struct WsLink {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    mid_message: bool,
    max_message: usize,
    log: Arc<dyn LogSink>,
}

/// How a failed read affects the link.
#[derive(Debug, PartialEq)]
enum ReadFailure {
    /// Nothing to read yet.
    Idle,
    /// An inbound message went over the size limit and was discarded.
    Oversize(String),
    Fatal(TransportError),
}

fn classify_read_error(e: tungstenite::Error) -> ReadFailure {
    match e {
        e if is_would_block(&e) => ReadFailure::Idle,
        tungstenite::Error::Capacity(c) => ReadFailure::Oversize(c.to_string()),
        e => ReadFailure::Fatal(e.into()),
    }
}

/// Inbound limits: no message, and so no single frame, above `max_message`.
fn ws_config(max_message: usize) -> WebSocketConfig {
    WebSocketConfig::default()
        .max_message_size(Some(max_message))
        .max_frame_size(Some(max_message))
}

impl WsLink {
    /// Blocking connect + TLS + upgrade, bounded by `timeout` at each step.
    /// The socket is switched to non-blocking before returning.
    ///
    /// # Errors
    /// Any [`TransportError`] from resolving, connecting or the handshake.
    pub fn connect(
        url: &str,
        timeout: Duration,
        tls: Option<Arc<ClientConfig>>,
        max_message: usize,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, TransportError> {
        let parsed = DuplexUrl::parse(url)?;
        let addr = resolve(&parsed)?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)?;
        tcp.set_nodelay(true)?;
        tcp.set_read_timeout(Some(timeout))?;
        tcp.set_write_timeout(Some(timeout))?;
        let raw = tcp.try_clone()?;

        let connector = match (parsed.secure, tls) {
            (false, _) => Some(Connector::Plain),
            (true, Some(cfg)) => Some(Connector::Rustls(cfg)),
            (true, None) => None,
        };
        let (socket, _response) = tungstenite::client_tls_with_config(
            url,
            tcp,
            Some(ws_config(max_message)),
            connector,
        )
            .map_err(|e| match e {
                HandshakeError::Failure(err) => TransportError::from(err),
                HandshakeError::Interrupted(_) => TransportError::Timeout,
            })?;

        raw.set_read_timeout(None)?;
        raw.set_write_timeout(None)?;
        raw.set_nonblocking(true)?;

        Ok(Self {
            socket,
            mid_message: false,
            max_message,
            log,
        })
    }
}

fn resolve(url: &DuplexUrl) -> Result<SocketAddr, TransportError> {
    (url.host.as_str(), url.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransportError::BadUrl(format!("{} did not resolve", url.host)))
}

fn is_would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::WouldBlock)
}

impl FrameLink for WsLink {
    fn write_fragment(&mut self, frag: &Fragment) -> Result<(), TransportError> {
        let opcode = if self.mid_message {
            OpCode::Data(Data::Continue)
        } else {
            OpCode::Data(Data::Text)
        };
        let frame = Frame::message(frag.data.to_vec(), opcode, frag.is_final);
        match self.socket.write(Message::Frame(frame)) {
            // tungstenite keeps the frame buffered when the socket is full
            Ok(()) => {}
            Err(e) if is_would_block(&e) => {}
            Err(e) => return Err(e.into()),
        }
        self.mid_message = !frag.is_final;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        match self.socket.flush() {
            Ok(()) => Ok(()),
            Err(e) if is_would_block(&e) => Err(TransportError::WouldBlock),
            Err(e) => Err(e.into()),
        }
    }

    fn read_fragment(&mut self) -> Result<Option<Fragment>, TransportError> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => {
                    return Ok(Some(Fragment {
                        data: Bytes::copy_from_slice(text.as_bytes()),
                        is_final: true,
                    }));
                }
                Ok(Message::Binary(bin)) => {
                    return Ok(Some(Fragment {
                        data: Bytes::copy_from_slice(&bin),
                        is_final: true,
                    }));
                }
                Ok(Message::Close(_)) => return Err(TransportError::Closed),
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => match classify_read_error(e) {
                    ReadFailure::Idle => return Ok(None),
                    ReadFailure::Oversize(why) => {
                        sink_warn!(
                            self.log,
                            "[Reassembly] inbound message exceeds {} bytes, discarding: {}",
                            self.max_message,
                            why
                        );
                        return Ok(None);
                    }
                    ReadFailure::Fatal(e) => return Err(e),
                },
            }
        }
    }

    fn close(&mut self) {
        let _ = self.socket.close(None);
        let _ = self.socket.flush();
    }
}
