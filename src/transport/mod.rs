//! Signaling channels: the request/response poster and the duplex socket.
pub mod duplex_endpoint;
pub mod duplex_url;
pub mod endpoint;
pub mod factory;
pub mod fragment;
pub mod http_endpoint;
pub mod message_queue;
pub mod tls;
pub mod transport_error;
pub mod ws_link;

pub use duplex_endpoint::{DuplexEndpoint, FrameLink};
pub use endpoint::{PreferredTransport, TransportEndpoint, TransportEvent};
pub use factory::{DuplexResult, NetTransportFactory, TransportFactory};
pub use fragment::{Fragment, Reassembler};
pub use http_endpoint::{HttpPoster, MessagePoster, RequestResponseEndpoint};
pub use message_queue::MessageQueue;
pub use transport_error::TransportError;
pub use duplex_url::DuplexUrl;
pub use ws_link::WsLink;
