//! roomlink joins a peer into a signaling room and drives the offer/answer
//! exchange, then paces a bulk test flow with a credit-based shaper.
//!
//! The real-time transport engine and the UI stay outside the crate and are
//! reached through [`engine::PeerEngine`], [`engine::FlowIo`] and
//! [`ui::UiSink`].

/// Generation-tagged completion handles for asynchronous collaborator calls.
pub mod completion;
/// INI-style configuration file parsing.
pub mod config;
/// Interface to the external real-time transport engine.
pub mod engine;
/// Logging utilities.
pub mod log;
/// Offer/answer ordering and candidate buffering.
pub mod negotiation;
/// The signaling orchestrator state machine and its runtime worker.
pub mod orchestrator;
/// Typed client settings read from a [`config::Config`].
pub mod settings;
/// Credit-based bulk traffic shaping.
pub mod shaper;
/// Signaling wire messages and the room-join handshake.
pub mod signaling;
/// Request/response and duplex signaling transports.
pub mod transport;
/// Front-end collaborator interface.
pub mod ui;
