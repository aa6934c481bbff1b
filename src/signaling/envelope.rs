//! Framing used by the duplex relay around peer messages.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signaling::signaling_error::SignalingError;

#[derive(Debug, Serialize)]
struct RegisterFrame<'a> {
    cmd: &'static str,
    roomid: &'a str,
    clientid: &'a str,
}

#[derive(Debug, Serialize)]
struct SendFrame<'a> {
    cmd: &'static str,
    msg: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommandFrame {
    cmd: String,
}

#[derive(Debug, Deserialize)]
struct RelayFrame {
    msg: String,
    #[serde(default)]
    error: String,
}

/// What an inbound duplex frame turned out to carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unwrapped {
    /// A peer message in its own JSON text, ready for decoding.
    Payload(String),
    /// The relay reported an error instead of forwarding.
    RelayError(String),
}

/// `{"cmd":"register","roomid":..,"clientid":..}`
///
/// # Errors
/// Only on serializer failure.
pub fn register_frame(room_id: &str, client_id: &str) -> Result<String, SignalingError> {
    Ok(serde_json::to_string(&RegisterFrame {
        cmd: "register",
        roomid: room_id,
        clientid: client_id,
    })?)
}

/// Wraps an already encoded message as `{"cmd":"send","msg":"<json>"}`.
///
/// # Errors
/// Only on serializer failure.
pub fn send_frame(encoded: &str) -> Result<String, SignalingError> {
    Ok(serde_json::to_string(&SendFrame {
        cmd: "send",
        msg: encoded,
    })?)
}

/// True for an outbound `register` command, whatever the field order.
#[must_use]
pub fn is_register_frame(frame: &str) -> bool {
    serde_json::from_str::<CommandFrame>(frame).is_ok_and(|f| f.cmd == "register")
}

/// Unwraps a relay frame. Accepts `{"msg":"<json>","error":""}` as well as a
/// bare message object with a `type` field.
///
/// # Errors
/// [`SignalingError::Parse`] when the frame is neither shape.
pub fn unwrap_inbound(text: &str) -> Result<Unwrapped, SignalingError> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("msg").is_some() {
        let frame: RelayFrame = serde_json::from_value(value)?;
        if !frame.error.is_empty() {
            return Ok(Unwrapped::RelayError(frame.error));
        }
        return Ok(Unwrapped::Payload(frame.msg));
    }
    if value.get("type").is_some() {
        return Ok(Unwrapped::Payload(text.to_owned()));
    }
    Err(SignalingError::Parse(
        "relay frame has neither \"msg\" nor \"type\"".into(),
    ))
}
