//! Socket.IO (protocol 5) packets carried in Engine.IO v4 WebSocket text frames.
//!
//! Only the subset the messaging channel needs is understood: handshake,
//! ping/pong, namespace connect and named events. Binary attachments are not.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::models::Thread;
use crate::error::ChannelError;

pub const NEW_REQUEST: &str = "new_request";
pub const NEW_RESPONSE: &str = "new_response";
pub const JOIN: &str = "join";

/// Engine.IO handshake carried by the `0` open packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl Handshake {
    /// How long the server may stay silent before the session is presumed dead.
    pub fn silence_window(&self) -> Option<std::time::Duration> {
        let total = self.ping_interval.saturating_add(self.ping_timeout);
        (total > 0).then(|| std::time::Duration::from_millis(total))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect,
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
    /// Acks and anything else the channel does not act on.
    Other(char),
}

#[derive(Debug, Clone)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncomingEvent {
    NewRequest(Thread),
    NewResponse(Thread),
    Other { event_type: String, data: Value },
}

impl IncomingEvent {
    pub fn from_event(name: &str, data: Value) -> Result<Self, ChannelError> {
        let thread = |data: Value| {
            serde_json::from_value::<Thread>(data)
                .map_err(|e| ChannelError::Protocol(format!("bad `{name}` payload: {e}")))
        };
        match name {
            NEW_REQUEST => Ok(Self::NewRequest(thread(data)?)),
            NEW_RESPONSE => Ok(Self::NewResponse(thread(data)?)),
            _ => Ok(Self::Other { event_type: name.to_string(), data }),
        }
    }
}

pub fn decode(frame: &str) -> Result<EnginePacket, ChannelError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or_else(|| ChannelError::Protocol("empty frame".into()))?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| ChannelError::Protocol(format!("bad handshake: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '6' => Ok(EnginePacket::Noop),
        other => Err(ChannelError::Protocol(format!("unknown engine packet `{other}`"))),
    }
}

fn decode_socket(body: &str) -> Result<SocketPacket, ChannelError> {
    let mut chars = body.chars();
    let kind = chars.next().ok_or_else(|| ChannelError::Protocol("empty message".into()))?;
    let mut rest = chars.as_str();
    // Optional "/nsp," prefix.
    if rest.starts_with('/') {
        rest = rest.split_once(',').map(|(_, r)| r).unwrap_or("");
    }
    // Optional ack id.
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    match kind {
        '0' => Ok(SocketPacket::Connect),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            let args: Vec<Value> = serde_json::from_str(rest)
                .map_err(|e| ChannelError::Protocol(format!("bad event: {e}")))?;
            let mut args = args.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(ChannelError::Protocol("event without a name".into())),
            };
            Ok(SocketPacket::Event { name, data: args.next().unwrap_or(Value::Null) })
        }
        '4' => Ok(SocketPacket::ConnectError(serde_json::from_str(rest).unwrap_or(Value::Null))),
        other => Ok(SocketPacket::Other(other)),
    }
}

pub fn connect_frame() -> String {
    "40".to_string()
}

pub fn pong_frame() -> String {
    "3".to_string()
}

pub fn event_frame(name: &str, data: &Value) -> String {
    format!("42{}", Value::Array(vec![Value::String(name.to_string()), data.clone()]))
}

pub fn join_frame(room: &str) -> String {
    event_frame(JOIN, &Value::String(room.to_string()))
}
