use thiserror::Error;

use crate::api::models::Role;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("`{0}` cannot be used as an API base")]
    BadBase(String),
}

/// The local identity could not be derived from the stored profile.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no profile stored")]
    NoProfile,
    #[error("{role} profile is missing `{field}`")]
    MissingField { role: Role, field: &'static str },
    #[error("malformed identity `{0}`")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("invalid realtime url: {0}")]
    Url(#[from] url::ParseError),
    #[error("connection closed by server")]
    Closed,
    #[error("no traffic from server for {0:?}")]
    Silent(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("nothing to send")]
    EmptyMessage,
    #[error("no counterpart selected")]
    NoCounterpart,
    #[error("a send is already in flight")]
    InFlight,
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot load messages: {0}")]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config directory available")]
    NoConfigDir,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml encode: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("toml decode: {0}")]
    Decode(#[from] toml::de::Error),
}
