//! WebSocket error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Message parse error: {0}")]
    ParseError(String),

    #[error("Heartbeat timeout")]
    HeartbeatTimeout,

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connect",
            Self::ConnectionClosed { .. } => "closed",
            Self::ParseError(_) | Self::Json(_) => "parse",
            Self::HeartbeatTimeout => "heartbeat",
            Self::Tungstenite(_) => "transport",
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
