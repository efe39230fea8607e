//! Streaming price feeds for the crypto kiosk.
//!
//! Each provider (Binance, Kraken) runs in its own `StreamDriver`:
//! - Persistent WebSocket with exponential backoff reconnection
//! - Provider-specific URL or subscribe handshake
//! - WebSocket-level ping keepalive with pong timeout
//! - Status handle readable by the health aggregator

pub mod backoff;
pub mod binance;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod kraken;
pub mod provider;
pub mod status;

pub use backoff::{BackoffConfig, BackoffPolicy};
pub use binance::BinanceProvider;
pub use connection::{DriverConfig, StreamDriver};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatManager;
pub use kraken::KrakenProvider;
pub use provider::{StreamProvider, Tick};
pub use status::{DriverStatus, StatusHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket or HTTPS connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
