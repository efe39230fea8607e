//! kiosk-dashboard - frame model for the kiosk display.
//!
//! The renderer itself is external. This crate reads the shared `Store` at a
//! fixed cadence and turns it into an immutable [`Frame`], which is handed to
//! a [`FrameSink`].
//!
//! # Architecture
//!
//! ```text
//!  Store ──┐
//!          ├──▶ DashboardState::collect_frame ──▶ Frame ──▶ FrameSink
//!  Health ─┘            (fps tick)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kiosk_dashboard::{run_frame_loop, DashboardConfig, DashboardState, LogFrameSink};
//!
//! let state = DashboardState::new(store.clone(), health, DashboardConfig::default());
//! let sink = LogFrameSink::new(None);
//! run_frame_loop(state, sink, 25, shutdown).await?;
//! ```

mod config;
mod error;
pub mod format;
mod sink;
mod state;
mod types;

pub use config::DashboardConfig;
pub use error::{DashboardError, DashboardResult};
pub use sink::{run_frame_loop, FrameSink, LogFrameSink};
pub use state::DashboardState;
pub use types::{Frame, MainBody, MainPanel, MarqueeEntry, MinerColor, NetworkLine, TopRight};
