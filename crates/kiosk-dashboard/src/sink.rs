//! Frame sink and the fixed-cadence frame loop.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use kiosk_telemetry::Metrics;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{DashboardError, DashboardResult};
use crate::state::DashboardState;
use crate::types::Frame;

/// Renderer boundary. `open` failing is fatal; `present` failures are not.
pub trait FrameSink: Send {
    fn open(&mut self) -> DashboardResult<()>;

    /// Present one frame. Returns whether anything was written.
    fn present(&mut self, frame: &Frame) -> DashboardResult<bool>;
}

/// Headless sink: writes a rendition whenever the frame content changes.
///
/// Without a path the text rendition goes to the log; with a path each
/// changed frame is appended as a JSON line.
pub struct LogFrameSink {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    last_text: Option<String>,
    written: u64,
}

impl LogFrameSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            writer: None,
            last_text: None,
            written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for LogFrameSink {
    fn open(&mut self) -> DashboardResult<()> {
        if let Some(path) = &self.path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| DashboardError::SinkOpen(format!("{}: {e}", path.display())))?;
            self.writer = Some(BufWriter::new(file));
            info!(path = %path.display(), "Frame sink opened");
        } else {
            info!("Frame sink writing to log");
        }
        Ok(())
    }

    fn present(&mut self, frame: &Frame) -> DashboardResult<bool> {
        let text = frame.render_text();
        if self.last_text.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }

        match self.writer.as_mut() {
            Some(writer) => {
                let line = serde_json::to_string(frame)
                    .map_err(|e| DashboardError::SinkWrite(e.into()))?;
                writeln!(writer, "{line}")?;
                writer.flush()?;
            }
            None => info!(target: "kiosk::frame", "\n{text}"),
        }
        self.last_text = Some(text);
        self.written += 1;
        Ok(true)
    }
}

/// Collect and present frames at `fps` until shutdown.
pub async fn run_frame_loop<S: FrameSink>(
    mut state: DashboardState,
    mut sink: S,
    fps: u32,
    shutdown: CancellationToken,
) -> DashboardResult<()> {
    sink.open()?;

    let period = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(fps, "Frame loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown.cancelled() => break,
        }

        let frame = state.collect_frame(Utc::now());
        match sink.present(&frame) {
            Ok(true) => Metrics::frame_rendered(),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Frame sink write failed"),
        }
    }

    info!("Frame loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MainBody, MainPanel, TopRight};
    use kiosk_core::ConnectionHealth;

    fn frame(price: &str) -> Frame {
        Frame {
            timestamp_ms: 0,
            main: Some(MainPanel {
                key: "btcusdt".to_string(),
                display_name: "BTC".to_string(),
                body: MainBody::Price {
                    price_text: price.to_string(),
                    change_text: "↑ +0.00%".to_string(),
                    change_up: true,
                    candles: vec![],
                },
            }),
            top_right: TopRight::Clock {
                text: "00:00".to_string(),
            },
            network: None,
            marquee: vec![],
            hash_history: vec![],
            health: ConnectionHealth::Healthy,
        }
    }

    #[test]
    fn test_log_sink_writes_on_change_only() {
        let mut sink = LogFrameSink::new(None);
        sink.open().unwrap();

        assert!(sink.present(&frame("$1.00")).unwrap());
        assert!(!sink.present(&frame("$1.00")).unwrap());
        assert!(sink.present(&frame("$2.00")).unwrap());
        assert_eq!(sink.frames_written(), 2);
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let path = std::env::temp_dir().join(format!("kiosk-frames-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let mut sink = LogFrameSink::new(Some(path.clone()));
        sink.open().unwrap();
        sink.present(&frame("$1.00")).unwrap();
        sink.present(&frame("$1.00")).unwrap();
        sink.present(&frame("$3.00")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("$3.00"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let mut sink = LogFrameSink::new(Some(PathBuf::from("/nonexistent-dir/frames.jsonl")));
        assert!(matches!(sink.open(), Err(DashboardError::SinkOpen(_))));
    }
}
