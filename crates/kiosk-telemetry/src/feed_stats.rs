//! Periodic feed statistics summary.
//!
//! Reads the Prometheus collectors back and logs one block per source, so a
//! headless kiosk's logs show how each feed behaved over the last period.

use crate::metrics::{
    PARSE_ERRORS_TOTAL, POLL_FAILURES_TOTAL, POLL_SUCCESS_TOTAL, STREAM_RECONNECT_TOTAL,
    TICKS_TOTAL,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::CounterVec;
use serde::Serialize;
use tracing::info;

/// Counters for one source since process start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub ticks: u64,
    pub parse_errors: u64,
    pub reconnects: u64,
    pub poll_successes: u64,
    pub poll_failures: u64,
}

/// Feed statistics reporter.
pub struct FeedStatsReporter {
    sources: Vec<String>,
    start_time: DateTime<Utc>,
}

impl FeedStatsReporter {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            start_time: Utc::now(),
        }
    }

    pub fn get_stats(&self) -> Vec<SourceStats> {
        self.sources.iter().map(|s| self.source_stats(s)).collect()
    }

    fn source_stats(&self, source: &str) -> SourceStats {
        SourceStats {
            source: source.to_string(),
            ticks: TICKS_TOTAL.with_label_values(&[source]).get() as u64,
            parse_errors: PARSE_ERRORS_TOTAL.with_label_values(&[source]).get() as u64,
            reconnects: sum_matching(&STREAM_RECONNECT_TOTAL, source),
            poll_successes: POLL_SUCCESS_TOTAL.with_label_values(&[source]).get() as u64,
            poll_failures: sum_matching(&POLL_FAILURES_TOTAL, source),
        }
    }

    /// Log the summary block.
    pub fn output_summary(&self) {
        let stats = self.get_stats();
        let duration = Utc::now() - self.start_time;

        info!("========== Feed Statistics Summary ==========");
        info!(
            "Since: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            duration.num_hours(),
            duration.num_minutes() % 60
        );
        for s in &stats {
            info!(
                source = %s.source,
                ticks = s.ticks,
                parse_errors = s.parse_errors,
                reconnects = s.reconnects,
                poll_ok = s.poll_successes,
                poll_failed = s.poll_failures,
                "Feed stats"
            );
        }
        info!("=============================================");
    }
}

/// Sum every series whose first label equals `first_label`.
fn sum_matching(counter: &CounterVec, first_label: &str) -> u64 {
    let mut total = 0.0;
    for mf in counter.collect() {
        for m in mf.get_metric() {
            let matches = m
                .get_label()
                .first()
                .is_some_and(|pair| pair.get_value() == first_label);
            if matches {
                total += m.get_counter().get_value();
            }
        }
    }
    total as u64
}
