//! Candle aggregation.
//!
//! Turns a stream of `(timestamp, price)` samples into fixed-width OHLC
//! buckets. `CandleAggregator::step` is pure; `apply` and `bootstrap`
//! mutate a ticker's candle history in place and are only called under
//! the store's ticker lock.

use crate::error::{FeedError, FeedResult};
use chrono::{DateTime, Duration, Utc};
use kiosk_core::Candle;
use std::collections::VecDeque;

/// Outcome of feeding one sample to the open bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandleStep {
    /// Sample fell inside the open bucket.
    Extend(Candle),
    /// Sample started a new bucket; `closed` is the previous one, if any.
    Roll {
        closed: Option<Candle>,
        opened: Candle,
    },
}

/// Floor a timestamp to the bucket grid.
pub fn bucket_start(at: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_secs = width.num_seconds();
    if width_secs <= 0 {
        return at;
    }
    let floored = at.timestamp().div_euclid(width_secs) * width_secs;
    DateTime::from_timestamp(floored, 0).unwrap_or(at)
}

/// Fixed-width OHLC bucketing with bounded closed history.
#[derive(Debug, Clone, Copy)]
pub struct CandleAggregator {
    width: Duration,
    capacity: usize,
}

impl CandleAggregator {
    /// Create an aggregator. Width and capacity must be non-zero.
    pub fn new(width_secs: u64, capacity: usize) -> FeedResult<Self> {
        if width_secs == 0 {
            return Err(FeedError::InvalidConfig(
                "candle width must be positive".to_string(),
            ));
        }
        if capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "candle capacity must be positive".to_string(),
            ));
        }
        let width_secs = i64::try_from(width_secs)
            .map_err(|_| FeedError::InvalidConfig(format!("candle width too large: {width_secs}")))?;
        Ok(Self {
            width: Duration::seconds(width_secs),
            capacity,
        })
    }

    pub fn width(&self) -> Duration {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Compute the next open bucket from the current one and a sample.
    pub fn step(&self, open: Option<Candle>, at: DateTime<Utc>, price: f64) -> CandleStep {
        match open {
            Some(mut candle) if at - candle.start < self.width => {
                candle.extend(price);
                CandleStep::Extend(candle)
            }
            closed => CandleStep::Roll {
                closed,
                opened: Candle::from_sample(bucket_start(at, self.width), price),
            },
        }
    }

    /// Feed a sample into a candle history. Returns the bucket that was closed, if any.
    pub fn apply(
        &self,
        closed: &mut VecDeque<Candle>,
        open: &mut Option<Candle>,
        at: DateTime<Utc>,
        price: f64,
    ) -> Option<Candle> {
        match self.step(*open, at, price) {
            CandleStep::Extend(candle) => {
                *open = Some(candle);
                None
            }
            CandleStep::Roll {
                closed: finished,
                opened,
            } => {
                if let Some(candle) = finished {
                    self.push_closed(closed, candle);
                }
                *open = Some(opened);
                finished
            }
        }
    }

    /// Replace the history with upstream bars (oldest first).
    ///
    /// Bars narrower than the bucket width are merged onto the bucket grid
    /// first. The most recent bucket is still in progress upstream and
    /// becomes the open bucket; the rest become closed history, newest
    /// `capacity` kept.
    pub fn bootstrap(&self, closed: &mut VecDeque<Candle>, open: &mut Option<Candle>, bars: Vec<Candle>) {
        let mut buckets = self.resample(bars);
        let Some(last) = buckets.pop() else {
            return;
        };
        closed.clear();
        for bar in buckets {
            self.push_closed(closed, bar);
        }
        *open = Some(last);
    }

    /// Merge bars into width-aligned buckets: first open, extreme high/low, last close.
    fn resample(&self, bars: Vec<Candle>) -> Vec<Candle> {
        let mut buckets: Vec<Candle> = Vec::with_capacity(bars.len());
        for bar in bars {
            let start = bucket_start(bar.start, self.width);
            match buckets.last_mut() {
                Some(current) if current.start == start => {
                    current.high = current.high.max(bar.high);
                    current.low = current.low.min(bar.low);
                    current.close = bar.close;
                }
                _ => buckets.push(Candle { start, ..bar }),
            }
        }
        buckets
    }

    fn push_closed(&self, closed: &mut VecDeque<Candle>, candle: Candle) {
        closed.push_back(candle);
        while closed.len() > self.capacity {
            closed.pop_front();
        }
    }
}
