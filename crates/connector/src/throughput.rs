//! Per-data-type rate counters.
//!
//! Each instance keeps a rolling window (reset by `flush` every second), the
//! last flushed window, and a lifetime cumulative count. One instance tracks
//! published messages, another tracks publish failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::message::DataType;

pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    /// Successfully published messages; flush logs at info
    Throughput,
    /// Failed publishes; flush logs at warn
    Failures,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DataTypeCounts {
    pub total: u64,
    pub ticker: u64,
    pub trade: u64,
    pub orderbook: u64,
}

impl DataTypeCounts {
    fn from_array(values: [u64; 3]) -> Self {
        Self {
            total: values.iter().sum(),
            ticker: values[DataType::Ticker.index()],
            trade: values[DataType::Trade.index()],
            orderbook: values[DataType::OrderBook.index()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DataTypeRates {
    pub total: f64,
    pub ticker: f64,
    pub trade: f64,
    pub orderbook: f64,
}

/// Point-in-time view of a [`RateCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub last_second: DataTypeCounts,
    pub average: DataTypeRates,
    pub cumulative: DataTypeCounts,
    pub elapsed_seconds: f64,
}

pub struct RateCounters {
    kind: CounterKind,
    window: [AtomicU64; 3],
    last_window: [AtomicU64; 3],
    cumulative: [AtomicU64; 3],
    base: Instant,
    /// Millis since `base` of the first record, plus one; 0 = nothing recorded
    started_at: AtomicU64,
}

impl RateCounters {
    pub fn new(kind: CounterKind) -> Self {
        Self {
            kind,
            window: Default::default(),
            last_window: Default::default(),
            cumulative: Default::default(),
            base: Instant::now(),
            started_at: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    /// Count one message of the given type
    #[inline]
    pub fn record(&self, data_type: DataType) {
        if self.started_at.load(Ordering::Acquire) == 0 {
            let stamp = self.base.elapsed().as_millis() as u64 + 1;
            let _ = self
                .started_at
                .compare_exchange(0, stamp, Ordering::AcqRel, Ordering::Acquire);
        }
        let i = data_type.index();
        self.window[i].fetch_add(1, Ordering::Relaxed);
        self.cumulative[i].fetch_add(1, Ordering::Relaxed);
    }

    /// Close the current window: move its counts to the last-window snapshot and
    /// start a new one at zero.
    pub fn flush(&self) -> DataTypeCounts {
        let mut values = [0u64; 3];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.window[i].swap(0, Ordering::AcqRel);
            self.last_window[i].store(*value, Ordering::Release);
        }
        let counts = DataTypeCounts::from_array(values);

        if counts.total > 0 {
            match self.kind {
                CounterKind::Throughput => info!(
                    total = counts.total,
                    ticker = counts.ticker,
                    trade = counts.trade,
                    orderbook = counts.orderbook,
                    avg_per_sec = self.average_per_second().total,
                    "Ingest throughput"
                ),
                CounterKind::Failures => warn!(
                    total = counts.total,
                    ticker = counts.ticker,
                    trade = counts.trade,
                    orderbook = counts.orderbook,
                    cumulative = self.cumulative().total,
                    "Publish failures"
                ),
            }
        }
        counts
    }

    pub fn last_window(&self) -> DataTypeCounts {
        DataTypeCounts::from_array(Self::load(&self.last_window))
    }

    pub fn cumulative(&self) -> DataTypeCounts {
        DataTypeCounts::from_array(Self::load(&self.cumulative))
    }

    /// Seconds since the first record, 0 before any record
    pub fn elapsed_seconds(&self) -> f64 {
        match self.started_at.load(Ordering::Acquire) {
            0 => 0.0,
            stamp => {
                let started = Duration::from_millis(stamp - 1);
                self.base.elapsed().saturating_sub(started).as_secs_f64()
            }
        }
    }

    pub fn average_per_second(&self) -> DataTypeRates {
        let elapsed = self.elapsed_seconds();
        if elapsed <= 0.0 {
            return DataTypeRates::default();
        }
        let cumulative = self.cumulative();
        DataTypeRates {
            total: cumulative.total as f64 / elapsed,
            ticker: cumulative.ticker as f64 / elapsed,
            trade: cumulative.trade as f64 / elapsed,
            orderbook: cumulative.orderbook as f64 / elapsed,
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            last_second: self.last_window(),
            average: self.average_per_second(),
            cumulative: self.cumulative(),
            elapsed_seconds: self.elapsed_seconds(),
        }
    }

    /// Flush every [`FLUSH_INTERVAL`] until shutdown is signalled
    pub async fn run_flusher(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    fn load(values: &[AtomicU64; 3]) -> [u64; 3] {
        [
            values[0].load(Ordering::Acquire),
            values[1].load(Ordering::Acquire),
            values[2].load(Ordering::Acquire),
        ]
    }
}
