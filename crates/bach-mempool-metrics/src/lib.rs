//! # bach-mempool-metrics
//!
//! Mempool instrumentation for BachLedger.
//!
//! This crate provides:
//! - A fixed set of mempool instruments (one gauge, one histogram, five counters)
//! - A Prometheus backend bound to an explicitly injected registry
//! - A no-op backend for tests and disabled instrumentation
//! - A lifetime snapshot of pool counters persisted as JSON at shutdown
//!
//! ## Architecture
//!
//! ```text
//! +--------------------+        +------------------+
//! |  MempoolMetrics    |        |   JsonMetrics    |
//! +--------------------+        +------------------+
//!      |         |                       |
//! +---------+ +------+     <root>/data/mempool_metrics.json
//! |Prometheus| | Noop |
//! +---------+ +------+
//!      |
//! +--------------------+
//! |  MetricsRegistry   |  <- scraped by the exporter
//! +--------------------+
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use bach_mempool_metrics::{JsonMetrics, MempoolMetrics, MetricsRegistry, SnapshotCounter};
//!
//! let registry = MetricsRegistry::new();
//! let metrics = MempoolMetrics::prometheus(&registry, "bachledger", &["chain_id", "1337"])?;
//! metrics.size.set(42);
//! metrics.tx_size_bytes.observe(180.0);
//!
//! let snapshot = JsonMetrics::open(&datadir);
//! snapshot.incr(SnapshotCounter::FailedTxs);
//!
//! // at shutdown; an error here is fatal
//! snapshot.save()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod instrument;
mod labels;
mod mempool;
mod registry;
mod snapshot;

pub use config::{MetricsConfig, CHAIN_ID_LABEL};
pub use error::{MetricsError, MetricsResult};
pub use instrument::{Counter, Gauge, Histogram, NoopCounter, NoopGauge, NoopHistogram};
pub use labels::Labels;
pub use mempool::{tx_size_buckets, MempoolMetrics, METRICS_SUBSYSTEM};
pub use registry::MetricsRegistry;
pub use snapshot::{
    snapshot_path, JsonMetrics, MetricsSnapshot, SnapshotCounter, DATA_DIR, SNAPSHOT_FILE,
    SNAPSHOT_FILE_MODE,
};

