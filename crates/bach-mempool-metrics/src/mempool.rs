//! Mempool instrument set

use crate::error::MetricsResult;
use crate::instrument::{Counter, Gauge, Histogram, NoopCounter, NoopGauge, NoopHistogram};
use crate::labels::Labels;
use crate::registry::MetricsRegistry;
use prometheus::core::Collector;
use prometheus::{HistogramOpts, IntCounter, IntGauge, Opts};
use std::sync::Arc;
use tracing::debug;

/// Subsystem shared by every metric in this set
pub const METRICS_SUBSYSTEM: &str = "mempool";

/// First bucket boundary of the transaction size histogram
const TX_SIZE_BUCKET_START: f64 = 1.0;
/// Growth factor between consecutive bucket boundaries
const TX_SIZE_BUCKET_FACTOR: f64 = 3.0;
/// Number of bucket boundaries
const TX_SIZE_BUCKET_COUNT: usize = 17;

/// Bucket boundaries of the `tx_size_bytes` histogram: 1, 3, 9, ..., 3^16
pub fn tx_size_buckets() -> Vec<f64> {
    let mut buckets = Vec::with_capacity(TX_SIZE_BUCKET_COUNT);
    let mut bound = TX_SIZE_BUCKET_START;
    for _ in 0..TX_SIZE_BUCKET_COUNT {
        buckets.push(bound);
        bound *= TX_SIZE_BUCKET_FACTOR;
    }
    buckets
}

/// Metrics exposed by the mempool.
///
/// Built once per pool instance, either against a registry with
/// [`MempoolMetrics::prometheus`] or detached with [`MempoolMetrics::noop`].
/// Clones share the same instruments.
#[derive(Clone)]
pub struct MempoolMetrics {
    /// Number of uncommitted transactions
    pub size: Arc<dyn Gauge>,
    /// Histogram of transaction sizes, in bytes
    pub tx_size_bytes: Arc<dyn Histogram>,
    /// Transactions rejected by the application during check or recheck
    pub failed_txs: Arc<dyn Counter>,
    /// Valid transactions evicted to make room for higher priority ones
    pub evicted_txs: Arc<dyn Counter>,
    /// Transactions that made it into a committed block
    pub successful_txs: Arc<dyn Counter>,
    /// Number of recheck passes over the pool
    pub recheck_times: Arc<dyn Counter>,
    /// Transactions received that were already in the pool
    pub already_seen_txs: Arc<dyn Counter>,
}

impl MempoolMetrics {
    /// Build the set on the Prometheus backend and register it with `registry`.
    ///
    /// Every series is named `<namespace>_mempool_<metric>` and carries the
    /// constant labels given as an alternating `key, value, ...` sequence.
    ///
    /// Fails without registering anything if the sequence has odd length or a
    /// repeated key. Building a second set with the same namespace and label
    /// values on the same registry fails with
    /// [`MetricsError::AlreadyRegistered`](crate::MetricsError::AlreadyRegistered)
    /// and leaves the registry as it was.
    pub fn prometheus<S: AsRef<str>>(
        registry: &MetricsRegistry,
        namespace: &str,
        labels_and_values: &[S],
    ) -> MetricsResult<Self> {
        let labels = Labels::from_pairs(labels_and_values)?;
        let const_labels = labels.to_const_labels();

        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace)
                .subsystem(METRICS_SUBSYSTEM)
                .const_labels(const_labels.clone())
        };

        let size = IntGauge::with_opts(opts(
            "size",
            "Size of the mempool (number of uncommitted transactions).",
        ))?;
        let tx_size_bytes = prometheus::Histogram::with_opts(
            HistogramOpts::new("tx_size_bytes", "Transaction sizes in bytes.")
                .namespace(namespace)
                .subsystem(METRICS_SUBSYSTEM)
                .const_labels(const_labels.clone())
                .buckets(tx_size_buckets()),
        )?;
        let failed_txs = IntCounter::with_opts(opts("failed_txs", "Number of failed transactions."))?;
        let evicted_txs =
            IntCounter::with_opts(opts("evicted_txs", "Number of evicted transactions."))?;
        let successful_txs = IntCounter::with_opts(opts(
            "successful_txs",
            "Number of transactions that successfully made it into a block.",
        ))?;
        let recheck_times = IntCounter::with_opts(opts(
            "recheck_times",
            "Number of times transactions are rechecked in the mempool.",
        ))?;
        let already_seen_txs = IntCounter::with_opts(opts(
            "already_seen_txs",
            "Number of transactions that entered the mempool but were already present in the mempool.",
        ))?;

        let fq = |name: &str| {
            if namespace.is_empty() {
                format!("{}_{}", METRICS_SUBSYSTEM, name)
            } else {
                format!("{}_{}_{}", namespace, METRICS_SUBSYSTEM, name)
            }
        };
        let collectors: Vec<(String, Box<dyn Collector>)> = vec![
            (fq("size"), Box::new(size.clone())),
            (fq("tx_size_bytes"), Box::new(tx_size_bytes.clone())),
            (fq("failed_txs"), Box::new(failed_txs.clone())),
            (fq("evicted_txs"), Box::new(evicted_txs.clone())),
            (fq("successful_txs"), Box::new(successful_txs.clone())),
            (fq("recheck_times"), Box::new(recheck_times.clone())),
            (fq("already_seen_txs"), Box::new(already_seen_txs.clone())),
        ];
        registry.register_all(collectors)?;

        debug!(
            namespace,
            labels = labels.len(),
            "registered mempool metrics with prometheus backend"
        );

        Ok(Self {
            size: Arc::new(size),
            tx_size_bytes: Arc::new(tx_size_bytes),
            failed_txs: Arc::new(failed_txs),
            evicted_txs: Arc::new(evicted_txs),
            successful_txs: Arc::new(successful_txs),
            recheck_times: Arc::new(recheck_times),
            already_seen_txs: Arc::new(already_seen_txs),
        })
    }

    /// Build the set on a backend that discards every write.
    ///
    /// Registers nothing; safe to call any number of times.
    pub fn noop() -> Self {
        Self {
            size: Arc::new(NoopGauge),
            tx_size_bytes: Arc::new(NoopHistogram),
            failed_txs: Arc::new(NoopCounter),
            evicted_txs: Arc::new(NoopCounter),
            successful_txs: Arc::new(NoopCounter),
            recheck_times: Arc::new(NoopCounter),
            already_seen_txs: Arc::new(NoopCounter),
        }
    }
}

impl Default for MempoolMetrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl std::fmt::Debug for MempoolMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MempoolMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;

    #[test]
    fn test_tx_size_buckets() {
        let buckets = tx_size_buckets();
        assert_eq!(buckets.len(), 17);
        assert_eq!(buckets[0], 1.0);
        assert_eq!(buckets[1], 3.0);
        assert_eq!(buckets[2], 9.0);
        assert_eq!(buckets[16], 43_046_721.0);
    }

    #[test]
    fn test_buckets_match_prometheus_helper() {
        let expected = prometheus::exponential_buckets(1.0, 3.0, 17).unwrap();
        assert_eq!(tx_size_buckets(), expected);
    }

    #[test]
    fn test_prometheus_registers_seven_series() {
        let registry = MetricsRegistry::new();
        let _metrics = MempoolMetrics::prometheus::<&str>(&registry, "bach", &[]).unwrap();
        assert_eq!(registry.gather().len(), 7);
    }

    #[test]
    fn test_odd_labels_register_nothing() {
        let registry = MetricsRegistry::new();
        let err = MempoolMetrics::prometheus(&registry, "bach", &["chain_id"]).unwrap_err();
        assert!(matches!(err, MetricsError::OddLabelValues { len: 1 }));
        assert!(registry.gather().is_empty());
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let registry = MetricsRegistry::new();
        let err = MempoolMetrics::prometheus::<&str>(&registry, "bad-namespace", &[]).unwrap_err();
        assert!(matches!(err, MetricsError::Prometheus(_)));
        assert!(registry.gather().is_empty());
    }

    #[test]
    fn test_noop_is_detached() {
        let metrics = MempoolMetrics::noop();
        metrics.size.set(12);
        metrics.tx_size_bytes.observe(250.0);
        metrics.failed_txs.inc();
        metrics.already_seen_txs.inc_by(3);
        let _again = MempoolMetrics::default();
    }
}
