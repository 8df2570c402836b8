//! Instrumentation configuration

use crate::error::MetricsResult;
use crate::mempool::MempoolMetrics;
use crate::registry::MetricsRegistry;
use crate::snapshot::JsonMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Label added to every series by [`MetricsConfig::mempool_metrics`]
pub const CHAIN_ID_LABEL: &str = "chain_id";

fn default_namespace() -> String {
    "bachledger".to_string()
}

/// Instrumentation section of the node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Record and export through Prometheus; otherwise metrics are discarded
    #[serde(default)]
    pub prometheus: bool,
    /// Namespace prefixed to every series
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Extra constant labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Keep a lifetime snapshot and write it to disk at shutdown
    #[serde(default)]
    pub json_snapshot: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus: false,
            namespace: default_namespace(),
            labels: BTreeMap::new(),
            json_snapshot: false,
        }
    }
}

impl MetricsConfig {
    /// Alternating label/value sequence: `chain_id` first, then the configured labels by key
    pub fn labels_and_values(&self, chain_id: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(2 + self.labels.len() * 2);
        out.push(CHAIN_ID_LABEL.to_string());
        out.push(chain_id.to_string());
        for (key, value) in &self.labels {
            out.push(key.clone());
            out.push(value.clone());
        }
        out
    }

    /// Mempool metrics for `chain_id` on the configured backend.
    ///
    /// Registers with `registry` only when Prometheus is enabled.
    pub fn mempool_metrics(
        &self,
        registry: &MetricsRegistry,
        chain_id: &str,
    ) -> MetricsResult<MempoolMetrics> {
        if !self.prometheus {
            debug!("prometheus disabled, using no-op mempool metrics");
            return Ok(MempoolMetrics::noop());
        }
        MempoolMetrics::prometheus(registry, &self.namespace, &self.labels_and_values(chain_id))
    }

    /// Snapshot accumulator rooted at `root_dir`, if enabled
    pub fn json_metrics(&self, root_dir: impl AsRef<Path>) -> Option<JsonMetrics> {
        self.json_snapshot.then(|| JsonMetrics::open(root_dir))
    }
}
