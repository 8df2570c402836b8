//! Mempool metrics error types

use thiserror::Error;

/// Errors raised while building instruments or persisting snapshots
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Label/value sequence has an odd number of elements
    #[error("odd number of label/value elements: {len}")]
    OddLabelValues {
        /// Length of the rejected sequence
        len: usize,
    },

    /// Same label key supplied more than once
    #[error("duplicate label: {0}")]
    DuplicateLabel(String),

    /// An identical series is already registered
    #[error("metric already registered: {0}")]
    AlreadyRegistered(String),

    /// Prometheus backend error
    #[error("prometheus error: {0}")]
    Prometheus(prometheus::Error),

    /// Snapshot serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<prometheus::Error> for MetricsError {
    fn from(err: prometheus::Error) -> Self {
        match err {
            prometheus::Error::AlreadyReg => {
                MetricsError::AlreadyRegistered("duplicate collector".to_string())
            }
            other => MetricsError::Prometheus(other),
        }
    }
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;
