//! Lifetime counter snapshot persisted as JSON
//!
//! [`JsonMetrics`] keeps a flat record of what a pool instance did between
//! startup and shutdown, independent of the exporting backend. The owner bumps
//! counters as events happen and calls [`JsonMetrics::save`] once at shutdown,
//! which writes `<root>/data/mempool_metrics.json`.

use crate::error::MetricsResult;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory under the root that holds the snapshot
pub const DATA_DIR: &str = "data";

/// Snapshot file name
pub const SNAPSHOT_FILE: &str = "mempool_metrics.json";

/// Permission bits of the snapshot file (owner rw, group/other r)
pub const SNAPSHOT_FILE_MODE: u32 = 0o644;

/// Selects one counter of the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotCounter {
    /// Transactions admitted to the pool
    Size,
    /// Total bytes of admitted transactions
    TxSizeBytes,
    /// Transactions rejected by the application
    FailedTxs,
    /// Valid transactions evicted to make room
    EvictedTxs,
    /// Transactions committed in a block
    SuccessfulTxs,
    /// Recheck passes
    RecheckTimes,
    /// Duplicates of transactions already in the pool
    AlreadySeenTxs,
    /// Duplicates of transactions already rejected
    AlreadyRejectedTxs,
    /// Transactions requested from peers
    RequestedTxs,
    /// Transactions requested again after a lost request
    RerequestedTxs,
    /// Requested transactions never received
    LostTxs,
    /// Failed responses to peer requests
    FailedResponses,
    /// Bytes of transactions sent to peers
    SentTransactionBytes,
    /// Bytes of pool state sent to peers
    SentStateBytes,
    /// Bytes of transactions received from peers
    ReceivedTxBytes,
    /// Bytes of pool state received from peers
    ReceivedStateBytes,
}

impl SnapshotCounter {
    /// Every counter, in file order
    pub const ALL: [SnapshotCounter; 16] = [
        SnapshotCounter::Size,
        SnapshotCounter::TxSizeBytes,
        SnapshotCounter::FailedTxs,
        SnapshotCounter::EvictedTxs,
        SnapshotCounter::SuccessfulTxs,
        SnapshotCounter::RecheckTimes,
        SnapshotCounter::AlreadySeenTxs,
        SnapshotCounter::AlreadyRejectedTxs,
        SnapshotCounter::RequestedTxs,
        SnapshotCounter::RerequestedTxs,
        SnapshotCounter::LostTxs,
        SnapshotCounter::FailedResponses,
        SnapshotCounter::SentTransactionBytes,
        SnapshotCounter::SentStateBytes,
        SnapshotCounter::ReceivedTxBytes,
        SnapshotCounter::ReceivedStateBytes,
    ];

    /// JSON key of the counter
    pub fn key(&self) -> &'static str {
        match self {
            SnapshotCounter::Size => "Size",
            SnapshotCounter::TxSizeBytes => "TxSizeBytes",
            SnapshotCounter::FailedTxs => "FailedTxs",
            SnapshotCounter::EvictedTxs => "EvictedTxs",
            SnapshotCounter::SuccessfulTxs => "SuccessfulTxs",
            SnapshotCounter::RecheckTimes => "RecheckTimes",
            SnapshotCounter::AlreadySeenTxs => "AlreadySeenTxs",
            SnapshotCounter::AlreadyRejectedTxs => "AlreadyRejectedTxs",
            SnapshotCounter::RequestedTxs => "RequestedTxs",
            SnapshotCounter::RerequestedTxs => "RerequestedTxs",
            SnapshotCounter::LostTxs => "LostTxs",
            SnapshotCounter::FailedResponses => "FailedResponses",
            SnapshotCounter::SentTransactionBytes => "SentTransactionBytes",
            SnapshotCounter::SentStateBytes => "SentStateBytes",
            SnapshotCounter::ReceivedTxBytes => "ReceivedTxBytes",
            SnapshotCounter::ReceivedStateBytes => "ReceivedStateBytes",
        }
    }
}

/// Persisted record of one pool instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricsSnapshot {
    /// When the instance started (UTC)
    pub started_at: DateTime<Utc>,
    /// When the snapshot was last saved (UTC); unset before the first save
    pub ended_at: Option<DateTime<Utc>>,
    /// Transactions admitted
    pub size: u64,
    /// Bytes of admitted transactions
    pub tx_size_bytes: u64,
    /// Transactions rejected by the application
    pub failed_txs: u64,
    /// Transactions evicted
    pub evicted_txs: u64,
    /// Transactions committed
    pub successful_txs: u64,
    /// Recheck passes
    pub recheck_times: u64,
    /// Duplicates of pooled transactions
    pub already_seen_txs: u64,
    /// Duplicates of rejected transactions
    pub already_rejected_txs: u64,
    /// Transactions requested from peers
    pub requested_txs: u64,
    /// Transactions re-requested from peers
    pub rerequested_txs: u64,
    /// Requested transactions never received
    pub lost_txs: u64,
    /// Failed responses
    pub failed_responses: u64,
    /// Transaction bytes sent
    pub sent_transaction_bytes: u64,
    /// State bytes sent
    pub sent_state_bytes: u64,
    /// Transaction bytes received
    pub received_tx_bytes: u64,
    /// State bytes received
    pub received_state_bytes: u64,
}

impl MetricsSnapshot {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            ended_at: None,
            size: 0,
            tx_size_bytes: 0,
            failed_txs: 0,
            evicted_txs: 0,
            successful_txs: 0,
            recheck_times: 0,
            already_seen_txs: 0,
            already_rejected_txs: 0,
            requested_txs: 0,
            rerequested_txs: 0,
            lost_txs: 0,
            failed_responses: 0,
            sent_transaction_bytes: 0,
            sent_state_bytes: 0,
            received_tx_bytes: 0,
            received_state_bytes: 0,
        }
    }

    /// Current value of a counter
    pub fn counter(&self, counter: SnapshotCounter) -> u64 {
        match counter {
            SnapshotCounter::Size => self.size,
            SnapshotCounter::TxSizeBytes => self.tx_size_bytes,
            SnapshotCounter::FailedTxs => self.failed_txs,
            SnapshotCounter::EvictedTxs => self.evicted_txs,
            SnapshotCounter::SuccessfulTxs => self.successful_txs,
            SnapshotCounter::RecheckTimes => self.recheck_times,
            SnapshotCounter::AlreadySeenTxs => self.already_seen_txs,
            SnapshotCounter::AlreadyRejectedTxs => self.already_rejected_txs,
            SnapshotCounter::RequestedTxs => self.requested_txs,
            SnapshotCounter::RerequestedTxs => self.rerequested_txs,
            SnapshotCounter::LostTxs => self.lost_txs,
            SnapshotCounter::FailedResponses => self.failed_responses,
            SnapshotCounter::SentTransactionBytes => self.sent_transaction_bytes,
            SnapshotCounter::SentStateBytes => self.sent_state_bytes,
            SnapshotCounter::ReceivedTxBytes => self.received_tx_bytes,
            SnapshotCounter::ReceivedStateBytes => self.received_state_bytes,
        }
    }

    fn counter_mut(&mut self, counter: SnapshotCounter) -> &mut u64 {
        match counter {
            SnapshotCounter::Size => &mut self.size,
            SnapshotCounter::TxSizeBytes => &mut self.tx_size_bytes,
            SnapshotCounter::FailedTxs => &mut self.failed_txs,
            SnapshotCounter::EvictedTxs => &mut self.evicted_txs,
            SnapshotCounter::SuccessfulTxs => &mut self.successful_txs,
            SnapshotCounter::RecheckTimes => &mut self.recheck_times,
            SnapshotCounter::AlreadySeenTxs => &mut self.already_seen_txs,
            SnapshotCounter::AlreadyRejectedTxs => &mut self.already_rejected_txs,
            SnapshotCounter::RequestedTxs => &mut self.requested_txs,
            SnapshotCounter::RerequestedTxs => &mut self.rerequested_txs,
            SnapshotCounter::LostTxs => &mut self.lost_txs,
            SnapshotCounter::FailedResponses => &mut self.failed_responses,
            SnapshotCounter::SentTransactionBytes => &mut self.sent_transaction_bytes,
            SnapshotCounter::SentStateBytes => &mut self.sent_state_bytes,
            SnapshotCounter::ReceivedTxBytes => &mut self.received_tx_bytes,
            SnapshotCounter::ReceivedStateBytes => &mut self.received_state_bytes,
        }
    }

    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Lifetime counters of one pool instance, saved to disk on demand.
///
/// All counters and the save path share one lock, so a save never observes a
/// half-applied update.
pub struct JsonMetrics {
    path: PathBuf,
    state: Mutex<MetricsSnapshot>,
}

impl JsonMetrics {
    /// Start a new record that will be saved under `root_dir/data/`.
    ///
    /// Touches no files.
    pub fn open(root_dir: impl AsRef<Path>) -> Self {
        Self {
            path: snapshot_path(root_dir.as_ref()),
            state: Mutex::new(MetricsSnapshot::new(Utc::now())),
        }
    }

    /// Where [`save`](Self::save) writes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the record was opened
    pub fn started_at(&self) -> DateTime<Utc> {
        self.state.lock().started_at
    }

    /// When the record was last saved, if ever
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().ended_at
    }

    /// Add `delta` to a counter, saturating at `u64::MAX`
    pub fn add(&self, counter: SnapshotCounter, delta: u64) {
        let mut state = self.state.lock();
        let value = state.counter_mut(counter);
        *value = value.saturating_add(delta);
    }

    /// Add one to a counter
    pub fn incr(&self, counter: SnapshotCounter) {
        self.add(counter, 1);
    }

    /// Current value of a counter
    pub fn get(&self, counter: SnapshotCounter) -> u64 {
        self.state.lock().counter(counter)
    }

    /// Consistent copy of every field
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().clone()
    }

    /// Stamp `EndedAt` and overwrite the snapshot file with the cumulative totals.
    ///
    /// Creates the `data` directory if it is missing. Every call rewrites the
    /// whole file; counters are never reset.
    ///
    /// An error here means the instance's telemetry is lost. Callers must treat
    /// it as fatal: log it and terminate the process.
    pub fn save(&self) -> MetricsResult<()> {
        let mut state = self.state.lock();

        // Wall clock may step backwards; never record an end before the start.
        let ended_at = Utc::now().max(state.started_at);
        state.ended_at = Some(ended_at);

        let content = serde_json::to_vec(&*state)?;
        write_snapshot(&self.path, &content)?;

        info!(
            path = %self.path.display(),
            lifetime_secs = (ended_at - state.started_at).num_seconds(),
            "saved mempool metrics snapshot"
        );
        Ok(())
    }
}

impl std::fmt::Debug for JsonMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonMetrics")
            .field("path", &self.path)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// `root_dir/data/mempool_metrics.json`
pub fn snapshot_path(root_dir: &Path) -> PathBuf {
    root_dir.join(DATA_DIR).join(SNAPSHOT_FILE)
}

fn write_snapshot(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(SNAPSHOT_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()?;

    // The create mode is narrowed by the umask and ignored for existing files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(SNAPSHOT_FILE_MODE))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_open_computes_path() {
        let metrics = JsonMetrics::open("/tmp/x");
        assert_eq!(
            metrics.path(),
            Path::new("/tmp/x/data/mempool_metrics.json")
        );
        assert!(metrics.ended_at().is_none());
    }

    #[test]
    fn test_open_touches_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = JsonMetrics::open(dir.path());
        assert!(!dir.path().join(DATA_DIR).exists());
        assert!(!metrics.path().exists());
    }

    #[test]
    fn test_add_and_get() {
        let metrics = JsonMetrics::open("/tmp/x");
        metrics.incr(SnapshotCounter::FailedTxs);
        metrics.add(SnapshotCounter::FailedTxs, 4);
        metrics.add(SnapshotCounter::ReceivedTxBytes, 1024);
        assert_eq!(metrics.get(SnapshotCounter::FailedTxs), 5);
        assert_eq!(metrics.get(SnapshotCounter::ReceivedTxBytes), 1024);
        assert_eq!(metrics.get(SnapshotCounter::LostTxs), 0);
    }

    #[test]
    fn test_add_saturates() {
        let metrics = JsonMetrics::open("/tmp/x");
        metrics.add(SnapshotCounter::SentStateBytes, u64::MAX);
        metrics.incr(SnapshotCounter::SentStateBytes);
        assert_eq!(metrics.get(SnapshotCounter::SentStateBytes), u64::MAX);
    }

    #[test]
    fn test_every_counter_is_addressable() {
        let metrics = JsonMetrics::open("/tmp/x");
        for (i, counter) in SnapshotCounter::ALL.iter().enumerate() {
            metrics.add(*counter, i as u64 + 1);
        }
        let snapshot = metrics.snapshot();
        for (i, counter) in SnapshotCounter::ALL.iter().enumerate() {
            assert_eq!(snapshot.counter(*counter), i as u64 + 1);
        }
    }

    #[test]
    fn test_json_keys_match_counter_keys() {
        let metrics = JsonMetrics::open("/tmp/x");
        let value = serde_json::to_value(metrics.snapshot()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), SnapshotCounter::ALL.len() + 2);
        assert!(object.contains_key("StartedAt"));
        assert!(object.contains_key("EndedAt"));
        for counter in SnapshotCounter::ALL {
            assert!(object.contains_key(counter.key()), "missing {}", counter.key());
        }
    }

    #[test]
    fn test_save_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = JsonMetrics::open(dir.path());
        metrics.save().unwrap();
        assert!(metrics.path().is_file());
        assert!(metrics.ended_at().unwrap() >= metrics.started_at());
    }

    #[test]
    fn test_save_fails_when_root_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let metrics = JsonMetrics::open(file.path());
        assert!(metrics.save().is_err());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(JsonMetrics::open(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.incr(SnapshotCounter::AlreadySeenTxs);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        metrics.save().unwrap();
        assert_eq!(metrics.get(SnapshotCounter::AlreadySeenTxs), 8000);
    }
}
