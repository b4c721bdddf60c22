//! # Remote Sync
//!
//! Fire-and-forget convergence with the remote territory store:
//! - Outbound mutations come from the engine's pending-upload queues and are
//!   drained here; entries leave a queue only after a confirmed write
//! - Transient failures requeue (the payload is full state, so a retry is an
//!   idempotent re-send); permanent rejections are dropped with a warning
//! - Inbound snapshots replace local state wholesale (last-writer-wins);
//!   nothing here attempts distributed consensus or merge
//!
//! The drain runs on a fixed interval and on app-foreground transitions via
//! [`SyncScheduler`]. There is no cancellation of in-flight writes.

use crate::{
    engine::CaptureEngine,
    store::{BlobStore, PendingUpload},
    ActivityMode, Owner, Territory, TrackPoint,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How often the retry queue is drained.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(15);

/// A remote store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network or store unavailable; the write stays queued for retry.
    Transient(String),
    /// The store rejected the write; retrying cannot help.
    Permanent(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Transient(msg) => write!(f, "transient remote failure: {}", msg),
            RemoteError::Permanent(msg) => write!(f, "permanent remote failure: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

/// The remote territory store contract.
///
/// Implemented by the transport collaborator (out of scope here); the engine
/// only assumes the store serializes writes to the same territory document.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Fetch the full current territory set, newest first.
    async fn fetch_territories(&self) -> Result<Vec<RemoteTerritoryDoc>, RemoteError>;

    /// Fetch the territories a given owner holds a claim on.
    async fn fetch_by_owner(&self, owner_id: &str) -> Result<Vec<RemoteTerritoryDoc>, RemoteError>;

    /// Create a territory document; returns the remote id.
    async fn create_territory(&self, territory: &Territory) -> Result<String, RemoteError>;

    /// Replace a territory's owners.
    async fn update_owners(&self, territory_id: &str, owners: &[Owner]) -> Result<(), RemoteError>;

    /// Delete a territory document (explicit user action only).
    async fn delete_territory(&self, territory_id: &str) -> Result<(), RemoteError>;
}

/// `createdAt` as stored remotely: either raw epoch milliseconds or a
/// server timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteTimestamp {
    Millis(i64),
    Server { seconds: i64, nanos: u32 },
}

impl RemoteTimestamp {
    /// Convert to Unix epoch milliseconds.
    pub fn epoch_ms(&self) -> i64 {
        match *self {
            RemoteTimestamp::Millis(ms) => ms,
            RemoteTimestamp::Server { seconds, nanos } => {
                seconds * 1000 + (nanos / 1_000_000) as i64
            }
        }
    }
}

/// A territory document as the remote store represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTerritoryDoc {
    pub id: String,
    pub mode: ActivityMode,
    pub polygon: Vec<TrackPoint>,
    pub created_at: RemoteTimestamp,
    pub owners: Vec<Owner>,
}

impl RemoteTerritoryDoc {
    /// Convert to the local territory model. Returns `None` for documents
    /// with a degenerate polygon.
    pub fn into_territory(self) -> Option<Territory> {
        Territory::new(
            self.id,
            self.mode,
            self.polygon,
            self.created_at.epoch_ms(),
            self.owners,
        )
    }
}

/// Outcome of one drain pass over the pending-upload queues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub attempted: usize,
    pub confirmed: usize,
    pub requeued: usize,
    pub dropped: usize,
}

/// Attempt every queued upload against the remote store.
///
/// Confirmed writes are removed from their queue. A transient failure stops
/// the pass (the store is unreachable; later entries would fail the same
/// way) and leaves everything else queued. A permanent rejection drops the
/// entry with a warning.
pub async fn drain_pending<S, R>(engine: &mut CaptureEngine<S>, remote: &R) -> DrainStats
where
    S: BlobStore,
    R: RemoteStore,
{
    let mut stats = DrainStats::default();

    for upload in engine.pending_uploads() {
        stats.attempted += 1;

        let result = match &upload {
            PendingUpload::Create { territory } => {
                remote.create_territory(territory).await.map(|_id| ())
            }
            PendingUpload::UpdateOwners { territory_id, owners } => {
                remote.update_owners(territory_id, owners).await
            }
        };

        match result {
            Ok(()) => {
                engine.mark_uploaded(&upload);
                stats.confirmed += 1;
            }
            Err(RemoteError::Transient(msg)) => {
                debug!("[Sync] write requeued: {}", msg);
                stats.requeued += 1;
                break;
            }
            Err(RemoteError::Permanent(msg)) => {
                warn!("[Sync] write dropped: {}", msg);
                engine.mark_uploaded(&upload);
                stats.dropped += 1;
            }
        }
    }

    if stats.attempted > 0 {
        info!(
            "[Sync] drain: {} attempted, {} confirmed, {} requeued, {} dropped",
            stats.attempted, stats.confirmed, stats.requeued, stats.dropped
        );
    }

    stats
}

/// Pull the current remote snapshot and replace local territories with it.
///
/// Returns the number of territories applied. Local territories not yet
/// confirmed remotely are overwritten; their queued uploads will re-send on
/// the next drain. This is the accepted last-writer-wins gap.
pub async fn refresh_snapshot<S, R>(
    engine: &mut CaptureEngine<S>,
    remote: &R,
) -> Result<usize, RemoteError>
where
    S: BlobStore,
    R: RemoteStore,
{
    let docs = remote.fetch_territories().await?;
    let territories: Vec<Territory> = docs
        .into_iter()
        .filter_map(RemoteTerritoryDoc::into_territory)
        .collect();
    let applied = territories.len();
    engine.apply_remote_snapshot(territories);
    Ok(applied)
}

/// Paces drain passes: a fixed retry interval, cut short whenever the app
/// comes to the foreground.
///
/// ```no_run
/// # use territory_engine::sync::SyncScheduler;
/// # async fn example() {
/// let scheduler = SyncScheduler::new();
/// let foreground = scheduler.foreground_handle();
/// // elsewhere: foreground.notify_one() on app-foreground transitions
/// loop {
///     scheduler.tick().await;
///     // drain_pending(...).await;
/// }
/// # }
/// ```
pub struct SyncScheduler {
    interval: Duration,
    foreground: Arc<Notify>,
}

impl SyncScheduler {
    /// Scheduler with the standard retry interval.
    pub fn new() -> Self {
        Self::with_interval(RETRY_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval, foreground: Arc::new(Notify::new()) }
    }

    /// Handle for signaling app-foreground transitions.
    pub fn foreground_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.foreground)
    }

    /// Wait until the next drain should run: the retry interval elapses or
    /// a foreground transition is signaled, whichever comes first.
    pub async fn tick(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.interval) => {}
            _ = self.foreground.notified() => {
                debug!("[Sync] foreground transition, draining early");
            }
        }
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::store::MemoryBlobStore;
    use crate::PositionSample;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Succeed,
        FailTransient,
        FailPermanent,
    }

    struct MockRemote {
        behavior: Mutex<Behavior>,
        docs: Mutex<Vec<RemoteTerritoryDoc>>,
        creates: Mutex<Vec<String>>,
        updates: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    impl MockRemote {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                docs: Mutex::new(Vec::new()),
                creates: Mutex::new(Vec::new()),
                updates: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
            }
        }

        fn set_behavior(&self, behavior: Behavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        fn check(&self) -> Result<(), RemoteError> {
            match *self.behavior.lock().unwrap() {
                Behavior::Succeed => Ok(()),
                Behavior::FailTransient => {
                    Err(RemoteError::Transient("store unreachable".to_string()))
                }
                Behavior::FailPermanent => {
                    Err(RemoteError::Permanent("rejected".to_string()))
                }
            }
        }
    }

    impl RemoteStore for MockRemote {
        async fn fetch_territories(&self) -> Result<Vec<RemoteTerritoryDoc>, RemoteError> {
            self.check()?;
            Ok(self.docs.lock().unwrap().clone())
        }

        async fn fetch_by_owner(
            &self,
            owner_id: &str,
        ) -> Result<Vec<RemoteTerritoryDoc>, RemoteError> {
            self.check()?;
            Ok(self
                .docs
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.owners.iter().any(|o| o.owner_id == owner_id))
                .cloned()
                .collect())
        }

        async fn create_territory(&self, territory: &Territory) -> Result<String, RemoteError> {
            self.check()?;
            self.creates.lock().unwrap().push(territory.id.clone());
            Ok(territory.id.clone())
        }

        async fn update_owners(
            &self,
            territory_id: &str,
            _owners: &[Owner],
        ) -> Result<(), RemoteError> {
            self.check()?;
            self.updates.lock().unwrap().push(territory_id.to_string());
            Ok(())
        }

        async fn delete_territory(&self, territory_id: &str) -> Result<(), RemoteError> {
            self.check()?;
            self.deletes.lock().unwrap().push(territory_id.to_string());
            Ok(())
        }
    }

    fn sample(lat: f64, lng: f64, ts: i64) -> PositionSample {
        PositionSample::new(lat, lng, Some(5.0), ts)
    }

    /// Walk a ~110m square so the engine captures one territory.
    fn engine_with_capture() -> CaptureEngine<MemoryBlobStore> {
        let mut engine =
            CaptureEngine::new("alice", MemoryBlobStore::new(), SessionConfig::default());
        engine.start_session(crate::ActivityMode::Walk, 0);

        let mut corners: Vec<(f64, f64)> = Vec::new();
        for i in 0..4 {
            corners.push((i as f64 * 0.00025, 0.0));
        }
        for i in 0..4 {
            corners.push((0.001, i as f64 * 0.00025));
        }
        for i in 0..4 {
            corners.push((0.001 - i as f64 * 0.00025, 0.001));
        }
        for i in 0..4 {
            corners.push((0.0, 0.001 - i as f64 * 0.00025));
        }
        corners.push((0.0, 0.0));

        for (i, (lat, lng)) in corners.into_iter().enumerate() {
            engine.ingest(sample(lat, lng, i as i64 * 20_000));
        }

        assert_eq!(engine.pending_uploads().len(), 1);
        engine
    }

    fn doc(id: &str, created_at: RemoteTimestamp, owner: &str) -> RemoteTerritoryDoc {
        RemoteTerritoryDoc {
            id: id.to_string(),
            mode: crate::ActivityMode::Walk,
            polygon: vec![
                TrackPoint::new(0.0, 0.0, 0),
                TrackPoint::new(0.001, 0.0, 0),
                TrackPoint::new(0.001, 0.001, 0),
            ],
            created_at,
            owners: vec![Owner::new(owner, 1.0)],
        }
    }

    #[tokio::test]
    async fn test_drain_confirms_and_removes() {
        let mut engine = engine_with_capture();
        let remote = MockRemote::new(Behavior::Succeed);

        let stats = drain_pending(&mut engine, &remote).await;
        assert_eq!(stats.attempted, 1);
        assert_eq!(stats.confirmed, 1);
        assert!(engine.pending_uploads().is_empty());
        assert_eq!(remote.creates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_entry_queued() {
        let mut engine = engine_with_capture();
        let remote = MockRemote::new(Behavior::FailTransient);

        let stats = drain_pending(&mut engine, &remote).await;
        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.confirmed, 0);
        assert_eq!(engine.pending_uploads().len(), 1, "entry must stay queued");

        // Store comes back: the retried drain re-sends the same payload
        remote.set_behavior(Behavior::Succeed);
        let stats = drain_pending(&mut engine, &remote).await;
        assert_eq!(stats.confirmed, 1);
        assert!(engine.pending_uploads().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_drops_entry() {
        let mut engine = engine_with_capture();
        let remote = MockRemote::new(Behavior::FailPermanent);

        let stats = drain_pending(&mut engine, &remote).await;
        assert_eq!(stats.dropped, 1);
        assert!(engine.pending_uploads().is_empty(), "rejected entry is dropped");
    }

    #[tokio::test]
    async fn test_refresh_snapshot_replaces_local() {
        let mut engine = engine_with_capture();
        assert_eq!(engine.territories().len(), 1);

        let remote = MockRemote::new(Behavior::Succeed);
        remote.docs.lock().unwrap().push(doc(
            "remote-1",
            RemoteTimestamp::Server { seconds: 1_700_000_000, nanos: 500_000_000 },
            "bob",
        ));

        let applied = refresh_snapshot(&mut engine, &remote).await.unwrap();
        assert_eq!(applied, 1);
        assert_eq!(engine.territories().len(), 1);
        assert_eq!(engine.territories()[0].id, "remote-1");
        assert_eq!(engine.territories()[0].created_at, 1_700_000_000_500);
    }

    #[tokio::test]
    async fn test_refresh_failure_leaves_local_untouched() {
        let mut engine = engine_with_capture();
        let local_id = engine.territories()[0].id.clone();

        let remote = MockRemote::new(Behavior::FailTransient);
        assert!(refresh_snapshot(&mut engine, &remote).await.is_err());
        assert_eq!(engine.territories()[0].id, local_id);
    }

    #[tokio::test]
    async fn test_fetch_by_owner_and_delete_contract() {
        let remote = MockRemote::new(Behavior::Succeed);
        remote
            .docs
            .lock()
            .unwrap()
            .push(doc("remote-1", RemoteTimestamp::Millis(5_000), "bob"));

        let bobs = remote.fetch_by_owner("bob").await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert!(remote.fetch_by_owner("alice").await.unwrap().is_empty());

        remote.delete_territory("remote-1").await.unwrap();
        assert_eq!(remote.deletes.lock().unwrap().as_slice(), ["remote-1"]);
    }

    #[test]
    fn test_remote_timestamp_dual_form() {
        let raw: RemoteTimestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(raw.epoch_ms(), 1_700_000_000_000);

        let server: RemoteTimestamp =
            serde_json::from_str("{\"seconds\": 1700000000, \"nanos\": 250000000}").unwrap();
        assert_eq!(server.epoch_ms(), 1_700_000_000_250);
    }

    #[test]
    fn test_degenerate_remote_doc_is_skipped() {
        let mut bad = doc("remote-1", RemoteTimestamp::Millis(0), "bob");
        bad.polygon.truncate(2);
        assert!(bad.into_territory().is_none());
    }

    #[tokio::test]
    async fn test_foreground_signal_cuts_interval_short() {
        let scheduler = SyncScheduler::with_interval(Duration::from_secs(3600));
        let foreground = scheduler.foreground_handle();
        foreground.notify_one();

        tokio::time::timeout(Duration::from_millis(100), scheduler.tick())
            .await
            .expect("foreground signal should fire the tick immediately");
    }
}
