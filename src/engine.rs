//! # Capture Engine
//!
//! Single-writer integration layer tying the tracking session, the territory
//! collection, and local persistence together. The engine updates local
//! state immediately and optimistically; durable writes to the remote store
//! are queued as [`PendingUpload`]s and drained by the sync layer.
//!
//! Shared state is updated by whole-value replacement and there is exactly
//! one local writer, so no locks appear anywhere in the engine.

use crate::{
    claims::{ClaimResult, TerritorySet},
    decay,
    session::{SessionConfig, SessionState, TrackingSession},
    store::{
        load_collection, save_collection, BlobStore, PendingUpload, SessionRecord,
        PENDING_CREATES_KEY, PENDING_UPDATES_KEY, SESSIONS_KEY, TERRITORIES_KEY,
    },
    ActivityMode, PositionSample, Territory,
};
use log::{debug, info};

/// The local authoritative cache plus its outbound mutation queues.
///
/// Lifecycle: construct with an owner id and a blob store (previously
/// persisted territories and queues are loaded tolerantly), start a session,
/// feed samples through [`CaptureEngine::ingest`], and read territories
/// through the decayed view.
pub struct CaptureEngine<S: BlobStore> {
    owner_id: String,
    config: SessionConfig,
    session: Option<TrackingSession>,
    territories: TerritorySet,
    store: S,
    pending_creates: Vec<PendingUpload>,
    pending_updates: Vec<PendingUpload>,
    loop_count: u32,
}

impl<S: BlobStore> CaptureEngine<S> {
    /// Create an engine for one owner, restoring persisted state.
    pub fn new(owner_id: impl Into<String>, mut store: S, config: SessionConfig) -> Self {
        let territories: Vec<Territory> = load_collection(&mut store, TERRITORIES_KEY);
        let pending_creates: Vec<PendingUpload> = load_collection(&mut store, PENDING_CREATES_KEY);
        let pending_updates: Vec<PendingUpload> = load_collection(&mut store, PENDING_UPDATES_KEY);

        info!(
            "[CaptureEngine] restored {} territories, {} queued uploads",
            territories.len(),
            pending_creates.len() + pending_updates.len()
        );

        Self {
            owner_id: owner_id.into(),
            config,
            session: None,
            territories: TerritorySet::from_territories(territories),
            store,
            pending_creates,
            pending_updates,
            loop_count: 0,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// The live session's state, if a session exists.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }

    /// Distance covered in the live session, in meters.
    pub fn distance_m(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.distance_m())
    }

    /// Begin a tracking session in the given mode.
    pub fn start_session(&mut self, mode: ActivityMode, now_ms: i64) {
        let mut session = TrackingSession::new(mode, self.config.clone());
        session.start(now_ms);
        self.session = Some(session);
        self.loop_count = 0;
    }

    pub fn pause_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pause();
        }
    }

    pub fn resume_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.resume();
        }
    }

    /// Stop the live session and persist its record.
    pub fn stop_session(&mut self, now_ms: i64) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        let started_at = session.started_at().unwrap_or(now_ms);
        let record = SessionRecord {
            id: format!("session-{:x}", started_at),
            mode: session.mode(),
            started_at,
            ended_at: now_ms,
            distance_m: session.distance_m(),
            loop_count: self.loop_count,
        };
        session.stop();

        let mut records: Vec<SessionRecord> = load_collection(&mut self.store, SESSIONS_KEY);
        records.push(record);
        save_collection(&mut self.store, SESSIONS_KEY, &records);
    }

    /// Record the step counter's running total (walk/run collaborator).
    pub fn record_steps(&mut self, total: u64) {
        if let Some(session) = self.session.as_mut() {
            session.record_steps(total);
        }
    }

    /// Feed one raw position sample through the pipeline.
    ///
    /// On loop capture, arbitration runs against the territory collection,
    /// the collection is persisted, and the resulting mutations are queued
    /// for upload. Returns the claim outcome when a capture occurred.
    pub fn ingest(&mut self, sample: PositionSample) -> Option<ClaimResult> {
        let session = self.session.as_mut()?;
        let capture = session.ingest(sample)?;
        self.loop_count += 1;

        let mode = session.mode();
        let result =
            self.territories
                .resolve_claim(&self.owner_id, &capture, mode, sample.timestamp);

        if let Some(created_id) = &result.created {
            if let Some(territory) = self.territories.get(created_id) {
                self.pending_creates
                    .push(PendingUpload::Create { territory: territory.clone() });
            }
        }

        for change in &result.changed {
            if let Some(territory) = self.territories.get(&change.territory_id) {
                // Full-state re-send: a newer update for the same territory
                // supersedes any queued one.
                self.pending_updates.retain(|u| {
                    !matches!(u, PendingUpload::UpdateOwners { territory_id, .. }
                        if territory_id == &change.territory_id)
                });
                self.pending_updates.push(PendingUpload::UpdateOwners {
                    territory_id: territory.id.clone(),
                    owners: territory.owners.clone(),
                });
            }
        }

        self.persist_territories();
        self.persist_queues();

        Some(result)
    }

    /// The stored territory collection (undecayed).
    pub fn territories(&self) -> &[Territory] {
        self.territories.territories()
    }

    /// The decay-projected view for display and scoring.
    pub fn territories_view(&self, now_ms: i64) -> Vec<Territory> {
        decay::project_territories(self.territories.territories(), now_ms)
    }

    /// Replace local territories with a remote subscription snapshot.
    ///
    /// The remote set is authoritative: local territories not yet confirmed
    /// remotely are overwritten, not merged. Queued uploads stay queued.
    pub fn apply_remote_snapshot(&mut self, territories: Vec<Territory>) {
        self.territories.replace_all(territories);
        self.persist_territories();
    }

    /// Every queued upload, creations first.
    pub fn pending_uploads(&self) -> Vec<PendingUpload> {
        self.pending_creates
            .iter()
            .chain(self.pending_updates.iter())
            .cloned()
            .collect()
    }

    /// Remove a confirmed upload from its queue.
    pub fn mark_uploaded(&mut self, upload: &PendingUpload) {
        let remove_first = |queue: &mut Vec<PendingUpload>| {
            if let Some(pos) = queue.iter().position(|u| u == upload) {
                queue.remove(pos);
                true
            } else {
                false
            }
        };

        if remove_first(&mut self.pending_creates) || remove_first(&mut self.pending_updates) {
            self.persist_queues();
        } else {
            debug!("[CaptureEngine] confirmed upload was not queued");
        }
    }

    fn persist_territories(&mut self) {
        save_collection(&mut self.store, TERRITORIES_KEY, self.territories.territories());
    }

    fn persist_queues(&mut self) {
        save_collection(&mut self.store, PENDING_CREATES_KEY, &self.pending_creates);
        save_collection(&mut self.store, PENDING_UPDATES_KEY, &self.pending_updates);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
