//! # Territory Engine
//!
//! GPS loop capture and territory ownership arbitration.
//!
//! This library provides:
//! - GPS path filtering and smoothing for noisy location streams
//! - Loop-closure detection with enclosed-area validation
//! - Territory ownership arbitration (strengthen / contest / claim-over)
//! - Read-time strength decay for display and scoring
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel decay projection with rayon
//! - **`persistence`** - Enable the SQLite-backed blob store
//! - **`sync`** - Enable the background sync worker for the remote store
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use territory_engine::{ActivityMode, PositionSample, SessionConfig, TrackingSession};
//!
//! let mut session = TrackingSession::new(ActivityMode::Walk, SessionConfig::default());
//! session.start(0);
//!
//! // Walk a ~110m square, one sample every 20 seconds.
//! let mut corners: Vec<(f64, f64)> = Vec::new();
//! for i in 0..4 { corners.push((i as f64 * 0.00025, 0.0)); }
//! for i in 0..4 { corners.push((0.001, i as f64 * 0.00025)); }
//! for i in 0..4 { corners.push((0.001 - i as f64 * 0.00025, 0.001)); }
//! for i in 0..4 { corners.push((0.0, 0.001 - i as f64 * 0.00025)); }
//! corners.push((0.0, 0.0));
//!
//! let mut captured = None;
//! for (i, (lat, lng)) in corners.iter().enumerate() {
//!     let sample = PositionSample::new(*lat, *lng, Some(5.0), i as i64 * 20_000);
//!     if let Some(capture) = session.ingest(sample) {
//!         captured = Some(capture);
//!     }
//! }
//!
//! let capture = captured.expect("closed loop should be captured");
//! assert!(capture.area_m2 > 10_000.0); // ~111m x 111m
//! ```

// Geographic primitives (distance, projection, area, bounds)
pub mod geo_utils;

// Path filtering and smoothing
pub mod filter;
pub use filter::{smooth_path, FilterConfig};

// Loop-closure detection
pub mod loop_detect;
pub use loop_detect::{detect_loop, LoopCapture, LoopConfig};

// Territory ownership arbitration
pub mod claims;
pub use claims::{ClaimChange, ClaimEffect, ClaimResult, TerritorySet};

// Read-time strength decay
pub mod decay;
pub use decay::{decay_factor, project_territories, project_territory};

// Tracking session state machine
pub mod session;
pub use session::{SessionConfig, SessionState, TrackingSession};

// Local blob store and persisted collections
pub mod store;
pub use store::{BlobStore, MemoryBlobStore, PendingUpload};

// Capture engine (session + arbitration + persistence)
pub mod engine;
pub use engine::CaptureEngine;

// Remote territory store and retry worker
#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "sync")]
pub use sync::{
    drain_pending, refresh_snapshot, DrainStats, RemoteError, RemoteStore, RemoteTerritoryDoc,
    RemoteTimestamp, SyncScheduler,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Core Types
// ============================================================================

/// A raw position sample as produced by a location source.
///
/// Carries an optional horizontal accuracy estimate in meters. Samples with
/// poor accuracy are rejected before they ever reach the tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported horizontal accuracy in meters, if the source provides one.
    pub accuracy_m: Option<f64>,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl PositionSample {
    /// Create a new position sample.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: Option<f64>, timestamp: i64) -> Self {
        Self { latitude, longitude, accuracy_m, timestamp }
    }

    /// The sample's coordinates as a path point.
    pub fn point(&self) -> TrackPoint {
        TrackPoint::new(self.latitude, self.longitude, self.timestamp)
    }
}

/// A GPS coordinate with a capture timestamp.
///
/// Immutable once recorded; every downstream stage (smoothing, loop
/// detection, area computation) consumes these.
///
/// # Example
/// ```
/// use territory_engine::TrackPoint;
/// let point = TrackPoint::new(51.5074, -0.1278, 1_700_000_000_000); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl TrackPoint {
    /// Create a new track point.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self { latitude, longitude, timestamp }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box for a path or polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from track points. Returns `None` for empty input.
    pub fn from_points(points: &[TrackPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Activity mode for a tracking session.
///
/// Selects the speed gate and (for on-foot modes) the stride length used to
/// derive distance from a step counter. Immutable for a session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityMode {
    Walk,
    Run,
    Cycle,
}

impl ActivityMode {
    /// Maximum plausible sustained speed for this mode, in m/s.
    pub fn max_speed_mps(&self) -> f64 {
        match self {
            ActivityMode::Walk => 3.0,
            ActivityMode::Run => 7.0,
            ActivityMode::Cycle => 15.0,
        }
    }

    /// Average stride length in meters, for modes where a step counter
    /// can substitute for GPS distance.
    pub fn stride_m(&self) -> Option<f64> {
        match self {
            ActivityMode::Walk => Some(0.762),
            ActivityMode::Run => Some(0.914),
            ActivityMode::Cycle => None,
        }
    }
}

/// An owner's claim on a territory.
///
/// `strength` is a claim-intensity scalar in `[0.0, 2.0]`, not a
/// probability. It rises with repeated captures and is decayed at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub owner_id: String,
    pub strength: f64,
}

impl Owner {
    /// Create a new owner record.
    pub fn new(owner_id: impl Into<String>, strength: f64) -> Self {
        Self { owner_id: owner_id.into(), strength }
    }
}

/// A captured, owned polygon.
///
/// The polygon is implicitly closed (the last point connects back to the
/// first) and always has at least 3 vertices; this is enforced at creation
/// and the polygon is never mutated afterwards. Owners are unique by
/// `owner_id`. Territories are never merged and never deleted by decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    pub id: String,
    pub mode: ActivityMode,
    pub polygon: Vec<TrackPoint>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub owners: Vec<Owner>,
}

impl Territory {
    /// Create a new territory. Returns `None` if the polygon has fewer than
    /// 3 vertices.
    pub fn new(
        id: impl Into<String>,
        mode: ActivityMode,
        polygon: Vec<TrackPoint>,
        created_at: i64,
        owners: Vec<Owner>,
    ) -> Option<Self> {
        if polygon.len() < 3 {
            return None;
        }
        Some(Self { id: id.into(), mode, polygon, created_at, owners })
    }

    /// Bounding box of the territory's polygon.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.polygon)
    }

    /// Look up an owner's claim by id.
    pub fn owner(&self, owner_id: &str) -> Option<&Owner> {
        self.owners.iter().find(|o| o.owner_id == owner_id)
    }

    /// A territory with more than one current owner is contested.
    pub fn is_contested(&self) -> bool {
        self.owners.len() > 1
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
