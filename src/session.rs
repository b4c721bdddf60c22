//! # Tracking Session
//!
//! Owns the live path for one activity. All mutation of tracking state goes
//! through this struct: `start`, `pause`, `resume`, `stop`, `ingest`, and
//! `record_steps` are the only mutators, and there is exactly one session
//! per device, so no locking is needed anywhere in the pipeline.
//!
//! `ingest` runs the full per-sample pipeline: admission filters, whole-path
//! smoothing, the speed-gated distance accumulator, and loop detection. A
//! capture truncates the live path to the closure index so the agent can
//! keep moving and looping without restarting the session.

use crate::{
    filter, loop_detect, ActivityMode, FilterConfig, LoopCapture, LoopConfig, PositionSample,
    TrackPoint,
};
use log::{debug, info};

/// Configuration for a tracking session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub filter: FilterConfig,
    pub loops: LoopConfig,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tracking,
    Paused,
}

/// Live tracking state for one agent and one activity mode.
///
/// The mode is fixed for the session's duration; the path is cleared on
/// start and stop, and truncated (not cleared) when a loop is captured.
#[derive(Debug)]
pub struct TrackingSession {
    mode: ActivityMode,
    config: SessionConfig,
    state: SessionState,
    path: Vec<TrackPoint>,
    smoothed: Vec<TrackPoint>,
    gps_distance_m: f64,
    steps: Option<u64>,
    started_at: Option<i64>,
}

impl TrackingSession {
    /// Create a new idle session.
    pub fn new(mode: ActivityMode, config: SessionConfig) -> Self {
        Self {
            mode,
            config,
            state: SessionState::Idle,
            path: Vec::new(),
            smoothed: Vec::new(),
            gps_distance_m: 0.0,
            steps: None,
            started_at: None,
        }
    }

    pub fn mode(&self) -> ActivityMode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The accepted (raw) path.
    pub fn path(&self) -> &[TrackPoint] {
        &self.path
    }

    /// The smoothed path, recomputed on every accepted sample.
    pub fn smoothed_path(&self) -> &[TrackPoint] {
        &self.smoothed
    }

    pub fn started_at(&self) -> Option<i64> {
        self.started_at
    }

    /// Latest step-counter total, if one has been recorded.
    pub fn steps(&self) -> Option<u64> {
        self.steps
    }

    /// Begin tracking. Clears any previous path and accumulators.
    pub fn start(&mut self, now_ms: i64) {
        self.path.clear();
        self.smoothed.clear();
        self.gps_distance_m = 0.0;
        self.steps = None;
        self.started_at = Some(now_ms);
        self.state = SessionState::Tracking;
        info!("[TrackingSession] started ({:?})", self.mode);
    }

    /// Pause tracking; samples are ignored until resume.
    pub fn pause(&mut self) {
        if self.state == SessionState::Tracking {
            self.state = SessionState::Paused;
            info!("[TrackingSession] paused");
        }
    }

    /// Resume a paused session.
    pub fn resume(&mut self) {
        if self.state == SessionState::Paused {
            self.state = SessionState::Tracking;
            info!("[TrackingSession] resumed");
        }
    }

    /// Stop tracking and clear the path.
    pub fn stop(&mut self) {
        self.state = SessionState::Idle;
        self.path.clear();
        self.smoothed.clear();
        info!(
            "[TrackingSession] stopped ({:.0}m tracked)",
            self.distance_m()
        );
    }

    /// Record the step counter's running total (walk/run collaborator).
    pub fn record_steps(&mut self, total: u64) {
        if self.state != SessionState::Idle {
            self.steps = Some(total);
        }
    }

    /// Distance covered this session, in meters.
    ///
    /// For walk/run with a step counter available, distance is derived from
    /// steps and the mode's stride length, bypassing the speed gate. All
    /// other cases use the speed-gated GPS accumulator.
    pub fn distance_m(&self) -> f64 {
        if let Some(steps) = self.steps {
            if let Some(d) = filter::stride_distance_m(steps, self.mode) {
                return d;
            }
        }
        self.gps_distance_m
    }

    /// Feed one raw position sample through the pipeline.
    ///
    /// Returns a capture when this sample closed a loop. A session that is
    /// idle or paused ignores samples (quiescent, not an error): a missing
    /// or denied location source simply means this is never called.
    pub fn ingest(&mut self, sample: PositionSample) -> Option<LoopCapture> {
        if self.state != SessionState::Tracking {
            debug!("[TrackingSession] sample ignored while {:?}", self.state);
            return None;
        }

        if let Some(reason) = filter::check_sample(&self.path, &sample, &self.config.filter) {
            debug!("[TrackingSession] sample rejected: {:?}", reason);
            return None;
        }

        self.path.push(sample.point());
        self.smoothed = filter::smooth_path(&self.path, self.config.filter.smoothing_window);

        // Speed gate: implausible segments stay in the path for geometry but
        // never reach the distance accumulator.
        if self.smoothed.len() >= 2 {
            let prev = &self.smoothed[self.smoothed.len() - 2];
            let curr = &self.smoothed[self.smoothed.len() - 1];
            if !filter::exceeds_speed_gate(prev, curr, self.mode, &self.config.filter) {
                self.gps_distance_m += crate::geo_utils::haversine_distance(prev, curr);
            } else {
                debug!(
                    "[TrackingSession] segment speed-gated at {:.1} m/s",
                    filter::instantaneous_speed_mps(prev, curr)
                );
            }
        }

        let capture = loop_detect::detect_loop(&self.smoothed, &self.config.loops)?;

        // Keep the pre-loop prefix so tracking continues seamlessly.
        self.path.truncate(capture.closure_index + 1);
        self.smoothed = filter::smooth_path(&self.path, self.config.filter.smoothing_window);
        info!(
            "[TrackingSession] loop captured, path truncated to {} points",
            self.path.len()
        );

        Some(capture)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
