//! # Path Filtering and Smoothing
//!
//! Turns a noisy GPS sample stream into a stable path:
//! 1. Reject samples with poor reported accuracy (never reach the path)
//! 2. Reject implausible jumps from the path's last point (GPS glitches)
//! 3. Smooth the accepted path with a centered moving-average window
//! 4. Gate implausible speeds out of the distance accumulator
//!
//! Smoothing is recomputed over the entire path on every new point. That is
//! acceptable here because paths are bounded by session length and loop
//! capture truncates them.

use crate::{geo_utils, ActivityMode, PositionSample, TrackPoint};

/// Configuration for sample admission and smoothing.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Maximum reported horizontal accuracy to accept (meters)
    pub max_accuracy_m: f64,
    /// Maximum plausible distance from the previous point (meters)
    pub max_jump_m: f64,
    /// Moving-average window size, clamped to [2, 5]
    pub smoothing_window: usize,
    /// Multiplier on the mode's max speed before a point is speed-gated
    pub speed_gate_factor: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_accuracy_m: 50.0,   // anything coarser is not a usable fix
            max_jump_m: 100.0,      // a 100m step between samples is a glitch
            smoothing_window: 3,    // one neighbor each side
            speed_gate_factor: 1.5, // headroom over the mode's max speed
        }
    }
}

/// Why a raw sample was refused admission to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Reported horizontal accuracy exceeded the threshold.
    LowAccuracy,
    /// Distance from the path's last point exceeded the jump threshold.
    ImplausibleJump,
    /// Coordinates were out of range or non-finite.
    InvalidCoordinates,
}

/// Decide whether a raw sample may be appended to the path.
///
/// Applies the accuracy filter and, when the path already has a last point,
/// the jump filter. Returns `None` when the sample is admissible.
pub fn check_sample(
    path: &[TrackPoint],
    sample: &PositionSample,
    config: &FilterConfig,
) -> Option<RejectReason> {
    if !sample.point().is_valid() {
        return Some(RejectReason::InvalidCoordinates);
    }

    if let Some(accuracy) = sample.accuracy_m {
        if accuracy > config.max_accuracy_m {
            return Some(RejectReason::LowAccuracy);
        }
    }

    if let Some(last) = path.last() {
        if geo_utils::haversine_distance(last, &sample.point()) > config.max_jump_m {
            return Some(RejectReason::ImplausibleJump);
        }
    }

    None
}

/// Smooth a path with a centered moving-average window.
///
/// Each output point's latitude, longitude, and timestamp are the arithmetic
/// mean of a window of up to `window / 2` neighbors on each side, clamped at
/// the path boundaries (so windows are asymmetric at the ends). The window
/// size is clamped to [2, 5]. Paths of length <= 2 are returned unchanged.
///
/// Smoothing preserves path length: indices into the smoothed path line up
/// with indices into the input path.
pub fn smooth_path(path: &[TrackPoint], window: usize) -> Vec<TrackPoint> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let window = window.clamp(2, 5);
    let half = window / 2;

    (0..path.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half).min(path.len() - 1);
            let count = (end - start + 1) as f64;

            let mut lat = 0.0;
            let mut lng = 0.0;
            let mut ts = 0.0;
            for p in &path[start..=end] {
                lat += p.latitude;
                lng += p.longitude;
                ts += p.timestamp as f64;
            }

            TrackPoint::new(lat / count, lng / count, (ts / count) as i64)
        })
        .collect()
}

/// Instantaneous speed between two consecutive smoothed points, in m/s.
///
/// Elapsed time is floored at one second so near-simultaneous samples do not
/// blow the division up.
pub fn instantaneous_speed_mps(prev: &TrackPoint, curr: &TrackPoint) -> f64 {
    let elapsed_s = ((curr.timestamp - prev.timestamp) as f64 / 1000.0).max(1.0);
    geo_utils::haversine_distance(prev, curr) / elapsed_s
}

/// Check whether a segment's speed exceeds the gate for the given mode.
///
/// Gated points are excluded from the distance accumulator but remain in the
/// path for geometry purposes.
pub fn exceeds_speed_gate(
    prev: &TrackPoint,
    curr: &TrackPoint,
    mode: ActivityMode,
    config: &FilterConfig,
) -> bool {
    instantaneous_speed_mps(prev, curr) > config.speed_gate_factor * mode.max_speed_mps()
}

/// Distance in meters derived from a step-counter total.
///
/// For walk/run modes this substitutes for GPS distance when a step-counting
/// collaborator is available, bypassing the speed gate entirely. Returns
/// `None` for modes without a stride constant.
pub fn stride_distance_m(steps: u64, mode: ActivityMode) -> Option<f64> {
    mode.stride_m().map(|stride| steps as f64 * stride)
}

// =============================================================================
// Unit Tests
// =============================================================================
