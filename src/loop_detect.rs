//! # Loop-Closure Detection
//!
//! Scans a smoothed path for self-closure and emits a captured polygon when
//! the closed portion is long enough and encloses enough area.
//!
//! ## Algorithm
//! 1. Only scan once the path has more than `min_loop_points` points
//! 2. Walk candidate start indices oldest-first; earlier indices are checked
//!    first, which biases toward longer loops
//! 3. Accept the first candidate whose point lies within the closure
//!    threshold of the path's last point AND whose cumulative distance to the
//!    end exceeds the minimum loop distance; stop scanning
//! 4. If the candidate sub-path encloses at least the minimum area, emit a
//!    capture; otherwise nothing is emitted and the path is left untouched
//!
//! At most one capture can result from a single scan. The caller truncates
//! the live path to `[0, closure_index]` on capture, retaining the pre-loop
//! prefix so tracking continues seamlessly.

use crate::{geo_utils, TrackPoint};
use log::{debug, info};

/// Configuration for loop-closure detection.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Distance to the last point under which a candidate closes the loop (meters)
    pub close_threshold_m: f64,
    /// Minimum cumulative path distance for an accepted loop (meters)
    pub min_loop_distance_m: f64,
    /// Minimum enclosed area for a capture (square meters)
    pub min_area_m2: f64,
    /// Minimum number of points a loop can span
    pub min_loop_points: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            close_threshold_m: 50.0,  // GPS noise band around the start point
            min_loop_distance_m: 20.0, // shorter closures are standing still
            min_area_m2: 30.0,        // smallest claimable patch
            min_loop_points: 10,
        }
    }
}

/// A captured loop: the enclosing polygon plus its metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCapture {
    /// The closed sub-path, from the closure index to the path's end.
    pub polygon: Vec<TrackPoint>,
    /// Enclosed area in square meters.
    pub area_m2: f64,
    /// Cumulative path distance around the loop in meters.
    pub distance_m: f64,
    /// Index into the scanned path where the loop closes. The live path
    /// should be truncated to `[0, closure_index]` inclusive.
    pub closure_index: usize,
}

/// Scan a smoothed path for a closed loop.
///
/// Returns `None` when the path is too short, no candidate closes, or the
/// closed portion encloses less than the minimum area.
pub fn detect_loop(path: &[TrackPoint], config: &LoopConfig) -> Option<LoopCapture> {
    if path.len() <= config.min_loop_points {
        return None;
    }

    let last = path.last()?;

    // Oldest-first scan: the first index that closes wins.
    let mut accepted: Option<(usize, f64)> = None;
    for i in 0..=path.len() - config.min_loop_points {
        if geo_utils::haversine_distance(&path[i], last) < config.close_threshold_m {
            let loop_distance = geo_utils::path_length(&path[i..]);
            if loop_distance > config.min_loop_distance_m {
                accepted = Some((i, loop_distance));
                break;
            }
        }
    }

    let (closure_index, distance_m) = accepted?;
    let polygon = path[closure_index..].to_vec();
    let area_m2 = geo_utils::polygon_area_m2(&polygon);

    if area_m2 < config.min_area_m2 {
        debug!(
            "[LoopDetector] closure at {} rejected: area {:.1}m2 below minimum",
            closure_index, area_m2
        );
        return None;
    }

    info!(
        "[LoopDetector] captured loop: {} points, {:.0}m around, {:.0}m2 enclosed",
        polygon.len(),
        distance_m,
        area_m2
    );

    Some(LoopCapture { polygon, area_m2, distance_m, closure_index })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_point(lat: f64, lng: f64) -> TrackPoint {
        TrackPoint::new(lat, lng, 0)
    }

    /// Walk ~33m east, ~11m north, back west, and return to within ~5m of
    /// the start. 13 points, ~90m around, ~360m2 enclosed.
    fn closing_loop() -> Vec<TrackPoint> {
        let mut path = Vec::new();
        for i in 0..6 {
            path.push(make_point(0.0, i as f64 * 0.00006));
        }
        path.push(make_point(0.0001, 0.00030));
        for i in (0..6).rev() {
            path.push(make_point(0.0001, i as f64 * 0.00006));
        }
        path.push(make_point(0.00004, 0.0));
        path
    }

    #[test]
    fn test_short_path_never_scans() {
        let path: Vec<TrackPoint> = (0..10).map(|i| make_point(i as f64 * 0.0001, 0.0)).collect();
        assert!(detect_loop(&path, &LoopConfig::default()).is_none());
    }

    #[test]
    fn test_closed_loop_is_captured() {
        let path = closing_loop();
        let capture = detect_loop(&path, &LoopConfig::default()).expect("loop should capture");

        assert_eq!(capture.closure_index, 0);
        assert_eq!(capture.polygon.len(), path.len());
        assert!(capture.distance_m > 20.0);
        assert!(capture.area_m2 > 30.0, "got {}", capture.area_m2);
    }

    #[test]
    fn test_out_and_back_encloses_nothing() {
        // Straight out ~40m and straight back on the same line: closes, but
        // encloses no area.
        let mut path = Vec::new();
        for i in 0..7 {
            path.push(make_point(0.0, i as f64 * 0.00006));
        }
        for i in (0..6).rev() {
            path.push(make_point(0.0, i as f64 * 0.00006));
        }
        assert!(path.len() > 10);
        assert!(detect_loop(&path, &LoopConfig::default()).is_none());
    }

    #[test]
    fn test_standing_still_is_not_a_loop() {
        // Jitter within a couple of meters: every point closes, but the
        // cumulative distance never clears the minimum.
        let path: Vec<TrackPoint> = (0..15)
            .map(|i| make_point(if i % 2 == 0 { 0.0 } else { 0.00001 }, 0.0))
            .collect();
        assert!(detect_loop(&path, &LoopConfig::default()).is_none());
    }

    #[test]
    fn test_oldest_candidate_wins() {
        // Both index 0 and index 1 are within the closure threshold of the
        // last point; the scan must pick index 0 (the longer loop).
        let path = closing_loop();
        let capture = detect_loop(&path, &LoopConfig::default()).unwrap();
        assert_eq!(capture.closure_index, 0);
    }

    #[test]
    fn test_capture_keeps_polygon_intact() {
        let path = closing_loop();
        let capture = detect_loop(&path, &LoopConfig::default()).unwrap();
        assert_eq!(capture.polygon.first(), path.first());
        assert_eq!(capture.polygon.last(), path.last());
    }
}
