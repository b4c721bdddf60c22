//! # Geographic Utilities
//!
//! Core geographic computation utilities for GPS path analysis.
//!
//! This module provides the fundamental geographic operations used throughout
//! the territory engine. All functions are pure and total: degenerate input
//! (too few points, zero span) degrades to a zero/empty result rather than
//! an error.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`path_length`] | Total length of a GPS path in meters |
//! | [`project_local`] | Equirectangular projection to local planar meters |
//! | [`polygon_area_m2`] | Enclosed area of an implicitly-closed polygon |
//! | [`compute_bounds`] | Bounding box of a GPS path |
//! | [`bounds_overlap`] | Check if two bounding boxes intersect |
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! The haversine formula calculates the great-circle distance between two
//! points on a sphere (radius ~6,371 km). It is the standard method for GPS
//! distance calculation, accurate to within 0.3% for practical use.
//!
//! ### Local Projection and Area
//!
//! Area computation projects all vertices onto a local plane with an
//! equirectangular projection (WGS-84 semi-major radius, 6,378,137 m, with a
//! `cos(origin_lat)` longitude correction) and applies the shoelace formula.
//! The projection constant intentionally differs from the haversine radius;
//! for polygons spanning well under a kilometer the error is negligible.
//! Projected coordinates are only ever compared within one origin.
//!
//! ### Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees),
//! which is the standard used by GPS receivers and mapping services.

use crate::{Bounds, TrackPoint};
use geo::{Distance, Haversine, Point};

/// WGS-84 semi-major axis in meters, used for the local planar projection.
const WGS84_SEMI_MAJOR_M: f64 = 6_378_137.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the
/// Haversine formula.
///
/// Returns the distance in meters along the Earth's surface. Total for valid
/// coordinates: always finite, zero for identical points, and symmetric in
/// its arguments.
///
/// # Example
///
/// ```rust
/// use territory_engine::{geo_utils, TrackPoint};
///
/// let london = TrackPoint::new(51.5074, -0.1278, 0);
/// let paris = TrackPoint::new(48.8566, 2.3522, 0);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a GPS path in meters.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point paths return 0.0.
pub fn path_length(points: &[TrackPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Projection and Area
// =============================================================================

/// Project a GPS point to local planar (x, y) coordinates in meters.
///
/// Equirectangular projection around `origin_lat`: longitude is scaled by
/// `cos(origin_lat)` so east-west meters stay honest away from the equator.
/// The output is only meaningful relative to other points projected with the
/// same origin latitude.
///
/// # Arguments
///
/// * `origin_lat` - Reference latitude for the longitude scale correction
/// * `point` - The point to project
///
/// # Returns
///
/// `(x, y)` in meters: x along longitude, y along latitude.
#[inline]
pub fn project_local(origin_lat: f64, point: &TrackPoint) -> (f64, f64) {
    let x = point.longitude.to_radians() * WGS84_SEMI_MAJOR_M * origin_lat.to_radians().cos();
    let y = point.latitude.to_radians() * WGS84_SEMI_MAJOR_M;
    (x, y)
}

/// Compute the enclosed area of a polygon in square meters.
///
/// The polygon is implicitly closed: the last vertex connects back to the
/// first, and the first and last vertices are not required to be identical.
/// All vertices are projected to a local plane using the first vertex's
/// latitude as origin, then the shoelace formula is applied.
///
/// Returns 0.0 for polygons with fewer than 3 vertices and for degenerate
/// input producing non-finite projections. The result is always >= 0:
/// winding direction is irrelevant.
///
/// # Example
///
/// ```rust
/// use territory_engine::{geo_utils, TrackPoint};
///
/// // A ~111m x ~111m square at the equator
/// let square = vec![
///     TrackPoint::new(0.0, 0.0, 0),
///     TrackPoint::new(0.0, 0.001, 0),
///     TrackPoint::new(0.001, 0.001, 0),
///     TrackPoint::new(0.001, 0.0, 0),
/// ];
///
/// let area = geo_utils::polygon_area_m2(&square);
/// assert!((area - 12_321.0).abs() / 12_321.0 < 0.05);
/// ```
pub fn polygon_area_m2(polygon: &[TrackPoint]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let origin_lat = polygon[0].latitude;
    let projected: Vec<(f64, f64)> = polygon
        .iter()
        .map(|p| project_local(origin_lat, p))
        .collect();

    let mut twice_area = 0.0;
    for i in 0..projected.len() {
        let (x1, y1) = projected[i];
        let (x2, y2) = projected[(i + 1) % projected.len()];
        twice_area += x1 * y2 - x2 * y1;
    }

    let area = twice_area.abs() / 2.0;
    if area.is_finite() {
        area
    } else {
        0.0
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS path.
///
/// Returns a [`Bounds`] struct containing the minimum and maximum
/// latitude/longitude values that enclose all points. Returns `None` for
/// empty input.
pub fn compute_bounds(points: &[TrackPoint]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Check if two bounding boxes overlap.
///
/// Standard AABB intersection test. This is a cheap, deliberately
/// conservative proxy for polygon intersection: false positives (boxes
/// overlap but the polygons don't) are tolerated, false negatives are not.
///
/// # Example
///
/// ```rust
/// use territory_engine::{geo_utils, Bounds};
///
/// let a = Bounds { min_lat: 51.50, max_lat: 51.52, min_lng: -0.13, max_lng: -0.11 };
/// let b = Bounds { min_lat: 51.51, max_lat: 51.53, min_lng: -0.12, max_lng: -0.10 };
///
/// assert!(geo_utils::bounds_overlap(&a, &b));
/// ```
pub fn bounds_overlap(a: &Bounds, b: &Bounds) -> bool {
    !(a.max_lat < b.min_lat
        || a.min_lat > b.max_lat
        || a.max_lng < b.min_lng
        || a.min_lng > b.max_lng)
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

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = make_point(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let a = make_point(51.5074, -0.1278);
        let b = make_point(48.8566, 2.3522);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // 0.01 degrees of latitude at the equator is ~1113m
        let a = make_point(0.0, 0.0);
        let b = make_point(0.01, 0.0);
        let dist = haversine_distance(&a, &b);
        assert!(approx_eq(dist, 1113.0, 1113.0 * 0.05), "got {}", dist);
    }

    #[test]
    fn test_path_length_empty_and_single() {
        assert_eq!(path_length(&[]), 0.0);
        assert_eq!(path_length(&[make_point(51.5, -0.12)]), 0.0);
    }

    #[test]
    fn test_path_length_two_points() {
        let path = vec![make_point(51.5074, -0.1278), make_point(51.5080, -0.1280)];
        let length = path_length(&path);
        assert!(length > 0.0);
        assert!(length < 100.0); // Should be about 68m
    }

    #[test]
    fn test_project_local_longitude_scaling() {
        let p = make_point(60.0, 0.001);
        let (x_equator, _) = project_local(0.0, &p);
        let (x_north, _) = project_local(60.0, &p);
        // cos(60 deg) = 0.5: east-west meters halve at 60N
        assert!(approx_eq(x_north / x_equator, 0.5, 0.001));
    }

    #[test]
    fn test_polygon_area_square() {
        let square = vec![
            make_point(0.0, 0.0),
            make_point(0.0, 0.001),
            make_point(0.001, 0.001),
            make_point(0.001, 0.0),
        ];
        let area = polygon_area_m2(&square);
        // ~111m x ~111m
        assert!(approx_eq(area, 12_321.0, 12_321.0 * 0.05), "got {}", area);
    }

    #[test]
    fn test_polygon_area_winding_independent() {
        let square = vec![
            make_point(0.0, 0.0),
            make_point(0.0, 0.001),
            make_point(0.001, 0.001),
            make_point(0.001, 0.0),
        ];
        let reversed: Vec<TrackPoint> = square.iter().rev().copied().collect();
        assert_eq!(polygon_area_m2(&square), polygon_area_m2(&reversed));
    }

    #[test]
    fn test_polygon_area_degenerate() {
        assert_eq!(polygon_area_m2(&[]), 0.0);
        assert_eq!(polygon_area_m2(&[make_point(0.0, 0.0)]), 0.0);
        assert_eq!(
            polygon_area_m2(&[make_point(0.0, 0.0), make_point(0.001, 0.0)]),
            0.0
        );
        // Collinear points enclose nothing
        let line = vec![
            make_point(0.0, 0.0),
            make_point(0.001, 0.0),
            make_point(0.002, 0.0),
        ];
        assert!(polygon_area_m2(&line) < 1.0);
    }

    #[test]
    fn test_bounds_overlap_yes() {
        let a = Bounds { min_lat: 51.50, max_lat: 51.52, min_lng: -0.13, max_lng: -0.11 };
        let b = Bounds { min_lat: 51.51, max_lat: 51.53, min_lng: -0.12, max_lng: -0.10 };
        assert!(bounds_overlap(&a, &b));
        assert!(bounds_overlap(&b, &a));
    }

    #[test]
    fn test_bounds_overlap_no() {
        let a = Bounds { min_lat: 51.50, max_lat: 51.51, min_lng: -0.13, max_lng: -0.12 };
        let b = Bounds { min_lat: 51.52, max_lat: 51.53, min_lng: -0.11, max_lng: -0.10 };
        assert!(!bounds_overlap(&a, &b));
    }

    #[test]
    fn test_bounds_overlap_touching_edges() {
        // Shared edge counts as overlapping (conservative)
        let a = Bounds { min_lat: 51.50, max_lat: 51.51, min_lng: -0.13, max_lng: -0.12 };
        let b = Bounds { min_lat: 51.51, max_lat: 51.52, min_lng: -0.13, max_lng: -0.12 };
        assert!(bounds_overlap(&a, &b));
    }
}
