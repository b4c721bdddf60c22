//! # Strength Decay
//!
//! Read-time exponential decay of owner strength. Decay is a pure view
//! transform: stored strengths are never mutated and territories are never
//! removed, so the projection is consistent no matter when it is evaluated
//! and nothing about it needs to be persisted or migrated.

use crate::Territory;

/// Fraction of strength lost per day.
const DAILY_DECAY_RATE: f64 = 0.02;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Decay factor for a territory created at `created_at`, evaluated at `now_ms`.
///
/// `0.98^days`, with elapsed days floored at zero so clock skew between
/// devices never inflates strength.
///
/// # Example
///
/// ```rust
/// use territory_engine::decay_factor;
///
/// let now = 1_700_000_000_000_i64;
/// assert_eq!(decay_factor(now, now), 1.0);
///
/// let thirty_five_days = 35 * 86_400_000;
/// let factor = decay_factor(now - thirty_five_days, now);
/// assert!((factor - 0.4902).abs() < 0.005); // 0.98^35
/// ```
pub fn decay_factor(created_at: i64, now_ms: i64) -> f64 {
    let days = ((now_ms - created_at) as f64 / MS_PER_DAY).max(0.0);
    (1.0 - DAILY_DECAY_RATE).powf(days)
}

/// Project one territory for display: every owner's strength scaled by the
/// territory's decay factor. The input is untouched.
pub fn project_territory(territory: &Territory, now_ms: i64) -> Territory {
    let factor = decay_factor(territory.created_at, now_ms);
    let mut projected = territory.clone();
    for owner in &mut projected.owners {
        owner.strength *= factor;
    }
    projected
}

/// Project a collection of territories for display.
pub fn project_territories(territories: &[Territory], now_ms: i64) -> Vec<Territory> {
    territories
        .iter()
        .map(|t| project_territory(t, now_ms))
        .collect()
}

/// Parallel projection for large territory sets.
#[cfg(feature = "parallel")]
pub fn project_territories_parallel(territories: &[Territory], now_ms: i64) -> Vec<Territory> {
    use rayon::prelude::*;

    territories
        .par_iter()
        .map(|t| project_territory(t, now_ms))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
