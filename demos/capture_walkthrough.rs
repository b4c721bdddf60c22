//! Walk a synthetic square loop through the full pipeline: ingest, capture,
//! claim, contest, and the decayed read view.
//!
//! Run with: cargo run --example capture_walkthrough

use territory_engine::{
    ActivityMode, CaptureEngine, MemoryBlobStore, PositionSample, SessionConfig,
};

/// Samples tracing a ~110m square near the given corner, 20s apart.
fn square_walk(lat0: f64, lng0: f64, t0: i64) -> Vec<PositionSample> {
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

    corners
        .into_iter()
        .enumerate()
        .map(|(i, (lat, lng))| {
            PositionSample::new(lat0 + lat, lng0 + lng, Some(5.0), t0 + i as i64 * 20_000)
        })
        .collect()
}

fn walk(engine: &mut CaptureEngine<MemoryBlobStore>, lat0: f64, lng0: f64, t0: i64) {
    for sample in square_walk(lat0, lng0, t0) {
        if let Some(result) = engine.ingest(sample) {
            if let Some(id) = &result.created {
                println!("   captured new territory {}", id);
            }
            for change in &result.changed {
                println!("   {} -> {:?}", change.territory_id, change.effect);
            }
        }
    }
}

fn main() {
    println!("Territory Capture Walkthrough\n");

    // Alice walks a square in a park (London-ish coordinates)
    let mut alice = CaptureEngine::new("alice", MemoryBlobStore::new(), SessionConfig::default());
    alice.start_session(ActivityMode::Walk, 0);

    println!("1. Alice walks a ~110m square:");
    walk(&mut alice, 51.5074, -0.1278, 0);
    println!("   distance tracked: {:.0}m\n", alice.distance_m());

    println!("2. Alice loops the same ground again (exclusive strengthen):");
    walk(&mut alice, 51.5074, -0.1278, 1_000_000);

    // Bob runs the same block on his own device; here we reuse the territory
    // collection to show the contest path.
    println!("\n3. Bob contests the same ground three times:");
    let snapshot = alice.territories().to_vec();
    let mut bob = CaptureEngine::new("bob", MemoryBlobStore::new(), SessionConfig::default());
    bob.apply_remote_snapshot(snapshot);
    bob.start_session(ActivityMode::Run, 2_000_000);
    for round in 0..3 {
        walk(&mut bob, 51.5074, -0.1278, 2_000_000 + round * 1_000_000);
    }

    println!("\nFinal territories (decayed view):");
    let now = 10_000_000;
    for territory in bob.territories_view(now) {
        println!("  {} ({:?}, {} vertices)", territory.id, territory.mode, territory.polygon.len());
        for owner in &territory.owners {
            println!("    {}: strength {:.2}", owner.owner_id, owner.strength);
        }
    }

    println!("\nPending uploads on Bob's device: {}", bob.pending_uploads().len());
}
