//! # Ownership Arbitration
//!
//! Decides what a newly captured polygon does to the territory collection:
//! create a new territory, strengthen the claimant's existing hold, enter a
//! contest, or claim the territory over entirely.
//!
//! ## Conflict model
//!
//! A lightweight "majority strength wins" scheme favoring incumbents:
//! exclusive owners gain slowly (+0.2 per capture) while challengers gain
//! fast (+0.5), but a challenger must exceed the combined strength of all
//! current claimants before eviction. Single incursions therefore never flip
//! a territory.
//!
//! Overlap is tested on bounding boxes only (see [`crate::geo_utils::bounds_overlap`]):
//! two territories with overlapping boxes but disjoint polygons still
//! arbitrate. The conservatism is intentional and relied upon.
//!
//! Strength is clamped to `[0.0, 2.0]` at every mutation point, including
//! the contest increment; the claim-over comparison runs against the clamped
//! value.

use crate::{geo_utils, ActivityMode, Bounds, LoopCapture, Owner, Territory};
use log::{debug, info};
use rstar::{RTree, RTreeObject, AABB};

/// Strength granted by the capture that creates or takes over a territory.
const INITIAL_STRENGTH: f64 = 1.0;
/// Increment for re-capturing a territory held exclusively.
const EXCLUSIVE_STRENGTHEN: f64 = 0.2;
/// Strength granted to a challenger entering a contest.
const CONTEST_ENTRY_STRENGTH: f64 = 0.5;
/// Increment for a challenger's repeat capture while contesting.
const CONTEST_STRENGTHEN: f64 = 0.5;
/// Hard cap on any stored strength value.
const STRENGTH_CAP: f64 = 2.0;
/// A challenger needs at least this much strength before claim-over.
const CLAIM_OVER_MIN_STRENGTH: f64 = 1.0;

#[inline]
fn clamp_strength(strength: f64) -> f64 {
    strength.clamp(0.0, STRENGTH_CAP)
}

/// Bounding box wrapper for R-tree spatial indexing of territories.
#[derive(Debug, Clone)]
struct TerritoryBoundsEntry {
    territory_id: String,
    bounds: Bounds,
}

impl RTreeObject for TerritoryBoundsEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// What a claim did to one overlapped territory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimEffect {
    /// The claimant already held it exclusively; strength increased.
    Strengthened,
    /// The claimant entered as a challenger; the territory is now contested.
    Contested,
    /// The claimant was already contesting; strength increased but the
    /// incumbents still hold.
    Reinforced,
    /// The claimant's strength overcame the combined incumbents; all other
    /// owners were evicted.
    ClaimedOver,
}

/// A mutation applied to an existing territory during arbitration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimChange {
    pub territory_id: String,
    pub effect: ClaimEffect,
}

/// The outcome of arbitrating one captured polygon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClaimResult {
    /// Id of the territory created, when no existing territory overlapped.
    pub created: Option<String>,
    /// Existing territories mutated by this claim, queued for durable write.
    pub changed: Vec<ClaimChange>,
}

impl ClaimResult {
    /// True if the claim had any effect on the collection.
    pub fn touched(&self) -> bool {
        self.created.is_some() || !self.changed.is_empty()
    }

    /// Ids of every territory this claim created or mutated.
    pub fn touched_ids(&self) -> Vec<&str> {
        self.created
            .iter()
            .map(String::as_str)
            .chain(self.changed.iter().map(|c| c.territory_id.as_str()))
            .collect()
    }
}

/// The local territory collection with its spatial index.
///
/// Single-writer: all mutation goes through [`TerritorySet::resolve_claim`]
/// and [`TerritorySet::replace_all`]. The R-tree over territory bounds is
/// rebuilt whenever the collection changes.
#[derive(Debug, Default)]
pub struct TerritorySet {
    territories: Vec<Territory>,
    index: RTree<TerritoryBoundsEntry>,
    next_seq: u64,
}

impl TerritorySet {
    /// Create an empty territory set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from existing territories (e.g. loaded from storage).
    pub fn from_territories(territories: Vec<Territory>) -> Self {
        let mut set = Self { territories, index: RTree::new(), next_seq: 0 };
        set.rebuild_index();
        set
    }

    /// All territories, in collection order.
    pub fn territories(&self) -> &[Territory] {
        &self.territories
    }

    /// Look up a territory by id.
    pub fn get(&self, id: &str) -> Option<&Territory> {
        self.territories.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    /// Replace the whole collection with a remote snapshot.
    ///
    /// Inbound snapshots are authoritative: local territories not yet
    /// confirmed remotely are dropped, not merged (last-writer-wins).
    /// Territories are ordered by creation time descending, newest first.
    pub fn replace_all(&mut self, mut territories: Vec<Territory>) {
        territories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.territories = territories;
        self.rebuild_index();
        debug!("[TerritorySet] replaced with {} territories", self.territories.len());
    }

    /// Arbitrate a captured polygon for `owner_id`.
    ///
    /// Every existing territory whose bounding box overlaps the capture's is
    /// mutated according to the conflict model. If none overlap, a new
    /// territory is inserted with the claimant as sole owner at strength 1.0.
    /// If any overlap, the mutations substitute for creation: a loop over
    /// already-claimed ground never spawns a competing territory.
    pub fn resolve_claim(
        &mut self,
        owner_id: &str,
        capture: &LoopCapture,
        mode: ActivityMode,
        now_ms: i64,
    ) -> ClaimResult {
        let bounds = match Bounds::from_points(&capture.polygon) {
            Some(b) => b,
            None => return ClaimResult::default(),
        };

        let envelope = AABB::from_corners(
            [bounds.min_lng, bounds.min_lat],
            [bounds.max_lng, bounds.max_lat],
        );

        let overlapping: Vec<String> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .filter(|e| geo_utils::bounds_overlap(&e.bounds, &bounds))
            .map(|e| e.territory_id.clone())
            .collect();

        let mut changed = Vec::new();
        for id in &overlapping {
            if let Some(territory) = self.territories.iter_mut().find(|t| &t.id == id) {
                let effect = apply_claim(territory, owner_id);
                info!(
                    "[TerritorySet] {} on {}: {:?}",
                    owner_id, territory.id, effect
                );
                changed.push(ClaimChange { territory_id: id.clone(), effect });
            }
        }

        if !changed.is_empty() {
            return ClaimResult { created: None, changed };
        }

        // Virgin ground: insert the capture as a new territory.
        let id = self.next_id(now_ms);
        match Territory::new(
            id.clone(),
            mode,
            capture.polygon.clone(),
            now_ms,
            vec![Owner::new(owner_id, INITIAL_STRENGTH)],
        ) {
            Some(territory) => {
                info!(
                    "[TerritorySet] {} created {} ({:.0}m2)",
                    owner_id, id, capture.area_m2
                );
                self.territories.push(territory);
                self.rebuild_index();
                ClaimResult { created: Some(id), changed }
            }
            None => {
                debug!("[TerritorySet] capture polygon degenerate, nothing created");
                ClaimResult::default()
            }
        }
    }

    fn next_id(&mut self, now_ms: i64) -> String {
        self.next_seq += 1;
        format!("territory-{:x}-{:x}", now_ms, self.next_seq)
    }

    fn rebuild_index(&mut self) {
        let entries: Vec<TerritoryBoundsEntry> = self
            .territories
            .iter()
            .filter_map(|t| {
                t.bounds().map(|bounds| TerritoryBoundsEntry {
                    territory_id: t.id.clone(),
                    bounds,
                })
            })
            .collect();
        self.index = RTree::bulk_load(entries);
    }
}

/// Apply one claim to one overlapped territory.
fn apply_claim(territory: &mut Territory, owner_id: &str) -> ClaimEffect {
    let mine = territory.owners.iter().position(|o| o.owner_id == owner_id);
    let others_strength: f64 = territory
        .owners
        .iter()
        .filter(|o| o.owner_id != owner_id)
        .map(|o| o.strength)
        .sum();
    let has_others = territory.owners.iter().any(|o| o.owner_id != owner_id);

    match (mine, has_others) {
        // Exclusive hold: slow reinforcement.
        (Some(i), false) => {
            territory.owners[i].strength =
                clamp_strength(territory.owners[i].strength + EXCLUSIVE_STRENGTHEN);
            ClaimEffect::Strengthened
        }
        // New challenger: the territory becomes contested.
        (None, true) => {
            territory
                .owners
                .push(Owner::new(owner_id, CONTEST_ENTRY_STRENGTH));
            ClaimEffect::Contested
        }
        // Repeat challenger: fast gain, eviction once past the incumbents.
        (Some(i), true) => {
            let strength = clamp_strength(territory.owners[i].strength + CONTEST_STRENGTHEN);
            territory.owners[i].strength = strength;
            if strength >= CLAIM_OVER_MIN_STRENGTH && strength > others_strength {
                territory.owners = vec![Owner::new(owner_id, INITIAL_STRENGTH)];
                ClaimEffect::ClaimedOver
            } else {
                ClaimEffect::Reinforced
            }
        }
        // Unowned record (possible in remote data): take it outright.
        (None, false) => {
            territory.owners.push(Owner::new(owner_id, INITIAL_STRENGTH));
            ClaimEffect::Strengthened
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
