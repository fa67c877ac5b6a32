// Map targeting - distance ranking, exclusive claims and approach sectors

use crate::models::Bookmark;
use crate::storage::{ClaimRegistry, Position, PositionCache};
use std::time::Duration;

/// Map tile coordinates times this factor give fleet coordinates
pub const TILE_SCALE: i64 = 100;

/// Clock positions in selection order; raw offsets before normalization.
/// The map is isometric, so 12 o'clock points up-left in map coordinates.
const CLOCK_OFFSETS: [(u8, f64, f64); 12] = [
    (12, -1.0, -1.0),
    (1, -0.33, -1.0),
    (2, 0.33, -1.0),
    (3, 1.0, -1.0),
    (4, 1.0, -0.33),
    (5, 1.0, 0.33),
    (6, 1.0, 1.0),
    (7, 0.33, 1.0),
    (8, -0.33, 1.0),
    (9, -1.0, 1.0),
    (10, -1.0, 0.33),
    (11, -1.0, -0.33),
];

/// One of the twelve approach directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockSector(u8);

impl ClockSector {
    pub const TWELVE: ClockSector = ClockSector(12);

    pub fn new(hour: u8) -> Option<Self> {
        (1..=12).contains(&hour).then_some(ClockSector(hour))
    }

    pub fn hour(&self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = ClockSector> {
        CLOCK_OFFSETS.iter().map(|(hour, _, _)| ClockSector(*hour))
    }

    /// Pre-normalized direction for this sector
    pub fn unit_vector(&self) -> (f64, f64) {
        let (_, cx, cy) = CLOCK_OFFSETS
            .iter()
            .find(|(hour, _, _)| *hour == self.0)
            .copied()
            .unwrap_or(CLOCK_OFFSETS[0]);
        let magnitude = cx.hypot(cy);
        (cx / magnitude, cy / magnitude)
    }

    /// Point `radius` units away from `center` in this sector's direction
    pub fn offset(&self, center: Position, radius: f64) -> Position {
        let (ux, uy) = self.unit_vector();
        Position::new(
            center.x + (ux * radius).ceil() as i64,
            center.y + (uy * radius).ceil() as i64,
        )
    }
}

/// A candidate ranked for one particular fleet
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCandidate {
    pub tile_x: i64,
    pub tile_y: i64,
    pub distance: f64,
    pub id: String,
}

impl TargetCandidate {
    pub fn position(&self) -> Position {
        tile_to_fleet_units(self.tile_x, self.tile_y)
    }
}

pub fn tile_to_fleet_units(tile_x: i64, tile_y: i64) -> Position {
    Position::new(tile_x * TILE_SCALE, tile_y * TILE_SCALE)
}

/// Estimated seconds to travel `distance` at `map_speed`. Only an estimate:
/// the server's own travel time can differ, callers verify afterwards.
pub fn travel_time(distance: f64, map_speed: f64) -> Duration {
    Duration::from_secs_f64((distance / (map_speed * 4.0)).max(0.0))
}

/// Filter by distance (inclusive) and level, nearest first.
/// `None` means nothing usable; callers back off and retry.
pub fn rank_targets(
    bookmarks: &[Bookmark],
    fleet_position: Position,
    level: Option<i64>,
    max_distance: f64,
) -> Option<Vec<TargetCandidate>> {
    let mut targets: Vec<TargetCandidate> = bookmarks
        .iter()
        .filter(|b| level.is_none() || b.level == level)
        .filter_map(|b| {
            let distance = fleet_position.distance_to(tile_to_fleet_units(b.x, b.y));
            if distance > max_distance {
                return None;
            }
            Some(TargetCandidate {
                tile_x: b.x,
                tile_y: b.y,
                distance,
                id: b.id.clone(),
            })
        })
        .collect();

    if targets.is_empty() {
        return None;
    }

    targets.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    Some(targets)
}

/// Sector whose direction best matches the vector from target to fleet.
/// First maximum in table order wins; a fleet sitting on the target gets 12.
pub fn approach_heading(fleet_position: Position, target: Position) -> ClockSector {
    let dx = (fleet_position.x - target.x) as f64;
    let dy = (fleet_position.y - target.y) as f64;
    let magnitude = dx.hypot(dy);
    if magnitude < 1e-6 {
        return ClockSector::TWELVE;
    }

    let (ux, uy) = (dx / magnitude, dy / magnitude);
    let mut best = ClockSector::TWELVE;
    let mut best_dot = -1.0;
    for sector in ClockSector::all() {
        let (cx, cy) = sector.unit_vector();
        let dot = ux * cx + uy * cy;
        if dot > best_dot {
            best_dot = dot;
            best = sector;
        }
    }
    best
}

/// Per-process targeting state shared by every hunting fleet
#[derive(Debug, Clone)]
pub struct Targeting {
    positions: PositionCache,
    claims: ClaimRegistry<String>,
}

impl Targeting {
    pub fn new(positions: PositionCache) -> Self {
        Self {
            positions,
            claims: ClaimRegistry::new(),
        }
    }

    pub fn positions(&self) -> &PositionCache {
        &self.positions
    }

    pub fn distance(&self, fleet_id: &str, target: Position) -> f64 {
        self.positions.get(fleet_id).distance_to(target)
    }

    pub fn rank_targets(
        &self,
        bookmarks: &[Bookmark],
        fleet_id: &str,
        level: Option<i64>,
        max_distance: f64,
    ) -> Option<Vec<TargetCandidate>> {
        rank_targets(bookmarks, self.positions.get(fleet_id), level, max_distance)
    }

    pub fn claim_target(&self, target_id: &str) -> bool {
        self.claims.claim(&target_id.to_string())
    }

    pub fn release_target(&self, target_id: &str) {
        self.claims.release(&target_id.to_string());
    }

    /// Nearest candidate this fleet could claim
    pub fn pick_target(&self, candidates: &[TargetCandidate]) -> Option<TargetCandidate> {
        candidates.iter().find(|t| self.claim_target(&t.id)).cloned()
    }

    pub fn approach_heading(&self, fleet_id: &str, target: Position) -> ClockSector {
        approach_heading(self.positions.get(fleet_id), target)
    }
}
