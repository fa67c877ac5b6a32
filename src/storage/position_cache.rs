// Last known fleet positions
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A point in fleet coordinate units (map tiles times `TILE_SCALE`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x) as f64).hypot((self.y - other.y) as f64)
    }
}

/// Local, optimistic cache written whenever a move is issued. The server
/// is never re-queried after a move, so entries can drift from the real
/// position until the next move overwrites them.
#[derive(Debug, Clone)]
pub struct PositionCache {
    home: Position,
    positions: Arc<Mutex<HashMap<String, Position>>>,
}

impl PositionCache {
    pub fn new(home: Position) -> Self {
        Self {
            home,
            positions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn home(&self) -> Position {
        self.home
    }

    /// Cached position, or the home base for fleets never moved
    pub fn get(&self, fleet_id: &str) -> Position {
        self.lookup(fleet_id).unwrap_or(self.home)
    }

    /// Cached position only, `None` if this fleet was never moved
    pub fn lookup(&self, fleet_id: &str) -> Option<Position> {
        let positions = self.positions.lock().unwrap_or_else(|p| p.into_inner());
        positions.get(fleet_id).copied()
    }

    pub fn update(&self, fleet_id: &str, position: Position) {
        let mut positions = self.positions.lock().unwrap_or_else(|p| p.into_inner());
        positions.insert(fleet_id.to_string(), position);
    }
}
