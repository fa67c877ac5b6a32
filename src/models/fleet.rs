use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::lenient;

#[derive(Debug, Deserialize, Clone)]
pub struct FleetsResponse {
    #[serde(default)]
    pub fleets: Vec<Fleet>,
}

impl FleetsResponse {
    pub fn find(&self, fleet_id: &str) -> Option<&Fleet> {
        self.fleets.iter().find(|f| f.id == fleet_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Fleet {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_on_map: bool,
    #[serde(rename = "mapId", default, deserialize_with = "lenient::opt_string")]
    pub map_id: Option<String>,
    #[serde(default)]
    pub ships: Vec<FleetShip>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FleetShip {
    pub actives: ShipActives,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShipActives {
    /// Slot position inside the fleet
    #[serde(deserialize_with = "lenient::string")]
    pub fltp: String,
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ManifestSlot {
    pub id: i64,
    pub dock: String,
}

/// Ship instance ids by slot, as the dock endpoints expect them
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ShipManifest {
    pub ships: BTreeMap<String, ManifestSlot>,
}

impl ShipManifest {
    pub fn from_fleet(fleet: &Fleet) -> Self {
        let ships = fleet
            .ships
            .iter()
            .map(|ship| {
                (
                    ship.actives.fltp.clone(),
                    ManifestSlot {
                        id: ship.actives.id,
                        dock: "base".to_string(),
                    },
                )
            })
            .collect();
        Self { ships }
    }

    /// Partial manifest for re-docking: slots named in `layout` keep their
    /// ship, the others are sent empty.
    pub fn layout_payload(&self, layout: &str) -> serde_json::Value {
        let ships: serde_json::Map<String, serde_json::Value> = self
            .ships
            .iter()
            .map(|(slot, ship)| {
                let value = if layout.contains(slot.as_str()) {
                    serde_json::json!({ "id": ship.id, "dock": ship.dock })
                } else {
                    serde_json::json!({ "id": null })
                };
                (slot.clone(), value)
            })
            .collect();
        serde_json::Value::Object(ships)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepairResponse {
    #[serde(deserialize_with = "lenient::int")]
    pub complete_time: i64,
    #[serde(deserialize_with = "lenient::int")]
    pub currenttime: i64,
}

impl RepairResponse {
    pub fn repair_seconds(&self) -> i64 {
        self.complete_time - self.currenttime
    }
}
