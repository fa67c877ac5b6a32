// Fleet control - launch, move, dock and repair through the signed client
use crate::client::{Action, GameClient};
use crate::error::{BotError, Result};
use crate::fields;
use crate::models::*;
use crate::operations::targeting::{ClockSector, TargetCandidate, Targeting};
use crate::storage::Position;
use crate::{o_debug, o_info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

/// Seconds of repair the free rush completes instantly
pub const RUSH_SECONDS: i64 = 300;

pub const NOT_LAUNCHABLE: &str = "Fleet is locked / out in worldmap";

#[derive(Debug, Clone, PartialEq)]
pub enum MoveMode {
    Plain,
    /// Move, then dock at the home base
    Dock,
    /// Move, then attack the target with this id
    Attack(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaunchOutcome {
    Launched(Value),
    /// Expected failure, the fleet is already on the map or locked
    NotLaunchable(String),
}

/// Optional approach offset applied to a move destination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    pub clock: ClockSector,
    pub radius: f64,
}

/// The nested action list the world map endpoint expects.
/// Speed is sent doubled.
pub fn move_actions(mode: &MoveMode, destination: Position, map_speed: f64, user_id: u32, base_id: u64) -> String {
    let movement = format!(
        r#"["move",{},{},{},{}]"#,
        destination.x,
        destination.y,
        map_speed * 2.0,
        user_id
    );
    match mode {
        MoveMode::Plain => format!("[{}]", movement),
        MoveMode::Dock => format!(r#"[{},["dock",{}]]"#, movement, base_id),
        MoveMode::Attack(target) => format!(r#"[{},["attack",{},"platform","kxp"]]"#, movement, target),
    }
}

#[derive(Clone)]
pub struct FleetOperations {
    client: GameClient,
    targeting: Targeting,
    map_ids: Arc<Mutex<HashMap<String, String>>>,
    manifests: Arc<Mutex<HashMap<String, ShipManifest>>>,
    /// Serializes lazy repairs across fleets; the rush is a scarce server-side resource
    repair_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FleetOperations {
    pub fn new(client: GameClient, targeting: Targeting) -> Self {
        Self {
            client,
            targeting,
            map_ids: Arc::new(Mutex::new(HashMap::new())),
            manifests: Arc::new(Mutex::new(HashMap::new())),
            repair_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn targeting(&self) -> &Targeting {
        &self.targeting
    }

    pub fn client(&self) -> &GameClient {
        &self.client
    }

    pub fn home(&self) -> Position {
        self.targeting.positions().home()
    }

    pub fn position(&self, fleet_id: &str) -> Position {
        self.targeting.positions().get(fleet_id)
    }

    pub fn map_id(&self, fleet_id: &str) -> Option<String> {
        let map_ids = self.map_ids.lock().unwrap_or_else(|p| p.into_inner());
        map_ids.get(fleet_id).cloned()
    }

    /// All docked and active fleets for this user
    pub async fn fleets(&self) -> Result<FleetsResponse> {
        let endpoint = format!("users/{}/dock/base/fleets", self.client.config().identity.user_id);
        self.client.execute_as(Action::FleetList, &endpoint, fields!(), fields!()).await
    }

    /// True when the fleet sits in the dock. Fleets on the map have their
    /// map id recorded for later moves; unknown fleets count as not docked.
    pub async fn is_docked(&self, fleet_id: &str) -> Result<bool> {
        let fleets = self.fleets().await?;
        let Some(fleet) = fleets.find(fleet_id) else {
            o_debug!("[Fleet-{}] not found in dock listing", fleet_id);
            return Ok(false);
        };

        if fleet.is_on_map {
            if let Some(map_id) = &fleet.map_id {
                let mut map_ids = self.map_ids.lock().unwrap_or_else(|p| p.into_inner());
                map_ids.insert(fleet_id.to_string(), map_id.clone());
            }
        }
        Ok(!fleet.is_on_map)
    }

    /// Fresh ship manifest; the first one seen per fleet is kept for re-docking
    pub async fn ship_manifest(&self, fleet_id: &str) -> Result<ShipManifest> {
        let fleets = self.fleets().await?;
        let manifest = fleets
            .find(fleet_id)
            .map(ShipManifest::from_fleet)
            .unwrap_or_default();

        let mut manifests = self.manifests.lock().unwrap_or_else(|p| p.into_inner());
        manifests
            .entry(fleet_id.to_string())
            .or_insert_with(|| manifest.clone());
        Ok(manifest)
    }

    async fn cached_manifest(&self, fleet_id: &str) -> Result<ShipManifest> {
        let cached = {
            let manifests = self.manifests.lock().unwrap_or_else(|p| p.into_inner());
            manifests.get(fleet_id).cloned()
        };
        match cached {
            Some(manifest) => Ok(manifest),
            None => self.ship_manifest(fleet_id).await,
        }
    }

    pub async fn launch(&self, fleet_id: &str) -> Result<LaunchOutcome> {
        if !self.is_docked(fleet_id).await? {
            o_info!("[Fleet-{}] {}", fleet_id, NOT_LAUNCHABLE);
            return Ok(LaunchOutcome::NotLaunchable(NOT_LAUNCHABLE.to_string()));
        }

        let manifest = self.ship_manifest(fleet_id).await?;
        let mut body = fields!("launch" => "worldmap");
        body.insert("ships".to_string(), serde_json::to_value(&manifest.ships)?);

        let endpoint = format!("dock/base/fleets/{}", fleet_id);
        let response = self.client.execute(Action::Launch, &endpoint, fields!(), body).await?;

        // Picks up the map id of the freshly launched fleet
        self.is_docked(fleet_id).await?;
        o_debug!("[Fleet-{}] launched", fleet_id);
        Ok(LaunchOutcome::Launched(response))
    }

    /// Issue a move. The position cache is written before the call returns,
    /// callers estimate travel time from it right away.
    pub async fn move_fleet(
        &self,
        fleet_id: &str,
        destination: Position,
        map_speed: f64,
        mode: MoveMode,
        approach: Option<Approach>,
    ) -> Result<MapObjectsResponse> {
        self.issue_move(fleet_id, destination, map_speed, mode, approach, true).await
    }

    async fn issue_move(
        &self,
        fleet_id: &str,
        destination: Position,
        map_speed: f64,
        mode: MoveMode,
        approach: Option<Approach>,
        announce: bool,
    ) -> Result<MapObjectsResponse> {
        let destination = match approach {
            Some(approach) => approach.clock.offset(destination, approach.radius),
            None => destination,
        };

        if announce {
            match &mode {
                MoveMode::Plain => o_info!("[Fleet-{}] moving to {} {}", fleet_id, destination.x, destination.y),
                MoveMode::Dock => o_info!("[Fleet-{}] returning to dock", fleet_id),
                MoveMode::Attack(_) => o_info!("[Fleet-{}] attacking target at {} {}", fleet_id, destination.x, destination.y),
            }
        }

        let map_id = self.map_id(fleet_id).ok_or_else(|| {
            BotError::protocol(format!("fleet {} has no map id, launch it first", fleet_id))
        })?;

        let identity = &self.client.config().identity;
        let actions = move_actions(&mode, destination, map_speed, identity.user_id, identity.base_id);

        self.targeting.positions().update(fleet_id, destination);

        let query = fields!(
            "actions" => actions,
            "id" => map_id,
            "worldindex" => identity.world_index,
        );
        self.client
            .execute_as(Action::Move, "updateMapObjects2.php", query, fields!())
            .await
    }

    /// No-op move to the cached position; the response tells whether the
    /// server has this fleet engaged.
    pub async fn combat_probe(&self, fleet_id: &str, map_speed: f64) -> Result<Option<CombatTarget>> {
        let here = self.position(fleet_id);
        let response = self
            .issue_move(fleet_id, here, map_speed, MoveMode::Plain, None, false)
            .await?;
        response.combat()
    }

    pub async fn repair_fleet(&self, fleet_id: &str) -> Result<RepairResponse> {
        let fleet: i64 = fleet_id
            .parse()
            .map_err(|_| BotError::protocol(format!("fleet id {} is not numeric", fleet_id)))?;
        self.client
            .execute_as(Action::Repair, "dock/base/repair", fields!(), fields!("fleet" => fleet))
            .await
    }

    /// Free rush on a running repair. The server only honours it as a
    /// promotional free purchase.
    pub async fn repair_speed_up(&self, fleet_id: &str) -> Result<Value> {
        let body = fields!(
            "fleet" => fleet_id,
            "seconds" => RUSH_SECONDS,
            "purchase_type" => "free",
            "currency_id" => 0,
            "quantity" => 1,
        );
        self.client
            .execute(Action::InstantRepair, "dock/base/repair/default", fields!(), body)
            .await
    }

    /// Re-dock `fleet_id`'s ships into `into_fleet` (or its own slot when
    /// `None`), keeping only slots listed in `layout`.
    pub async fn manage_fleet(&self, fleet_id: &str, into_fleet: Option<&str>, layout: &str) -> Result<Value> {
        let manifest = self.cached_manifest(fleet_id).await?;
        let endpoint = format!("dock/base/fleets/{}", into_fleet.unwrap_or(fleet_id));
        let mut body = fields!();
        body.insert("ships".to_string(), manifest.layout_payload(layout));
        self.client.execute(Action::FleetEdit, &endpoint, fields!(), body).await
    }

    /// Repair ship by ship through the repair fleet, rushing each one.
    /// Only ships assigned to the dock can be repaired, so the manifest is
    /// rebuilt one slot at a time. Calls from all fleets are serialized.
    pub async fn lazy_repair(&self, fleet_id: &str, repair_fleet_id: &str, ship_count: usize) -> Result<()> {
        let _guard = self.repair_lock.lock().await;

        if !self.is_docked(fleet_id).await? {
            o_info!("[Fleet-{}] Send fleet to dock first", fleet_id);
            sleep(Duration::from_secs(25)).await;
        }

        let regroup = ship_count > 1 || fleet_id != repair_fleet_id;
        if regroup {
            self.manage_fleet(fleet_id, None, "").await?;
            sleep(Duration::from_secs(2)).await;
        }

        let mut layout = String::new();
        for slot in 1..=ship_count {
            layout.push_str(&slot.to_string());
            if regroup {
                self.manage_fleet(fleet_id, Some(repair_fleet_id), &layout).await?;
                sleep(Duration::from_secs(2)).await;
            }

            let repair = self.repair_fleet(repair_fleet_id).await?;
            let remaining = repair.repair_seconds();
            if remaining > RUSH_SECONDS {
                o_info!("[== Repair ==] [Fleet-{}] Waiting {} s", fleet_id, remaining - RUSH_SECONDS);
                sleep(Duration::from_secs((remaining - RUSH_SECONDS) as u64)).await;
            }
            sleep(Duration::from_secs(1)).await;
            self.repair_speed_up(repair_fleet_id).await?;
            sleep(Duration::from_secs(1)).await;
        }

        if fleet_id != repair_fleet_id {
            self.manage_fleet(fleet_id, Some(repair_fleet_id), "").await?;
            sleep(Duration::from_secs(2)).await;
            self.manage_fleet(fleet_id, None, &layout).await?;
        }
        Ok(())
    }

    /// NPC targets from the locator
    pub async fn locator_targets(&self, level: i64, types: &str) -> Result<BookmarksResponse> {
        let body = fields!(
            "count" => "100",
            "levels" => level.to_string(),
            "minHealth" => "100",
            "types" => types,
        );
        self.client
            .execute_as(Action::Locator, "api/bm/bookmarks/npctargets", fields!(), body)
            .await
    }

    /// Vengeance targets in and out of sector, minus the ones too strong to take
    pub async fn vengeance_targets(&self, fleet_id: &str) -> Result<Option<Vec<TargetCandidate>>> {
        let mut bookmarks = Vec::new();
        for endpoint in ["api/bm/bookmarks/vengeanceoutsector", "api/bm/bookmarks/vengeanceinsector"] {
            let response: BookmarksResponse = self
                .client
                .execute_as(Action::Locator, endpoint, fields!(), fields!())
                .await?;
            bookmarks.extend(
                response
                    .bookmarks
                    .into_iter()
                    .filter(|b| !b.too_strong_for_vengeance()),
            );
        }
        Ok(self.targeting.rank_targets(&bookmarks, fleet_id, None, 50000.0))
    }
}

