// Hunting and campaign loops for a single fleet
use crate::config::HuntingConfig;
use crate::error::Result;
use crate::models::CombatTarget;
use crate::operations::combat::{CombatDriver, CombatScript};
use crate::operations::fleet::{Approach, FleetOperations, MoveMode};
use crate::operations::targeting::{travel_time, ClockSector, TargetCandidate};
use crate::{o_debug, o_info};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::{sleep, Duration, Instant};

/// Clock and radius used to park near the base between campaign levels
const CAMPAIGN_CLOCK: u8 = 10;
const CAMPAIGN_RADIUS: f64 = 300.0;

/// Everything one hunting fleet needs to know
#[derive(Debug, Clone)]
pub struct HuntMission {
    pub fleet_id: String,
    /// Fleet whose dock slot is used for repairs
    pub repair_fleet_id: String,
    pub level: i64,
    /// Locator target type filter, passed through verbatim
    pub types: String,
    /// Fixed approach sector; computed per target when `None`
    pub clock: Option<ClockSector>,
    pub map_speed: f64,
    pub ship_count: usize,
    pub script: Option<CombatScript>,
    pub base_repair: bool,
    pub deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct CampaignMission {
    pub fleet_id: String,
    pub repair_fleet_id: String,
    pub ship_count: usize,
    pub map_speed: f64,
    pub levels: Vec<PathBuf>,
    pub base_repair: bool,
}

/// Asks whether the next campaign level should run
#[async_trait]
pub trait LevelPrompt: Send {
    /// `false` skips the level
    async fn proceed(&mut self, level: &str) -> Result<bool>;
}

/// Waits for Enter on stdin; typing `0` skips the level
pub struct StdinPrompt {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LevelPrompt for StdinPrompt {
    async fn proceed(&mut self, level: &str) -> Result<bool> {
        println!("Press Enter to do [level-{}]...", level);
        let line = self.lines.next_line().await?.unwrap_or_default();
        Ok(line.trim() != "0")
    }
}

#[derive(Clone)]
pub struct Hunter {
    fleets: FleetOperations,
    combat: CombatDriver,
    settings: HuntingConfig,
}

impl Hunter {
    pub fn new(fleets: FleetOperations, combat: CombatDriver, settings: HuntingConfig) -> Self {
        Self {
            fleets,
            combat,
            settings,
        }
    }

    pub fn fleets(&self) -> &FleetOperations {
        &self.fleets
    }

    /// Launch, then pick off locator targets until the deadline. Each
    /// target is claimed for the length of one engagement and released
    /// even when the engagement fails.
    pub async fn hunt(&self, mission: &HuntMission) -> Result<()> {
        let fleet_id = mission.fleet_id.as_str();
        self.fleets.ship_manifest(fleet_id).await?;
        self.fleets.launch(fleet_id).await?;
        sleep(Duration::from_secs(2)).await;

        while Instant::now() < mission.deadline {
            let bookmarks = self.fleets.locator_targets(mission.level, &mission.types).await?;
            let target = self
                .fleets
                .targeting()
                .rank_targets(
                    &bookmarks.bookmarks,
                    fleet_id,
                    Some(mission.level),
                    self.settings.max_target_distance,
                )
                .and_then(|ranked| self.fleets.targeting().pick_target(&ranked));

            let Some(target) = target else {
                o_info!("[Fleet-{}] Could not find targets close to base", fleet_id);
                sleep(Duration::from_secs(self.settings.no_target_backoff_seconds)).await;
                continue;
            };

            let outcome = self.engage_target(mission, &target).await;
            self.fleets.targeting().release_target(&target.id);
            let left = mission.deadline.saturating_duration_since(Instant::now());
            o_info!("[Fleet-{}] {:.2} min left", fleet_id, left.as_secs_f64() / 60.0);
            outcome?;

            if mission.base_repair {
                self.repair_cycle(fleet_id, &mission.repair_fleet_id, mission.ship_count, mission.map_speed)
                    .await?;
            }
        }

        sleep(Duration::from_secs(1)).await;
        let home = self.fleets.home();
        self.fleets
            .move_fleet(fleet_id, home, mission.map_speed, MoveMode::Dock, None)
            .await?;
        sleep(Duration::from_secs(3)).await;
        Ok(())
    }

    async fn engage_target(&self, mission: &HuntMission, target: &TargetCandidate) -> Result<()> {
        let fleet_id = mission.fleet_id.as_str();
        let destination = target.position();
        let clock = mission
            .clock
            .unwrap_or_else(|| self.fleets.targeting().approach_heading(fleet_id, destination));

        self.fleets
            .move_fleet(
                fleet_id,
                destination,
                mission.map_speed,
                MoveMode::Attack(target.id.clone()),
                Some(Approach {
                    clock,
                    radius: self.settings.engage_radius,
                }),
            )
            .await?;

        // Estimated only; the probe below confirms whether the fleet arrived
        sleep(travel_time(target.distance, mission.map_speed)).await;
        sleep(Duration::from_secs(5)).await;

        if let Some(combat) = self.fleets.combat_probe(fleet_id, mission.map_speed).await? {
            self.fight(&combat, mission.script.as_ref()).await?;
        }

        sleep(Duration::from_secs(2)).await;
        self.wait_out_combat(fleet_id, mission.map_speed).await
    }

    async fn fight(&self, combat: &CombatTarget, script: Option<&CombatScript>) -> Result<()> {
        match script.filter(|s| !s.is_empty()) {
            Some(script) => self.combat.engage_scripted(combat, script).await,
            None => self.combat.engage_default(combat).await,
        }
    }

    async fn wait_out_combat(&self, fleet_id: &str, map_speed: f64) -> Result<()> {
        loop {
            if self.fleets.combat_probe(fleet_id, map_speed).await?.is_none() {
                sleep(Duration::from_secs(2)).await;
                return Ok(());
            }
            o_debug!("[Fleet-{}] still in combat", fleet_id);
            sleep(Duration::from_secs(self.settings.combat_poll_seconds)).await;
        }
    }

    /// Return and dock, repair ship by ship, then launch again
    pub async fn repair_cycle(&self, fleet_id: &str, repair_fleet_id: &str, ship_count: usize, map_speed: f64) -> Result<()> {
        let home = self.fleets.home();
        let distance = self.fleets.targeting().distance(fleet_id, home);
        self.fleets
            .move_fleet(fleet_id, home, map_speed, MoveMode::Dock, None)
            .await?;
        sleep(travel_time(distance, map_speed)).await;
        sleep(Duration::from_secs(3)).await;

        self.fleets.lazy_repair(fleet_id, repair_fleet_id, ship_count).await?;

        sleep(Duration::from_secs(1)).await;
        self.fleets.launch(fleet_id).await?;
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn park_near_base(&self, fleet_id: &str, map_speed: f64) -> Result<()> {
        let clock = ClockSector::new(CAMPAIGN_CLOCK).unwrap_or(ClockSector::TWELVE);
        self.fleets
            .move_fleet(
                fleet_id,
                self.fleets.home(),
                map_speed,
                MoveMode::Plain,
                Some(Approach {
                    clock,
                    radius: CAMPAIGN_RADIUS,
                }),
            )
            .await?;
        Ok(())
    }

    /// Play campaign levels one after another. The player starts each
    /// battle in the browser; the prompt gates every level.
    pub async fn campaign(&self, mission: &CampaignMission, prompt: &mut dyn LevelPrompt) -> Result<usize> {
        let fleet_id = mission.fleet_id.as_str();
        self.fleets.launch(fleet_id).await?;
        sleep(Duration::from_secs(3)).await;
        self.park_near_base(fleet_id, mission.map_speed).await?;

        let mut played = 0;
        for level in &mission.levels {
            let name = level.display().to_string();
            if !prompt.proceed(&name).await? {
                o_info!("Skipping Lvl-{}", name);
                continue;
            }
            if self.campaign_level(mission, level).await? {
                played += 1;
            }
        }
        Ok(played)
    }

    /// Replay one level script against the battle the fleet is in.
    /// Returns `false` when the fleet was not in combat.
    pub async fn campaign_level(&self, mission: &CampaignMission, level: &Path) -> Result<bool> {
        let fleet_id = mission.fleet_id.as_str();
        let script = CombatScript::load(level)?;

        let Some(combat) = self.fleets.combat_probe(fleet_id, mission.map_speed).await? else {
            o_info!("[Fleet-{}] not in combat, start the battle first", fleet_id);
            return Ok(false);
        };

        let session = self.combat.open(&combat).await?;
        session.replay(&script).await?;

        if mission.base_repair {
            self.fleets
                .move_fleet(fleet_id, self.fleets.home(), mission.map_speed, MoveMode::Dock, None)
                .await?;
            sleep(Duration::from_secs(3)).await;
            self.fleets
                .lazy_repair(fleet_id, &mission.repair_fleet_id, mission.ship_count)
                .await?;
            sleep(Duration::from_secs(1)).await;
            self.fleets.launch(fleet_id).await?;
            sleep(Duration::from_secs(2)).await;
            self.park_near_base(fleet_id, mission.map_speed).await?;
        }
        Ok(true)
    }
}
