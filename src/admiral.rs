// Admiral module - wires the operations together and runs whole scenarios
use crate::client::{GameClient, ReqwestTransport, Transport};
use crate::config::BotConfig;
use crate::error::Result;
use crate::operations::*;
use crate::storage::{PositionCache, Position, RollLog, RollStats};
use crate::{o_error, o_info, o_summary};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

/// Hunters plus rollers sharing one deadline
#[derive(Debug, Clone)]
pub struct ScenarioPlan {
    pub fleets: Vec<String>,
    pub level: i64,
    pub types: String,
    pub clock: Option<ClockSector>,
    pub map_speed: f64,
    pub ship_count: usize,
    pub base_repair: bool,
    pub hunter_stagger: Duration,
    pub roller_count: usize,
    pub duration: Duration,
}

pub struct Admiral {
    config: Arc<BotConfig>,
    fleets: FleetOperations,
    roller: CrewRoller,
    hunter: Hunter,
}

impl Admiral {
    /// Production wiring: reqwest for HTTP, tungstenite for battles
    pub fn new(config: BotConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.links.base_url, &config.identity.phpsessid)?;
        let connector = TungsteniteConnector::new(config.links.base_url.clone());
        Ok(Self::with_parts(Arc::new(config), Arc::new(transport), Arc::new(connector)))
    }

    pub fn with_parts(
        config: Arc<BotConfig>,
        transport: Arc<dyn Transport>,
        connector: Arc<dyn CombatConnector>,
    ) -> Self {
        let client = GameClient::new(transport, config.clone());
        let home = Position::new(config.base.x, config.base.y);
        let targeting = Targeting::new(PositionCache::new(home));
        let fleets = FleetOperations::new(client.clone(), targeting);
        let combat = CombatDriver::new(connector, config.identity.user_id);
        let hunter = Hunter::new(fleets.clone(), combat, config.hunting.clone());
        let roller = CrewRoller::new(client);

        Self {
            config,
            fleets,
            roller,
            hunter,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn fleets(&self) -> &FleetOperations {
        &self.fleets
    }

    pub fn roller(&self) -> &CrewRoller {
        &self.roller
    }

    pub fn hunter(&self) -> &Hunter {
        &self.hunter
    }

    pub async fn balance(&self) -> Result<i64> {
        self.roller.refresh_balance().await
    }

    pub async fn flush_crews(&self, block_list_only: bool) -> Result<usize> {
        let deleted = self.roller.flush(block_list_only).await?;
        o_info!("🧹 Deleted {} crews", deleted);
        Ok(deleted)
    }

    pub async fn hunt(&self, mission: &HuntMission) -> Result<()> {
        o_info!("🎯 [Fleet-{}] hunting level {} targets", mission.fleet_id, mission.level);
        self.hunter.hunt(mission).await
    }

    pub async fn campaign(&self, mission: &CampaignMission, prompt: &mut dyn LevelPrompt) -> Result<usize> {
        let played = self.hunter.campaign(mission, prompt).await?;
        o_info!("🏁 Campaign finished, {} of {} levels played", played, mission.levels.len());
        Ok(played)
    }

    /// Send the hunters out one by one, then start rolling with every
    /// worker bound to the same deadline. Writes the roll log at the end.
    pub async fn crew_scenario(&self, plan: &ScenarioPlan) -> Result<RollStats> {
        let deadline = Instant::now() + plan.duration;
        let mut hunters: Vec<(String, JoinHandle<Result<()>>)> = Vec::new();

        o_info!("\n═══ STEP 1: Hunters ═══");
        for fleet_id in &plan.fleets {
            let mission = HuntMission {
                fleet_id: fleet_id.clone(),
                repair_fleet_id: fleet_id.clone(),
                level: plan.level,
                types: plan.types.clone(),
                clock: plan.clock,
                map_speed: plan.map_speed,
                ship_count: plan.ship_count,
                script: None,
                base_repair: plan.base_repair,
                deadline,
            };
            let hunter = self.hunter.clone();
            hunters.push((
                format!("Fleet-{}", fleet_id),
                tokio::spawn(async move { hunter.hunt(&mission).await }),
            ));
            sleep(plan.hunter_stagger).await;
        }

        o_info!("\n═══ STEP 2: Crew rolling ═══");
        self.roller.refresh().await?;
        self.roller.configure_workers(plan.roller_count);
        o_info!("💰 Balance {} / floor {}", self.roller.balance(), self.roller.floor());

        let mut rollers: Vec<(String, JoinHandle<Result<()>>)> = Vec::new();
        for worker in 0..plan.roller_count {
            let roller = self.roller.clone();
            rollers.push((
                format!("Crew-{}", worker),
                tokio::spawn(async move { roller.fill_crews(worker, deadline).await }),
            ));
            sleep(Duration::from_secs(1)).await;
        }

        for (name, handle) in hunters.into_iter().chain(rollers) {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => o_error!("❌ [{}] stopped: {}", name, e),
                Err(e) => o_error!("❌ [{}] task failed: {}", name, e),
            }
        }

        let stats = self.roller.stats();
        o_summary!("🎲 {} rolls, {} discarded", stats.total_rolls(), stats.discarded);
        let path = self.write_roll_log(&stats)?;
        o_info!("📝 Roll log written to {}", path.display());
        Ok(stats)
    }

    pub fn write_roll_log(&self, stats: &RollStats) -> Result<PathBuf> {
        RollLog::new(&self.config.logging.log_folder).write(&stats.report(&self.config))
    }
}
