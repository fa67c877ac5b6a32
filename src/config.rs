use serde::{Deserialize, Serialize};
use crate::error::{BotError, Result};
use crate::o_info;
use crate::operations::ClockSector;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Everything the bot needs, loaded once at startup and shared by `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub identity: IdentityConfig,
    pub links: LinksConfig,
    pub seeds: SeedsConfig,
    pub base: BaseConfig,
    pub crews: CrewsConfig,
    pub rolling: RollingConfig,
    pub hunting: HuntingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub user_id: u32,
    pub base_id: u64,
    pub world_index: u32,
    pub phpsessid: String,
    pub signed_request: String,
    pub game_signed_request: String,
    pub map_signed_request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Primary game surface, e.g. https://example-game-host
    pub base_url: String,
    /// World map surface
    pub world_map_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedsConfig {
    /// Signing seed for the primary surface
    pub base: String,
    /// Signing seed for the world map surface
    pub world: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Home base position in fleet coordinate units
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewsConfig {
    /// Crew types kept when rolled
    pub allow_list: Vec<u32>,
    /// Crew types removed by `flush`
    pub block_list: Vec<u32>,
    /// Display names keyed by crew type, e.g. "13001" = "(E) Grease Monkey".
    /// TOML keys are strings, so the type id is stored in decimal.
    pub names: BTreeMap<String, String>,
    /// Types whose roll streaks are recorded in the run log
    #[serde(default)]
    pub tracked_types: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingConfig {
    pub pack_id: String,
    pub currency_id: u32,
    pub purchase_cost: i64,
    pub reroll_cost: i64,
    /// Workers stop once remaining slots fall to this margin
    pub slot_safety_margin: i64,
    /// Sleep while paused before re-reading the balance
    pub pause_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuntingConfig {
    pub map_speed: f64,
    /// Locator targets further than this are ignored
    pub max_target_distance: f64,
    pub engage_radius: f64,
    pub no_target_backoff_seconds: u64,
    pub combat_poll_seconds: u64,
    /// Approach sector used when a hunt names none; unset picks one per target
    #[serde(default)]
    pub default_clock: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbosity: u8,
    pub api_logging: bool,
    /// Folder receiving one roll log per run
    pub log_folder: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig {
                user_id: 0,
                base_id: 0,
                world_index: 0,
                phpsessid: String::new(),
                signed_request: String::new(),
                game_signed_request: String::new(),
                map_signed_request: String::new(),
            },
            links: LinksConfig {
                base_url: String::new(),
                world_map_url: String::new(),
            },
            seeds: SeedsConfig {
                base: String::new(),
                world: String::new(),
            },
            base: BaseConfig { x: 0, y: 0 },
            crews: CrewsConfig {
                allow_list: Vec::new(),
                block_list: Vec::new(),
                names: BTreeMap::new(),
                tracked_types: Vec::new(),
            },
            rolling: RollingConfig {
                pack_id: "9".to_string(),
                currency_id: 1,
                purchase_cost: 1000,
                reroll_cost: 800,
                slot_safety_margin: 2,
                pause_seconds: 5,
            },
            hunting: HuntingConfig {
                map_speed: 443.5,
                max_target_distance: 80000.0,
                engage_radius: 100.0,
                no_target_backoff_seconds: 60,
                combat_poll_seconds: 10,
                default_clock: None,
            },
            logging: LoggingConfig {
                verbosity: 1,
                api_logging: false,
                log_folder: "logs".to_string(),
            },
        }
    }
}

impl HuntingConfig {
    /// `requested` when given, else the configured default
    pub fn approach_clock(&self, requested: Option<u8>) -> Result<Option<ClockSector>> {
        requested
            .or(self.default_clock)
            .map(|hour| {
                ClockSector::new(hour).ok_or_else(|| BotError::Config(format!("clock must be 1-12, got {}", hour)))
            })
            .transpose()
    }
}

impl BotConfig {
    /// Load configuration from file, writing a template if it doesn't exist
    pub fn load_or_create(config_path: &str) -> Result<Self> {
        if Path::new(config_path).exists() {
            o_info!("📋 Loading configuration from {}", config_path);
            let config_str = fs::read_to_string(config_path)?;
            Ok(toml::from_str(&config_str)?)
        } else {
            o_info!("📋 Creating configuration template at {}", config_path);
            let config = BotConfig::default();
            config.save(config_path)?;
            o_info!("💡 Fill in the identity, links and seeds sections of {}", config_path);
            Ok(config)
        }
    }

    pub fn save(&self, config_path: &str) -> Result<()> {
        if let Some(parent) = Path::new(config_path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("identity.phpsessid", &self.identity.phpsessid),
            ("identity.signed_request", &self.identity.signed_request),
            ("identity.game_signed_request", &self.identity.game_signed_request),
            ("identity.map_signed_request", &self.identity.map_signed_request),
            ("links.base_url", &self.links.base_url),
            ("links.world_map_url", &self.links.world_map_url),
            ("seeds.base", &self.seeds.base),
            ("seeds.world", &self.seeds.world),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(BotError::Config(format!("{} must be set", name)));
            }
        }

        if self.identity.user_id == 0 {
            return Err(BotError::Config("identity.user_id must be set".to_string()));
        }
        if self.rolling.purchase_cost <= 0 || self.rolling.reroll_cost <= 0 {
            return Err(BotError::Config("rolling costs must be positive".to_string()));
        }
        if self.hunting.map_speed <= 0.0 {
            return Err(BotError::Config("hunting.map_speed must be positive".to_string()));
        }
        self.hunting.approach_clock(None)?;

        o_info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Display name for a crew type, falling back to the numeric id
    pub fn crew_name(&self, crew_type: u32) -> String {
        self.crews
            .names
            .get(&crew_type.to_string())
            .cloned()
            .unwrap_or_else(|| format!("#{}", crew_type))
    }

    pub fn print_summary(&self) {
        o_info!("📋 Configuration Summary:");
        o_info!("   👤 User {} / base {} / world {}", self.identity.user_id, self.identity.base_id, self.identity.world_index);
        o_info!("   🏠 Base position: ({}, {})", self.base.x, self.base.y);
        o_info!("   🎲 Crews: {} allowed, {} blocked", self.crews.allow_list.len(), self.crews.block_list.len());
        o_info!("   💰 Roll costs: {} purchase / {} reroll", self.rolling.purchase_cost, self.rolling.reroll_cost);
        o_info!("   ⛵ Map speed: {}, max target distance {}", self.hunting.map_speed, self.hunting.max_target_distance);
    }
}
