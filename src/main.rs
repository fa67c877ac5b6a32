// Battle Pirates automation - command line entry point

use battlepirates_cc::operations::{CampaignMission, CombatScript, HuntMission, StdinPrompt};
use battlepirates_cc::output_broker::get_output_broker;
use battlepirates_cc::{debug, o_error, o_info, verbosity};
use battlepirates_cc::{Admiral, BotConfig, Result, ScenarioPlan, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Crew rolling, hunting and scripted battles for Battle Pirates", long_about = None)]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, action = clap::ArgAction::Count)]
    v: u8,

    /// Trace every outbound request
    #[arg(long)]
    debug: bool,

    /// Append every call to api_debug.log
    #[arg(long)]
    api_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Roll crews until the deadline
    Crews {
        #[arg(long, default_value_t = 1)]
        workers: usize,
        #[arg(long, default_value_t = 30)]
        minutes: u64,
    },
    /// Delete stored crews (block-listed only unless --all)
    Flush {
        #[arg(long)]
        all: bool,
    },
    /// Hunt locator targets with one fleet
    Hunt {
        #[arg(long)]
        fleet: String,
        /// Fleet used for repairs, defaults to the hunting fleet
        #[arg(long)]
        repair_fleet: Option<String>,
        #[arg(long)]
        level: i64,
        #[arg(long)]
        types: String,
        /// Fixed approach sector 1-12, otherwise picked per target
        #[arg(long)]
        clock: Option<u8>,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long, default_value_t = 1)]
        ships: usize,
        /// Combat script replayed on every engagement
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long)]
        repair: bool,
        #[arg(long, default_value_t = 30)]
        minutes: u64,
    },
    /// Send several hunters out, then roll crews alongside them
    Scenario {
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5")]
        fleets: Vec<String>,
        #[arg(long)]
        level: i64,
        #[arg(long)]
        types: String,
        #[arg(long)]
        clock: Option<u8>,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long, default_value_t = 1)]
        ships: usize,
        #[arg(long)]
        repair: bool,
        /// Seconds between hunter launches
        #[arg(long, default_value_t = 15)]
        stagger: u64,
        #[arg(long, default_value_t = 20)]
        workers: usize,
        #[arg(long, default_value_t = 30)]
        minutes: u64,
    },
    /// Replay campaign level scripts, one prompt per level
    Campaign {
        #[arg(long, default_value = "1")]
        fleet: String,
        #[arg(long)]
        repair_fleet: Option<String>,
        #[arg(long, default_value_t = 1)]
        ships: usize,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        repair: bool,
        levels: Vec<PathBuf>,
    },
    /// Print the current currency balance
    Balance,
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.display().to_string();
    let config = BotConfig::load_or_create(&config_path)?;

    verbosity::set_verbosity_level(config.logging.verbosity.max(cli.v));
    debug::set_full_debug(cli.debug);
    config.validate()?;
    config.print_summary();

    let mut config = config;
    config.logging.api_logging |= cli.api_log;
    let default_speed = config.hunting.map_speed;
    let admiral = Admiral::new(config)?;

    match cli.command {
        Command::Crews { workers, minutes } => {
            let plan = ScenarioPlan {
                fleets: Vec::new(),
                level: 0,
                types: String::new(),
                clock: None,
                map_speed: default_speed,
                ship_count: 0,
                base_repair: false,
                hunter_stagger: Duration::ZERO,
                roller_count: workers,
                duration: Duration::from_secs(minutes * 60),
            };
            admiral.crew_scenario(&plan).await?;
        }
        Command::Flush { all } => {
            admiral.flush_crews(!all).await?;
        }
        Command::Hunt {
            fleet,
            repair_fleet,
            level,
            types,
            clock,
            speed,
            ships,
            script,
            repair,
            minutes,
        } => {
            let script = script.map(CombatScript::load).transpose()?;
            let mission = HuntMission {
                repair_fleet_id: repair_fleet.unwrap_or_else(|| fleet.clone()),
                fleet_id: fleet,
                level,
                types,
                clock: admiral.config().hunting.approach_clock(clock)?,
                map_speed: speed.unwrap_or(default_speed),
                ship_count: ships,
                script,
                base_repair: repair,
                deadline: Instant::now() + Duration::from_secs(minutes * 60),
            };
            admiral.hunt(&mission).await?;
        }
        Command::Scenario {
            fleets,
            level,
            types,
            clock,
            speed,
            ships,
            repair,
            stagger,
            workers,
            minutes,
        } => {
            let plan = ScenarioPlan {
                fleets,
                level,
                types,
                clock: admiral.config().hunting.approach_clock(clock)?,
                map_speed: speed.unwrap_or(default_speed),
                ship_count: ships,
                base_repair: repair,
                hunter_stagger: Duration::from_secs(stagger),
                roller_count: workers,
                duration: Duration::from_secs(minutes * 60),
            };
            admiral.crew_scenario(&plan).await?;
        }
        Command::Campaign {
            fleet,
            repair_fleet,
            ships,
            speed,
            repair,
            levels,
        } => {
            let mission = CampaignMission {
                repair_fleet_id: repair_fleet.unwrap_or_else(|| fleet.clone()),
                fleet_id: fleet,
                ship_count: ships,
                map_speed: speed.unwrap_or(default_speed),
                levels,
                base_repair: repair,
            };
            let mut prompt = StdinPrompt::new();
            admiral.campaign(&mission, &mut prompt).await?;
        }
        Command::Balance => {
            let balance = admiral.balance().await?;
            o_info!("💰 Balance: {}", balance);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    o_info!("🏴‍☠️ Battle Pirates bot starting...");

    let outcome = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            o_info!("shutdown. keyboard interrupt");
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        o_error!("\n🚨 ============================================");
        o_error!("🚨 Unhandled error: {}", e);
        o_error!("🚨 ============================================");
    }

    get_output_broker().flush_summaries().await;
    // Let the broker thread print the last lines
    tokio::time::sleep(Duration::from_millis(100)).await;

    if outcome.is_err() {
        std::process::exit(1);
    }
}
