// Roll statistics and the per-run JSON roll log
use chrono::{Datelike, Local, Timelike};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use crate::config::BotConfig;
use crate::error::Result;

/// Crew tiers, read from the display-name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Basic,
    Advanced,
    Elite,
    Core,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Basic, Tier::Advanced, Tier::Elite, Tier::Core];

    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::Basic => "(B)",
            Tier::Advanced => "(A)",
            Tier::Elite => "(E)",
            Tier::Core => "(C)",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Basic => "Basic",
            Tier::Advanced => "Advanced",
            Tier::Elite => "Elite",
            Tier::Core => "Core",
        }
    }

    /// Split "(E) Grease Monkey" into (Elite, "Grease Monkey")
    pub fn split_display_name(name: &str) -> Option<(Tier, &str)> {
        let mut parts = name.splitn(2, char::is_whitespace);
        let prefix = parts.next()?;
        let rest = parts.next().unwrap_or("").trim_start();
        Tier::ALL
            .into_iter()
            .find(|tier| tier.prefix() == prefix)
            .map(|tier| (tier, rest))
    }
}

/// Counters shared by every rolling worker
#[derive(Debug, Clone, Default)]
pub struct RollStats {
    /// Every crew type seen, one count per roll
    pub roll_history: HashMap<u32, u64>,
    /// Accepted crews per type
    pub accepted: HashMap<u32, u64>,
    /// Rolls it took to land each accepted crew, per type
    pub streaks: HashMap<u32, Vec<u64>>,
    pub discarded: u64,
}

impl RollStats {
    pub fn record_roll(&mut self, crew_type: u32) {
        *self.roll_history.entry(crew_type).or_insert(0) += 1;
    }

    pub fn record_accept(&mut self, crew_type: u32, streak: u64) {
        *self.accepted.entry(crew_type).or_insert(0) += 1;
        self.streaks.entry(crew_type).or_default().push(streak);
    }

    pub fn record_discard(&mut self) {
        self.discarded += 1;
    }

    pub fn total_rolls(&self) -> u64 {
        self.roll_history.values().sum()
    }

    pub fn rolls_of(&self, crew_type: u32) -> u64 {
        self.roll_history.get(&crew_type).copied().unwrap_or(0)
    }

    pub fn accepted_of(&self, crew_type: u32) -> u64 {
        self.accepted.get(&crew_type).copied().unwrap_or(0)
    }

    /// Roll counts summed per tier and per name inside each tier.
    /// Types without a tiered display name are left out.
    pub fn tier_breakdown(&self, config: &BotConfig) -> BTreeMap<Tier, BTreeMap<String, u64>> {
        let mut tiers: BTreeMap<Tier, BTreeMap<String, u64>> = BTreeMap::new();
        for (&crew_type, &count) in &self.roll_history {
            let name = config.crew_name(crew_type);
            if let Some((tier, rest)) = Tier::split_display_name(&name) {
                *tiers.entry(tier).or_default().entry(rest.to_string()).or_insert(0) += count;
            }
        }
        tiers
    }

    pub fn report(&self, config: &BotConfig) -> RollReport {
        let roll_history = self
            .roll_history
            .iter()
            .map(|(crew_type, count)| (crew_type.to_string(), *count))
            .collect();

        let breakdown = self.tier_breakdown(config);
        let mut tiers = BTreeMap::new();
        for tier in Tier::ALL {
            let crews = breakdown.get(&tier).cloned().unwrap_or_default();
            tiers.insert(format!("{}_rolls", tier.label()), Value::from(crews.values().sum::<u64>()));
            tiers.insert(format!("{}_crews", tier.label()), serde_json::to_value(crews).unwrap_or(Value::Null));
        }

        for crew_type in &config.crews.tracked_types {
            let Some(streaks) = self.streaks.get(crew_type).filter(|s| !s.is_empty()) else {
                continue;
            };
            let label = short_name(&config.crew_name(*crew_type));
            let average = streaks.iter().sum::<u64>() as f64 / streaks.len() as f64;
            tiers.insert(format!("Average_{}", label), Value::from(average));
            tiers.insert(format!("{}_roll_counts", label), Value::from(streaks.clone()));
        }

        RollReport {
            total_rolls: self.total_rolls(),
            roll_history,
            sections: tiers,
        }
    }
}

/// Name without the tier prefix, first word only: "(E) Grease Monkey" -> "Grease"
fn short_name(name: &str) -> String {
    let rest = Tier::split_display_name(name).map(|(_, rest)| rest).unwrap_or(name);
    rest.split_whitespace().next().unwrap_or(rest).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct RollReport {
    #[serde(rename = "Total_rolls")]
    pub total_rolls: u64,
    #[serde(rename = "Roll_history")]
    pub roll_history: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

/// Write-only run log, one file per run
pub struct RollLog {
    folder: PathBuf,
}

impl RollLog {
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    /// `log_<day-of-year>_<hour>_<minute>_<second>.json`
    pub fn file_name() -> String {
        let now = Local::now();
        format!("log_{}_{}_{}_{}.json", now.ordinal(), now.hour(), now.minute(), now.second())
    }

    pub fn write(&self, report: &RollReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.folder)?;
        let path = self.folder.join(Self::file_name());
        fs::write(&path, serde_json::to_string(report)?)?;
        Ok(path)
    }
}
