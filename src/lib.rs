// Battle Pirates automation library
// Signed HTTP client, crew rolling, fleet hunting and scripted combat

pub mod models;
pub mod client;
pub mod operations;
pub mod admiral;
pub mod storage;
pub mod signing;
pub mod error;
pub mod debug;
pub mod config;
pub mod verbosity;
pub mod output_broker;

// Re-export commonly used types
pub use admiral::{Admiral, ScenarioPlan};
pub use client::{Action, GameClient, Transport};
pub use config::BotConfig;
pub use error::{BotError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/battlepirates.toml";
