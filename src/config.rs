use log::LevelFilter;
use serde::Deserialize;
use std::{env, fs::read_to_string, path::Path};

/// The server version extracted from the Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable key to load the config from
const CONFIG_ENV_KEY: &str = "CUSTOM_MATCH_CONFIG_JSON";

pub fn load_config() -> Config {
    // Attempt to load the config from the env
    if let Ok(env) = env::var(CONFIG_ENV_KEY) {
        return match serde_json::from_str(&env) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("Failed to load env config (Using default): {:?}", err);
                Config::default()
            }
        };
    }

    // Attempt to load the config from disk
    let file = Path::new("config.json");
    if !file.exists() {
        return Config::default();
    }

    let data = match read_to_string(file) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using defaults): {:?}", err);
            return Config::default();
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to load config file (Using default): {:?}", err);
            Config::default()
        }
    }
}

/// All of the enumerated configuration keys from spec §6, plus the ambient
/// logging/database settings the teacher repo also keeps in `Config`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LevelFilter,
    pub database_file: String,

    pub acceptance: AcceptanceConfig,
    pub draft: DraftConfig,
    pub game: GameConfig,
    pub queue: QueueConfig,
    pub player_lock: PlayerLockConfig,
    pub janitor: JanitorConfig,
    pub bot: BotConfig,
    pub ranked_data: RankedDataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LevelFilter::Info,
            database_file: "data/custom_match.db".to_string(),
            acceptance: Default::default(),
            draft: Default::default(),
            game: Default::default(),
            queue: Default::default(),
            player_lock: Default::default(),
            janitor: Default::default(),
            bot: Default::default(),
            ranked_data: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    pub timeout_seconds: u64,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    pub action_timeout_ms: u64,
    pub confirmation_timeout_seconds: u64,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: 30_000,
            confirmation_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub timeout_ms: u64,
    pub monitoring_interval_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3_600_000,
            monitoring_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub min_cohort: usize,
    pub enabled: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_cohort: 10,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerLockConfig {
    pub ttl_hours: u64,
}

impl Default for PlayerLockConfig {
    fn default() -> Self {
        Self { ttl_hours: 4 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    pub interval_ms: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub auto_accept_delay_ms: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            auto_accept_delay_ms: 2_000,
        }
    }
}

/// Configuration for the external ranked-data adapter (C10). Disabled by
/// default since it talks to a collaborator outside this crate's scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankedDataConfig {
    pub enabled: bool,
    pub base_url: String,
}

impl Default for RankedDataConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
        }
    }
}
