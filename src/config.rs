use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::env;
use std::str::FromStr;

/// Longest difficulty a 256-bit digest can satisfy (64 hex characters)
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur while loading configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Difficulty {0} exceeds the maximum of 64")]
    DifficultyTooHigh(usize),

    #[error("Mining workers must be at least 1")]
    NoWorkers,
}

/// Mining parameters bound to a ledger at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Number of leading '0' hex characters a block hash must have
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Amount credited to the ledger's address for each mined block
    #[serde(default = "default_reward")]
    pub reward: f64,

    /// Sender tag used on reward transactions
    #[serde(default = "default_reward_sender")]
    pub reward_sender: String,

    /// Threads used for the nonce search
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_difficulty() -> usize {
    3
}

fn default_reward() -> f64 {
    1.0
}

fn default_reward_sender() -> String {
    "THE BLOCKCHAIN".to_string()
}

fn default_workers() -> usize {
    1
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            difficulty: default_difficulty(),
            reward: default_reward(),
            reward_sender: default_reward_sender(),
            workers: default_workers(),
        }
    }
}

impl MiningConfig {
    /// Sets the mining difficulty
    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Sets the mining reward
    pub fn with_reward(mut self, reward: f64) -> Self {
        self.reward = reward;
        self
    }

    /// Sets the number of search workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Checks that mining with this configuration can terminate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }

        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }

        Ok(())
    }

    /// Loads the defaults, overridden by `LEDGER_DIFFICULTY`, `LEDGER_REWARD`,
    /// `LEDGER_REWARD_SENDER` and `LEDGER_WORKERS` when set
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = MiningConfig::default();

        if let Some(difficulty) = parse_var(&lookup, "LEDGER_DIFFICULTY")? {
            config.difficulty = difficulty;
        }
        if let Some(reward) = parse_var(&lookup, "LEDGER_REWARD")? {
            config.reward = reward;
        }
        if let Some(sender) = lookup("LEDGER_REWARD_SENDER") {
            config.reward_sender = sender;
        }
        if let Some(workers) = parse_var(&lookup, "LEDGER_WORKERS")? {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Settings for the HTTP server and the ledger it serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address credited with mining rewards
    pub address: String,

    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Mining parameters for the served ledger
    #[serde(default)]
    pub mining: MiningConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: "myBlockChainAddress".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            mining: MiningConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads the defaults, overridden by `LEDGER_ADDRESS`, `LEDGER_BIND_HOST`
    /// and `LEDGER_BIND_PORT` plus the mining variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig {
            mining: MiningConfig::from_lookup(&lookup)?,
            ..ServerConfig::default()
        };

        if let Some(address) = lookup("LEDGER_ADDRESS") {
            config.address = address;
        }
        if let Some(host) = lookup("LEDGER_BIND_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "LEDGER_BIND_PORT")? {
            config.port = port;
        }

        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}
