//! Governance configuration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use devdao_common::config::{config_file_from_env, env_parsed, env_string, Configuration};
use devdao_common::{Error, Result};

use crate::types::Amount;

/// Default voting window: five minutes
pub const DEFAULT_VOTING_PERIOD_SECS: u64 = 300;

/// Default membership collection cap
pub const DEFAULT_MAX_SUPPLY: u64 = 100;

/// One tenth of an 18-decimal unit
pub const DEFAULT_ASSET_PRICE: Amount = 100_000_000_000_000_000;

/// Five hundredths of an 18-decimal unit
pub const DEFAULT_INITIAL_TREASURY: Amount = 50_000_000_000_000_000;

/// Which token balance counts as a voter's weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteWeightPolicy {
    /// Token count at the moment the vote is cast
    #[default]
    Live,
    /// Token count as of the proposal's creation time
    Snapshot,
}

impl fmt::Display for VoteWeightPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteWeightPolicy::Live => write!(f, "live"),
            VoteWeightPolicy::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl FromStr for VoteWeightPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(VoteWeightPolicy::Live),
            "snapshot" => Ok(VoteWeightPolicy::Snapshot),
            other => Err(format!("unknown vote weight policy '{}'", other)),
        }
    }
}

/// Configuration for a governance instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Length of the voting window in seconds
    #[serde(default = "default_voting_period_secs")]
    pub voting_period_secs: u64,
    /// How vote weight is measured
    #[serde(default)]
    pub vote_weight_policy: VoteWeightPolicy,
    /// Only token holders may trigger execution
    #[serde(default)]
    pub members_only_execution: bool,
    /// Cap on membership tokens for the bundled registry
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,
    /// Fixed price of the bundled marketplace
    #[serde(default = "default_asset_price")]
    pub asset_price: Amount,
    /// Treasury funding at instantiation
    #[serde(default = "default_initial_treasury")]
    pub initial_treasury: Amount,
    /// Where ledger state is persisted
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory for rolling log files, console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_voting_period_secs() -> u64 {
    DEFAULT_VOTING_PERIOD_SECS
}

fn default_max_supply() -> u64 {
    DEFAULT_MAX_SUPPLY
}

fn default_asset_price() -> Amount {
    DEFAULT_ASSET_PRICE
}

fn default_initial_treasury() -> Amount {
    DEFAULT_INITIAL_TREASURY
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            voting_period_secs: default_voting_period_secs(),
            vote_weight_policy: VoteWeightPolicy::default(),
            members_only_execution: false,
            max_supply: default_max_supply(),
            asset_price: default_asset_price(),
            initial_treasury: default_initial_treasury(),
            data_dir: default_data_dir(),
            log_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Configuration for GovernanceConfig {
    fn validate(&self) -> Result<()> {
        if self.voting_period_secs == 0 {
            return Err(Error::validation("voting_period_secs must be positive"));
        }
        if self.max_supply == 0 {
            return Err(Error::validation("max_supply must be positive"));
        }
        Ok(())
    }
}

impl GovernanceConfig {
    /// Load configuration from `DEVDAO_CONFIG_FILE` if it points at a file,
    /// otherwise from defaults overridden by `DEVDAO_*` variables
    pub fn from_env() -> Result<Self> {
        if let Some(path) = config_file_from_env() {
            debug!("Loading governance config from {}", path);
            return Self::from_file(path);
        }

        let mut config = Self::default();

        if let Some(period) = env_parsed("DEVDAO_VOTING_PERIOD_SECS")? {
            config.voting_period_secs = period;
        }
        if let Some(policy) = env_parsed::<VoteWeightPolicy>("DEVDAO_VOTE_WEIGHT_POLICY")? {
            config.vote_weight_policy = policy;
        }
        if let Some(restricted) = env_parsed("DEVDAO_MEMBERS_ONLY_EXECUTION")? {
            config.members_only_execution = restricted;
        }
        if let Some(max_supply) = env_parsed("DEVDAO_MAX_SUPPLY")? {
            config.max_supply = max_supply;
        }
        if let Some(price) = env_parsed("DEVDAO_ASSET_PRICE")? {
            config.asset_price = price;
        }
        if let Some(funding) = env_parsed("DEVDAO_INITIAL_TREASURY")? {
            config.initial_treasury = funding;
        }
        if let Some(data_dir) = env_string("DEVDAO_DATA_DIR") {
            config.data_dir = data_dir;
        }
        if let Some(log_dir) = env_string("DEVDAO_LOG_DIR") {
            config.log_dir = Some(log_dir);
        }
        if let Some(log_level) = env_string("DEVDAO_LOG_LEVEL") {
            config.log_level = log_level;
        }

        config.validate()?;
        Ok(config)
    }
}
