//! Runtime Configuration
//!
//! Tunables for the generation pipeline, loadable from `chronoweave.toml`
//! and `CHRONOWEAVE_`-prefixed environment variables. Defaults match the
//! platform's production settings; tests construct configs directly.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::generation::retry::RetryPolicy;

/// Fixed credit price of each pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCosts {
    pub events: u32,
    pub descriptions: u32,
    pub images: u32,
}

impl Default for StageCosts {
    fn default() -> Self {
        Self {
            events: 5,
            descriptions: 5,
            images: 10,
        }
    }
}

impl StageCosts {
    /// Total price of a full pipeline run
    pub fn total(&self) -> u32 {
        self.events + self.descriptions + self.images
    }
}

/// Provider retry bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Top-level configuration for the generation core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub starting_credits: u32,
    pub cache_ttl_secs: i64,
    pub stage_costs: StageCosts,
    pub retry: RetrySettings,
    pub provider_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            starting_credits: 100,
            cache_ttl_secs: 3600,
            stage_costs: StageCosts::default(),
            retry: RetrySettings::default(),
            provider_timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    /// Load configuration: defaults, then `chronoweave.toml`, then
    /// `CHRONOWEAVE_`-prefixed environment variables (nested keys split on
    /// `__`, e.g. `CHRONOWEAVE_STAGE_COSTS__IMAGES=25`)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("chronoweave.toml"))
            .merge(Env::prefixed("CHRONOWEAVE_").split("__"))
            .extract()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}
