//! Pipeline tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Parents posted longer ago than this are no longer monitored.
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: u64,
    /// Cap on replies gathered per parent per cycle.
    #[serde(default = "default_max_replies_per_fetch")]
    pub max_replies_per_fetch: usize,
    /// Parents processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Failed attempts after which a reply is abandoned. 0 retries forever.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,
}

fn default_lookback_secs() -> u64 {
    60 * 60
}

fn default_max_replies_per_fetch() -> usize {
    100
}

fn default_workers() -> usize {
    4
}

fn default_generation_timeout_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_secs: default_lookback_secs(),
            max_replies_per_fetch: default_max_replies_per_fetch(),
            workers: default_workers(),
            max_retries: 0,
            generation_timeout_ms: default_generation_timeout_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Whether `retry_count` failures should close the reply.
    pub fn retries_exhausted(&self, retry_count: i32) -> bool {
        self.max_retries > 0 && retry_count >= self.max_retries as i32
    }
}
