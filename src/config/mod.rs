// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Engine configuration.
//!
//! Configuration is read from a TOML file with two optional sections:
//!
//! ```toml
//! [runtime]
//! threads = 8          # 0 = detected hardware concurrency
//! accelerators = false
//!
//! [vectorized]
//! queue-mode = "per-cpu"          # centralized | per-cpu | per-group
//! steal-logic = "sequential"      # off | sequential | sequential-priority
//! pin-workers = true
//! batch-size = 64
//! partitioning = "static"         # static | batched | guided | factoring
//! prefetch-ratio = 1.0
//! verbose = false
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::vectorized::PartitionScheme;

/// File name searched for by [`find_config_file`].
pub const CONFIG_FILE_NAME: &str = "mind-vec.toml";

/// Complete engine configuration.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub vectorized: VectorizedConfig,
}

/// Process-wide execution resources.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeConfig {
    /// CPU worker threads; `0` selects the detected hardware concurrency.
    #[serde(default)]
    pub threads: usize,
    /// Whether accelerator devices registered with the context may be used.
    #[serde(default)]
    pub accelerators: bool,
}

/// How tasks are distributed over queues.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum QueueMode {
    /// One queue shared by every worker.
    #[default]
    Centralized,
    /// One queue per CPU worker, bound to a physical core.
    PerCpu,
    /// One queue per physical package.
    PerGroup,
}

impl fmt::Display for QueueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueMode::Centralized => write!(f, "centralized"),
            QueueMode::PerCpu => write!(f, "per-cpu"),
            QueueMode::PerGroup => write!(f, "per-group"),
        }
    }
}

/// Order in which an idle worker visits sibling queues.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StealLogic {
    /// Never steal.
    Off,
    /// Ascending queue index, starting after the worker's own queue.
    #[default]
    Sequential,
    /// Queues of the worker's own physical group first, then the rest.
    SequentialPriority,
}

/// Vectorized-pipeline distribution settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct VectorizedConfig {
    #[serde(default)]
    pub queue_mode: QueueMode,
    #[serde(default)]
    pub steal_logic: StealLogic,
    #[serde(default)]
    pub pin_workers: bool,
    /// Minimum rows per task.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Tasks a worker claims from its own queue per access.
    #[serde(default = "default_claim_size")]
    pub claim_size: usize,
    #[serde(default)]
    pub partitioning: PartitionScheme,
    /// Prefetch inputs to a device only while the run's footprint stays
    /// strictly below this fraction of its memory budget.
    #[serde(default = "default_prefetch_ratio")]
    pub prefetch_ratio: f64,
    /// Log every task a worker executes.
    #[serde(default)]
    pub verbose: bool,
}

fn default_batch_size() -> usize {
    1
}

fn default_claim_size() -> usize {
    1
}

fn default_prefetch_ratio() -> f64 {
    1.0
}

impl Default for VectorizedConfig {
    fn default() -> Self {
        Self {
            queue_mode: QueueMode::default(),
            steal_logic: StealLogic::default(),
            pin_workers: false,
            batch_size: default_batch_size(),
            claim_size: default_claim_size(),
            partitioning: PartitionScheme::default(),
            prefetch_ratio: default_prefetch_ratio(),
            verbose: false,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("batch size must be positive")]
    ZeroBatchSize,
    #[error("claim size must be positive")]
    ZeroClaimSize,
    #[error("prefetch ratio must lie in (0, 1], got {0}")]
    PrefetchRatio(f64),
}

impl VectorizedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.claim_size == 0 {
            return Err(ConfigError::ZeroClaimSize);
        }
        if !(self.prefetch_ratio > 0.0 && self.prefetch_ratio <= 1.0) {
            return Err(ConfigError::PrefetchRatio(self.prefetch_ratio));
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content).context("invalid engine configuration")?;
        config.vectorized.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Find [`CONFIG_FILE_NAME`] in `start` or any of its parents.
pub fn find_config_file(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(anyhow!(
                "Could not find {} in {} or any parent",
                CONFIG_FILE_NAME,
                start.display()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.vectorized.batch_size, 1);
        assert_eq!(cfg.vectorized.queue_mode, QueueMode::Centralized);
    }

    #[test]
    fn parses_kebab_case_sections() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            [runtime]
            threads = 3
            accelerators = true

            [vectorized]
            queue-mode = "per-group"
            steal-logic = "sequential-priority"
            pin-workers = true
            batch-size = 16
            claim-size = 4
            partitioning = "guided"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.runtime, RuntimeConfig { threads: 3, accelerators: true });
        assert_eq!(cfg.vectorized.queue_mode, QueueMode::PerGroup);
        assert_eq!(cfg.vectorized.steal_logic, StealLogic::SequentialPriority);
        assert_eq!(cfg.vectorized.partitioning, PartitionScheme::Guided);
        assert!(cfg.vectorized.pin_workers);
        assert_eq!(cfg.vectorized.batch_size, 16);
        assert_eq!(cfg.vectorized.claim_size, 4);
    }

    #[test]
    fn rejects_zero_batch_size() {
        let err = EngineConfig::from_toml_str("[vectorized]\nbatch-size = 0\n").unwrap_err();
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn claim_size_is_independent_of_batch_size() {
        let cfg = EngineConfig::from_toml_str("[vectorized]\nbatch-size = 64\n").unwrap();
        assert_eq!(cfg.vectorized.claim_size, 1);
        let mut vectorized = cfg.vectorized;
        vectorized.claim_size = 0;
        assert_eq!(vectorized.validate(), Err(ConfigError::ZeroClaimSize));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(EngineConfig::from_toml_str("[vectorized]\nqueues = 2\n").is_err());
    }

    #[test]
    fn prefetch_ratio_bounds() {
        let mut cfg = VectorizedConfig::default();
        cfg.prefetch_ratio = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::PrefetchRatio(1.5)));
        cfg.prefetch_ratio = 0.5;
        assert!(cfg.validate().is_ok());
    }
}
