// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 The simnet project developers

//! Engine startup configuration.
//!
//! A single typed record, loadable from a TOML file or built
//! programmatically, validated eagerly rather than left to fail deep
//! inside the engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::SimulationTime;

/// Configuration errors. Fatal before `Engine` construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Typed engine startup options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default = "default_min_time_jump")]
    pub min_time_jump_ns: u64,

    pub end_time_ns: u64,

    pub graph_path: PathBuf,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_worker_threads() -> usize {
    4
}

fn default_min_time_jump() -> u64 {
    10_000
}

fn default_seed() -> u64 {
    0
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn min_time_jump(&self) -> SimulationTime {
        SimulationTime::from_nanos(self.min_time_jump_ns)
    }

    pub fn end_time(&self) -> SimulationTime {
        SimulationTime::from_nanos(self.end_time_ns)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be > 0".to_string()));
        }
        if self.min_time_jump_ns == 0 {
            return Err(ConfigError::Invalid("min_time_jump_ns must be > 0".to_string()));
        }
        if self.end_time_ns == 0 {
            return Err(ConfigError::Invalid("end_time_ns must be > 0".to_string()));
        }
        Ok(())
    }
}
