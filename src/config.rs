//! Hyper-parameters, simulator parameters and run settings.
//!
//! Every section has a `Default` matching the values the agent was tuned
//! with, so a TOML file only needs to list the fields it overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MixError, Result};

/// Top-level configuration, usually read from `mix_dqn.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub simulator: SimulatorConfig,
    pub run: RunConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.training.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Learning hyper-parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub buffer_size: usize,
    pub batch_size: usize,
    pub gamma: f64,
    /// Target sync period, counted in intra-episode steps.
    pub update_freq: usize,
    pub episodes: usize,
    pub steps: usize,
    pub learning_rate: f64,
    pub epsilon_floor: f64,
    pub epsilon_decay_rate: f64,
}

impl TrainingConfig {
    /// Rejects settings the training loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(MixError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.batch_size > self.buffer_size {
            return Err(MixError::InvalidConfig(format!(
                "batch_size {} exceeds buffer_size {}",
                self.batch_size, self.buffer_size
            )));
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            buffer_size: 32,
            batch_size: 4,
            gamma: 0.85,
            update_freq: 50,
            episodes: 100,
            steps: 30,
            learning_rate: 0.40,
            epsilon_floor: 0.01,
            epsilon_decay_rate: 0.001,
        }
    }
}

/// Scene layout and the physical parameters sent to the scene script.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the simulator's Python `zmqRemoteApi` package.
    pub api_path: PathBuf,
    pub table_path: String,
    pub box_path: String,
    pub object_prefix: String,
    pub blocks: usize,
    pub block_mass: f64,
    pub block_length: f64,
    pub friction_cube: f64,
    pub friction_cup: f64,
    pub shape: String,
    pub spawn_function: String,
    pub signal_name: String,
    pub drop_sentinel: f64,
    pub settle_ticks: usize,
    /// Distance the container travels in each half of a shake.
    pub span: f64,
    /// Ticks per half of a shake.
    pub micro_steps: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23000,
            api_path: PathBuf::from("/app/zmq/"),
            table_path: "/Table".to_string(),
            box_path: "/Table/Box".to_string(),
            object_prefix: "Cylinder".to_string(),
            blocks: 18,
            block_mass: 14.375e-3,
            block_length: 0.016,
            friction_cube: 0.06,
            friction_cup: 0.8,
            shape: "cylinder".to_string(),
            spawn_function: "setNumberOfBlocks".to_string(),
            signal_name: "toPython".to_string(),
            drop_sentinel: 99.0,
            settle_ticks: 20,
            span: 0.02,
            micro_steps: 5,
        }
    }
}

/// What the binary does and where it keeps its artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub train: bool,
    pub model_path: PathBuf,
    pub logdir: PathBuf,
    pub seed: Option<u64>,
    pub eval_episodes: usize,
    pub eval_steps: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train: true,
            model_path: PathBuf::from("model"),
            logdir: PathBuf::from("./logdir"),
            seed: None,
            eval_episodes: 100,
            eval_steps: 30,
        }
    }
}
