//! Runtime configuration loaded from YAML.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Top-level configuration for a tracker instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroveConfig {
    /// Profit represented by one tree.
    #[serde(default = "default_unit_value")]
    pub unit_value: Decimal,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// How new tree positions are searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Seeded random sampling over the ground square.
    Scatter,
    /// Row-major scan of a lattice whose pitch exceeds the separation.
    Grid,
}

/// Population engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tree count that triggers a reset and carry-over.
    pub milestone: u32,
    /// Delay between consecutive spawns of one batch.
    pub stagger_ms: u64,
    /// Minimum planar distance between two trees (exclusive).
    pub min_separation: f32,
    /// Trees are placed within [-half_extent, half_extent] on both axes.
    pub half_extent: f32,
    /// Random candidates tried per tree before giving up.
    pub max_attempts: u32,
    pub placement: Placement,
    /// Number of lift frames in the rise animation.
    pub rise_steps: u32,
    pub rise_step_ms: u64,
    /// Starting depth below the ground.
    pub rise_depth: f32,
    /// Seed for scatter placement.
    pub seed: u64,
}

fn default_unit_value() -> Decimal {
    ledger_econ::UNIT_VALUE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            milestone: 100,
            stagger_ms: 300,
            min_separation: 0.5,
            half_extent: 4.0,
            max_attempts: 200,
            placement: Placement::Scatter,
            rise_steps: 20,
            rise_step_ms: 16,
            rise_depth: 0.6,
            seed: 42,
        }
    }
}

impl Default for GroveConfig {
    fn default() -> Self {
        Self {
            unit_value: default_unit_value(),
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl GroveConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: GroveConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.unit_value <= Decimal::ZERO {
            return Err(ConfigError::Invalid("unit_value must be > 0".into()));
        }
        self.engine.validate()
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.milestone == 0 {
            return Err(ConfigError::Invalid("milestone must be > 0".into()));
        }
        if !(self.min_separation.is_finite() && self.min_separation > 0.0) {
            return Err(ConfigError::Invalid("min_separation must be > 0".into()));
        }
        if !(self.half_extent.is_finite() && self.half_extent > 0.0) {
            return Err(ConfigError::Invalid("half_extent must be > 0".into()));
        }
        if self.min_separation >= self.half_extent * 2.0 * std::f32::consts::SQRT_2 {
            return Err(ConfigError::Invalid(
                "min_separation does not fit on the ground".into(),
            ));
        }
        if self.max_attempts == 0 || self.rise_steps == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts and rise_steps must be > 0".into(),
            ));
        }
        if !(self.rise_depth.is_finite() && self.rise_depth >= 0.0) {
            return Err(ConfigError::Invalid("rise_depth must be >= 0".into()));
        }
        Ok(())
    }
}
