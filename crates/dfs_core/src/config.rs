//! # Engine Configuration
//!
//! Every tunable constant lives here, grouped by the component that reads
//! it. Correlation pair weights, event probabilities and value baselines
//! are policy, so they are configuration rather than code.
//!
//! ## Presets
//! - `cash_game()`: floor-oriented, tighter spreads, double-up payouts in mind
//! - `tournament()`: ceiling-oriented, heavier stacking, sharper fields
//! - `deterministic()`: one worker, no events, no field noise (tests)
//!
//! ## Usage
//! ```rust
//! use dfs_core::config::EngineConfig;
//!
//! let config = EngineConfig::tournament();
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analytics::AnalyticsConfig;
use crate::correlation::{CorrelationEngine, CorrelationRules};
use crate::distribution::{DistributionConfig, DistributionEngine};
use crate::error::{DfsError, Result};
use crate::optimizer::{LineupOptimizer, OptimizerConfig};
use crate::scoring::{ScoringWeights, Strategy};
use crate::simulation::{ContestFieldSimulator, EventConfig, FieldConfig, MonteCarloEngine, SimulationConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy used when a request does not name one
    pub strategy: Strategy,
    pub analytics: AnalyticsConfig,
    pub scoring: ScoringWeights,
    pub optimizer: OptimizerConfig,
    pub correlation: CorrelationRules,
    pub distribution: DistributionConfig,
    pub events: EventConfig,
    pub field: FieldConfig,
    pub simulation: SimulationConfig,
}

impl EngineConfig {
    /// Cash games reward consistency over upside.
    pub fn cash_game() -> Self {
        let mut cfg = Self::default();
        cfg.strategy = Strategy::MaximizeFloor;
        cfg.scoring.floor_weight = 0.8;
        cfg.scoring.correlation_bonus = 0.05;
        cfg.field.shark_share = 0.25; // cash fields skew sharp
        cfg.field.recreational_share = 0.55;
        cfg
    }

    /// Tournaments reward correlated upside and leverage.
    pub fn tournament() -> Self {
        let mut cfg = Self::default();
        cfg.strategy = Strategy::CorrelationWeighted;
        cfg.scoring.ceiling_weight = 0.8;
        cfg.scoring.correlation_bonus = 0.25;
        cfg.scoring.ownership_penalty = 1.0;
        cfg.field.shark_share = 0.12;
        cfg
    }

    /// Reproducible runs for tests and regression baselines.
    pub fn deterministic() -> Self {
        let mut cfg = Self::default();
        cfg.events.enabled = false;
        cfg.field.projection_noise = 0.0;
        cfg.simulation.seed = 0;
        cfg.simulation.worker_threads = Some(1);
        cfg
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a `.yaml`/`.yml` or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let cfg = if is_yaml { Self::from_yaml_str(&text)? } else { Self::from_json_str(&text)? };
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(cfg)
    }

    /// Range checks on every section plus the cross-field rules the derive
    /// cannot express.
    pub fn validate(&self) -> Result<()> {
        self.analytics.validate()?;
        self.scoring.validate()?;
        self.optimizer.validate()?;
        self.correlation.validate()?;
        self.distribution.validate()?;
        self.events.validate()?;
        self.field.validate()?;
        self.simulation.validate()?;

        if self.analytics.floor_percentile >= self.analytics.ceiling_percentile {
            return Err(invalid("analytics.floor_percentile must be below ceiling_percentile"));
        }
        if self.analytics.default_cv.values().any(|cv| !(0.0..=5.0).contains(cv)) {
            return Err(invalid("analytics.default_cv entries must be in [0, 5]"));
        }
        if self.analytics.value_baseline.values().any(|b| !(*b > 0.0 && b.is_finite())) {
            return Err(invalid("analytics.value_baseline entries must be positive"));
        }
        if self.events.injury_base_rate.values().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(invalid("events.injury_base_rate entries must be probabilities"));
        }
        if self.events.weather_penalty.values().any(|p| !(-1.0..=1.0).contains(p)) {
            return Err(invalid("events.weather_penalty entries must be in [-1, 1]"));
        }
        if self.events.blowout_base_rate > self.events.blowout_max_rate {
            return Err(invalid("events.blowout_base_rate exceeds blowout_max_rate"));
        }
        if self.field.shark_share + self.field.recreational_share > 1.0 + 1e-9 {
            return Err(invalid("field shark_share + recreational_share exceeds 1"));
        }
        if self.correlation.repair_jitter > self.correlation.max_repair_jitter {
            return Err(invalid("correlation.repair_jitter exceeds max_repair_jitter"));
        }
        if self.simulation.worker_threads == Some(0) {
            return Err(invalid("simulation.worker_threads must be at least 1"));
        }
        Ok(())
    }

    pub fn optimizer(&self) -> LineupOptimizer {
        LineupOptimizer::new(self.optimizer.clone(), self.scoring.clone())
    }

    pub fn correlation_engine(&self) -> CorrelationEngine {
        CorrelationEngine::new(self.correlation.clone())
    }

    pub fn simulator(&self) -> MonteCarloEngine {
        MonteCarloEngine::new(self.simulation.clone())
            .with_distributions(DistributionEngine::new(self.distribution.clone()))
            .with_correlation(self.correlation_engine())
            .with_events(self.events.clone())
            .with_field(ContestFieldSimulator::new(self.field.clone(), self.scoring.clone()))
    }
}

fn invalid(msg: &str) -> DfsError {
    DfsError::InvalidConfig(msg.to_string())
}

// ========== Tests ==========
