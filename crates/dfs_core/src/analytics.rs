//! # Player Analytics
//!
//! Derives ceiling, floor, volatility and value rating for each player from
//! a historical series of realized fantasy points.
//!
//! - Floor: 15th percentile (85% chance of beating it)
//! - Ceiling: 85th percentile (15% chance of beating it)
//! - Volatility: coefficient of variation (stddev / mean)
//! - Value rating: points per 1K salary, normalized per sport
//!
//! Short or missing histories fall back to a position default spread around
//! the projection instead of failing. Players with no salary or projection
//! are reported as not ratable; callers leave them out of optimization.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Player, PlayerPool, Position, Sport};

/// Standard normal z-score of the 85th percentile
pub const Z_85: f64 = 1.036_433;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Minimum history length before percentiles are trusted
    #[validate(range(min = 2))]
    pub min_samples: usize,
    #[validate(range(min = 0.0, max = 50.0))]
    pub floor_percentile: f64,
    #[validate(range(min = 50.0, max = 100.0))]
    pub ceiling_percentile: f64,
    /// Per-position coefficient of variation overrides
    pub default_cv: BTreeMap<Position, f64>,
    /// Per-sport points-per-1K that maps to a value rating of 1.0
    pub value_baseline: BTreeMap<Sport, f64>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            floor_percentile: 15.0,
            ceiling_percentile: 85.0,
            default_cv: BTreeMap::new(),
            value_baseline: BTreeMap::new(),
        }
    }
}

impl AnalyticsConfig {
    /// Typical scoring CV for a position when no history is available.
    pub fn default_cv(&self, sport: Sport, position: Position) -> f64 {
        if let Some(&cv) = self.default_cv.get(&position) {
            return cv;
        }
        match (sport, position) {
            (Sport::Nfl, Position::QB) => 0.35,
            (Sport::Nfl, Position::RB) => 0.50,
            (Sport::Nfl, Position::WR) => 0.60,
            (Sport::Nfl, Position::TE) => 0.65,
            (Sport::Nfl, Position::K) => 0.40,
            (Sport::Nfl, Position::DST) => 0.75,
            (Sport::Nba, _) => 0.28,
            (Sport::Mlb, Position::P) => 0.50,
            (Sport::Mlb, _) => 0.85,
            (Sport::Nhl, Position::G) => 0.55,
            (Sport::Nhl, _) => 0.75,
            (Sport::Pga, _) => 0.40,
            _ => 0.50,
        }
    }

    /// Points per 1K salary considered par for a sport.
    pub fn value_baseline(&self, sport: Sport) -> f64 {
        if let Some(&baseline) = self.value_baseline.get(&sport) {
            return baseline;
        }
        match sport {
            Sport::Nfl => 3.0,
            Sport::Nba => 5.5,
            Sport::Mlb => 2.0,
            Sport::Nhl => 2.2,
            Sport::Pga => 8.0,
        }
    }
}

/// Where a player's floor and ceiling came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsSource {
    History,
    Provided,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAnalytics {
    pub ceiling: f64,
    pub floor: f64,
    pub volatility: f64,
    pub value_rating: f64,
    pub source: AnalyticsSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsOutcome {
    Rated(PlayerAnalytics),
    NotRatable { reason: String },
}

impl AnalyticsOutcome {
    pub fn rated(self) -> Option<PlayerAnalytics> {
        match self {
            AnalyticsOutcome::Rated(a) => Some(a),
            AnalyticsOutcome::NotRatable { .. } => None,
        }
    }
}

/// Linear-interpolated percentile of an unsorted series; `p` in [0, 100].
pub fn percentile(series: &[f64], p: f64) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

/// Percentile of an already sorted, non-empty slice.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Coefficient of variation; 0 for empty, constant or non-positive-mean series.
pub fn coefficient_of_variation(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    if mean <= 0.0 || !mean.is_finite() {
        return 0.0;
    }
    let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let cv = var.sqrt() / mean;
    if cv.is_finite() {
        cv
    } else {
        0.0
    }
}

pub fn value_rating(player: &Player, config: &AnalyticsConfig) -> f64 {
    let per_k = player.projection / (player.salary as f64 / 1000.0);
    per_k / config.value_baseline(player.sport)
}

/// Analyze one player against its history.
pub fn analyze(player: &Player, history: &[f64], config: &AnalyticsConfig) -> AnalyticsOutcome {
    if player.salary == 0 {
        return AnalyticsOutcome::NotRatable { reason: format!("{} has no salary", player.id) };
    }
    if player.projection <= 0.0 || !player.projection.is_finite() {
        return AnalyticsOutcome::NotRatable {
            reason: format!("{} has non-positive projection", player.id),
        };
    }

    let value_rating = value_rating(player, config);
    let clean: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();

    if clean.len() >= config.min_samples {
        let cv = coefficient_of_variation(&clean);
        let floor = percentile(&clean, config.floor_percentile).unwrap_or(0.0);
        let ceiling = percentile(&clean, config.ceiling_percentile).unwrap_or(0.0);
        if ceiling > floor {
            return AnalyticsOutcome::Rated(PlayerAnalytics {
                ceiling,
                floor: floor.max(0.0).min(ceiling),
                volatility: cv,
                value_rating,
                source: AnalyticsSource::History,
            });
        }
        // A constant series carries no spread information; use the fallback.
    }

    AnalyticsOutcome::Rated(fallback(player, &clean, value_rating, config))
}

/// Projection ± the position's default spread. Volatility stays the series
/// statistic (0 for an empty or constant series).
fn fallback(
    player: &Player,
    history: &[f64],
    value_rating: f64,
    config: &AnalyticsConfig,
) -> PlayerAnalytics {
    let spread = Z_85 * config.default_cv(player.sport, player.position);
    PlayerAnalytics {
        ceiling: player.projection * (1.0 + spread),
        floor: (player.projection * (1.0 - spread)).max(0.0),
        volatility: coefficient_of_variation(history),
        value_rating,
        source: AnalyticsSource::Fallback,
    }
}

/// Analytics from the player record itself when upstream already supplied a
/// sensible floor and ceiling.
fn from_record(player: &Player, config: &AnalyticsConfig) -> AnalyticsOutcome {
    if !player.is_ratable() {
        return analyze(player, &[], config);
    }
    let provided = player.floor.is_finite()
        && player.ceiling.is_finite()
        && player.floor >= 0.0
        && player.floor < player.projection
        && player.projection < player.ceiling;
    if !provided {
        return analyze(player, &[], config);
    }
    let volatility = if player.volatility > 0.0 && player.volatility.is_finite() {
        player.volatility
    } else {
        (player.ceiling - player.floor) / (2.0 * Z_85 * player.projection)
    };
    AnalyticsOutcome::Rated(PlayerAnalytics {
        ceiling: player.ceiling,
        floor: player.floor,
        volatility,
        value_rating: value_rating(player, config),
        source: AnalyticsSource::Provided,
    })
}

/// Analytics for every pool player, indexed like the pool.
#[derive(Debug, Clone)]
pub struct AnalyticsTable {
    entries: Vec<Option<PlayerAnalytics>>,
}

impl AnalyticsTable {
    /// Histories are keyed by player id; players without one use their record.
    pub fn build(
        pool: &PlayerPool,
        histories: &HashMap<String, Vec<f64>>,
        config: &AnalyticsConfig,
    ) -> Self {
        let entries: Vec<Option<PlayerAnalytics>> = pool
            .players()
            .iter()
            .map(|player| {
                let outcome = match histories.get(&player.id) {
                    Some(history) => analyze(player, history, config),
                    None => from_record(player, config),
                };
                if let AnalyticsOutcome::NotRatable { reason } = &outcome {
                    tracing::debug!("Skipping unratable player: {}", reason);
                }
                outcome.rated()
            })
            .collect();

        let table = Self { entries };
        tracing::debug!("Analytics rated {}/{} players", table.ratable_count(), pool.len());
        table
    }

    /// Table built from player records only.
    pub fn from_pool(pool: &PlayerPool, config: &AnalyticsConfig) -> Self {
        Self::build(pool, &HashMap::new(), config)
    }

    /// Copy with each player's point-valued analytics multiplied by its
    /// factor. Volatility is scale free and stays as is.
    pub fn scaled(&self, factors: &[f64]) -> Self {
        let entries = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry.as_ref().map(|a| {
                    let f = factors.get(i).copied().filter(|f| f.is_finite() && *f > 0.0).unwrap_or(1.0);
                    PlayerAnalytics {
                        ceiling: a.ceiling * f,
                        floor: a.floor * f,
                        volatility: a.volatility,
                        value_rating: a.value_rating * f,
                        source: a.source,
                    }
                })
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, index: usize) -> Option<&PlayerAnalytics> {
        self.entries.get(index).and_then(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ratable_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InjuryStatus;

    fn qb(projection: f64, salary: u32) -> Player {
        Player {
            id: "qb".to_string(),
            name: "Quarterback".to_string(),
            sport: Sport::Nfl,
            position: Position::QB,
            team: "KC".to_string(),
            opponent: "BUF".to_string(),
            salary,
            projection,
            floor: projection,
            ceiling: projection,
            volatility: 0.0,
            value_rating: 0.0,
            ownership: None,
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    #[test]
    fn test_percentiles_from_history() {
        let history: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let cfg = AnalyticsConfig::default();
        let a = analyze(&qb(50.0, 8000), &history, &cfg).rated().unwrap();
        assert!((a.floor - 15.0).abs() < 1e-9);
        assert!((a.ceiling - 85.0).abs() < 1e-9);
        assert_eq!(a.source, AnalyticsSource::History);
        assert!(a.volatility > 0.0);
    }

    #[test]
    fn test_empty_history_falls_back_without_nan() {
        // identical projection / floor / ceiling and no history
        let cfg = AnalyticsConfig::default();
        let p = qb(20.0, 7000);
        let a = analyze(&p, &[], &cfg).rated().unwrap();
        assert_eq!(a.source, AnalyticsSource::Fallback);
        assert!(a.floor.is_finite() && a.ceiling.is_finite() && a.volatility.is_finite());
        assert!(a.floor < 20.0 && a.ceiling > 20.0);
        assert_eq!(a.volatility, 0.0);

        let pool = PlayerPool::new(vec![p]).unwrap();
        let table = AnalyticsTable::from_pool(&pool, &cfg);
        let b = table.get(0).unwrap();
        assert_eq!(b.source, AnalyticsSource::Fallback);
        assert!(!b.value_rating.is_nan());
    }

    #[test]
    fn test_constant_series_has_zero_volatility_and_falls_back() {
        let cfg = AnalyticsConfig::default();
        assert_eq!(coefficient_of_variation(&[12.0; 10]), 0.0);
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        let a = analyze(&qb(12.0, 6000), &[12.0; 10], &cfg).rated().unwrap();
        assert_eq!(a.source, AnalyticsSource::Fallback);
    }

    #[test]
    fn test_short_history_uses_fallback() {
        let cfg = AnalyticsConfig::default();
        let a = analyze(&qb(18.0, 6000), &[10.0, 30.0], &cfg).rated().unwrap();
        assert_eq!(a.source, AnalyticsSource::Fallback);
    }

    #[test]
    fn test_not_ratable() {
        let cfg = AnalyticsConfig::default();
        assert!(matches!(analyze(&qb(10.0, 0), &[], &cfg), AnalyticsOutcome::NotRatable { .. }));
        assert!(matches!(analyze(&qb(0.0, 5000), &[], &cfg), AnalyticsOutcome::NotRatable { .. }));
        assert!(matches!(analyze(&qb(-3.0, 5000), &[], &cfg), AnalyticsOutcome::NotRatable { .. }));
    }

    #[test]
    fn test_value_rating_is_sport_normalized() {
        let cfg = AnalyticsConfig::default();
        // 3 points per 1K in football is par
        let v = value_rating(&qb(24.0, 8000), &cfg);
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_provided_floor_and_ceiling_are_kept() {
        let cfg = AnalyticsConfig::default();
        let mut p = qb(20.0, 7000);
        p.floor = 12.0;
        p.ceiling = 31.0;
        let pool = PlayerPool::new(vec![p]).unwrap();
        let table = AnalyticsTable::from_pool(&pool, &cfg);
        let a = table.get(0).unwrap();
        assert_eq!(a.source, AnalyticsSource::Provided);
        assert_eq!(a.floor, 12.0);
        assert_eq!(a.ceiling, 31.0);
        assert!(a.volatility > 0.0);
    }

    #[test]
    fn test_scaled_table_moves_points_not_volatility() {
        let cfg = AnalyticsConfig::default();
        let mut backup = qb(0.0, 7000);
        backup.id = "qb2".to_string();
        let pool = PlayerPool::new(vec![qb(20.0, 7000), backup]).unwrap();
        let table = AnalyticsTable::from_pool(&pool, &cfg);
        let scaled = table.scaled(&[1.5, 2.0]);
        let (a, b) = (table.get(0).unwrap(), scaled.get(0).unwrap());
        assert!((b.ceiling - a.ceiling * 1.5).abs() < 1e-9);
        assert!((b.floor - a.floor * 1.5).abs() < 1e-9);
        assert_eq!(b.volatility, a.volatility);
        assert!(scaled.get(1).is_none());
    }
}
