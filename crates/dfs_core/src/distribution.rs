//! # Distribution Engine
//!
//! Assigns each player a marginal outcome distribution calibrated to its
//! projection, spread, floor and ceiling. The family depends on sport and
//! position; configuration can override it per position.
//!
//! Every draw is clamped to the distribution's `[floor, ceiling]` range.

use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use rand::Rng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;
use statrs::function::erf::erfc;
use validator::Validate;

use crate::analytics::{percentile_sorted, PlayerAnalytics, Z_85};
use crate::models::{Player, Position, Sport};

/// Quantile arguments are kept strictly inside (0, 1).
const P_EPSILON: f64 = 1e-9;

/// Standard normal CDF, Φ(z).
#[inline]
pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    Normal,
    LogNormal,
    Beta,
    Gamma,
    Exponential,
    Empirical,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DistributionConfig {
    /// Relative spread floor: std dev is at least `min_cv × projection`
    #[validate(range(min = 0.0, max = 2.0))]
    pub min_cv: f64,
    /// Absolute variance floor in points²
    #[validate(range(min = 0.0))]
    pub min_variance: f64,
    pub use_empirical: bool,
    /// History length required before the empirical family is used
    #[validate(range(min = 2))]
    pub empirical_min_samples: usize,
    /// Per-position family overrides
    pub family_overrides: BTreeMap<Position, DistributionFamily>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            min_cv: 0.10,
            min_variance: 1.0,
            use_empirical: true,
            empirical_min_samples: 20,
            family_overrides: BTreeMap::new(),
        }
    }
}

/// Family parameters. `Normal` with zero spread is a point mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "family")]
pub enum DistributionKind {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    /// Beta(alpha, beta) stretched over [lower, upper]
    Beta { alpha: f64, beta: f64, lower: f64, upper: f64 },
    Gamma { shape: f64, scale: f64 },
    Exponential { rate: f64 },
    /// Sorted observations; quantiles interpolate between them
    Empirical { sorted: Vec<f64> },
}

/// One player's outcome distribution plus its clamp range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginalDistribution {
    pub kind: DistributionKind,
    pub mean: f64,
    pub floor: f64,
    pub ceiling: f64,
}

impl MarginalDistribution {
    /// Point mass, used for players that cannot be rated.
    pub fn constant(value: f64) -> Self {
        let v = if value.is_finite() { value } else { 0.0 };
        Self { kind: DistributionKind::Normal { mean: v, std_dev: 0.0 }, mean: v, floor: v, ceiling: v }
    }

    pub fn family(&self) -> DistributionFamily {
        match self.kind {
            DistributionKind::Normal { .. } => DistributionFamily::Normal,
            DistributionKind::LogNormal { .. } => DistributionFamily::LogNormal,
            DistributionKind::Beta { .. } => DistributionFamily::Beta,
            DistributionKind::Gamma { .. } => DistributionFamily::Gamma,
            DistributionKind::Exponential { .. } => DistributionFamily::Exponential,
            DistributionKind::Empirical { .. } => DistributionFamily::Empirical,
        }
    }

    #[inline]
    fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.floor, self.ceiling)
        } else {
            self.mean.clamp(self.floor, self.ceiling)
        }
    }

    /// Independent draw, clamped to `[floor, ceiling]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let raw = match &self.kind {
            DistributionKind::Normal { mean, std_dev } => {
                if *std_dev <= 0.0 {
                    *mean
                } else {
                    rand_distr::Normal::new(*mean, *std_dev).map(|d| d.sample(rng)).unwrap_or(*mean)
                }
            }
            DistributionKind::LogNormal { mu, sigma } => {
                rand_distr::LogNormal::new(*mu, *sigma).map(|d| d.sample(rng)).unwrap_or(self.mean)
            }
            DistributionKind::Beta { alpha, beta, lower, upper } => rand_distr::Beta::new(*alpha, *beta)
                .map(|d| lower + (upper - lower) * d.sample(rng))
                .unwrap_or(self.mean),
            DistributionKind::Gamma { shape, scale } => {
                rand_distr::Gamma::new(*shape, *scale).map(|d| d.sample(rng)).unwrap_or(self.mean)
            }
            DistributionKind::Exponential { rate } => {
                rand_distr::Exp::new(*rate).map(|d| d.sample(rng)).unwrap_or(self.mean)
            }
            DistributionKind::Empirical { .. } => return self.quantile(rng.gen::<f64>()),
        };
        self.clamp(raw)
    }

    /// Inverse CDF at `p`, clamped to `[floor, ceiling]`.
    pub fn quantile(&self, p: f64) -> f64 {
        let p = if p.is_finite() { p.clamp(P_EPSILON, 1.0 - P_EPSILON) } else { 0.5 };
        let raw = match &self.kind {
            DistributionKind::Normal { mean, std_dev } => {
                if *std_dev <= 0.0 {
                    *mean
                } else {
                    statrs::distribution::Normal::new(*mean, *std_dev)
                        .map(|d| d.inverse_cdf(p))
                        .unwrap_or(*mean)
                }
            }
            DistributionKind::LogNormal { mu, sigma } => statrs::distribution::LogNormal::new(*mu, *sigma)
                .map(|d| d.inverse_cdf(p))
                .unwrap_or(self.mean),
            DistributionKind::Beta { alpha, beta, lower, upper } => statrs::distribution::Beta::new(*alpha, *beta)
                .map(|d| lower + (upper - lower) * d.inverse_cdf(p))
                .unwrap_or(self.mean),
            DistributionKind::Gamma { shape, scale } => statrs::distribution::Gamma::new(*shape, 1.0 / scale)
                .map(|d| d.inverse_cdf(p))
                .unwrap_or(self.mean),
            DistributionKind::Exponential { rate } => -(1.0 - p).ln() / rate,
            DistributionKind::Empirical { sorted } => {
                if sorted.is_empty() {
                    self.mean
                } else {
                    percentile_sorted(sorted, p * 100.0)
                }
            }
        };
        self.clamp(raw)
    }
}

/// Builds marginals from analytics under one configuration.
#[derive(Debug, Clone, Default)]
pub struct DistributionEngine {
    config: DistributionConfig,
}

impl DistributionEngine {
    pub fn new(config: DistributionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Default family for a position, after configured overrides.
    pub fn family_for(&self, sport: Sport, position: Position) -> DistributionFamily {
        if let Some(&family) = self.config.family_overrides.get(&position) {
            return family;
        }
        use DistributionFamily::*;
        match (sport, position) {
            (Sport::Nfl, Position::QB) => Normal,
            (Sport::Nfl, Position::RB | Position::WR | Position::TE) => LogNormal,
            // kickers score in a narrow band
            (Sport::Nfl, Position::K) => Beta,
            (Sport::Nfl, Position::DST) => Gamma,
            (Sport::Nba, _) => Normal,
            (Sport::Mlb, Position::P) => Normal,
            // most hitter games are near zero with a long right tail
            (Sport::Mlb, _) => Exponential,
            (Sport::Nhl, Position::G) => Normal,
            (Sport::Nhl, _) => Gamma,
            (Sport::Pga, _) => Normal,
            _ => Normal,
        }
    }

    /// Outcome variance: `volatility² × projection²` with relative and
    /// absolute floors. Zero volatility falls back to the floor/ceiling span.
    pub fn variance(&self, projection: f64, analytics: &PlayerAnalytics) -> f64 {
        let cv = if analytics.volatility > 0.0 && analytics.volatility.is_finite() {
            analytics.volatility
        } else if projection > 0.0 {
            ((analytics.ceiling - analytics.floor) / (2.0 * Z_85 * projection)).max(0.0)
        } else {
            0.0
        };
        let from_cv = (cv * projection).powi(2);
        let relative_floor = (self.config.min_cv * projection).powi(2);
        let v = from_cv.max(relative_floor).max(self.config.min_variance);
        if v.is_finite() {
            v
        } else {
            self.config.min_variance
        }
    }

    /// Clamp range: the analytics floor and ceiling, stretched only far
    /// enough to contain the projection.
    fn clamp_range(&self, projection: f64, analytics: &PlayerAnalytics) -> (f64, f64) {
        (analytics.floor.min(projection), analytics.ceiling.max(projection))
    }

    /// Marginal for one rated player.
    pub fn build(&self, player: &Player, analytics: &PlayerAnalytics, history: Option<&[f64]>) -> MarginalDistribution {
        let mean = player.projection;
        let (floor, ceiling) = self.clamp_range(mean, analytics);

        if let Some(history) = history {
            let mut sorted: Vec<f64> = history.iter().copied().filter(|v| v.is_finite()).collect();
            if self.config.use_empirical && sorted.len() >= self.config.empirical_min_samples {
                sorted.sort_by(f64::total_cmp);
                return MarginalDistribution { kind: DistributionKind::Empirical { sorted }, mean, floor, ceiling };
            }
        }

        let variance = self.variance(mean, analytics);
        let family = match self.family_for(player.sport, player.position) {
            // asked for without enough history
            DistributionFamily::Empirical => DistributionFamily::Normal,
            other => other,
        };
        let kind = parameterize(family, mean, variance, floor, ceiling);
        MarginalDistribution { kind, mean, floor, ceiling }
    }
}

/// Moment-match a family to (mean, variance).
fn parameterize(family: DistributionFamily, mean: f64, variance: f64, lower: f64, upper: f64) -> DistributionKind {
    let normal = DistributionKind::Normal { mean, std_dev: variance.sqrt() };
    if mean <= 0.0 {
        return normal;
    }
    match family {
        DistributionFamily::Normal | DistributionFamily::Empirical => normal,
        DistributionFamily::LogNormal => {
            let sigma2 = (1.0 + variance / (mean * mean)).ln();
            DistributionKind::LogNormal { mu: mean.ln() - sigma2 / 2.0, sigma: sigma2.sqrt() }
        }
        DistributionFamily::Gamma => DistributionKind::Gamma { shape: mean * mean / variance, scale: variance / mean },
        DistributionFamily::Exponential => DistributionKind::Exponential { rate: 1.0 / mean },
        DistributionFamily::Beta => {
            let span = upper - lower;
            if span <= 1e-9 {
                return normal;
            }
            let m = ((mean - lower) / span).clamp(0.01, 0.99);
            let max_var = m * (1.0 - m);
            let v = (variance / (span * span)).min(0.9 * max_var);
            let common = max_var / v - 1.0;
            DistributionKind::Beta { alpha: m * common, beta: (1.0 - m) * common, lower, upper }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsSource;
    use crate::models::InjuryStatus;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn player(sport: Sport, position: Position, projection: f64) -> Player {
        Player {
            id: "x".to_string(),
            name: String::new(),
            sport,
            position,
            team: "A".to_string(),
            opponent: "B".to_string(),
            salary: 5000,
            projection,
            floor: 0.0,
            ceiling: 0.0,
            volatility: 0.0,
            value_rating: 0.0,
            ownership: None,
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn analytics(floor: f64, ceiling: f64, volatility: f64) -> PlayerAnalytics {
        PlayerAnalytics { ceiling, floor, volatility, value_rating: 1.0, source: AnalyticsSource::Provided }
    }

    fn with_family(family: DistributionFamily) -> DistributionEngine {
        let mut config = DistributionConfig::default();
        config.family_overrides.insert(Position::WR, family);
        DistributionEngine::new(config)
    }

    #[test]
    fn test_default_families() {
        let engine = DistributionEngine::default();
        assert_eq!(engine.family_for(Sport::Nfl, Position::K), DistributionFamily::Beta);
        assert_eq!(engine.family_for(Sport::Nfl, Position::WR), DistributionFamily::LogNormal);
        assert_eq!(engine.family_for(Sport::Mlb, Position::OF), DistributionFamily::Exponential);
        assert_eq!(with_family(DistributionFamily::Gamma).family_for(Sport::Nfl, Position::WR), DistributionFamily::Gamma);
    }

    #[test]
    fn test_variance_has_floor() {
        let engine = DistributionEngine::default();
        // identical floor and ceiling with no volatility still gets spread
        let v = engine.variance(20.0, &analytics(20.0, 20.0, 0.0));
        assert!((v - 4.0).abs() < 1e-9);
        let v = engine.variance(20.0, &analytics(10.0, 30.0, 0.5));
        assert!((v - 100.0).abs() < 1e-9);
        assert_eq!(engine.variance(0.5, &analytics(0.5, 0.5, 0.0)), 1.0);
    }

    #[test]
    fn test_lognormal_matches_mean() {
        let engine = with_family(DistributionFamily::LogNormal);
        // wide floor and ceiling so the clamp does not bias the mean
        let dist = engine.build(&player(Sport::Nfl, Position::WR, 15.0), &analytics(0.0, 200.0, 0.3), None);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 40_000;
        let mean = (0..n).map(|_| dist.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 15.0).abs() < 0.3, "mean {}", mean);
    }

    #[test]
    fn test_quantile_is_monotone_and_clamped() {
        let engine = DistributionEngine::default();
        let dist = engine.build(&player(Sport::Nba, Position::PG, 40.0), &analytics(30.0, 50.0, 0.25), None);
        let qs: Vec<f64> = [0.0, 0.1, 0.5, 0.9, 1.0].iter().map(|&p| dist.quantile(p)).collect();
        assert!(qs.windows(2).all(|w| w[0] <= w[1]));
        assert!((qs[2] - 40.0).abs() < 1e-6);
        assert_eq!(qs[0], 30.0);
        assert_eq!(qs[4], 50.0);
    }

    #[test]
    fn test_every_family_clamps_to_analytics_floor_and_ceiling() {
        let a = analytics(30.0, 50.0, 0.25);
        let history: Vec<f64> = (0..40).map(|v| v as f64 * 2.0).collect();
        let families = [
            DistributionFamily::Normal,
            DistributionFamily::LogNormal,
            DistributionFamily::Beta,
            DistributionFamily::Gamma,
            DistributionFamily::Exponential,
            DistributionFamily::Empirical,
        ];
        for family in families {
            let history = (family == DistributionFamily::Empirical).then_some(history.as_slice());
            let dist = with_family(family).build(&player(Sport::Nfl, Position::WR, 40.0), &a, history);
            assert_eq!(dist.family(), family);
            assert_eq!((dist.floor, dist.ceiling), (a.floor, a.ceiling));
            let mut rng = ChaCha8Rng::seed_from_u64(11);
            for _ in 0..2_000 {
                let x = dist.sample(&mut rng);
                assert!(x >= a.floor && x <= a.ceiling, "{:?} sampled {}", family, x);
            }
            for p in [0.0, 1e-6, 0.15, 0.5, 0.85, 1.0 - 1e-6, 1.0] {
                let q = dist.quantile(p);
                assert!(q >= a.floor && q <= a.ceiling, "{:?} q({}) = {}", family, p, q);
            }
        }
    }

    #[test]
    fn test_empirical_used_with_long_history() {
        let engine = DistributionEngine::default();
        let history: Vec<f64> = (0..30).map(|v| v as f64).collect();
        let dist = engine.build(&player(Sport::Nba, Position::C, 15.0), &analytics(4.0, 25.0, 0.5), Some(&history));
        assert_eq!(dist.family(), DistributionFamily::Empirical);
        assert!((dist.quantile(0.5) - 14.5).abs() < 1e-9);

        let short = [10.0, 20.0];
        let dist = engine.build(&player(Sport::Nba, Position::C, 15.0), &analytics(4.0, 25.0, 0.5), Some(&short));
        assert_eq!(dist.family(), DistributionFamily::Normal);
    }

    #[test]
    fn test_degenerate_beta_falls_back_to_normal() {
        let mut config = DistributionConfig::default();
        config.family_overrides.insert(Position::K, DistributionFamily::Beta);
        let engine = DistributionEngine::new(config);
        let dist = engine.build(&player(Sport::Nfl, Position::K, 8.0), &analytics(8.0, 8.0, 0.0), None);
        assert_eq!(dist.family(), DistributionFamily::Normal);
        assert_eq!(dist.quantile(0.99), 8.0);
    }

    #[test]
    fn test_standard_normal_cdf() {
        assert!((standard_normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((standard_normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!(standard_normal_cdf(-40.0) >= 0.0);
    }

    fn family_strategy() -> impl Strategy<Value = DistributionFamily> {
        prop_oneof![
            Just(DistributionFamily::Normal),
            Just(DistributionFamily::LogNormal),
            Just(DistributionFamily::Beta),
            Just(DistributionFamily::Gamma),
            Just(DistributionFamily::Exponential),
        ]
    }

    proptest! {
        #[test]
        fn prop_every_family_stays_in_range(
            family in family_strategy(),
            projection in 0.5f64..60.0,
            spread in 0.0f64..1.0,
            volatility in 0.0f64..1.5,
            seed in any::<u64>(),
            p in 0.0f64..=1.0,
        ) {
            let engine = with_family(family);
            let a = analytics(projection * (1.0 - spread), projection * (1.0 + spread), volatility);
            let dist = engine.build(&player(Sport::Nfl, Position::WR, projection), &a, None);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..20 {
                let x = dist.sample(&mut rng);
                prop_assert!(x >= a.floor && x <= a.ceiling);
            }
            let q = dist.quantile(p);
            prop_assert!(q >= a.floor && q <= a.ceiling);
        }

        #[test]
        fn prop_empirical_stays_in_range(
            history in prop::collection::vec(-5.0f64..80.0, 20..60),
            p in 0.0f64..=1.0,
        ) {
            let engine = DistributionEngine::default();
            let a = analytics(15.0, 35.0, 0.3);
            let dist = engine.build(&player(Sport::Nba, Position::SF, 25.0), &a, Some(&history));
            let q = dist.quantile(p);
            prop_assert!(q >= a.floor && q <= a.ceiling);
        }
    }
}
