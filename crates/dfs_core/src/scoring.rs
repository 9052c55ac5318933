//! # Multi-Objective Scorer
//!
//! Turns a player, its analytics and a strategy into the scalar the
//! optimizer maximizes. Every strategy is a plain function of its inputs.
//!
//! `CorrelationWeighted` depends on the players already in the partial
//! lineup, so callers score candidates incrementally as they are placed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analytics::PlayerAnalytics;
use crate::correlation::CorrelationMatrix;
use crate::error::{DfsError, Result};
use crate::models::Player;

/// Closed set of lineup objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Tournament upside
    MaximizeCeiling,
    /// Cash-game safety
    MaximizeFloor,
    /// Fade chalk: quadratic ownership penalty
    Contrarian,
    /// Stack players whose outcomes move together
    CorrelationWeighted,
    Balanced,
    /// Points per salary dollar
    Value,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::MaximizeCeiling,
        Strategy::MaximizeFloor,
        Strategy::Contrarian,
        Strategy::CorrelationWeighted,
        Strategy::Balanced,
        Strategy::Value,
    ];

    /// True when a player's score depends on who else is already selected.
    pub fn is_order_dependent(self) -> bool {
        matches!(self, Strategy::CorrelationWeighted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::MaximizeCeiling => "maximize_ceiling",
            Strategy::MaximizeFloor => "maximize_floor",
            Strategy::Contrarian => "contrarian",
            Strategy::CorrelationWeighted => "correlation_weighted",
            Strategy::Balanced => "balanced",
            Strategy::Value => "value",
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Balanced
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "maximizeceiling" | "ceiling" | "gpp" => Ok(Strategy::MaximizeCeiling),
            "maximizefloor" | "floor" | "cash" => Ok(Strategy::MaximizeFloor),
            "contrarian" | "leverage" => Ok(Strategy::Contrarian),
            "correlationweighted" | "correlation" | "stack" => Ok(Strategy::CorrelationWeighted),
            "balanced" => Ok(Strategy::Balanced),
            "value" => Ok(Strategy::Value),
            _ => Err(DfsError::InvalidParameter(format!("unknown strategy '{}'", s))),
        }
    }
}

/// Weights for every strategy formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScoringWeights {
    /// Ceiling share in `MaximizeCeiling` (rest is projection)
    #[validate(range(min = 0.0, max = 1.0))]
    pub ceiling_weight: f64,
    /// Floor share in `MaximizeFloor` (rest is projection)
    #[validate(range(min = 0.0, max = 1.0))]
    pub floor_weight: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub balanced_projection: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub balanced_ceiling: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub balanced_floor: f64,
    /// Scale of the `projection × penalty × own²` term
    #[validate(range(min = 0.0, max = 1.0))]
    pub ownership_penalty: f64,
    /// Share of unowned upside (`ceiling − projection`) credited to contrarian plays
    #[validate(range(min = 0.0, max = 1.0))]
    pub leverage_upside: f64,
    /// Ownership assumed for players with no projection
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_ownership: f64,
    /// Bonus per unit of summed correlation with already-selected players
    #[validate(range(min = 0.0, max = 2.0))]
    pub correlation_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            ceiling_weight: 0.7,
            floor_weight: 0.7,
            balanced_projection: 0.5,
            balanced_ceiling: 0.25,
            balanced_floor: 0.25,
            ownership_penalty: 0.8,
            leverage_upside: 0.2,
            default_ownership: 0.10,
            correlation_bonus: 0.15,
        }
    }
}

/// What the scorer may know about the lineup being built.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineupContext<'a> {
    /// Pool indices already placed, in placement order
    pub selected: &'a [usize],
    pub correlation: Option<&'a CorrelationMatrix>,
}

impl<'a> LineupContext<'a> {
    pub fn empty() -> Self {
        Self::default()
    }

    fn correlation_sum(&self, player_index: usize) -> f64 {
        match self.correlation {
            Some(m) if player_index < m.size() => self
                .selected
                .iter()
                .filter(|&&s| s != player_index && s < m.size())
                .map(|&s| m.get(player_index, s))
                .sum(),
            _ => 0.0,
        }
    }
}

fn ownership(player: &Player, weights: &ScoringWeights) -> f64 {
    player
        .ownership
        .filter(|o| o.is_finite())
        .unwrap_or(weights.default_ownership)
        .clamp(0.0, 1.0)
}

/// Score one candidate under a strategy.
///
/// # Arguments
/// * `player_index` - The candidate's pool index (for correlation lookups)
/// * `ctx` - Players already selected in the partial lineup
///
/// # Returns
/// Finite scalar; higher is better
pub fn score(
    player_index: usize,
    player: &Player,
    analytics: &PlayerAnalytics,
    strategy: Strategy,
    ctx: &LineupContext,
    weights: &ScoringWeights,
) -> f64 {
    let proj = player.projection;
    let ceil = analytics.ceiling;
    let floor = analytics.floor;

    let raw = match strategy {
        Strategy::MaximizeCeiling => weights.ceiling_weight * ceil + (1.0 - weights.ceiling_weight) * proj,
        Strategy::MaximizeFloor => weights.floor_weight * floor + (1.0 - weights.floor_weight) * proj,
        Strategy::Contrarian => {
            let own = ownership(player, weights);
            let penalty = proj * weights.ownership_penalty * own * own;
            let upside = weights.leverage_upside * (ceil - proj).max(0.0) * (1.0 - own);
            proj - penalty + upside
        }
        Strategy::CorrelationWeighted => {
            proj * (1.0 + weights.correlation_bonus * ctx.correlation_sum(player_index))
        }
        Strategy::Balanced => {
            weights.balanced_projection * proj
                + weights.balanced_ceiling * ceil
                + weights.balanced_floor * floor
        }
        Strategy::Value => proj * analytics.value_rating.max(0.0),
    };

    if raw.is_finite() {
        raw
    } else {
        0.0
    }
}

/// Largest score `player_index` can earn in any lineup of `lineup_size`
/// players drawn from `candidates`. Admissible bound for pruning.
pub fn upper_bound(
    player_index: usize,
    player: &Player,
    analytics: &PlayerAnalytics,
    strategy: Strategy,
    correlation: Option<&CorrelationMatrix>,
    candidates: &[usize],
    lineup_size: usize,
    weights: &ScoringWeights,
) -> f64 {
    let base = score(player_index, player, analytics, strategy, &LineupContext::empty(), weights);
    if !strategy.is_order_dependent() {
        return base;
    }
    let bonus = bonus_upper_bound(player_index, correlation, candidates, lineup_size);
    let bound = player.projection * (1.0 + weights.correlation_bonus * bonus);
    bound.max(base)
}

/// Sum of the `lineup_size − 1` largest positive correlations between
/// `player_index` and any candidate.
pub fn bonus_upper_bound(
    player_index: usize,
    correlation: Option<&CorrelationMatrix>,
    candidates: &[usize],
    lineup_size: usize,
) -> f64 {
    let matrix = match correlation {
        Some(m) if player_index < m.size() => m,
        _ => return 0.0,
    };
    let mut positives: Vec<f64> = candidates
        .iter()
        .filter(|&&c| c != player_index && c < matrix.size())
        .map(|&c| matrix.get(player_index, c))
        .filter(|&v| v > 0.0)
        .collect();
    positives.sort_by(|a, b| b.total_cmp(a));
    positives.iter().take(lineup_size.saturating_sub(1)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsSource;
    use crate::models::{InjuryStatus, Position, Sport};

    fn player(projection: f64, ownership: Option<f64>) -> Player {
        Player {
            id: "p".to_string(),
            name: String::new(),
            sport: Sport::Nfl,
            position: Position::WR,
            team: "KC".to_string(),
            opponent: "BUF".to_string(),
            salary: 6000,
            projection,
            floor: 0.0,
            ceiling: 0.0,
            volatility: 0.0,
            value_rating: 0.0,
            ownership,
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn analytics(floor: f64, ceiling: f64) -> PlayerAnalytics {
        PlayerAnalytics { ceiling, floor, volatility: 0.4, value_rating: 1.2, source: AnalyticsSource::Provided }
    }

    #[test]
    fn test_ceiling_and_floor_strategies_lean_the_right_way() {
        let w = ScoringWeights::default();
        let p = player(20.0, None);
        let a = analytics(10.0, 35.0);
        let ctx = LineupContext::empty();
        let ceil = score(0, &p, &a, Strategy::MaximizeCeiling, &ctx, &w);
        let floor = score(0, &p, &a, Strategy::MaximizeFloor, &ctx, &w);
        let balanced = score(0, &p, &a, Strategy::Balanced, &ctx, &w);
        assert!(ceil > balanced && balanced > floor);
        assert!((ceil - (0.7 * 35.0 + 0.3 * 20.0)).abs() < 1e-9);
        assert!((score(0, &p, &a, Strategy::Value, &ctx, &w) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_contrarian_penalty_is_quadratic_in_ownership() {
        let mut w = ScoringWeights::default();
        w.leverage_upside = 0.0;
        let a = analytics(10.0, 20.0);
        let ctx = LineupContext::empty();
        let low = 20.0 - score(0, &player(20.0, Some(0.2)), &a, Strategy::Contrarian, &ctx, &w);
        let high = 20.0 - score(0, &player(20.0, Some(0.4)), &a, Strategy::Contrarian, &ctx, &w);
        // doubling ownership quadruples the penalty
        assert!((high / low - 4.0).abs() < 1e-9);

        let missing = score(0, &player(20.0, None), &a, Strategy::Contrarian, &ctx, &w);
        let default = score(0, &player(20.0, Some(0.10)), &a, Strategy::Contrarian, &ctx, &w);
        assert_eq!(missing, default);
    }

    #[test]
    fn test_correlation_bonus_depends_on_selection() {
        let w = ScoringWeights::default();
        let mut m = CorrelationMatrix::identity(3);
        m.set(0, 1, 0.5);
        m.set(0, 2, -0.2);
        let p = player(10.0, None);
        let a = analytics(5.0, 18.0);

        let alone = score(0, &p, &a, Strategy::CorrelationWeighted, &LineupContext::empty(), &w);
        let stacked = LineupContext { selected: &[1], correlation: Some(&m) };
        let mixed = LineupContext { selected: &[1, 2], correlation: Some(&m) };
        assert_eq!(alone, 10.0);
        assert!((score(0, &p, &a, Strategy::CorrelationWeighted, &stacked, &w) - 10.75).abs() < 1e-9);
        assert!((score(0, &p, &a, Strategy::CorrelationWeighted, &mixed, &w) - 10.45).abs() < 1e-9);

        let ub = upper_bound(0, &p, &a, Strategy::CorrelationWeighted, Some(&m), &[0, 1, 2], 3, &w);
        assert!(ub >= 10.75 - 1e-12);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("maximize_ceiling".parse::<Strategy>().unwrap(), Strategy::MaximizeCeiling);
        assert_eq!("Correlation-Weighted".parse::<Strategy>().unwrap(), Strategy::CorrelationWeighted);
        assert_eq!("cash".parse::<Strategy>().unwrap(), Strategy::MaximizeFloor);
        assert!("yolo".parse::<Strategy>().is_err());
        for s in Strategy::ALL {
            assert_eq!(s.as_str().parse::<Strategy>().unwrap(), s);
        }
    }

    #[test]
    fn test_non_finite_inputs_score_zero() {
        let w = ScoringWeights::default();
        let p = player(f64::NAN, None);
        let a = analytics(1.0, 2.0);
        assert_eq!(score(0, &p, &a, Strategy::Balanced, &LineupContext::empty(), &w), 0.0);
    }
}
