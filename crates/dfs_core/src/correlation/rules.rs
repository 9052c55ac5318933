//! Sport-specific correlation policy constants.
//!
//! Every value here is tunable configuration. The defaults follow the usual
//! stacking heuristics: passer/receiver positive, backfield mates negative,
//! game stacks mildly positive, pitchers and goalies against opposing
//! hitters/skaters negative.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Player, Position, Sport};

/// Correlation between two positions, matched in either order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairRule {
    pub a: Position,
    pub b: Position,
    pub value: f64,
}

impl PairRule {
    pub const fn new(a: Position, b: Position, value: f64) -> Self {
        Self { a, b, value }
    }

    fn matches(&self, x: Position, y: Position) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

fn lookup(rules: &[PairRule], x: Position, y: Position) -> Option<f64> {
    rules.iter().find(|r| r.matches(x, y)).map(|r| r.value)
}

/// Team-based rules for one sport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportRules {
    /// Same-team position pairs
    pub same_team: Vec<PairRule>,
    /// Used for teammates with no matching pair rule
    pub default_teammate: f64,
    /// Opposing position pairs; bounded to `[0, max_opponent]`
    pub opponent: Vec<PairRule>,
    /// Used for opponents with no matching pair or override
    pub default_opponent: f64,
    /// Opposing pairs applied as-is, including negative values
    pub opponent_overrides: Vec<PairRule>,
}

/// Golf has no teams: tee-time wave and weather drive co-movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GolfRules {
    /// Two tee times within this many minutes share a wave
    #[validate(range(min = 1, max = 720))]
    pub tee_window_minutes: u32,
    /// Baseline co-movement for players in the same wave
    #[validate(range(min = 0.0, max = 0.5))]
    pub same_wave: f64,
    /// Scale of the weather term (severity × shared exposure)
    #[validate(range(min = 0.0, max = 1.0))]
    pub weather_weight: f64,
    /// Exposure assumed when a player has none on record
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_exposure: f64,
}

impl Default for GolfRules {
    fn default() -> Self {
        Self { tee_window_minutes: 150, same_wave: 0.10, weather_weight: 0.35, default_exposure: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CorrelationRules {
    pub nfl: SportRules,
    pub nba: SportRules,
    pub mlb: SportRules,
    pub nhl: SportRules,
    #[validate]
    pub golf: GolfRules,
    /// Upper bound for generic opponent ("game stack") correlation
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_opponent: f64,
    /// Absolute bound on any off-diagonal entry
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_abs: f64,
    /// Smallest diagonal perturbation tried when decomposition fails
    #[validate(range(min = 0.0, max = 1.0))]
    pub repair_jitter: f64,
    /// Largest perturbation the repair may use before giving up
    #[validate(range(min = 0.0, max = 2.0))]
    pub max_repair_jitter: f64,
}

impl Default for CorrelationRules {
    fn default() -> Self {
        use Position::*;

        let nfl = SportRules {
            same_team: vec![
                PairRule::new(QB, WR, 0.45),
                PairRule::new(QB, TE, 0.35),
                PairRule::new(QB, RB, 0.12),
                PairRule::new(QB, K, 0.20),
                PairRule::new(RB, RB, -0.25),
                PairRule::new(RB, DST, 0.12),
                PairRule::new(K, DST, 0.12),
            ],
            default_teammate: 0.0,
            opponent: vec![
                PairRule::new(QB, QB, 0.20),
                PairRule::new(QB, WR, 0.15),
                PairRule::new(QB, TE, 0.10),
                PairRule::new(WR, WR, 0.10),
                PairRule::new(RB, RB, 0.0),
            ],
            default_opponent: 0.03,
            opponent_overrides: vec![
                PairRule::new(DST, QB, -0.30),
                PairRule::new(DST, RB, -0.15),
                PairRule::new(DST, WR, -0.15),
                PairRule::new(DST, TE, -0.10),
                PairRule::new(DST, K, -0.10),
            ],
        };

        let nba = SportRules {
            same_team: vec![
                PairRule::new(PG, C, 0.10),
                PairRule::new(PG, SG, -0.10),
                PairRule::new(PG, PG, -0.12),
                PairRule::new(C, C, -0.15),
            ],
            default_teammate: -0.05,
            opponent: vec![PairRule::new(PG, PG, 0.12), PairRule::new(C, C, 0.08)],
            default_opponent: 0.10,
            opponent_overrides: vec![],
        };

        let hitters = [C, FirstBase, SecondBase, ThirdBase, SS, OF];
        let mlb = SportRules {
            same_team: hitters.iter().map(|&h| PairRule::new(P, h, 0.05)).collect(),
            default_teammate: 0.25,
            opponent: vec![PairRule::new(P, P, 0.0)],
            default_opponent: 0.05,
            opponent_overrides: hitters.iter().map(|&h| PairRule::new(P, h, -0.35)).collect(),
        };

        let nhl = SportRules {
            same_team: vec![
                PairRule::new(C, W, 0.35),
                PairRule::new(W, W, 0.30),
                PairRule::new(C, D, 0.15),
                PairRule::new(W, D, 0.15),
                PairRule::new(D, D, 0.05),
                PairRule::new(C, C, 0.05),
                PairRule::new(G, C, 0.10),
                PairRule::new(G, W, 0.10),
                PairRule::new(G, D, 0.10),
            ],
            default_teammate: 0.0,
            opponent: vec![],
            default_opponent: 0.05,
            opponent_overrides: vec![
                PairRule::new(G, C, -0.30),
                PairRule::new(G, W, -0.30),
                PairRule::new(G, D, -0.25),
            ],
        };

        Self {
            nfl,
            nba,
            mlb,
            nhl,
            golf: GolfRules::default(),
            max_opponent: 0.30,
            max_abs: 0.95,
            repair_jitter: 0.05,
            max_repair_jitter: 0.5,
        }
    }
}

/// Extra context for a correlation build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationContext {
    /// Weather severity for the slate in [0, 1]; 0 means calm
    pub weather_severity: f64,
}

impl CorrelationRules {
    pub fn for_sport(&self, sport: Sport) -> Option<&SportRules> {
        match sport {
            Sport::Nfl => Some(&self.nfl),
            Sport::Nba => Some(&self.nba),
            Sport::Mlb => Some(&self.mlb),
            Sport::Nhl => Some(&self.nhl),
            Sport::Pga => None,
        }
    }

    /// Raw pair correlation before the absolute bound is applied.
    pub fn pair_value(&self, sport: Sport, a: &Player, b: &Player, ctx: &CorrelationContext) -> f64 {
        match self.for_sport(sport) {
            Some(rules) => team_pair_value(rules, self.max_opponent, a, b),
            None => self.golf_pair_value(a, b, ctx),
        }
    }

    fn golf_pair_value(&self, a: &Player, b: &Player, ctx: &CorrelationContext) -> f64 {
        let golf = &self.golf;
        let (Some(ta), Some(tb)) = (a.tee_time, b.tee_time) else {
            return 0.0;
        };
        let severity = ctx.weather_severity.clamp(0.0, 1.0);
        let ea = a.weather_exposure.unwrap_or(golf.default_exposure).clamp(0.0, 1.0);
        let eb = b.weather_exposure.unwrap_or(golf.default_exposure).clamp(0.0, 1.0);
        let weather = golf.weather_weight * severity * ea.min(eb);

        if ta.abs_diff(tb) <= golf.tee_window_minutes {
            golf.same_wave + weather
        } else {
            // The other wave gets different conditions.
            -0.5 * weather
        }
    }
}

fn team_pair_value(rules: &SportRules, max_opponent: f64, a: &Player, b: &Player) -> f64 {
    if a.is_teammate(b) {
        lookup(&rules.same_team, a.position, b.position).unwrap_or(rules.default_teammate)
    } else if a.is_opponent(b) {
        if let Some(v) = lookup(&rules.opponent_overrides, a.position, b.position) {
            return v;
        }
        lookup(&rules.opponent, a.position, b.position)
            .unwrap_or(rules.default_opponent)
            .clamp(0.0, max_opponent)
    } else {
        0.0
    }
}
