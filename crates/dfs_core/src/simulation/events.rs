//! In-game event injection applied on top of the correlated draw.
//!
//! - Injury / early exit: position base rate × injury-status multiplier;
//!   the player keeps a uniform fraction of the sampled outcome. `Out`
//!   players always score zero.
//! - Weather: per game (or slate-wide for golf), a bad-weather event fires
//!   with the supplied severity and penalizes exposed positions.
//! - Blowout: per game, probability grows with the point spread; the
//!   favorite's starters lose production and the trailing passing game
//!   gains some back.

use std::collections::{BTreeMap, HashMap};

use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{InjuryStatus, Player, PlayerPool, Position};

/// Injury-status multipliers on the position base rate.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StatusMultipliers {
    #[validate(range(min = 0.0, max = 100.0))]
    pub probable: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub questionable: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub doubtful: f64,
}

impl Default for StatusMultipliers {
    fn default() -> Self {
        Self { probable: 1.2, questionable: 2.5, doubtful: 5.0 }
    }
}

impl StatusMultipliers {
    /// `None` for `Out`, which is not a probability but a certainty.
    pub fn for_status(&self, status: InjuryStatus) -> Option<f64> {
        match status {
            InjuryStatus::Healthy => Some(1.0),
            InjuryStatus::Probable => Some(self.probable),
            InjuryStatus::Questionable => Some(self.questionable),
            InjuryStatus::Doubtful => Some(self.doubtful),
            InjuryStatus::Out => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EventConfig {
    pub enabled: bool,

    // ========== Injury ==========
    /// Per-position early-exit probability per game
    pub injury_base_rate: BTreeMap<Position, f64>,
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_injury_rate: f64,
    #[validate]
    pub status_multipliers: StatusMultipliers,
    /// Upper bound of the uniform fraction an injured player keeps
    #[validate(range(min = 0.0, max = 1.0))]
    pub injury_retained_max: f64,

    // ========== Weather ==========
    /// Fractional production loss per position at full severity; negative
    /// values are gains (defenses in bad weather)
    pub weather_penalty: BTreeMap<Position, f64>,
    /// Exposure assumed for golfers without a `weather_exposure`
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_weather_exposure: f64,

    // ========== Blowout ==========
    #[validate(range(min = 0.0, max = 1.0))]
    pub blowout_base_rate: f64,
    /// Added probability per point of spread
    #[validate(range(min = 0.0, max = 1.0))]
    pub blowout_per_point: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub blowout_max_rate: f64,
    /// Production lost by the favorite's players when the game is decided early
    #[validate(range(min = 0.0, max = 1.0))]
    pub favorite_penalty: f64,
    /// Production gained by the trailing side's passing game
    #[validate(range(min = 0.0, max = 2.0))]
    pub trailing_bonus: f64,
    pub trailing_positions: Vec<Position>,
    /// Favorite positions that are not penalized in a blowout
    pub favorite_exempt: Vec<Position>,
}

impl Default for EventConfig {
    fn default() -> Self {
        use Position::*;
        Self {
            enabled: true,
            injury_base_rate: [(QB, 0.02), (RB, 0.04), (WR, 0.03), (TE, 0.03), (Golfer, 0.01)]
                .into_iter()
                .collect(),
            default_injury_rate: 0.015,
            status_multipliers: StatusMultipliers::default(),
            injury_retained_max: 0.5,
            weather_penalty: [(QB, 0.20), (WR, 0.20), (TE, 0.10), (K, 0.30), (DST, -0.10), (Golfer, 0.15)]
                .into_iter()
                .collect(),
            default_weather_exposure: 0.5,
            blowout_base_rate: 0.02,
            blowout_per_point: 0.025,
            blowout_max_rate: 0.5,
            favorite_penalty: 0.12,
            trailing_bonus: 0.10,
            trailing_positions: vec![QB, WR, TE],
            favorite_exempt: vec![DST, K],
        }
    }
}

impl EventConfig {
    pub fn injury_rate(&self, position: Position) -> f64 {
        self.injury_base_rate.get(&position).copied().unwrap_or(self.default_injury_rate)
    }

    pub fn weather_penalty(&self, position: Position) -> f64 {
        self.weather_penalty.get(&position).copied().unwrap_or(0.0)
    }

    pub fn blowout_probability(&self, spread: f64) -> f64 {
        if spread == 0.0 || !spread.is_finite() {
            return 0.0;
        }
        (self.blowout_base_rate + self.blowout_per_point * spread.abs()).clamp(0.0, self.blowout_max_rate)
    }
}

/// Betting line for one game, quoted for `team`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLine {
    pub team: String,
    pub opponent: String,
    /// Points `team` is expected to win by, negative when favored
    #[serde(default)]
    pub spread: f64,
    /// Chance of game-affecting weather in [0, 1]
    #[serde(default)]
    pub weather_severity: f64,
}

impl GameLine {
    /// The favored team, if the line has one.
    pub fn favorite(&self) -> Option<&str> {
        if self.spread < 0.0 {
            Some(&self.team)
        } else if self.spread > 0.0 {
            Some(&self.opponent)
        } else {
            None
        }
    }
}

/// Game lines and slate weather for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventContext {
    pub games: Vec<GameLine>,
    /// Slate-wide weather chance, used for golf
    pub weather_severity: f64,
}

/// Events fired, summed over all completed iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub injuries: u64,
    pub weather: u64,
    pub blowouts: u64,
}

impl EventCounts {
    pub fn merge(&mut self, other: &EventCounts) {
        self.injuries += other.injuries;
        self.weather += other.weather;
        self.blowouts += other.blowouts;
    }
}

/// How a blowout affects one simulated player.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BlowoutRole {
    Unaffected,
    Favorite,
    Trailing,
}

#[derive(Debug, Clone)]
struct GameEvents {
    blowout_probability: f64,
    weather_probability: f64,
    /// (local player index, role)
    members: Vec<(usize, BlowoutRole)>,
}

#[derive(Debug, Clone, Copy)]
struct PlayerEvents {
    injury_probability: f64,
    always_out: bool,
    /// Production multiplier when this player's weather event fires
    weather_factor: f64,
    /// Index into `games`, or `None` for players under slate weather
    game: Option<usize>,
}

/// Per-simulation event plan over the simulated player set, built once and
/// shared read-only across iteration blocks.
#[derive(Debug, Clone)]
pub struct EventModel {
    enabled: bool,
    players: Vec<PlayerEvents>,
    games: Vec<GameEvents>,
    slate_weather: f64,
    retained_max: f64,
    favorite_factor: f64,
    trailing_factor: f64,
}

impl EventModel {
    /// A model that leaves every outcome untouched.
    pub fn disabled(size: usize) -> Self {
        Self {
            enabled: false,
            players: vec![
                PlayerEvents { injury_probability: 0.0, always_out: false, weather_factor: 1.0, game: None };
                size
            ],
            games: Vec::new(),
            slate_weather: 0.0,
            retained_max: 0.0,
            favorite_factor: 1.0,
            trailing_factor: 1.0,
        }
    }

    /// `members` lists pool indices in simulation order.
    pub fn build(config: &EventConfig, context: &EventContext, pool: &PlayerPool, members: &[usize]) -> Self {
        if !config.enabled {
            let mut model = Self::disabled(members.len());
            // Out is a roster fact, not a random event.
            for (local, &index) in members.iter().enumerate() {
                model.players[local].always_out = pool.get(index).injury_status == InjuryStatus::Out;
            }
            return model;
        }

        let mut game_of_team: HashMap<&str, usize> = HashMap::new();
        let mut games: Vec<GameEvents> = Vec::with_capacity(context.games.len());
        for (g, line) in context.games.iter().enumerate() {
            game_of_team.insert(line.team.as_str(), g);
            game_of_team.insert(line.opponent.as_str(), g);
            games.push(GameEvents {
                blowout_probability: config.blowout_probability(line.spread),
                weather_probability: line.weather_severity.clamp(0.0, 1.0),
                members: Vec::new(),
            });
        }

        let players = members
            .iter()
            .enumerate()
            .map(|(local, &index)| {
                let player = pool.get(index);
                let game = game_of_team.get(player.team.as_str()).copied();
                if let Some(g) = game {
                    let role = blowout_role(config, &context.games[g], player);
                    if role != BlowoutRole::Unaffected {
                        games[g].members.push((local, role));
                    }
                }
                player_events(config, player, game)
            })
            .collect();

        Self {
            enabled: true,
            players,
            games,
            slate_weather: context.weather_severity.clamp(0.0, 1.0),
            retained_max: config.injury_retained_max,
            favorite_factor: 1.0 - config.favorite_penalty,
            trailing_factor: 1.0 + config.trailing_bonus,
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Adjust one iteration's outcomes in place. Game events are drawn
    /// first, in game order, then per-player injuries in simulation order.
    pub fn apply<R: Rng + ?Sized>(&self, rng: &mut R, outcomes: &mut [f64], counts: &mut EventCounts) {
        if !self.enabled {
            for (value, p) in outcomes.iter_mut().zip(&self.players) {
                if p.always_out {
                    *value = 0.0;
                }
            }
            return;
        }

        let slate_weather = self.slate_weather > 0.0 && rng.gen::<f64>() < self.slate_weather;
        if slate_weather {
            counts.weather += 1;
        }

        let mut game_weather = vec![false; self.games.len()];
        for (g, game) in self.games.iter().enumerate() {
            if game.weather_probability > 0.0 && rng.gen::<f64>() < game.weather_probability {
                game_weather[g] = true;
                counts.weather += 1;
            }
            if game.blowout_probability > 0.0 && rng.gen::<f64>() < game.blowout_probability {
                counts.blowouts += 1;
                for &(local, role) in &game.members {
                    outcomes[local] *= match role {
                        BlowoutRole::Favorite => self.favorite_factor,
                        BlowoutRole::Trailing => self.trailing_factor,
                        BlowoutRole::Unaffected => 1.0,
                    };
                }
            }
        }

        for (value, p) in outcomes.iter_mut().zip(&self.players) {
            if p.always_out {
                *value = 0.0;
                continue;
            }
            let weather = match p.game {
                Some(g) => game_weather[g],
                None => slate_weather,
            };
            if weather {
                *value *= p.weather_factor;
            }
            if p.injury_probability > 0.0 && rng.gen::<f64>() < p.injury_probability {
                counts.injuries += 1;
                *value *= rng.gen::<f64>() * self.retained_max;
            }
        }
    }
}

fn player_events(config: &EventConfig, player: &Player, game: Option<usize>) -> PlayerEvents {
    let (injury_probability, always_out) = match config.status_multipliers.for_status(player.injury_status) {
        Some(multiplier) => ((config.injury_rate(player.position) * multiplier).clamp(0.0, 1.0), false),
        None => (1.0, true),
    };
    let exposure = if player.team.is_empty() {
        player.weather_exposure.unwrap_or(config.default_weather_exposure)
    } else {
        player.weather_exposure.unwrap_or(1.0)
    };
    let weather_factor = (1.0 - config.weather_penalty(player.position) * exposure.clamp(0.0, 1.0)).max(0.0);
    PlayerEvents { injury_probability, always_out, weather_factor, game }
}

fn blowout_role(config: &EventConfig, line: &GameLine, player: &Player) -> BlowoutRole {
    let Some(favorite) = line.favorite() else {
        return BlowoutRole::Unaffected;
    };
    if player.team == favorite {
        if config.favorite_exempt.contains(&player.position) {
            BlowoutRole::Unaffected
        } else {
            BlowoutRole::Favorite
        }
    } else if config.trailing_positions.contains(&player.position) {
        BlowoutRole::Trailing
    } else {
        BlowoutRole::Unaffected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sport;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn nfl(id: &str, position: Position, team: &str, opp: &str, status: InjuryStatus) -> Player {
        Player {
            id: id.to_string(),
            name: String::new(),
            sport: Sport::Nfl,
            position,
            team: team.to_string(),
            opponent: opp.to_string(),
            salary: 5000,
            projection: 15.0,
            floor: 8.0,
            ceiling: 25.0,
            volatility: 0.4,
            value_rating: 1.0,
            ownership: None,
            injury_status: status,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn pool() -> PlayerPool {
        PlayerPool::new(vec![
            nfl("kc-qb", Position::QB, "KC", "LV", InjuryStatus::Healthy),
            nfl("kc-rb", Position::RB, "KC", "LV", InjuryStatus::Questionable),
            nfl("lv-wr", Position::WR, "LV", "KC", InjuryStatus::Healthy),
            nfl("lv-dst", Position::DST, "LV", "KC", InjuryStatus::Out),
        ])
        .unwrap()
    }

    #[test]
    fn test_status_multipliers() {
        let m = StatusMultipliers::default();
        assert_eq!(m.for_status(InjuryStatus::Healthy), Some(1.0));
        assert_eq!(m.for_status(InjuryStatus::Probable), Some(1.2));
        assert_eq!(m.for_status(InjuryStatus::Questionable), Some(2.5));
        assert_eq!(m.for_status(InjuryStatus::Doubtful), Some(5.0));
        assert_eq!(m.for_status(InjuryStatus::Out), None);
    }

    #[test]
    fn test_blowout_probability_grows_with_spread() {
        let cfg = EventConfig::default();
        assert_eq!(cfg.blowout_probability(0.0), 0.0);
        let small = cfg.blowout_probability(-3.0);
        let large = cfg.blowout_probability(14.0);
        assert!(small > 0.0 && large > small);
        assert!(cfg.blowout_probability(100.0) <= cfg.blowout_max_rate);
    }

    #[test]
    fn test_out_players_always_score_zero() {
        let pool = pool();
        let members = [0, 1, 2, 3];
        for enabled in [true, false] {
            let cfg = EventConfig { enabled, ..EventConfig::default() };
            let model = EventModel::build(&cfg, &EventContext::default(), &pool, &members);
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            let mut counts = EventCounts::default();
            for _ in 0..100 {
                let mut outcomes = vec![20.0; 4];
                model.apply(&mut rng, &mut outcomes, &mut counts);
                assert_eq!(outcomes[3], 0.0);
                assert!(outcomes[..3].iter().all(|v| *v >= 0.0 && *v <= 20.0));
            }
        }
    }

    #[test]
    fn test_questionable_player_exits_more_often() {
        let pool = pool();
        let cfg = EventConfig { weather_penalty: BTreeMap::new(), ..EventConfig::default() };
        let model = EventModel::build(&cfg, &EventContext::default(), &pool, &[0, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut counts = EventCounts::default();
        let mut hurt = [0usize; 2];
        for _ in 0..20_000 {
            let mut outcomes = vec![10.0, 10.0];
            model.apply(&mut rng, &mut outcomes, &mut counts);
            for (k, v) in outcomes.iter().enumerate() {
                if *v < 10.0 {
                    hurt[k] += 1;
                }
            }
        }
        // 2% for a healthy QB, 10% for a questionable RB
        assert!((hurt[0] as f64 / 20_000.0 - 0.02).abs() < 0.006);
        assert!((hurt[1] as f64 / 20_000.0 - 0.10).abs() < 0.012);
        assert_eq!(counts.injuries as usize, hurt[0] + hurt[1]);
    }

    #[test]
    fn test_blowout_moves_favorite_down_and_trailing_passers_up() {
        let pool = pool();
        let cfg = EventConfig {
            injury_base_rate: BTreeMap::new(),
            default_injury_rate: 0.0,
            blowout_base_rate: 1.0,
            blowout_max_rate: 1.0,
            ..EventConfig::default()
        };
        let context = EventContext {
            games: vec![GameLine { team: "KC".into(), opponent: "LV".into(), spread: -10.0, weather_severity: 0.0 }],
            weather_severity: 0.0,
        };
        let model = EventModel::build(&cfg, &context, &pool, &[0, 2]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut counts = EventCounts::default();
        let mut outcomes = vec![10.0, 10.0];
        model.apply(&mut rng, &mut outcomes, &mut counts);
        assert_eq!(counts.blowouts, 1);
        assert!((outcomes[0] - 10.0 * (1.0 - cfg.favorite_penalty)).abs() < 1e-9);
        assert!((outcomes[1] - 10.0 * (1.0 + cfg.trailing_bonus)).abs() < 1e-9);
    }

    #[test]
    fn test_weather_penalizes_exposed_positions() {
        let pool = pool();
        let cfg = EventConfig { injury_base_rate: BTreeMap::new(), default_injury_rate: 0.0, ..EventConfig::default() };
        let context = EventContext {
            games: vec![GameLine { team: "LV".into(), opponent: "KC".into(), spread: 0.0, weather_severity: 1.0 }],
            weather_severity: 0.0,
        };
        let model = EventModel::build(&cfg, &context, &pool, &[0, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut counts = EventCounts::default();
        let mut outcomes = vec![10.0, 10.0];
        model.apply(&mut rng, &mut outcomes, &mut counts);
        assert_eq!(counts.weather, 1);
        assert!((outcomes[0] - 8.0).abs() < 1e-9);
        // running backs are not weather sensitive by default
        assert!((outcomes[1] - 10.0).abs() < 1e-9);
    }
}
