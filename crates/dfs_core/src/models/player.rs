//! Player records and the read-only pool they live in.
//!
//! Players are owned by the pool for the duration of a request. Everything
//! downstream (analytics table, correlation matrix, lineups, simulation)
//! refers to a player by its index into the pool.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DfsError, Result};

/// Sports with registered slot templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nfl,
    Nba,
    Mlb,
    Nhl,
    Pga,
}

impl Sport {
    pub const ALL: [Sport; 5] = [Sport::Nfl, Sport::Nba, Sport::Mlb, Sport::Nhl, Sport::Pga];

    /// Team sports correlate through team/opponent; golf does not.
    pub fn is_team_sport(self) -> bool {
        !matches!(self, Sport::Pga)
    }
}

impl FromStr for Sport {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nfl" => Ok(Sport::Nfl),
            "nba" => Ok(Sport::Nba),
            "mlb" => Ok(Sport::Mlb),
            "nhl" => Ok(Sport::Nhl),
            "pga" | "golf" => Ok(Sport::Pga),
            other => Err(DfsError::InvalidParameter(format!("unknown sport '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    DraftKings,
    FanDuel,
    Yahoo,
}

impl FromStr for Platform {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "draftkings" | "dk" => Ok(Platform::DraftKings),
            "fanduel" | "fd" => Ok(Platform::FanDuel),
            "yahoo" => Ok(Platform::Yahoo),
            other => Err(DfsError::InvalidParameter(format!("unknown platform '{}'", other))),
        }
    }
}

/// Player positions across every supported sport.
///
/// `C` is shared by basketball centers, baseball catchers and hockey centers;
/// the player's sport tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    // Football
    QB,
    RB,
    WR,
    TE,
    K,
    DST,
    // Basketball
    PG,
    SG,
    SF,
    PF,
    C,
    // Baseball
    P,
    #[serde(rename = "1B")]
    FirstBase,
    #[serde(rename = "2B")]
    SecondBase,
    #[serde(rename = "3B")]
    ThirdBase,
    SS,
    OF,
    // Hockey
    W,
    D,
    G,
    // Golf
    Golfer,
}

impl Position {
    pub fn code(self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DST => "DST",
            Position::PG => "PG",
            Position::SG => "SG",
            Position::SF => "SF",
            Position::PF => "PF",
            Position::C => "C",
            Position::P => "P",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::SS => "SS",
            Position::OF => "OF",
            Position::W => "W",
            Position::D => "D",
            Position::G => "G",
            Position::Golfer => "Golfer",
        }
    }

    /// Baseball hitters (everyone but the pitcher).
    pub fn is_hitter(self) -> bool {
        matches!(
            self,
            Position::C
                | Position::FirstBase
                | Position::SecondBase
                | Position::ThirdBase
                | Position::SS
                | Position::OF
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Injury report designation carried on the player record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjuryStatus {
    #[default]
    Healthy,
    Probable,
    Questionable,
    Doubtful,
    Out,
}

/// A player record for one contest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub sport: Sport,
    pub position: Position,
    /// Team identifier (empty for golf)
    #[serde(default)]
    pub team: String,
    /// Opponent team identifier (empty for golf)
    #[serde(default)]
    pub opponent: String,
    /// Salary in platform currency units
    pub salary: u32,
    /// Base projection in fantasy points
    pub projection: f64,
    #[serde(default)]
    pub floor: f64,
    #[serde(default)]
    pub ceiling: f64,
    /// Coefficient of variation of the player's scoring
    #[serde(default)]
    pub volatility: f64,
    /// Projection per salary unit, sport-normalized
    #[serde(default)]
    pub value_rating: f64,
    /// Projected ownership as a fraction in [0, 1]
    #[serde(default)]
    pub ownership: Option<f64>,
    #[serde(default)]
    pub injury_status: InjuryStatus,
    /// Golf tee time in minutes after midnight
    #[serde(default)]
    pub tee_time: Option<u32>,
    /// Exposure to the day's weather in [0, 1] (golf wave, open-air venue)
    #[serde(default)]
    pub weather_exposure: Option<f64>,
}

impl Player {
    /// Players with no salary or no projection cannot be rated or rostered.
    pub fn is_ratable(&self) -> bool {
        self.salary > 0 && self.projection > 0.0 && self.projection.is_finite()
    }

    /// Same-team check on identifiers; golfers have no team.
    pub fn is_teammate(&self, other: &Player) -> bool {
        !self.team.is_empty() && self.team == other.team
    }

    pub fn is_opponent(&self, other: &Player) -> bool {
        !self.team.is_empty() && self.opponent == other.team && other.opponent == self.team
    }

    /// Stable key for the game this player appears in, independent of side.
    pub fn game_key(&self) -> Option<String> {
        if self.team.is_empty() || self.opponent.is_empty() {
            return None;
        }
        let (a, b) = if self.team <= self.opponent {
            (&self.team, &self.opponent)
        } else {
            (&self.opponent, &self.team)
        };
        Some(format!("{}@{}", a, b))
    }
}

/// Read-only collection of players for one request.
#[derive(Debug, Clone)]
pub struct PlayerPool {
    players: Vec<Player>,
    index: HashMap<String, usize>,
}

impl PlayerPool {
    /// Build a pool, rejecting empty input and duplicate identifiers.
    pub fn new(players: Vec<Player>) -> Result<Self> {
        if players.is_empty() {
            return Err(DfsError::EmptyPlayerPool);
        }
        let mut index = HashMap::with_capacity(players.len());
        for (i, player) in players.iter().enumerate() {
            if index.insert(player.id.clone(), i).is_some() {
                return Err(DfsError::DuplicatePlayer(player.id.clone()));
            }
        }
        tracing::debug!("Loaded player pool with {} players", players.len());
        Ok(Self { players, index })
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, index: usize) -> &Player {
        &self.players[index]
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Resolve an id or fail with `UnknownPlayer`.
    pub fn require(&self, id: &str) -> Result<usize> {
        self.index_of(id).ok_or_else(|| DfsError::UnknownPlayer(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Player)> {
        self.players.iter().enumerate()
    }
}
