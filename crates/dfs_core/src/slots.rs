//! # Position-Slot Resolver
//!
//! Maps a (sport, platform) pair to its ordered roster template. Templates
//! are static data built once on first use and never mutated.
//!
//! An unregistered pair is an error, never an empty template: an empty
//! template would make the optimizer quietly produce zero lineups.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{DfsError, Result};
use crate::models::{Platform, Position, Sport};

/// Fill priority for single-position slots
pub const PRIORITY_DEDICATED: u8 = 0;
/// Fill priority for multi-position slots that are not full utility
pub const PRIORITY_FLEX: u8 = 1;
/// Fill priority for utility slots accepting (nearly) every position
pub const PRIORITY_UTILITY: u8 = 2;

/// One roster position bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub name: String,
    pub eligible: Vec<Position>,
    /// Lower fills first; flex slots come after dedicated ones
    pub priority: u8,
}

impl RosterSlot {
    pub fn new(name: &str, eligible: &[Position]) -> Self {
        let priority = match eligible.len() {
            0 | 1 => PRIORITY_DEDICATED,
            2 => PRIORITY_FLEX,
            _ => PRIORITY_UTILITY,
        };
        Self { name: name.to_string(), eligible: eligible.to_vec(), priority }
    }

    pub fn accepts(&self, position: Position) -> bool {
        self.eligible.contains(&position)
    }

    pub fn is_flex(&self) -> bool {
        self.eligible.len() > 1
    }
}

/// Ordered slot list for one (sport, platform) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub sport: Sport,
    pub platform: Platform,
    /// Platform's standard salary cap
    pub salary_cap: u32,
    pub slots: Vec<RosterSlot>,
}

impl SlotTemplate {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot indices in the order the optimizer fills them: by priority,
    /// then by template position.
    pub fn fill_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.slots.len()).collect();
        order.sort_by_key(|&i| (self.slots[i].priority, i));
        order
    }

    /// Every position that can be rostered somewhere in this template.
    pub fn rosterable_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> =
            self.slots.iter().flat_map(|s| s.eligible.iter().copied()).collect();
        positions.sort();
        positions.dedup();
        positions
    }
}

fn template(sport: Sport, platform: Platform, salary_cap: u32, slots: &[RosterSlot]) -> SlotTemplate {
    SlotTemplate { sport, platform, salary_cap, slots: slots.to_vec() }
}

static TEMPLATES: Lazy<BTreeMap<(Sport, Platform), SlotTemplate>> = Lazy::new(|| {
    use Position::*;

    let nfl_classic = vec![
        RosterSlot::new("QB", &[QB]),
        RosterSlot::new("RB", &[RB]),
        RosterSlot::new("RB", &[RB]),
        RosterSlot::new("WR", &[WR]),
        RosterSlot::new("WR", &[WR]),
        RosterSlot::new("WR", &[WR]),
        RosterSlot::new("TE", &[TE]),
        RosterSlot::new("FLEX", &[RB, WR, TE]),
        RosterSlot::new("DST", &[DST]),
    ];
    let nba_dk = vec![
        RosterSlot::new("PG", &[PG]),
        RosterSlot::new("SG", &[SG]),
        RosterSlot::new("SF", &[SF]),
        RosterSlot::new("PF", &[PF]),
        RosterSlot::new("C", &[C]),
        RosterSlot::new("G", &[PG, SG]),
        RosterSlot::new("F", &[SF, PF]),
        RosterSlot::new("UTIL", &[PG, SG, SF, PF, C]),
    ];
    let nba_fd = vec![
        RosterSlot::new("PG", &[PG]),
        RosterSlot::new("PG", &[PG]),
        RosterSlot::new("SG", &[SG]),
        RosterSlot::new("SG", &[SG]),
        RosterSlot::new("SF", &[SF]),
        RosterSlot::new("SF", &[SF]),
        RosterSlot::new("PF", &[PF]),
        RosterSlot::new("PF", &[PF]),
        RosterSlot::new("C", &[C]),
    ];
    let nba_yahoo = vec![
        RosterSlot::new("PG", &[PG]),
        RosterSlot::new("SG", &[SG]),
        RosterSlot::new("G", &[PG, SG]),
        RosterSlot::new("SF", &[SF]),
        RosterSlot::new("PF", &[PF]),
        RosterSlot::new("F", &[SF, PF]),
        RosterSlot::new("C", &[C]),
        RosterSlot::new("UTIL", &[PG, SG, SF, PF, C]),
    ];
    let mlb_dk = vec![
        RosterSlot::new("P", &[P]),
        RosterSlot::new("P", &[P]),
        RosterSlot::new("C", &[C]),
        RosterSlot::new("1B", &[FirstBase]),
        RosterSlot::new("2B", &[SecondBase]),
        RosterSlot::new("3B", &[ThirdBase]),
        RosterSlot::new("SS", &[SS]),
        RosterSlot::new("OF", &[OF]),
        RosterSlot::new("OF", &[OF]),
        RosterSlot::new("OF", &[OF]),
    ];
    let mlb_fd = vec![
        RosterSlot::new("P", &[P]),
        RosterSlot::new("C/1B", &[C, FirstBase]),
        RosterSlot::new("2B", &[SecondBase]),
        RosterSlot::new("3B", &[ThirdBase]),
        RosterSlot::new("SS", &[SS]),
        RosterSlot::new("OF", &[OF]),
        RosterSlot::new("OF", &[OF]),
        RosterSlot::new("OF", &[OF]),
        RosterSlot::new("UTIL", &[C, FirstBase, SecondBase, ThirdBase, SS, OF]),
    ];
    let nhl_dk = vec![
        RosterSlot::new("C", &[C]),
        RosterSlot::new("C", &[C]),
        RosterSlot::new("W", &[W]),
        RosterSlot::new("W", &[W]),
        RosterSlot::new("W", &[W]),
        RosterSlot::new("D", &[D]),
        RosterSlot::new("D", &[D]),
        RosterSlot::new("G", &[G]),
        RosterSlot::new("UTIL", &[C, W, D]),
    ];
    let nhl_fd = vec![
        RosterSlot::new("C", &[C]),
        RosterSlot::new("C", &[C]),
        RosterSlot::new("W", &[W]),
        RosterSlot::new("W", &[W]),
        RosterSlot::new("D", &[D]),
        RosterSlot::new("D", &[D]),
        RosterSlot::new("UTIL", &[C, W, D]),
        RosterSlot::new("UTIL", &[C, W, D]),
        RosterSlot::new("G", &[G]),
    ];
    let pga = vec![
        RosterSlot::new("G", &[Golfer]),
        RosterSlot::new("G", &[Golfer]),
        RosterSlot::new("G", &[Golfer]),
        RosterSlot::new("G", &[Golfer]),
        RosterSlot::new("G", &[Golfer]),
        RosterSlot::new("G", &[Golfer]),
    ];

    let all = [
        template(Sport::Nfl, Platform::DraftKings, 50_000, &nfl_classic),
        template(Sport::Nfl, Platform::FanDuel, 60_000, &nfl_classic),
        template(Sport::Nfl, Platform::Yahoo, 200, &nfl_classic),
        template(Sport::Nba, Platform::DraftKings, 50_000, &nba_dk),
        template(Sport::Nba, Platform::FanDuel, 60_000, &nba_fd),
        template(Sport::Nba, Platform::Yahoo, 200, &nba_yahoo),
        template(Sport::Mlb, Platform::DraftKings, 50_000, &mlb_dk),
        template(Sport::Mlb, Platform::FanDuel, 35_000, &mlb_fd),
        template(Sport::Nhl, Platform::DraftKings, 50_000, &nhl_dk),
        template(Sport::Nhl, Platform::FanDuel, 55_000, &nhl_fd),
        template(Sport::Pga, Platform::DraftKings, 50_000, &pga),
        template(Sport::Pga, Platform::FanDuel, 60_000, &pga),
    ];
    all.into_iter().map(|t| ((t.sport, t.platform), t)).collect()
});

/// Look up the roster template for a sport on a platform.
pub fn resolve(sport: Sport, platform: Platform) -> Result<SlotTemplate> {
    match TEMPLATES.get(&(sport, platform)) {
        Some(template) => {
            tracing::debug!(
                "Resolved {:?}/{:?} template with {} slots",
                sport,
                platform,
                template.slots.len()
            );
            Ok(template.clone())
        }
        None => {
            tracing::warn!("No slot template registered for {:?}/{:?}", sport, platform);
            Err(DfsError::UnknownSlotTemplate { sport, platform })
        }
    }
}

/// All registered (sport, platform) pairs in a stable order.
pub fn known_templates() -> Vec<(Sport, Platform)> {
    TEMPLATES.keys().copied().collect()
}
