// ============================================================================
// Lineup - one player per template slot
// ============================================================================

use std::collections::HashSet;
use std::fmt;

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;
use serde::{Deserialize, Serialize};

use crate::models::PlayerPool;
use crate::slots::SlotTemplate;

/// Cost of placing a player in a slot that does not accept his position
const COST_INELIGIBLE: i64 = 1_000_000;

/// Player index placed into a template slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub slot: usize,
    pub player: usize,
}

/// A complete roster. `assignments` is ordered by slot index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lineup {
    pub assignments: Vec<SlotAssignment>,
    pub total_salary: u32,
    pub projection: f64,
    /// Aggregate objective score under the strategy that produced it
    pub score: f64,
}

/// Reasons a lineup breaks the roster invariants
#[derive(Debug, Clone, PartialEq)]
pub enum LineupViolation {
    WrongSlotCount { expected: usize, found: usize },
    DuplicatePlayer(usize),
    IneligiblePlayer { slot: usize, player: usize },
    OverSalaryCap { total: u32, cap: u32 },
    UnknownSlot(usize),
    UnknownPlayer(usize),
}

impl fmt::Display for LineupViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LineupViolation::WrongSlotCount { expected, found } => {
                write!(f, "expected {} slots, found {}", expected, found)
            }
            LineupViolation::DuplicatePlayer(p) => write!(f, "player {} appears twice", p),
            LineupViolation::IneligiblePlayer { slot, player } => {
                write!(f, "player {} is not eligible for slot {}", player, slot)
            }
            LineupViolation::OverSalaryCap { total, cap } => {
                write!(f, "salary {} exceeds cap {}", total, cap)
            }
            LineupViolation::UnknownSlot(s) => write!(f, "slot {} is outside the template", s),
            LineupViolation::UnknownPlayer(p) => write!(f, "player {} is outside the pool", p),
        }
    }
}

impl Lineup {
    /// Build a lineup from assignments, deriving salary and projection.
    pub fn from_assignments(
        mut assignments: Vec<SlotAssignment>,
        pool: &PlayerPool,
        score: f64,
    ) -> Self {
        assignments.sort_by_key(|a| a.slot);
        let total_salary = assignments.iter().map(|a| pool.get(a.player).salary).sum();
        let projection = assignments.iter().map(|a| pool.get(a.player).projection).sum();
        Self { assignments, total_salary, projection, score }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Player indices in slot order
    pub fn players(&self) -> Vec<usize> {
        self.assignments.iter().map(|a| a.player).collect()
    }

    /// Unordered identity used for diversity checks: sorted player indices.
    pub fn identity(&self) -> Vec<usize> {
        let mut ids = self.players();
        ids.sort_unstable();
        ids
    }

    pub fn contains(&self, player: usize) -> bool {
        self.assignments.iter().any(|a| a.player == player)
    }

    /// Number of players both lineups roster.
    pub fn shared_players(&self, other: &Lineup) -> usize {
        let mine: HashSet<usize> = self.assignments.iter().map(|a| a.player).collect();
        other.assignments.iter().filter(|a| mine.contains(&a.player)).count()
    }

    /// Player identifiers sorted lexicographically, for deterministic tie-breaks.
    pub fn sorted_ids<'a>(&self, pool: &'a PlayerPool) -> Vec<&'a str> {
        let mut ids: Vec<&str> = self.assignments.iter().map(|a| pool.get(a.player).id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Check every roster invariant against a template and cap.
    ///
    /// # Validation Rules
    /// 1. One assignment per template slot
    /// 2. No player appears twice
    /// 3. Each player's position is eligible for its slot
    /// 4. Total salary is within the cap
    pub fn validate(
        &self,
        pool: &PlayerPool,
        template: &SlotTemplate,
        salary_cap: u32,
    ) -> Result<(), LineupViolation> {
        if self.assignments.len() != template.slots.len() {
            return Err(LineupViolation::WrongSlotCount {
                expected: template.slots.len(),
                found: self.assignments.len(),
            });
        }

        let mut seen_slots = HashSet::new();
        let mut seen_players = HashSet::new();
        let mut total: u64 = 0;
        for a in &self.assignments {
            let slot = template.slots.get(a.slot).ok_or(LineupViolation::UnknownSlot(a.slot))?;
            if a.player >= pool.len() {
                return Err(LineupViolation::UnknownPlayer(a.player));
            }
            if !seen_slots.insert(a.slot) {
                return Err(LineupViolation::UnknownSlot(a.slot));
            }
            if !seen_players.insert(a.player) {
                return Err(LineupViolation::DuplicatePlayer(a.player));
            }
            let player = pool.get(a.player);
            if !slot.accepts(player.position) {
                return Err(LineupViolation::IneligiblePlayer { slot: a.slot, player: a.player });
            }
            total += player.salary as u64;
        }

        if total > salary_cap as u64 {
            return Err(LineupViolation::OverSalaryCap {
                total: total.min(u32::MAX as u64) as u32,
                cap: salary_cap,
            });
        }
        Ok(())
    }
}

/// Place a set of players into template slots.
///
/// Hungarian assignment (players × slots) that prefers dedicated slots over
/// flex slots. Returns `None` when the set has the wrong size or no
/// assignment makes every placement eligible.
pub fn assign_to_slots(
    players: &[usize],
    pool: &PlayerPool,
    template: &SlotTemplate,
) -> Option<Vec<SlotAssignment>> {
    let n = template.slots.len();
    if players.len() != n || n == 0 {
        return None;
    }

    let costs = Matrix::from_fn(n, n, |(player_idx, slot_idx)| {
        let position = pool.get(players[player_idx]).position;
        let slot = &template.slots[slot_idx];
        if !slot.accepts(position) {
            COST_INELIGIBLE
        } else if slot.is_flex() {
            // Prefer dedicated slots so flex stays open for whoever needs it.
            10 * slot.eligible.len() as i64
        } else {
            0
        }
    });

    let (_, assignments) = kuhn_munkres_min(&costs);

    let mut result = Vec::with_capacity(n);
    for (player_idx, &slot_idx) in assignments.iter().enumerate() {
        let player = players[player_idx];
        if !template.slots[slot_idx].accepts(pool.get(player).position) {
            return None;
        }
        result.push(SlotAssignment { slot: slot_idx, player });
    }
    result.sort_by_key(|a| a.slot);
    Some(result)
}
