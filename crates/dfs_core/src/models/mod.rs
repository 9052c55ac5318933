//! Core data model: players, the read-only pool, and lineups.

pub mod lineup;
pub mod player;

pub use lineup::{assign_to_slots, Lineup, LineupViolation, SlotAssignment};
pub use player::{InjuryStatus, Platform, Player, PlayerPool, Position, Sport};
