//! Contest entry economics: prize pool, payout table, rank → payout.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// How the prize pool is split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PayoutStructure {
    /// Top-heavy tournament: the top `paid_fraction` of the field is paid,
    /// prizes decaying as `rank^-decay`, every paid place at least a min-cash
    Gpp { paid_fraction: f64, decay: f64, min_cash_multiple: f64 },
    /// Double-up: as many places as the pool allows each win twice the fee
    Cash,
    /// Explicit prize per rank, first place first
    Custom { payouts: Vec<f64> },
}

impl PayoutStructure {
    pub fn gpp() -> Self {
        PayoutStructure::Gpp { paid_fraction: 0.2, decay: 1.1, min_cash_multiple: 1.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContestConfig {
    #[validate(range(min = 0.0))]
    pub entry_fee: f64,
    /// Total entries including the simulated lineup
    #[validate(range(min = 2))]
    pub field_size: usize,
    /// Operator cut of entry fees
    #[serde(default = "default_rake")]
    #[validate(range(min = 0.0, max = 0.5))]
    pub rake: f64,
    pub payout: PayoutStructure,
}

fn default_rake() -> f64 {
    0.15
}

impl ContestConfig {
    pub fn gpp(field_size: usize, entry_fee: f64) -> Self {
        Self { entry_fee, field_size, rake: default_rake(), payout: PayoutStructure::gpp() }
    }

    pub fn cash(field_size: usize, entry_fee: f64) -> Self {
        Self { entry_fee, field_size, rake: 0.10, payout: PayoutStructure::Cash }
    }

    pub fn prize_pool(&self) -> f64 {
        self.entry_fee * self.field_size as f64 * (1.0 - self.rake)
    }

    /// Materialized per-rank payouts.
    pub fn payout_table(&self) -> PayoutTable {
        let pool = self.prize_pool();
        let payouts = match &self.payout {
            PayoutStructure::Custom { payouts } => payouts.iter().map(|p| p.max(0.0)).collect(),
            PayoutStructure::Cash => {
                let prize = 2.0 * self.entry_fee;
                let paid = if prize > 0.0 { ((pool / prize).floor() as usize).clamp(1, self.field_size) } else { 0 };
                vec![prize; paid]
            }
            PayoutStructure::Gpp { paid_fraction, decay, min_cash_multiple } => {
                gpp_payouts(pool, self.entry_fee, self.field_size, *paid_fraction, *decay, *min_cash_multiple)
            }
        };
        PayoutTable { payouts }
    }

    /// Prize for a 1-based finishing rank.
    pub fn payout_for_rank(&self, rank: usize) -> f64 {
        self.payout_table().payout_for_rank(rank)
    }
}

/// Every paid place gets the min-cash; the rest of the pool is spread by
/// `rank^-decay` weights.
fn gpp_payouts(pool: f64, fee: f64, field: usize, paid_fraction: f64, decay: f64, min_cash_multiple: f64) -> Vec<f64> {
    let mut paid = ((field as f64 * paid_fraction.clamp(0.0, 1.0)).floor() as usize).clamp(1, field);
    let mut min_cash = fee * min_cash_multiple.max(0.0);
    if min_cash * paid as f64 > pool {
        paid = ((pool / min_cash.max(f64::MIN_POSITIVE)).floor() as usize).clamp(1, field);
        min_cash = min_cash.min(pool / paid as f64);
    }
    let weights: Vec<f64> = (1..=paid).map(|r| (r as f64).powf(-decay.max(0.0))).collect();
    let total: f64 = weights.iter().sum();
    let remaining = (pool - min_cash * paid as f64).max(0.0);
    weights.iter().map(|w| min_cash + remaining * w / total).collect()
}

/// Prize per rank; ranks past the table pay nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutTable {
    payouts: Vec<f64>,
}

impl PayoutTable {
    pub fn paid_places(&self) -> usize {
        self.payouts.len()
    }

    pub fn total(&self) -> f64 {
        self.payouts.iter().sum()
    }

    pub fn payout_for_rank(&self, rank: usize) -> f64 {
        if rank == 0 {
            return 0.0;
        }
        self.payouts.get(rank - 1).copied().unwrap_or(0.0)
    }

    /// Average prize over ranks `rank ..= rank + tied`, the usual split when
    /// `tied` other entries finish level.
    pub fn payout_for_tie(&self, rank: usize, tied: usize) -> f64 {
        if tied == 0 {
            return self.payout_for_rank(rank);
        }
        let sum: f64 = (rank..=rank + tied).map(|r| self.payout_for_rank(r)).sum();
        sum / (tied + 1) as f64
    }
}
