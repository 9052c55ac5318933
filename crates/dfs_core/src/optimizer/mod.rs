//! # Lineup Optimizer
//!
//! Produces up to N distinct, valid lineups ranked by objective score.
//!
//! Each round runs an exact branch-and-bound search for the best lineup
//! that still satisfies the diversity and exposure rules against the
//! lineups already accepted. Rounds stop when N lineups are accepted, when
//! no further lineup exists, or when the run budget expires.
//!
//! ## Ordering
//! Score descending, then total salary ascending, then the sorted player
//! identifiers lexicographically. The order is imposed after parallel work
//! is collected, so it does not depend on scheduling.

mod search;


use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analytics::AnalyticsTable;
use crate::budget::RunBudget;
use crate::correlation::CorrelationMatrix;
use crate::error::{DfsError, Result};
use crate::models::{Lineup, PlayerPool};
use crate::scoring::{ScoringWeights, Strategy};
use crate::slots::SlotTemplate;

use search::{RoundSearch, SearchSpace};

/// Largest request honored in one call; bigger requests are clamped and the
/// shortfall reports the difference.
pub const MAX_LINEUPS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Candidates kept per slot; half by strategy score, half by value
    #[validate(range(min = 1, max = 500))]
    pub candidates_per_slot: usize,
    /// First-slot branch count at which the search goes parallel
    pub parallel_threshold: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { candidates_per_slot: 40, parallel_threshold: 4 }
    }
}

/// Per-request roster constraints beyond the template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConstraints {
    /// Player ids that must appear in every lineup
    pub locked: Vec<String>,
    /// Player ids that may not appear
    pub excluded: Vec<String>,
    /// Maximum fraction of lineups any unlocked player may appear in
    pub max_exposure: Option<f64>,
    /// Minimum total salary per lineup
    pub min_salary: Option<u32>,
}

/// Why a request produced no lineups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Infeasibility {
    /// Some slots have no eligible, affordable, ratable player
    NoEligiblePlayers { slots: Vec<String> },
    /// Filling every slot with its cheapest candidate already breaks the cap
    CheapestFillExceedsCap { cheapest: u32, salary_cap: u32 },
    /// Locked players cannot all be placed in one valid lineup
    LockedPlayersDoNotFit,
    /// Per-slot candidates exist but no combination satisfies every rule
    NoValidCombination,
}

pub struct OptimizeRequest<'a> {
    pub pool: &'a PlayerPool,
    pub template: &'a SlotTemplate,
    pub analytics: &'a AnalyticsTable,
    pub salary_cap: u32,
    pub num_lineups: usize,
    pub min_different_players: usize,
    pub strategy: Strategy,
    /// Required by `CorrelationWeighted`; ignored otherwise
    pub correlation: Option<&'a CorrelationMatrix>,
    pub constraints: ExposureConstraints,
    pub budget: Option<&'a RunBudget>,
}

impl<'a> OptimizeRequest<'a> {
    /// One lineup at the template's salary cap under `Balanced`.
    pub fn new(pool: &'a PlayerPool, template: &'a SlotTemplate, analytics: &'a AnalyticsTable) -> Self {
        Self {
            pool,
            template,
            analytics,
            salary_cap: template.salary_cap,
            num_lineups: 1,
            min_different_players: 1,
            strategy: Strategy::Balanced,
            correlation: None,
            constraints: ExposureConstraints::default(),
            budget: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeOutcome {
    /// Valid lineups, best first
    pub lineups: Vec<Lineup>,
    pub requested: usize,
    /// `requested − lineups.len()` when fewer were found
    pub shortfall: Option<usize>,
    /// Slot names with no eligible, affordable, ratable player
    pub infeasible_slots: Vec<String>,
    pub infeasibility: Option<Infeasibility>,
    /// Stopped early by deadline or cancellation
    pub incomplete: bool,
    pub incomplete_reason: Option<String>,
    pub nodes_explored: u64,
}

impl OptimizeOutcome {
    fn empty(requested: usize) -> Self {
        Self {
            lineups: Vec::new(),
            requested,
            shortfall: None,
            infeasible_slots: Vec::new(),
            infeasibility: None,
            incomplete: false,
            incomplete_reason: None,
            nodes_explored: 0,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.infeasibility.is_none()
    }
}

/// Final ranking: score desc, salary asc, sorted identifiers lexicographic.
pub fn compare_lineups(a: &Lineup, b: &Lineup, pool: &PlayerPool) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.total_salary.cmp(&b.total_salary))
        .then_with(|| a.sorted_ids(pool).cmp(&b.sorted_ids(pool)))
}

/// Request after id resolution and range checks.
pub(crate) struct Resolved {
    pub locked: Vec<usize>,
    pub excluded: Vec<bool>,
    pub exposure_cap: Option<usize>,
    pub min_salary: u32,
    pub max_shared: usize,
    pub target: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LineupOptimizer {
    config: OptimizerConfig,
    weights: ScoringWeights,
}

impl LineupOptimizer {
    pub fn new(config: OptimizerConfig, weights: ScoringWeights) -> Self {
        Self { config, weights }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn resolve(&self, request: &OptimizeRequest) -> Result<Resolved> {
        let pool = request.pool;
        let slot_count = request.template.len();

        if pool.is_empty() {
            return Err(DfsError::EmptyPlayerPool);
        }
        if request.salary_cap == 0 {
            return Err(DfsError::InvalidSalaryCap(0));
        }
        if slot_count == 0 {
            return Err(DfsError::InvalidParameter("slot template has no slots".to_string()));
        }
        if request.num_lineups == 0 {
            return Err(DfsError::InvalidParameter("num_lineups must be at least 1".to_string()));
        }
        if request.min_different_players > slot_count {
            return Err(DfsError::InvalidParameter(format!(
                "min_different_players {} exceeds slot count {}",
                request.min_different_players, slot_count
            )));
        }
        if request.analytics.len() != pool.len() {
            return Err(DfsError::InvalidParameter(format!(
                "analytics cover {} players, pool has {}",
                request.analytics.len(),
                pool.len()
            )));
        }
        if let Some(m) = request.correlation {
            if m.size() != pool.len() {
                return Err(DfsError::InvalidParameter(format!(
                    "correlation matrix is {}x{}, pool has {} players",
                    m.size(),
                    m.size(),
                    pool.len()
                )));
            }
        }

        let constraints = &request.constraints;
        let mut locked = Vec::with_capacity(constraints.locked.len());
        for id in &constraints.locked {
            let idx = pool.require(id)?;
            if !locked.contains(&idx) {
                locked.push(idx);
            }
        }
        let mut excluded = vec![false; pool.len()];
        for id in &constraints.excluded {
            let idx = pool.require(id)?;
            if locked.contains(&idx) {
                return Err(DfsError::InvalidParameter(format!("player {} is both locked and excluded", id)));
            }
            excluded[idx] = true;
        }
        if locked.len() > slot_count {
            return Err(DfsError::InvalidParameter(format!(
                "{} locked players exceed {} slots",
                locked.len(),
                slot_count
            )));
        }

        let target = if request.num_lineups > MAX_LINEUPS {
            tracing::warn!("Requested {} lineups; clamping to {}", request.num_lineups, MAX_LINEUPS);
            MAX_LINEUPS
        } else {
            request.num_lineups
        };

        let exposure_cap = match constraints.max_exposure {
            Some(f) if !(0.0..=1.0).contains(&f) || f.is_nan() => {
                return Err(DfsError::InvalidParameter(format!("max_exposure {} outside [0, 1]", f)));
            }
            Some(f) => Some(((f * target as f64).ceil() as usize).max(1)),
            None => None,
        };

        // Zero still has to yield distinct lineups.
        let min_diff = request.min_different_players.max(1);

        Ok(Resolved {
            locked,
            excluded,
            exposure_cap,
            min_salary: constraints.min_salary.unwrap_or(0),
            max_shared: slot_count - min_diff,
            target,
        })
    }

    /// Run the optimizer.
    ///
    /// # Returns
    /// * `Err` - configuration problems (empty pool, zero cap, bad counts,
    ///   unknown locked/excluded ids)
    /// * `Ok` - lineups plus shortfall / infeasibility / incomplete markers
    pub fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizeOutcome> {
        let resolved = self.resolve(request)?;
        let pool = request.pool;
        let mut outcome = OptimizeOutcome::empty(request.num_lineups);

        tracing::info!(
            "Optimizing {} lineups ({:?} {:?}, cap {}, strategy {}, min diff {})",
            request.num_lineups,
            request.template.sport,
            request.template.platform,
            request.salary_cap,
            request.strategy,
            request.min_different_players
        );

        let unlimited = RunBudget::unlimited();
        let budget = request.budget.unwrap_or(&unlimited);

        let mut blocked = resolved.excluded.clone();
        let mut appearances = vec![0usize; pool.len()];
        let mut accepted: Vec<Vec<usize>> = Vec::new();

        while outcome.lineups.len() < resolved.target {
            if budget.is_exceeded() {
                outcome.incomplete = true;
                outcome.incomplete_reason = budget.exceeded_reason();
                tracing::warn!("Optimizer budget exhausted before round {}", accepted.len() + 1);
                break;
            }
            let space = SearchSpace::build(request, &self.config, &self.weights, &blocked, &resolved.locked);

            if outcome.lineups.is_empty() {
                if let Some(reason) = space.static_infeasibility(request.salary_cap) {
                    if let Infeasibility::NoEligiblePlayers { slots } = &reason {
                        outcome.infeasible_slots = slots.clone();
                    }
                    tracing::info!("No feasible lineup: {:?}", reason);
                    outcome.infeasibility = Some(reason);
                    break;
                }
            }

            let search = RoundSearch::new(&space, &resolved, &accepted, budget);
            let result = search.run();
            outcome.nodes_explored += result.nodes;

            match result.best {
                Some(found) => {
                    let lineup = space.to_lineup(&found);
                    let identity = lineup.identity();
                    for &p in &identity {
                        appearances[p] += 1;
                        if resolved.max_shared == 0 && !resolved.locked.contains(&p) {
                            blocked[p] = true;
                        }
                        if let Some(cap) = resolved.exposure_cap {
                            if appearances[p] >= cap && !resolved.locked.contains(&p) {
                                blocked[p] = true;
                            }
                        }
                    }
                    tracing::debug!(
                        "Round {}: score {:.2}, salary {}",
                        accepted.len() + 1,
                        lineup.score,
                        lineup.total_salary
                    );
                    accepted.push(identity);
                    outcome.lineups.push(lineup);
                }
                None if !result.aborted => {
                    if outcome.lineups.is_empty() {
                        outcome.infeasibility = Some(if resolved.locked.is_empty() {
                            Infeasibility::NoValidCombination
                        } else {
                            Infeasibility::LockedPlayersDoNotFit
                        });
                    }
                    break;
                }
                None => {}
            }

            if result.aborted {
                outcome.incomplete = true;
                outcome.incomplete_reason = budget.exceeded_reason();
                tracing::warn!(
                    "Optimizer stopped early after {} lineups: {}",
                    outcome.lineups.len(),
                    outcome.incomplete_reason.as_deref().unwrap_or("budget exceeded")
                );
                break;
            }
        }

        outcome.lineups.sort_by(|a, b| compare_lineups(a, b, pool));
        if outcome.lineups.len() < request.num_lineups {
            outcome.shortfall = Some(request.num_lineups - outcome.lineups.len());
        }

        tracing::info!(
            "Optimizer produced {}/{} lineups ({} nodes{})",
            outcome.lineups.len(),
            request.num_lineups,
            outcome.nodes_explored,
            if outcome.incomplete { ", incomplete" } else { "" }
        );
        Ok(outcome)
    }
}
