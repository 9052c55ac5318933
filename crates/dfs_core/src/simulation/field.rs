//! Synthetic contest fields.
//!
//! Opponents come in three tiers. Sharks are optimizer lineups built on a
//! few perturbed copies of the projections, so they are strong but not all
//! identical. Recreational and beginner entries are drawn slot by slot with
//! weights on projection and ownership, then checked through the slot
//! assignment.

use rand::distributions::WeightedIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analytics::AnalyticsTable;
use crate::budget::RunBudget;
use crate::error::{DfsError, Result};
use crate::models::{assign_to_slots, Player, PlayerPool};
use crate::optimizer::{LineupOptimizer, OptimizeRequest, OptimizerConfig};
use crate::scoring::{ScoringWeights, Strategy};
use crate::slots::SlotTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTier {
    Shark,
    Recreational,
    Beginner,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FieldConfig {
    /// Fraction of the field built by the optimizer
    #[validate(range(min = 0.0, max = 1.0))]
    pub shark_share: f64,
    /// Fraction drawn by projection × ownership; the rest are beginners
    #[validate(range(min = 0.0, max = 1.0))]
    pub recreational_share: f64,
    /// Perturbed projection sets the sharks are split across
    #[validate(range(min = 1, max = 20))]
    pub shark_pools: usize,
    /// σ of the `N(1, σ)` projection multiplier per perturbed set
    #[validate(range(min = 0.0, max = 1.0))]
    pub projection_noise: f64,
    pub shark_min_different: usize,
    #[validate(range(min = 1, max = 200))]
    pub shark_candidates_per_slot: usize,
    /// Draws per heuristic entry before giving up on it
    #[validate(range(min = 1))]
    pub max_attempts: usize,
    /// Opponents actually simulated; larger fields are sampled and ranks
    /// scaled up
    #[validate(range(min = 1))]
    pub max_simulated_entries: usize,
    /// Ownership assumed when a player has none
    #[validate(range(min = 0.0, max = 1.0))]
    pub default_ownership: f64,
    /// Projection exponent in the beginner weight
    #[validate(range(min = 0.0, max = 2.0))]
    pub beginner_projection_weight: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            shark_share: 0.10,
            recreational_share: 0.60,
            shark_pools: 3,
            projection_noise: 0.15,
            shark_min_different: 2,
            shark_candidates_per_slot: 20,
            max_attempts: 50,
            max_simulated_entries: 2000,
            default_ownership: 0.05,
            beginner_projection_weight: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    /// Sorted pool indices
    pub players: Vec<usize>,
    pub tier: FieldTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContestField {
    pub entries: Vec<FieldEntry>,
}

impl ContestField {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, tier: FieldTier) -> usize {
        self.entries.iter().filter(|e| e.tier == tier).count()
    }

    /// Sorted, de-duplicated pool indices used by any entry.
    pub fn players(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self.entries.iter().flat_map(|e| e.players.iter().copied()).collect();
        all.sort_unstable();
        all.dedup();
        all
    }
}

/// Inputs shared by every entry of one generated field.
pub struct FieldRequest<'a> {
    pub pool: &'a PlayerPool,
    pub template: &'a SlotTemplate,
    pub analytics: &'a AnalyticsTable,
    pub salary_cap: u32,
    pub size: usize,
    pub seed: u64,
    pub budget: Option<&'a RunBudget>,
}

#[derive(Debug, Clone, Default)]
pub struct ContestFieldSimulator {
    config: FieldConfig,
    weights: ScoringWeights,
}

impl ContestFieldSimulator {
    pub fn new(config: FieldConfig, weights: ScoringWeights) -> Self {
        Self { config, weights }
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Build `size` opponent entries. Entries that cannot be drawn within
    /// `max_attempts` are dropped, so the field may come back smaller.
    pub fn generate(
        &self,
        pool: &PlayerPool,
        template: &SlotTemplate,
        salary_cap: u32,
        analytics: &AnalyticsTable,
        size: usize,
        seed: u64,
    ) -> Result<ContestField> {
        self.generate_with(&FieldRequest { pool, template, analytics, salary_cap, size, seed, budget: None })
    }

    pub fn generate_with(&self, request: &FieldRequest) -> Result<ContestField> {
        let size = request.size;
        let sharks = ((size as f64 * self.config.shark_share).round() as usize).min(size);
        let recreational =
            ((size as f64 * self.config.recreational_share).round() as usize).min(size - sharks);
        let beginners = size - sharks - recreational;

        let mut rng = ChaCha8Rng::seed_from_u64(request.seed);
        let mut entries = self.shark_entries(request, sharks, &mut rng)?;
        // optimizer shortfall is covered by recreational entries
        let recreational = recreational + (sharks - entries.len());

        let filler = HeuristicFill::new(request, &self.config);
        let mut dropped = 0usize;
        for (tier, count) in [(FieldTier::Recreational, recreational), (FieldTier::Beginner, beginners)] {
            for _ in 0..count {
                match filler.draw(tier, &mut rng) {
                    Some(players) => entries.push(FieldEntry { players, tier }),
                    None => dropped += 1,
                }
            }
        }
        if dropped > 0 {
            tracing::debug!("Dropped {} field entries that could not be filled", dropped);
        }

        let field = ContestField { entries };
        tracing::debug!(
            "Generated field of {} ({} shark, {} recreational, {} beginner)",
            field.len(),
            field.count(FieldTier::Shark),
            field.count(FieldTier::Recreational),
            field.count(FieldTier::Beginner)
        );
        Ok(field)
    }

    fn shark_entries(&self, request: &FieldRequest, sharks: usize, rng: &mut ChaCha8Rng) -> Result<Vec<FieldEntry>> {
        if sharks == 0 {
            return Ok(Vec::new());
        }
        let pools = self.config.shark_pools.max(1).min(sharks);
        let optimizer = LineupOptimizer::new(
            OptimizerConfig { candidates_per_slot: self.config.shark_candidates_per_slot, ..OptimizerConfig::default() },
            self.weights.clone(),
        );
        let noise = Normal::new(1.0, self.config.projection_noise.max(0.0))
            .map_err(|e| DfsError::InvalidConfig(format!("projection_noise: {}", e)))?;

        let mut entries = Vec::with_capacity(sharks);
        for k in 0..pools {
            let wanted = sharks / pools + usize::from(k < sharks % pools);
            let factors: Vec<f64> = (0..request.pool.len()).map(|_| noise.sample(rng).max(0.05)).collect();
            let perturbed = perturb(request.pool, &factors)?;
            let analytics = request.analytics.scaled(&factors);

            let mut optimize = OptimizeRequest::new(&perturbed, request.template, &analytics);
            optimize.salary_cap = request.salary_cap;
            optimize.num_lineups = wanted;
            optimize.min_different_players = self.config.shark_min_different.clamp(1, request.template.len().max(1));
            optimize.strategy = Strategy::Balanced;
            optimize.budget = request.budget;

            let outcome = optimizer.optimize(&optimize)?;
            entries.extend(
                outcome.lineups.iter().map(|l| FieldEntry { players: l.identity(), tier: FieldTier::Shark }),
            );
            if outcome.incomplete {
                break;
            }
        }
        Ok(entries)
    }
}

/// Same players, same order, projections scaled per player.
fn perturb(pool: &PlayerPool, factors: &[f64]) -> Result<PlayerPool> {
    let players: Vec<Player> = pool
        .players()
        .iter()
        .zip(factors)
        .map(|(p, &f)| Player {
            projection: p.projection * f,
            floor: p.floor * f,
            ceiling: p.ceiling * f,
            ..p.clone()
        })
        .collect();
    PlayerPool::new(players)
}

/// Slot-by-slot weighted draws for the non-optimizer tiers.
struct HeuristicFill<'a> {
    request: &'a FieldRequest<'a>,
    config: &'a FieldConfig,
    /// Template slot per fill step
    order: Vec<usize>,
    /// Eligible, rated, affordable players per fill step
    eligible: Vec<Vec<usize>>,
    /// Cheapest possible salary of steps `d..`
    suffix_min: Vec<u64>,
}

impl<'a> HeuristicFill<'a> {
    fn new(request: &'a FieldRequest<'a>, config: &'a FieldConfig) -> Self {
        let template = request.template;
        let order = template.fill_order();
        let eligible: Vec<Vec<usize>> = order
            .iter()
            .map(|&slot| {
                request
                    .pool
                    .iter()
                    .filter(|(i, p)| {
                        p.sport == template.sport
                            && p.salary <= request.salary_cap
                            && request.analytics.get(*i).is_some()
                            && template.slots[slot].accepts(p.position)
                    })
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        let mut suffix_min = vec![0u64; order.len() + 1];
        for d in (0..order.len()).rev() {
            let cheapest = eligible[d].iter().map(|&i| request.pool.get(i).salary as u64).min();
            suffix_min[d] = suffix_min[d + 1].saturating_add(cheapest.unwrap_or(u64::MAX / 4));
        }
        Self { request, config, order, eligible, suffix_min }
    }

    fn weight(&self, tier: FieldTier, player: &Player) -> f64 {
        let own = player.ownership.unwrap_or(self.config.default_ownership).clamp(1e-3, 1.0);
        let projection = player.projection.max(0.0);
        let w = match tier {
            FieldTier::Beginner => own * projection.powf(self.config.beginner_projection_weight),
            _ => own * projection,
        };
        if w.is_finite() {
            w
        } else {
            0.0
        }
    }

    fn draw(&self, tier: FieldTier, rng: &mut ChaCha8Rng) -> Option<Vec<usize>> {
        for _ in 0..self.config.max_attempts {
            if let Some(players) = self.attempt(tier, rng) {
                return Some(players);
            }
        }
        None
    }

    fn attempt(&self, tier: FieldTier, rng: &mut ChaCha8Rng) -> Option<Vec<usize>> {
        let pool = self.request.pool;
        let cap = self.request.salary_cap as u64;
        let mut chosen: Vec<usize> = Vec::with_capacity(self.order.len());
        let mut salary = 0u64;

        for d in 0..self.order.len() {
            let options: Vec<usize> = self.eligible[d]
                .iter()
                .copied()
                .filter(|i| !chosen.contains(i) && salary + pool.get(*i).salary as u64 + self.suffix_min[d + 1] <= cap)
                .collect();
            if options.is_empty() {
                return None;
            }
            let weights: Vec<f64> = options.iter().map(|&i| self.weight(tier, pool.get(i))).collect();
            let pick = match WeightedIndex::new(&weights) {
                Ok(dist) => options[dist.sample(rng)],
                Err(_) => options[rng.gen_range(0..options.len())],
            };
            salary += pool.get(pick).salary as u64;
            chosen.push(pick);
        }

        // Hungarian placement normalizes flex usage and rejects bad sets.
        assign_to_slots(&chosen, pool, self.request.template)?;
        chosen.sort_unstable();
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsConfig;
    use crate::models::{InjuryStatus, Lineup, Platform, Position, Sport};
    use crate::slots;

    fn golfer(i: usize) -> Player {
        Player {
            id: format!("g{:02}", i),
            name: String::new(),
            sport: Sport::Pga,
            position: Position::Golfer,
            team: String::new(),
            opponent: String::new(),
            salary: 6000 + (i as u32 % 10) * 400,
            projection: 40.0 + (i % 13) as f64 * 3.0,
            floor: 0.0,
            ceiling: 0.0,
            volatility: 0.0,
            value_rating: 0.0,
            ownership: Some(0.02 + (i % 7) as f64 * 0.03),
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn setup() -> (PlayerPool, SlotTemplate, AnalyticsTable) {
        let pool = PlayerPool::new((0..40).map(golfer).collect()).unwrap();
        let template = slots::resolve(Sport::Pga, Platform::DraftKings).unwrap();
        let analytics = AnalyticsTable::from_pool(&pool, &AnalyticsConfig::default());
        (pool, template, analytics)
    }

    #[test]
    fn test_field_tiers_follow_the_mix() {
        let (pool, template, analytics) = setup();
        let sim = ContestFieldSimulator::default();
        let field = sim.generate(&pool, &template, template.salary_cap, &analytics, 100, 7).unwrap();
        assert_eq!(field.len(), 100);
        assert_eq!(field.count(FieldTier::Shark), 10);
        assert_eq!(field.count(FieldTier::Recreational), 60);
        assert_eq!(field.count(FieldTier::Beginner), 30);
    }

    #[test]
    fn test_every_entry_is_a_valid_lineup() {
        let (pool, template, analytics) = setup();
        let sim = ContestFieldSimulator::default();
        let field = sim.generate(&pool, &template, template.salary_cap, &analytics, 60, 3).unwrap();
        for entry in &field.entries {
            let assignments = assign_to_slots(&entry.players, &pool, &template).expect("placeable");
            let lineup = Lineup::from_assignments(assignments, &pool, 0.0);
            assert!(lineup.validate(&pool, &template, template.salary_cap).is_ok());
        }
    }

    #[test]
    fn test_same_seed_same_field() {
        let (pool, template, analytics) = setup();
        let sim = ContestFieldSimulator::default();
        let a = sim.generate(&pool, &template, template.salary_cap, &analytics, 50, 99).unwrap();
        let b = sim.generate(&pool, &template, template.salary_cap, &analytics, 50, 99).unwrap();
        assert_eq!(a, b);
        let c = sim.generate(&pool, &template, template.salary_cap, &analytics, 50, 100).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_unfillable_template_drops_heuristic_entries() {
        let (pool, template, analytics) = setup();
        let config = FieldConfig { shark_share: 0.0, max_attempts: 3, ..FieldConfig::default() };
        let sim = ContestFieldSimulator::new(config, ScoringWeights::default());
        // nobody fits under a tiny cap
        let field = sim.generate(&pool, &template, 1000, &analytics, 20, 1).unwrap();
        assert!(field.is_empty());
    }
}
