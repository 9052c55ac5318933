//! # Monte Carlo Simulation Engine
//!
//! Estimates each lineup's outcome distribution with correlated draws.
//!
//! ## Per iteration
//! 1. `z ~ N(0, I)` over the simulated players
//! 2. `x = L·z` with `L` the (repaired) Cholesky factor
//! 3. `u = Φ(x)`, outcome = marginal quantile of `u`
//! 4. event adjustments (injury, weather, blowout)
//! 5. lineup score = sum over its players; with a contest configured the
//!    field is scored on the same draw and the lineup's payout read off
//!    its rank
//!
//! ## Determinism
//! Iterations run in fixed-size blocks. Block `b` draws from
//! `ChaCha8Rng::seed_from_u64(seed)` on stream `b`, so every block sees the
//! same numbers whichever worker runs it, and blocks are merged in index
//! order. The aggregate is identical for any worker count.

mod contest;
mod events;
mod field;
mod stats;

pub use contest::{ContestConfig, PayoutStructure, PayoutTable};
pub use events::{EventConfig, EventContext, EventCounts, EventModel, GameLine, StatusMultipliers};
pub use field::{ContestField, ContestFieldSimulator, FieldConfig, FieldEntry, FieldRequest, FieldTier};
pub use stats::{prob_exceed, risk_score, summarize, Percentiles, RoiSummary, ScoreSummary};

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analytics::AnalyticsTable;
use crate::budget::RunBudget;
use crate::correlation::{CholeskyFactor, CorrelationContext, CorrelationEngine, DecompositionStatus};
use crate::distribution::{standard_normal_cdf, DistributionEngine, MarginalDistribution};
use crate::error::{DfsError, Result};
use crate::models::{Lineup, PlayerPool};
use crate::slots::SlotTemplate;

use stats::ContestTally;

/// Field entries are seeded apart from the iteration streams.
const FIELD_SEED_SALT: u64 = 0x0F1E_1D5E_ED00_0001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SimulationConfig {
    #[validate(range(min = 1, max = 1_000_000))]
    pub iterations: usize,
    /// Iterations per seeded block
    #[validate(range(min = 1, max = 100_000))]
    pub block_size: usize,
    pub seed: u64,
    /// Fixed worker count; `None` uses the global rayon pool
    pub worker_threads: Option<usize>,
    /// Score for `prob_exceed_target`; `None` uses the lineup projection
    pub target_score: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { iterations: 10_000, block_size: 1_000, seed: 0x00DF_5EED, worker_threads: None, target_score: None }
    }
}

/// Everything a simulation shares across the lineups it scores.
pub struct SimulationRequest<'a> {
    pub pool: &'a PlayerPool,
    pub template: &'a SlotTemplate,
    pub analytics: &'a AnalyticsTable,
    /// Realized history by player id, for empirical marginals
    pub histories: Option<&'a HashMap<String, Vec<f64>>>,
    pub correlation: CorrelationContext,
    pub events: EventContext,
    pub contest: Option<&'a ContestConfig>,
    /// Cap used when building the contest field
    pub salary_cap: u32,
    /// Overrides the configured iteration count
    pub iterations: Option<usize>,
    pub seed: Option<u64>,
    pub target_score: Option<f64>,
    pub budget: Option<&'a RunBudget>,
}

impl<'a> SimulationRequest<'a> {
    pub fn new(pool: &'a PlayerPool, template: &'a SlotTemplate, analytics: &'a AnalyticsTable) -> Self {
        Self {
            pool,
            template,
            analytics,
            histories: None,
            correlation: CorrelationContext::default(),
            events: EventContext::default(),
            contest: None,
            salary_cap: template.salary_cap,
            iterations: None,
            seed: None,
            target_score: None,
            budget: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Player identifiers, sorted
    pub players: Vec<String>,
    pub projection: f64,
    pub iterations_requested: usize,
    pub iterations_completed: usize,
    /// Stopped early by deadline or cancellation
    pub incomplete: bool,
    pub incomplete_reason: Option<String>,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
    pub target: f64,
    pub prob_exceed_target: f64,
    /// Present only when a contest was configured
    pub roi: Option<RoiSummary>,
    pub risk_score: f64,
    pub events: EventCounts,
    pub degraded_to_independent: bool,
    pub correlation_status: DecompositionStatus,
}

/// Metric for ordering simulated lineups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Mean,
    Median,
    /// 90th percentile
    Ceiling,
    /// 10th percentile
    Floor,
    /// Mean ROI; lineups without a contest rank last
    Roi,
    WinRate,
    CashRate,
    /// Mean over standard deviation
    RiskAdjusted,
}

impl RankMetric {
    pub fn value(self, result: &SimulationResult) -> f64 {
        let v = match self {
            RankMetric::Mean => result.mean,
            RankMetric::Median => result.percentiles.p50,
            RankMetric::Ceiling => result.percentiles.p90,
            RankMetric::Floor => result.percentiles.p10,
            RankMetric::Roi => result.roi.map_or(f64::NEG_INFINITY, |r| r.mean_roi),
            RankMetric::WinRate => result.roi.map_or(f64::NEG_INFINITY, |r| r.win_rate),
            RankMetric::CashRate => result.roi.map_or(f64::NEG_INFINITY, |r| r.cash_rate),
            RankMetric::RiskAdjusted => {
                if result.std_dev > 0.0 {
                    result.mean / result.std_dev
                } else {
                    result.mean
                }
            }
        };
        if v.is_nan() {
            f64::NEG_INFINITY
        } else {
            v
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RankMetric::Mean => "mean",
            RankMetric::Median => "median",
            RankMetric::Ceiling => "ceiling",
            RankMetric::Floor => "floor",
            RankMetric::Roi => "roi",
            RankMetric::WinRate => "win_rate",
            RankMetric::CashRate => "cash_rate",
            RankMetric::RiskAdjusted => "risk_adjusted",
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankMetric {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s.chars().filter(|c| !matches!(c, '-' | '_' | ' ')).collect::<String>().to_lowercase();
        match key.as_str() {
            "mean" => Ok(RankMetric::Mean),
            "median" | "p50" => Ok(RankMetric::Median),
            "ceiling" | "p90" => Ok(RankMetric::Ceiling),
            "floor" | "p10" => Ok(RankMetric::Floor),
            "roi" => Ok(RankMetric::Roi),
            "winrate" | "win" => Ok(RankMetric::WinRate),
            "cashrate" | "cash" => Ok(RankMetric::CashRate),
            "riskadjusted" | "sharpe" => Ok(RankMetric::RiskAdjusted),
            _ => Err(DfsError::InvalidParameter(format!("unknown rank metric '{}'", s))),
        }
    }
}

/// Indices of `results`, best first under `metric`. Ties keep input order.
pub fn rank_by(results: &[SimulationResult], metric: RankMetric) -> Vec<usize> {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| metric.value(&results[b]).total_cmp(&metric.value(&results[a])).then(a.cmp(&b)));
    order
}

/// Read-only state shared by every block of one run.
struct Plan<'a> {
    marginals: Vec<MarginalDistribution>,
    factor: CholeskyFactor,
    events: EventModel,
    /// Local player indices per lineup
    lineups: Vec<Vec<usize>>,
    /// Local player indices per field entry
    field: Vec<Vec<usize>>,
    contest: Option<ContestPlan<'a>>,
    seed: u64,
    budget: Option<&'a RunBudget>,
}

struct ContestPlan<'a> {
    config: &'a ContestConfig,
    table: PayoutTable,
    /// Real opponents per simulated opponent
    rank_scale: f64,
    top_1pct_rank: usize,
}

/// Output of one iteration block.
struct BlockOutput {
    iterations: usize,
    scores: Vec<Vec<f64>>,
    tallies: Vec<ContestTally>,
    events: EventCounts,
}

impl Plan<'_> {
    fn run_block(&self, block: usize, count: usize) -> Option<BlockOutput> {
        if self.budget.map_or(false, RunBudget::is_exceeded) {
            return None;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(block as u64);

        let n = self.marginals.len();
        let mut z = vec![0.0; n];
        let mut x = vec![0.0; n];
        let mut outcomes = vec![0.0; n];
        let mut field_scores = vec![0.0; self.field.len()];
        let mut out = BlockOutput {
            iterations: count,
            scores: vec![Vec::with_capacity(count); self.lineups.len()],
            tallies: if self.contest.is_some() {
                (0..self.lineups.len()).map(|_| ContestTally::with_capacity(count)).collect()
            } else {
                Vec::new()
            },
            events: EventCounts::default(),
        };

        for _ in 0..count {
            for v in z.iter_mut() {
                *v = rng.sample(StandardNormal);
            }
            self.factor.correlate(&z, &mut x);
            for ((o, m), xi) in outcomes.iter_mut().zip(&self.marginals).zip(&x) {
                *o = m.quantile(standard_normal_cdf(*xi));
            }
            self.events.apply(&mut rng, &mut outcomes, &mut out.events);
            // events may push a score under its floor but never past its ceiling
            for (o, m) in outcomes.iter_mut().zip(&self.marginals) {
                *o = o.min(m.ceiling);
            }

            for (k, lineup) in self.lineups.iter().enumerate() {
                out.scores[k].push(lineup.iter().map(|&i| outcomes[i]).sum());
            }

            if let Some(contest) = &self.contest {
                for (s, entry) in field_scores.iter_mut().zip(&self.field) {
                    *s = entry.iter().map(|&i| outcomes[i]).sum();
                }
                field_scores.sort_by(f64::total_cmp);
                for (k, tally) in out.tallies.iter_mut().enumerate() {
                    let score = out.scores[k][out.scores[k].len() - 1];
                    contest.record(&field_scores, score, tally);
                }
            }
        }
        Some(out)
    }
}

impl ContestPlan<'_> {
    fn record(&self, sorted_field: &[f64], score: f64, tally: &mut ContestTally) {
        let at_or_below = sorted_field.partition_point(|v| *v <= score);
        let below = sorted_field.partition_point(|v| *v < score);
        let better = sorted_field.len() - at_or_below;
        let level = at_or_below - below;

        let rank = 1 + (better as f64 * self.rank_scale).round() as usize;
        let tied = (level as f64 * self.rank_scale).round() as usize;
        let payout = self.table.payout_for_tie(rank, tied);
        let fee = self.config.entry_fee;
        tally.roi.push(if fee > 0.0 { (payout - fee) / fee } else { payout });
        if payout > 0.0 {
            tally.cashes += 1;
        }
        if rank <= self.top_1pct_rank {
            tally.top_1pct += 1;
        }
        if rank == 1 {
            tally.wins += 1;
        }
    }
}

/// Runs correlated Monte Carlo simulations over lineups.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloEngine {
    config: SimulationConfig,
    distributions: DistributionEngine,
    correlation: CorrelationEngine,
    events: EventConfig,
    field: ContestFieldSimulator,
}

impl MonteCarloEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn with_distributions(mut self, distributions: DistributionEngine) -> Self {
        self.distributions = distributions;
        self
    }

    pub fn with_correlation(mut self, correlation: CorrelationEngine) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn with_events(mut self, events: EventConfig) -> Self {
        self.events = events;
        self
    }

    pub fn with_field(mut self, field: ContestFieldSimulator) -> Self {
        self.field = field;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate a single lineup.
    pub fn simulate(&self, request: &SimulationRequest, lineup: &Lineup) -> Result<SimulationResult> {
        let mut results = self.simulate_many(request, std::slice::from_ref(lineup))?;
        results.pop().ok_or_else(|| DfsError::InvalidParameter("no lineup simulated".to_string()))
    }

    /// Simulate several lineups on common draws, so their results compare
    /// like for like. Results follow the input order; see [`rank_by`].
    pub fn simulate_many(&self, request: &SimulationRequest, lineups: &[Lineup]) -> Result<Vec<SimulationResult>> {
        let pool = request.pool;
        let iterations = request.iterations.unwrap_or(self.config.iterations);
        if lineups.is_empty() {
            return Err(DfsError::InvalidParameter("no lineups to simulate".to_string()));
        }
        if iterations == 0 {
            return Err(DfsError::InvalidParameter("iterations must be at least 1".to_string()));
        }
        if self.config.block_size == 0 {
            return Err(DfsError::InvalidParameter("block_size must be at least 1".to_string()));
        }
        if let Some(bad) = lineups.iter().flat_map(|l| l.players()).find(|&p| p >= pool.len()) {
            return Err(DfsError::InvalidParameter(format!("lineup references player index {} outside the pool", bad)));
        }
        if let Some(contest) = request.contest {
            contest.validate()?;
        }
        let seed = request.seed.unwrap_or(self.config.seed);

        let field = match request.contest {
            Some(contest) => {
                let size = (contest.field_size - 1).min(self.field.config().max_simulated_entries);
                self.field.generate_with(&FieldRequest {
                    pool,
                    template: request.template,
                    analytics: request.analytics,
                    salary_cap: request.salary_cap,
                    size,
                    seed: seed ^ FIELD_SEED_SALT,
                    budget: request.budget,
                })?
            }
            None => ContestField::default(),
        };

        // Simulated set: every rostered player, in pool order.
        let mut members: Vec<usize> = lineups.iter().flat_map(|l| l.players()).chain(field.players()).collect();
        members.sort_unstable();
        members.dedup();
        let mut local = vec![usize::MAX; pool.len()];
        for (k, &p) in members.iter().enumerate() {
            local[p] = k;
        }
        let to_local = |players: &[usize]| -> Vec<usize> { players.iter().map(|&p| local[p]).collect() };

        let marginals: Vec<MarginalDistribution> = members
            .iter()
            .map(|&p| {
                let player = pool.get(p);
                match request.analytics.get(p) {
                    Some(a) => {
                        let history = request.histories.and_then(|h| h.get(&player.id)).map(Vec::as_slice);
                        self.distributions.build(player, a, history)
                    }
                    None => MarginalDistribution::constant(player.projection.max(0.0)),
                }
            })
            .collect();

        let matrix = self.correlation.matrix(pool, request.template.sport, &request.correlation);
        let factor = self.correlation.factor(&matrix.submatrix(&members));
        let degraded = factor.is_degraded();
        let status = factor.status();

        let contest = request.contest.map(|config| {
            let simulated = field.len().max(1);
            ContestPlan {
                config,
                table: config.payout_table(),
                rank_scale: (config.field_size - 1) as f64 / simulated as f64,
                top_1pct_rank: ((config.field_size as f64 * 0.01).ceil() as usize).max(1),
            }
        });

        let plan = Plan {
            marginals,
            factor,
            events: EventModel::build(&self.events, &request.events, pool, &members),
            lineups: lineups.iter().map(|l| to_local(&l.players())).collect(),
            field: field.entries.iter().map(|e| to_local(&e.players)).collect(),
            contest,
            seed,
            budget: request.budget,
        };

        tracing::info!(
            "Simulating {} lineup(s) × {} iterations over {} players (field {}, {:?})",
            lineups.len(),
            iterations,
            members.len(),
            plan.field.len(),
            status
        );

        let block_size = self.config.block_size;
        let blocks: Vec<(usize, usize)> = (0..(iterations + block_size - 1) / block_size)
            .map(|b| (b, block_size.min(iterations - b * block_size)))
            .collect();
        let run = || -> Vec<Option<BlockOutput>> {
            blocks.par_iter().map(|&(b, count)| plan.run_block(b, count)).collect()
        };
        let outputs = match self.config.worker_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new().num_threads(threads.max(1)).build()?.install(run),
            None => run(),
        };

        let mut completed = 0usize;
        let mut skipped = 0usize;
        let mut events = EventCounts::default();
        let mut scores: Vec<Vec<f64>> = vec![Vec::new(); lineups.len()];
        let mut tallies: Vec<ContestTally> = (0..lineups.len()).map(|_| ContestTally::default()).collect();
        for output in outputs {
            let Some(output) = output else {
                skipped += 1;
                continue;
            };
            completed += output.iterations;
            events.merge(&output.events);
            for (all, block) in scores.iter_mut().zip(output.scores) {
                all.extend(block);
            }
            for (all, block) in tallies.iter_mut().zip(output.tallies) {
                all.merge(block);
            }
        }

        let incomplete = skipped > 0;
        let incomplete_reason = if incomplete {
            let reason = request
                .budget
                .and_then(RunBudget::exceeded_reason)
                .unwrap_or_else(|| "Budget exceeded".to_string());
            tracing::warn!("Simulation stopped after {}/{} iterations: {}", completed, iterations, reason);
            Some(reason)
        } else {
            None
        };

        let results = lineups
            .iter()
            .zip(scores)
            .zip(tallies)
            .map(|((lineup, mut values), tally)| {
                let summary = summarize(&mut values);
                let target = request.target_score.or(self.config.target_score).unwrap_or(lineup.projection);
                let mean_correlation = if degraded { 0.0 } else { matrix.mean_pairwise(&lineup.players()) };
                SimulationResult {
                    players: lineup.sorted_ids(pool).into_iter().map(str::to_string).collect(),
                    projection: lineup.projection,
                    iterations_requested: iterations,
                    iterations_completed: completed,
                    incomplete,
                    incomplete_reason: incomplete_reason.clone(),
                    mean: summary.mean,
                    std_dev: summary.std_dev,
                    min: summary.min,
                    max: summary.max,
                    percentiles: summary.percentiles,
                    target,
                    prob_exceed_target: prob_exceed(&values, target),
                    roi: request.contest.map(|_| tally.summarize()),
                    risk_score: risk_score(summary.mean, summary.std_dev, mean_correlation),
                    events,
                    degraded_to_independent: degraded,
                    correlation_status: status,
                }
            })
            .collect::<Vec<_>>();

        tracing::info!("Simulation finished: {}/{} iterations", completed, iterations);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::AnalyticsConfig;
    use crate::correlation::CorrelationRules;
    use crate::distribution::DistributionConfig;
    use crate::models::{InjuryStatus, Platform, Player, Position, SlotAssignment, Sport};
    use crate::slots;
    use proptest::prelude::*;

    fn player(id: &str, sport: Sport, position: Position, team: &str, opp: &str, projection: f64) -> Player {
        Player {
            id: id.to_string(),
            name: String::new(),
            sport,
            position,
            team: team.to_string(),
            opponent: opp.to_string(),
            salary: 6000,
            projection,
            floor: 0.0,
            ceiling: 0.0,
            volatility: 0.0,
            value_rating: 0.0,
            ownership: None,
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn golf_setup() -> (PlayerPool, SlotTemplate, AnalyticsTable) {
        let players = (0..30)
            .map(|i| {
                let mut p = player(&format!("g{:02}", i), Sport::Pga, Position::Golfer, "", "", 40.0 + i as f64 * 1.5);
                p.salary = 6000 + (i as u32 % 10) * 400;
                p.ownership = Some(0.02 + (i % 5) as f64 * 0.04);
                p
            })
            .collect();
        let pool = PlayerPool::new(players).unwrap();
        let template = slots::resolve(Sport::Pga, Platform::DraftKings).unwrap();
        let analytics = AnalyticsTable::from_pool(&pool, &AnalyticsConfig::default());
        (pool, template, analytics)
    }

    fn lineup_of(players: &[usize], pool: &PlayerPool) -> Lineup {
        let assignments = players.iter().enumerate().map(|(slot, &player)| SlotAssignment { slot, player }).collect();
        Lineup::from_assignments(assignments, pool, 0.0)
    }

    fn quiet_engine(iterations: usize) -> MonteCarloEngine {
        MonteCarloEngine::new(SimulationConfig { iterations, block_size: 500, ..SimulationConfig::default() })
            .with_events(EventConfig { enabled: false, ..EventConfig::default() })
    }

    #[test]
    fn test_result_is_independent_of_worker_count() {
        let (pool, template, analytics) = golf_setup();
        let lineup = lineup_of(&[0, 5, 10, 15, 20, 25], &pool);
        let contest = ContestConfig::gpp(50, 5.0);
        let mut request = SimulationRequest::new(&pool, &template, &analytics);
        request.contest = Some(&contest);
        request.iterations = Some(3_000);

        let run = |threads: usize| {
            let engine = MonteCarloEngine::new(SimulationConfig {
                block_size: 250,
                worker_threads: Some(threads),
                ..SimulationConfig::default()
            });
            engine.simulate(&request, &lineup).unwrap()
        };
        let one = run(1);
        assert_eq!(one, run(4));
        assert_eq!(one, run(7));
        assert_eq!(one.iterations_completed, 3_000);
        assert!(one.roi.is_some());
    }

    #[test]
    fn test_independent_lineup_matches_sum_of_marginals() {
        let (pool, template, analytics) = golf_setup();
        let members = [1, 4, 9, 16, 22, 28];
        let lineup = lineup_of(&members, &pool);
        let engine = quiet_engine(10_000);
        let request = SimulationRequest::new(&pool, &template, &analytics);
        let result = engine.simulate(&request, &lineup).unwrap();
        assert_eq!(result.correlation_status, DecompositionStatus::Exact);

        // Moments of each clamped marginal by quantile integration.
        let distributions = DistributionEngine::new(DistributionConfig::default());
        let grid = 20_000;
        let (mut mean, mut variance) = (0.0, 0.0);
        for &p in &members {
            let m = distributions.build(pool.get(p), analytics.get(p).unwrap(), None);
            let values: Vec<f64> = (0..grid).map(|k| m.quantile((k as f64 + 0.5) / grid as f64)).collect();
            let mu = values.iter().sum::<f64>() / grid as f64;
            mean += mu;
            variance += values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / grid as f64;
        }

        let std_err = (variance / 10_000.0).sqrt();
        assert!((result.mean - mean).abs() < 4.0 * std_err, "mean {} vs {}", result.mean, mean);
        let ratio = result.std_dev.powi(2) / variance;
        assert!((ratio - 1.0).abs() < 0.06, "variance ratio {}", ratio);
    }

    #[test]
    fn test_positive_stack_widens_the_distribution() {
        let players = vec![
            player("qb", Sport::Nfl, Position::QB, "KC", "BUF", 22.0),
            player("wr1", Sport::Nfl, Position::WR, "KC", "BUF", 15.0),
            player("te", Sport::Nfl, Position::TE, "KC", "BUF", 11.0),
            player("opp-wr", Sport::Nfl, Position::WR, "BUF", "KC", 14.0),
        ];
        let pool = PlayerPool::new(players).unwrap();
        let template = slots::resolve(Sport::Nfl, Platform::DraftKings).unwrap();
        let analytics = AnalyticsTable::from_pool(&pool, &AnalyticsConfig::default());
        let lineup = lineup_of(&[0, 1, 2, 3], &pool);
        let request = SimulationRequest::new(&pool, &template, &analytics);

        let stacked = quiet_engine(8_000).simulate(&request, &lineup).unwrap();
        let flat_rules = CorrelationRules { max_abs: 0.0, ..CorrelationRules::default() };
        let independent = quiet_engine(8_000)
            .with_correlation(CorrelationEngine::new(flat_rules))
            .simulate(&request, &lineup)
            .unwrap();

        assert!(!stacked.degraded_to_independent);
        assert!(stacked.std_dev > independent.std_dev * 1.1);
        assert!(stacked.risk_score > independent.risk_score);
        assert!((stacked.mean - independent.mean).abs() < 0.1 * independent.mean);
    }

    #[test]
    fn test_contest_roi_rates_are_consistent() {
        let (pool, template, analytics) = golf_setup();
        let strong = lineup_of(&[24, 25, 26, 27, 28, 29], &pool);
        let weak = lineup_of(&[0, 1, 2, 3, 4, 5], &pool);
        let contest = ContestConfig::gpp(200, 10.0);
        let mut request = SimulationRequest::new(&pool, &template, &analytics);
        request.contest = Some(&contest);
        request.iterations = Some(2_000);

        let results = quiet_engine(2_000).simulate_many(&request, &[weak, strong]).unwrap();
        for r in &results {
            let roi = r.roi.unwrap();
            assert!(roi.cash_rate >= roi.top_1pct_rate && roi.top_1pct_rate >= roi.win_rate);
            assert!((0.0..=1.0).contains(&roi.cash_rate));
            assert!(roi.mean_roi >= -1.0);
        }
        assert!(results[1].roi.unwrap().mean_roi > results[0].roi.unwrap().mean_roi);
        assert_eq!(rank_by(&results, RankMetric::Roi), vec![1, 0]);
        assert_eq!(rank_by(&results, RankMetric::Mean), vec![1, 0]);
    }

    #[test]
    fn test_no_contest_means_no_roi() {
        let (pool, template, analytics) = golf_setup();
        let lineup = lineup_of(&[0, 5, 10, 15, 20, 25], &pool);
        let request = SimulationRequest::new(&pool, &template, &analytics);
        let result = quiet_engine(500).simulate(&request, &lineup).unwrap();
        assert!(result.roi.is_none());
        assert_eq!(result.target, lineup.projection);
        assert!(result.prob_exceed_target > 0.2 && result.prob_exceed_target < 0.8);
    }

    #[test]
    fn test_cancelled_budget_returns_incomplete() {
        let (pool, template, analytics) = golf_setup();
        let lineup = lineup_of(&[0, 5, 10, 15, 20, 25], &pool);
        let budget = RunBudget::unlimited();
        budget.cancel();
        let mut request = SimulationRequest::new(&pool, &template, &analytics);
        request.budget = Some(&budget);
        let result = quiet_engine(2_000).simulate(&request, &lineup).unwrap();
        assert!(result.incomplete);
        assert_eq!(result.iterations_completed, 0);
        assert_eq!(result.incomplete_reason.as_deref(), Some("Cancelled"));
    }

    #[test]
    fn test_configuration_errors() {
        let (pool, template, analytics) = golf_setup();
        let engine = quiet_engine(100);
        let mut request = SimulationRequest::new(&pool, &template, &analytics);
        assert!(engine.simulate_many(&request, &[]).is_err());

        let lineup = lineup_of(&[0, 1, 2, 3, 4, 5], &pool);
        request.iterations = Some(0);
        assert!(engine.simulate(&request, &lineup).is_err());

        request.iterations = None;
        let mut outside = lineup_of(&[0, 1, 2, 3, 4, 5], &pool);
        outside.assignments[5].player = 99;
        assert!(matches!(engine.simulate(&request, &outside), Err(DfsError::InvalidParameter(_))));
    }

    #[test]
    fn test_out_player_contributes_nothing() {
        let (pool, template, analytics) = golf_setup();
        let mut players = pool.players().to_vec();
        players[3].injury_status = InjuryStatus::Out;
        let pool = PlayerPool::new(players).unwrap();
        let lone = lineup_of(&[3], &pool);
        let request = SimulationRequest::new(&pool, &template, &analytics);
        let result = MonteCarloEngine::new(SimulationConfig { iterations: 200, ..SimulationConfig::default() })
            .simulate(&request, &lone)
            .unwrap();
        assert_eq!(result.max, 0.0);
    }

    #[test]
    fn test_blowout_bonus_is_capped_at_ceiling() {
        let players = vec![
            player("kc-qb", Sport::Nfl, Position::QB, "KC", "LV", 22.0),
            player("lv-wr", Sport::Nfl, Position::WR, "LV", "KC", 14.0),
        ];
        let pool = PlayerPool::new(players).unwrap();
        let template = slots::resolve(Sport::Nfl, Platform::DraftKings).unwrap();
        let analytics = AnalyticsTable::from_pool(&pool, &AnalyticsConfig::default());
        let lone = lineup_of(&[1], &pool);
        let mut request = SimulationRequest::new(&pool, &template, &analytics);
        request.events = EventContext {
            games: vec![GameLine { team: "KC".into(), opponent: "LV".into(), spread: -10.0, weather_severity: 0.0 }],
            weather_severity: 0.0,
        };
        let events = EventConfig {
            injury_base_rate: Default::default(),
            default_injury_rate: 0.0,
            blowout_base_rate: 1.0,
            blowout_max_rate: 1.0,
            ..EventConfig::default()
        };
        let engine = MonteCarloEngine::new(SimulationConfig { iterations: 2_000, ..SimulationConfig::default() })
            .with_events(events);
        let result = engine.simulate(&request, &lone).unwrap();

        let ceiling = analytics.get(1).unwrap().ceiling;
        assert_eq!(result.events.blowouts, 2_000);
        assert!(result.max <= ceiling + 1e-9, "max {} above ceiling {}", result.max, ceiling);
        assert!((result.max - ceiling).abs() < 1e-9);
    }

    #[test]
    fn test_rank_metric_from_str() {
        assert_eq!("win-rate".parse::<RankMetric>().unwrap(), RankMetric::WinRate);
        assert_eq!("P90".parse::<RankMetric>().unwrap(), RankMetric::Ceiling);
        assert!("luck".parse::<RankMetric>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_scores_stay_within_summed_clamps(seed in any::<u64>(), pick in proptest::sample::subsequence((0..30usize).collect::<Vec<_>>(), 6)) {
            let (pool, template, analytics) = golf_setup();
            let lineup = lineup_of(&pick, &pool);
            let mut request = SimulationRequest::new(&pool, &template, &analytics);
            request.seed = Some(seed);
            let result = quiet_engine(400).simulate(&request, &lineup).unwrap();

            let (mut lo, mut hi) = (0.0, 0.0);
            for &p in &pick {
                let a = analytics.get(p).unwrap();
                lo += a.floor.min(pool.get(p).projection);
                hi += a.ceiling.max(pool.get(p).projection);
            }
            prop_assert!(result.min >= lo - 1e-9);
            prop_assert!(result.max <= hi + 1e-9);
            prop_assert!(result.percentiles.p10 <= result.percentiles.p50);
            prop_assert!(result.percentiles.p50 <= result.percentiles.p90);
        }
    }
}
