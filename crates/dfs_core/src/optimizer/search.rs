// ============================================================================
// Branch-and-bound lineup search
// ============================================================================
//
// Slots are filled in template fill order (dedicated before flex). Each
// first-slot candidate is an independent branch explored by its own worker
// with its own dead-end memo; workers share only the incumbent score.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use fxhash::FxHashMap;
use rayon::prelude::*;

use crate::budget::RunBudget;
use crate::models::{Lineup, PlayerPool, SlotAssignment};
use crate::scoring::{self, LineupContext, ScoringWeights, Strategy};

use super::{Infeasibility, OptimizeRequest, OptimizerConfig, Resolved};

/// Nodes between budget checks
const BUDGET_CHECK_INTERVAL: u64 = 4096;

/// Multiples of the pool's median points-per-salary used as Lagrange
/// multipliers on the salary constraint
const LAMBDA_SCALES: [f64; 9] = [0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 2.0, 3.0];

#[derive(Debug, Clone, Copy)]
struct Candidate {
    player: usize,
    salary: u32,
    /// Score with an empty lineup context
    score: f64,
    /// Admissible bound on the score in any context
    upper: f64,
}

/// A complete lineup found by the search, players in fill order.
#[derive(Debug, Clone)]
pub(crate) struct Found {
    pub players: Vec<usize>,
    pub score: f64,
    pub salary: u32,
}

/// Per-round candidate lists and bounds. Read-only once built.
pub(crate) struct SearchSpace<'a> {
    request: &'a OptimizeRequest<'a>,
    weights: &'a ScoringWeights,
    parallel_threshold: usize,
    /// Template slot index per depth
    order: Vec<usize>,
    candidates: Vec<Vec<Candidate>>,
    /// Slot at this depth has the same eligibility as the one before it
    same_as_prev: Vec<bool>,
    /// One past the last depth of the identical-slot run containing each depth
    run_end: Vec<usize>,
    lambdas: Vec<f64>,
    /// `[depth][k]`: Σ over slots from `depth` of max(upper − λₖ·salary)
    suffix_relaxed: Vec<Vec<f64>>,
    /// `[depth][start][k]`: best distinct fill of the rest of the run from
    /// candidates `start..` under λₖ
    run_tail: Vec<Vec<Vec<f64>>>,
    suffix_min_salary: Vec<u64>,
    suffix_max_salary: Vec<u64>,
    /// Deepest depth at which each player is still a candidate
    last_depth: Vec<Option<usize>>,
    is_locked: Vec<bool>,
}

impl<'a> SearchSpace<'a> {
    pub fn build(
        request: &'a OptimizeRequest<'a>,
        config: &OptimizerConfig,
        weights: &'a ScoringWeights,
        blocked: &[bool],
        locked: &[usize],
    ) -> Self {
        let pool = request.pool;
        let template = request.template;
        let order = template.fill_order();
        let n = order.len();

        let mut is_locked = vec![false; pool.len()];
        for &p in locked {
            is_locked[p] = true;
        }

        // Everyone who could appear anywhere; the universe for correlation bounds.
        let universe: Vec<usize> = pool
            .iter()
            .filter(|(i, p)| {
                !blocked[*i]
                    && p.sport == template.sport
                    && p.salary <= request.salary_cap
                    && request.analytics.get(*i).is_some()
                    && template.slots.iter().any(|s| s.accepts(p.position))
            })
            .map(|(i, _)| i)
            .collect();

        let strategy = request.strategy;
        let scored: FxHashMap<usize, Candidate> = universe
            .iter()
            .filter_map(|&i| {
                let player = pool.get(i);
                let analytics = request.analytics.get(i)?;
                let score =
                    scoring::score(i, player, analytics, strategy, &LineupContext::empty(), weights);
                let upper = scoring::upper_bound(
                    i,
                    player,
                    analytics,
                    strategy,
                    request.correlation,
                    &universe,
                    n,
                    weights,
                );
                Some((i, Candidate { player: i, salary: player.salary, score, upper }))
            })
            .collect();

        let mut candidates = Vec::with_capacity(n);
        for &slot_idx in &order {
            let slot = &template.slots[slot_idx];
            let mut eligible: Vec<Candidate> = universe
                .iter()
                .filter(|&&i| slot.accepts(pool.get(i).position))
                .filter_map(|i| scored.get(i).copied())
                .collect();
            eligible.sort_by(by_score);
            if eligible.len() > config.candidates_per_slot {
                eligible = cap_candidates(eligible, config.candidates_per_slot, request, &is_locked);
            }
            candidates.push(eligible);
        }

        let mut same_as_prev = vec![false; n];
        for d in 1..n {
            same_as_prev[d] = template.slots[order[d]].eligible == template.slots[order[d - 1]].eligible;
        }

        let mut run_end = vec![n; n];
        for d in (0..n).rev() {
            run_end[d] = if d + 1 < n && same_as_prev[d + 1] { run_end[d + 1] } else { d + 1 };
        }

        let lambdas = lambda_grid(&candidates);
        let mut suffix_relaxed = vec![vec![0.0; lambdas.len()]; n + 1];
        let mut suffix_min_salary = vec![0u64; n + 1];
        let mut suffix_max_salary = vec![0u64; n + 1];
        for d in (0..n).rev() {
            let cands = &candidates[d];
            for (k, &lambda) in lambdas.iter().enumerate() {
                let best = cands
                    .iter()
                    .map(|c| c.upper - lambda * c.salary as f64)
                    .fold(f64::NEG_INFINITY, f64::max);
                suffix_relaxed[d][k] = suffix_relaxed[d + 1][k] + best;
            }
            let min_salary = cands.iter().map(|c| c.salary as u64).min().unwrap_or(u64::MAX / 4);
            let max_salary = cands.iter().map(|c| c.salary as u64).max().unwrap_or(0);
            suffix_min_salary[d] = suffix_min_salary[d + 1].saturating_add(min_salary);
            suffix_max_salary[d] = suffix_max_salary[d + 1] + max_salary;
        }

        let run_tail: Vec<Vec<Vec<f64>>> = (0..n)
            .map(|d| {
                let cands = &candidates[d];
                let needed = run_end[d] - d;
                (0..=cands.len())
                    .map(|start| {
                        lambdas
                            .iter()
                            .map(|&lambda| {
                                let mut values: Vec<f64> =
                                    cands[start..].iter().map(|c| c.upper - lambda * c.salary as f64).collect();
                                if values.len() < needed {
                                    return f64::NEG_INFINITY;
                                }
                                values.sort_by(|a, b| b.total_cmp(a));
                                values[..needed].iter().sum()
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let mut last_depth = vec![None; pool.len()];
        for (d, cands) in candidates.iter().enumerate() {
            for c in cands {
                last_depth[c.player] = Some(d);
            }
        }

        Self {
            request,
            weights,
            parallel_threshold: config.parallel_threshold,
            order,
            candidates,
            same_as_prev,
            run_end,
            lambdas,
            suffix_relaxed,
            run_tail,
            suffix_min_salary,
            suffix_max_salary,
            last_depth,
            is_locked,
        }
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    /// Upper bound on the score the slots from `depth` on can add with
    /// `budget_left` salary, when this slot may only pick candidates from
    /// `start` on: the tightest Lagrangian relaxation of the cap.
    fn remaining_bound(&self, depth: usize, start: usize, budget_left: u32) -> f64 {
        let budget = budget_left as f64;
        let after_run = &self.suffix_relaxed[self.run_end[depth]];
        let tail = &self.run_tail[depth][start.min(self.candidates[depth].len())];
        self.lambdas
            .iter()
            .enumerate()
            .map(|(k, &lambda)| lambda * budget + tail[k] + after_run[k])
            .fold(f64::INFINITY, f64::min)
    }

    /// Problems visible before any search.
    pub fn static_infeasibility(&self, salary_cap: u32) -> Option<Infeasibility> {
        let template = self.request.template;
        let mut empty: Vec<String> = Vec::new();
        for (d, cands) in self.candidates.iter().enumerate() {
            let name = &template.slots[self.order[d]].name;
            if cands.is_empty() && !empty.contains(name) {
                empty.push(name.clone());
            }
        }
        if !empty.is_empty() {
            return Some(Infeasibility::NoEligiblePlayers { slots: empty });
        }

        let cheapest = self.suffix_min_salary[0];
        if cheapest > salary_cap as u64 {
            return Some(Infeasibility::CheapestFillExceedsCap {
                cheapest: cheapest.min(u32::MAX as u64) as u32,
                salary_cap,
            });
        }

        let stranded = self
            .is_locked
            .iter()
            .enumerate()
            .any(|(p, &locked)| locked && self.last_depth[p].is_none());
        if stranded {
            return Some(Infeasibility::LockedPlayersDoNotFit);
        }
        None
    }

    pub fn to_lineup(&self, found: &Found) -> Lineup {
        let assignments = found
            .players
            .iter()
            .enumerate()
            .map(|(d, &player)| SlotAssignment { slot: self.order[d], player })
            .collect();
        Lineup::from_assignments(assignments, self.request.pool, found.score)
    }

    fn ranks_before(&self, a: &Found, b: &Found) -> bool {
        let pool = self.request.pool;
        let ord = b
            .score
            .total_cmp(&a.score)
            .then_with(|| a.salary.cmp(&b.salary))
            .then_with(|| sorted_ids(pool, a).cmp(&sorted_ids(pool, b)));
        ord == Ordering::Less
    }
}

fn sorted_ids<'p>(pool: &'p PlayerPool, found: &Found) -> Vec<&'p str> {
    let mut ids: Vec<&str> = found.players.iter().map(|&p| pool.get(p).id.as_str()).collect();
    ids.sort_unstable();
    ids
}

fn lambda_grid(candidates: &[Vec<Candidate>]) -> Vec<f64> {
    let mut ratios: Vec<f64> = candidates
        .iter()
        .flatten()
        .filter(|c| c.salary > 0 && c.upper > 0.0)
        .map(|c| c.upper / c.salary as f64)
        .collect();
    if ratios.is_empty() {
        return vec![0.0];
    }
    ratios.sort_by(f64::total_cmp);
    let median = ratios[ratios.len() / 2];
    LAMBDA_SCALES.iter().map(|s| s * median).collect()
}

fn by_score(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.salary.cmp(&b.salary))
        .then_with(|| a.player.cmp(&b.player))
}

/// Keep half the slot by strategy score and fill the rest by value rating,
/// so both expensive studs and salary savers survive. Locked players stay.
fn cap_candidates(
    sorted: Vec<Candidate>,
    limit: usize,
    request: &OptimizeRequest,
    is_locked: &[bool],
) -> Vec<Candidate> {
    let by_score_share = (limit + 1) / 2;
    let mut keep = vec![false; sorted.len()];
    for (k, c) in sorted.iter().enumerate() {
        if k < by_score_share || is_locked[c.player] {
            keep[k] = true;
        }
    }

    let value = |c: &Candidate| request.analytics.get(c.player).map(|a| a.value_rating).unwrap_or(0.0);
    let mut rest: Vec<usize> = (0..sorted.len()).filter(|&k| !keep[k]).collect();
    rest.sort_by(|&x, &y| value(&sorted[y]).total_cmp(&value(&sorted[x])).then_with(|| x.cmp(&y)));
    let mut kept = keep.iter().filter(|&&k| k).count();
    for k in rest {
        if kept >= limit {
            break;
        }
        keep[k] = true;
        kept += 1;
    }

    sorted.into_iter().zip(keep).filter(|(_, k)| *k).map(|(c, _)| c).collect()
}

#[derive(Debug, Default)]
pub(crate) struct RoundResult {
    pub best: Option<Found>,
    pub nodes: u64,
    pub aborted: bool,
}

/// One round: the best lineup compatible with everything accepted so far.
pub(crate) struct RoundSearch<'s> {
    space: &'s SearchSpace<'s>,
    budget: &'s RunBudget,
    max_shared: usize,
    min_salary: u32,
    locked_count: usize,
    /// Accepted lineups containing each player
    player_lineups: Vec<Vec<usize>>,
    accepted_count: usize,
    incumbent: AtomicU64,
    aborted: AtomicBool,
}

impl<'s> RoundSearch<'s> {
    pub fn new(
        space: &'s SearchSpace<'s>,
        resolved: &Resolved,
        accepted: &[Vec<usize>],
        budget: &'s RunBudget,
    ) -> Self {
        let mut player_lineups = vec![Vec::new(); space.request.pool.len()];
        for (k, lineup) in accepted.iter().enumerate() {
            for &p in lineup {
                player_lineups[p].push(k);
            }
        }
        Self {
            space,
            budget,
            max_shared: resolved.max_shared,
            min_salary: resolved.min_salary,
            locked_count: resolved.locked.len(),
            player_lineups,
            accepted_count: accepted.len(),
            incumbent: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn run(&self) -> RoundResult {
        let first = self.space.candidates.first().map(|c| c.len()).unwrap_or(0);
        if first == 0 {
            return RoundResult::default();
        }

        let branches: Vec<RoundResult> = if first >= self.space.parallel_threshold {
            (0..first).into_par_iter().map(|ci| self.explore_branch(ci)).collect()
        } else {
            (0..first).map(|ci| self.explore_branch(ci)).collect()
        };

        let mut result = RoundResult::default();
        for branch in branches {
            result.nodes += branch.nodes;
            result.aborted |= branch.aborted;
            if let Some(found) = branch.best {
                let better = match &result.best {
                    Some(current) => self.space.ranks_before(&found, current),
                    None => true,
                };
                if better {
                    result.best = Some(found);
                }
            }
        }
        result
    }

    fn explore_branch(&self, ci: usize) -> RoundResult {
        let mut worker = Worker::new(self);
        if !self.aborted.load(AtomicOrdering::Relaxed) {
            let cap = self.space.request.salary_cap;
            worker.try_child(0, ci, cap, 0, 0.0);
        }
        RoundResult { best: worker.best, nodes: worker.nodes, aborted: worker.aborted }
    }

    fn raise_incumbent(&self, score: f64) {
        let mut current = self.incumbent.load(AtomicOrdering::Relaxed);
        while f64::from_bits(current) < score {
            match self.incumbent.compare_exchange_weak(
                current,
                score.to_bits(),
                AtomicOrdering::Relaxed,
                AtomicOrdering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => current = seen,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Explored {
    /// A complete valid lineup exists below this node
    found: bool,
    /// Part of the subtree was skipped by the score bound or by abort
    cut: bool,
}

/// Depth-first explorer for one top-level branch.
struct Worker<'r, 's> {
    search: &'r RoundSearch<'s>,
    /// (depth, first candidate, state signature) -> largest remaining budget
    /// proven to be a dead end
    memo: FxHashMap<(usize, usize, u64), u32>,
    use_memo: bool,
    selected: Vec<usize>,
    used: Vec<bool>,
    shared: Vec<usize>,
    locked_left: usize,
    best: Option<Found>,
    nodes: u64,
    aborted: bool,
}

impl<'r, 's> Worker<'r, 's> {
    fn new(search: &'r RoundSearch<'s>) -> Self {
        let space = search.space;
        Self {
            search,
            memo: FxHashMap::default(),
            // Budget monotonicity breaks once a salary floor is in play.
            use_memo: search.min_salary == 0,
            selected: Vec::with_capacity(space.len()),
            used: vec![false; space.request.pool.len()],
            shared: vec![0; search.accepted_count],
            locked_left: search.locked_count,
            best: None,
            nodes: 0,
            aborted: false,
        }
    }

    fn space(&self) -> &'s SearchSpace<'s> {
        self.search.space
    }

    fn incumbent(&self) -> f64 {
        let global = f64::from_bits(self.search.incumbent.load(AtomicOrdering::Relaxed));
        match &self.best {
            Some(b) => b.score.max(global),
            None => global,
        }
    }

    fn can_prune(&self, bound: f64) -> bool {
        let incumbent = self.incumbent();
        incumbent.is_finite() && bound + 1e-9 * (1.0 + incumbent.abs()) < incumbent
    }

    fn check_budget(&mut self) -> bool {
        if (self.nodes == 1 || self.nodes % BUDGET_CHECK_INTERVAL == 0) && self.search.budget.is_exceeded() {
            self.search.aborted.store(true, AtomicOrdering::Relaxed);
        }
        if self.search.aborted.load(AtomicOrdering::Relaxed) {
            self.aborted = true;
        }
        !self.aborted
    }

    fn diversity_ok(&self, player: usize) -> bool {
        self.search.player_lineups[player].iter().all(|&k| self.shared[k] < self.search.max_shared)
    }

    fn place(&mut self, player: usize) {
        self.selected.push(player);
        self.used[player] = true;
        for &k in &self.search.player_lineups[player] {
            self.shared[k] += 1;
        }
        if self.space().is_locked[player] {
            self.locked_left -= 1;
        }
    }

    fn unplace(&mut self, player: usize) {
        self.selected.pop();
        self.used[player] = false;
        for &k in &self.search.player_lineups[player] {
            self.shared[k] -= 1;
        }
        if self.space().is_locked[player] {
            self.locked_left += 1;
        }
    }

    /// Compact state key: used players that remaining slots could still
    /// pick, plus the overlap the other used players contribute.
    fn signature(&self, depth: usize) -> u64 {
        let space = self.space();
        let mut relevant: Vec<usize> = Vec::with_capacity(self.selected.len());
        let mut overlap: Vec<usize> = Vec::new();
        for &p in &self.selected {
            if space.last_depth[p].map_or(false, |d| d >= depth) {
                relevant.push(p);
            } else {
                overlap.extend_from_slice(&self.search.player_lineups[p]);
            }
        }
        relevant.sort_unstable();
        overlap.sort_unstable();
        fxhash::hash64(&(self.locked_left, relevant, overlap))
    }

    fn offer(&mut self, score: f64, salary: u32) {
        let found = Found { players: self.selected.clone(), score, salary };
        let better = match &self.best {
            Some(current) => self.space().ranks_before(&found, current),
            None => true,
        };
        if better {
            self.search.raise_incumbent(score);
            self.best = Some(found);
        }
    }

    fn descend(&mut self, depth: usize, budget_left: u32, salary: u32, score: f64, start: usize) -> Explored {
        self.nodes += 1;
        if !self.check_budget() {
            return Explored { found: false, cut: true };
        }

        let space = self.space();
        let n = space.len();
        if depth == n {
            if salary < self.search.min_salary || self.locked_left > 0 {
                return Explored::default();
            }
            self.offer(score, salary);
            return Explored { found: true, cut: false };
        }

        if (budget_left as u64) < space.suffix_min_salary[depth]
            || (salary as u64) + space.suffix_max_salary[depth] < self.search.min_salary as u64
            || self.locked_left > n - depth
        {
            return Explored::default();
        }
        if self.can_prune(score + space.remaining_bound(depth, start, budget_left)) {
            return Explored { found: false, cut: true };
        }

        let key = if self.use_memo { Some((depth, start, self.signature(depth))) } else { None };
        if let Some(k) = &key {
            if matches!(self.memo.get(k), Some(&dead) if dead >= budget_left) {
                return Explored::default();
            }
        }

        let mut summary = Explored::default();
        for ci in start..space.candidates[depth].len() {
            if let Some(r) = self.try_child(depth, ci, budget_left, salary, score) {
                summary.found |= r.found;
                summary.cut |= r.cut;
            }
            if self.aborted {
                summary.cut = true;
                break;
            }
        }

        if let Some(k) = key {
            if !summary.found && !summary.cut {
                let entry = self.memo.entry(k).or_insert(budget_left);
                *entry = (*entry).max(budget_left);
            }
        }
        summary
    }

    /// Place candidate `ci` at `depth` and explore below it. `None` when the
    /// candidate cannot be placed at all.
    fn try_child(&mut self, depth: usize, ci: usize, budget_left: u32, salary: u32, score: f64) -> Option<Explored> {
        let space = self.space();
        let n = space.len();
        let cand = space.candidates[depth][ci];

        if self.used[cand.player] || cand.salary > budget_left {
            return None;
        }
        if self.locked_left == n - depth && !space.is_locked[cand.player] {
            return None;
        }
        if !self.diversity_ok(cand.player) {
            return None;
        }

        let strategy = space.request.strategy;
        let gain = if strategy.is_order_dependent() {
            self.incremental_score(cand.player, strategy)
        } else {
            cand.score
        };

        self.place(cand.player);
        let next_start = if depth + 1 < n && space.same_as_prev[depth + 1] { ci + 1 } else { 0 };
        let explored = self.descend(depth + 1, budget_left - cand.salary, salary + cand.salary, score + gain, next_start);
        self.unplace(cand.player);
        Some(explored)
    }

    fn incremental_score(&self, player: usize, strategy: Strategy) -> f64 {
        let space = self.space();
        let request = space.request;
        match request.analytics.get(player) {
            Some(analytics) => {
                let ctx = LineupContext { selected: &self.selected, correlation: request.correlation };
                scoring::score(player, request.pool.get(player), analytics, strategy, &ctx, space.weights)
            }
            None => 0.0,
        }
    }
}
