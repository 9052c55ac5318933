//! # Correlation Engine
//!
//! Builds a symmetric, unit-diagonal pairwise correlation matrix over a
//! player pool from sport-specific rules, then factors it for correlated
//! sampling.
//!
//! ## Invariants
//! - `m[i][j] == m[j][i]`
//! - `m[i][i] == 1`
//! - every entry in `[-1, 1]`
//! - the factor used for sampling is positive semi-definite, or the build is
//!   flagged `degraded_to_independent`

mod decomposition;
mod rules;

pub use decomposition::{decompose, decompose_bounded, CholeskyFactor, DecompositionStatus};
pub use rules::{CorrelationContext, CorrelationRules, GolfRules, PairRule, SportRules};

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::models::{PlayerPool, Sport};

/// Dense symmetric correlation matrix indexed like the player pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn identity(size: usize) -> Self {
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
        }
        Self { size, values }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    /// Set a symmetric off-diagonal pair. Values are clamped to [-1, 1];
    /// writes to the diagonal are ignored.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i == j {
            return;
        }
        let v = if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 };
        self.values[i * self.size + j] = v;
        self.values[j * self.size + i] = v;
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.size..(i + 1) * self.size]
    }

    /// Principal submatrix over the given indices, in the given order.
    pub fn submatrix(&self, indices: &[usize]) -> CorrelationMatrix {
        let n = indices.len();
        let mut values = Vec::with_capacity(n * n);
        for &i in indices {
            for &j in indices {
                values.push(if i == j { 1.0 } else { self.get(i, j) });
            }
        }
        CorrelationMatrix { size: n, values }
    }

    /// Mean off-diagonal correlation among the given indices.
    pub fn mean_pairwise(&self, indices: &[usize]) -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (k, &i) in indices.iter().enumerate() {
            for &j in &indices[k + 1..] {
                sum += self.get(i, j);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Structural invariants: symmetric, unit diagonal, entries in [-1, 1].
    pub fn is_well_formed(&self) -> bool {
        (0..self.size).all(|i| {
            (self.get(i, i) - 1.0).abs() < 1e-12
                && (0..self.size).all(|j| {
                    let v = self.get(i, j);
                    (-1.0..=1.0).contains(&v) && v == self.get(j, i)
                })
        })
    }

    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.size, self.size, &self.values)
    }
}

/// Result of `CorrelationEngine::build`.
#[derive(Debug, Clone)]
pub struct CorrelationBuild {
    pub matrix: CorrelationMatrix,
    pub factor: CholeskyFactor,
    pub degraded_to_independent: bool,
}

impl CorrelationBuild {
    pub fn status(&self) -> DecompositionStatus {
        self.factor.status()
    }
}

/// Builds correlation matrices from a rule set.
#[derive(Debug, Clone, Default)]
pub struct CorrelationEngine {
    rules: CorrelationRules,
}

impl CorrelationEngine {
    pub fn new(rules: CorrelationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &CorrelationRules {
        &self.rules
    }

    /// Pairwise matrix only, without factoring.
    pub fn matrix(&self, pool: &PlayerPool, sport: Sport, ctx: &CorrelationContext) -> CorrelationMatrix {
        let n = pool.len();
        let bound = self.rules.max_abs.clamp(0.0, 1.0);
        let mut matrix = CorrelationMatrix::identity(n);
        for i in 0..n {
            let a = pool.get(i);
            for j in (i + 1)..n {
                let b = pool.get(j);
                if a.sport != b.sport {
                    continue;
                }
                let v = self.rules.pair_value(sport, a, b, ctx);
                if v != 0.0 {
                    matrix.set(i, j, v.clamp(-bound, bound));
                }
            }
        }
        matrix
    }

    /// Build the pool matrix and its sampling factor.
    pub fn build(&self, pool: &PlayerPool, sport: Sport, ctx: &CorrelationContext) -> CorrelationBuild {
        let matrix = self.matrix(pool, sport, ctx);
        let factor = self.factor(&matrix);
        let degraded_to_independent = factor.is_degraded();
        tracing::debug!(
            "Built {:?} correlation matrix over {} players ({:?})",
            sport,
            pool.len(),
            factor.status()
        );
        CorrelationBuild { matrix, factor, degraded_to_independent }
    }

    /// Factor any matrix with this engine's repair policy.
    pub fn factor(&self, matrix: &CorrelationMatrix) -> CholeskyFactor {
        decompose_bounded(matrix, self.rules.repair_jitter, self.rules.max_repair_jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InjuryStatus, Player, Position};
    use proptest::prelude::*;

    fn nfl(id: usize, position: Position, team: &str, opp: &str) -> Player {
        Player {
            id: format!("p{}", id),
            name: String::new(),
            sport: Sport::Nfl,
            position,
            team: team.to_string(),
            opponent: opp.to_string(),
            salary: 5000,
            projection: 12.0,
            floor: 4.0,
            ceiling: 24.0,
            volatility: 0.5,
            value_rating: 1.0,
            ownership: None,
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn slate() -> PlayerPool {
        use Position::*;
        let mut players = Vec::new();
        let teams = [("KC", "BUF"), ("BUF", "KC"), ("DAL", "PHI"), ("PHI", "DAL")];
        let positions = [QB, RB, RB, WR, WR, WR, TE, DST];
        for (team, opp) in teams {
            for pos in positions {
                players.push(nfl(players.len(), pos, team, opp));
            }
        }
        PlayerPool::new(players).unwrap()
    }

    #[test]
    fn test_built_matrix_is_well_formed_and_factored() {
        let pool = slate();
        let engine = CorrelationEngine::default();
        let build = engine.build(&pool, Sport::Nfl, &CorrelationContext::default());
        assert!(build.matrix.is_well_formed());
        assert!(!build.degraded_to_independent);
        let sampling = build.factor.sampling_matrix();
        let min_eig = sampling.symmetric_eigen().eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(min_eig >= -1e-9);
    }

    #[test]
    fn test_submatrix_and_mean_pairwise() {
        let pool = slate();
        let m = CorrelationEngine::default().matrix(&pool, Sport::Nfl, &CorrelationContext::default());
        // KC QB (0) and KC WR (3)
        let sub = m.submatrix(&[0, 3]);
        assert_eq!(sub.size(), 2);
        assert!((sub.get(0, 1) - 0.45).abs() < 1e-12);
        assert!((m.mean_pairwise(&[0, 3]) - 0.45).abs() < 1e-12);
        assert_eq!(m.mean_pairwise(&[0]), 0.0);
    }

    #[test]
    fn test_deep_receiver_room_is_repaired_not_dropped() {
        use Position::*;
        // six receivers sharing one quarterback overshoot what a PSD matrix allows
        let mut players = vec![nfl(0, QB, "KC", "BUF")];
        for i in 1..=6 {
            players.push(nfl(i, WR, "KC", "BUF"));
        }
        let pool = PlayerPool::new(players).unwrap();
        let build = CorrelationEngine::default().build(&pool, Sport::Nfl, &CorrelationContext::default());
        assert!(matches!(build.status(), DecompositionStatus::Repaired { .. }));
        assert!(!build.degraded_to_independent);
    }

    #[test]
    fn test_set_clamps_and_ignores_diagonal() {
        let mut m = CorrelationMatrix::identity(2);
        m.set(0, 1, 3.0);
        m.set(1, 1, 0.2);
        assert_eq!(m.get(1, 0), 1.0);
        assert_eq!(m.get(1, 1), 1.0);
        m.set(0, 1, f64::NAN);
        assert_eq!(m.get(0, 1), 0.0);
    }

    proptest! {
        #[test]
        fn prop_matrix_invariants_hold_for_any_pool(
            specs in prop::collection::vec((0usize..6, 0usize..4), 2..30),
            max_abs in 0.0f64..1.0,
            same_team in -2.0f64..2.0,
        ) {
            use Position::*;
            let positions = [QB, RB, WR, TE, K, DST];
            let teams = [("A", "B"), ("B", "A"), ("C", "D"), ("D", "C")];
            let players: Vec<Player> = specs
                .iter()
                .enumerate()
                .map(|(i, &(p, t))| nfl(i, positions[p], teams[t].0, teams[t].1))
                .collect();
            let pool = PlayerPool::new(players).unwrap();
            let mut rules = CorrelationRules::default();
            rules.max_abs = max_abs;
            rules.nfl.default_teammate = same_team;
            let build = CorrelationEngine::new(rules).build(&pool, Sport::Nfl, &CorrelationContext::default());
            prop_assert!(build.matrix.is_well_formed());
            if !build.degraded_to_independent {
                let eig = build.factor.sampling_matrix().symmetric_eigen().eigenvalues;
                prop_assert!(eig.iter().all(|&e| e >= -1e-7));
            }
        }
    }
}
