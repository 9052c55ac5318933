//! # dfs_core - Daily Fantasy Lineup Optimizer and Outcome Simulator
//!
//! Builds salary-capped, position-valid lineups for daily fantasy contests
//! and estimates how each lineup scores with correlated Monte Carlo trials.
//!
//! ## Features
//! - Exact branch-and-bound lineup search with diversity, exposure and lock rules
//! - Six scoring strategies, including correlation-weighted stacking
//! - Rule-based correlation matrices with Cholesky repair
//! - Per-position outcome distributions, injury/weather/blowout events
//! - Contest fields and payout tables for ROI estimates
//! - Same seed, same result, for any worker count
//! - JSON API for service and CLI integration

// Struct initialization pattern used intentionally
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod analytics;
pub mod api;
pub mod budget;
pub mod config;
pub mod correlation;
pub mod distribution;
pub mod error;
pub mod models;
pub mod optimizer;
pub mod scoring;
pub mod simulation;
pub mod slots;

// Re-export main API functions
pub use api::{build_correlation_json, optimize_json, simulate_json, SCHEMA_VERSION};
pub use error::{DfsError, Result};

pub use analytics::{AnalyticsConfig, AnalyticsTable, PlayerAnalytics};
pub use budget::RunBudget;
pub use config::EngineConfig;
pub use correlation::{CorrelationBuild, CorrelationContext, CorrelationEngine, CorrelationMatrix};
pub use distribution::{DistributionEngine, MarginalDistribution};
pub use models::{InjuryStatus, Lineup, Platform, Player, PlayerPool, Position, Sport};
pub use optimizer::{LineupOptimizer, OptimizeOutcome, OptimizeRequest};
pub use scoring::Strategy;
pub use simulation::{ContestConfig, MonteCarloEngine, RankMetric, SimulationRequest, SimulationResult};
pub use slots::SlotTemplate;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    fn nfl_player(id: &str, position: Position, team: &str, opp: &str, salary: u32, projection: f64) -> Player {
        Player {
            id: id.to_string(),
            name: id.to_string(),
            sport: Sport::Nfl,
            position,
            team: team.to_string(),
            opponent: opp.to_string(),
            salary,
            projection,
            floor: 0.0,
            ceiling: 0.0,
            volatility: 0.0,
            value_rating: 0.0,
            ownership: Some(0.1),
            injury_status: InjuryStatus::Healthy,
            tee_time: None,
            weather_exposure: None,
        }
    }

    fn slate() -> Vec<Player> {
        use Position::*;
        let mut players = Vec::new();
        for (team, opp) in [("KC", "BUF"), ("BUF", "KC"), ("DAL", "PHI"), ("PHI", "DAL")] {
            let bump = team.len() as f64 + team.as_bytes()[0] as f64 / 100.0;
            players.push(nfl_player(&format!("{}-QB", team), QB, team, opp, 7000, 19.0 + bump));
            for k in 0..3 {
                players.push(nfl_player(&format!("{}-RB{}", team, k), RB, team, opp, 5000 + k * 800, 10.0 + k as f64 * 2.5));
                players.push(nfl_player(&format!("{}-WR{}", team, k), WR, team, opp, 4500 + k * 1000, 9.0 + k as f64 * 3.0));
            }
            players.push(nfl_player(&format!("{}-TE", team), TE, team, opp, 4000, 8.5));
            players.push(nfl_player(&format!("{}-DST", team), DST, team, opp, 3000, 7.0));
        }
        players
    }

    #[test]
    fn test_optimize_then_simulate() {
        let config = EngineConfig::deterministic();
        let pool = PlayerPool::new(slate()).unwrap();
        let template = slots::resolve(Sport::Nfl, Platform::DraftKings).unwrap();
        let analytics = AnalyticsTable::from_pool(&pool, &config.analytics);

        let mut request = OptimizeRequest::new(&pool, &template, &analytics);
        request.num_lineups = 3;
        request.min_different_players = 2;
        let outcome = config.optimizer().optimize(&request).unwrap();
        assert_eq!(outcome.lineups.len(), 3);
        for lineup in &outcome.lineups {
            assert!(lineup.validate(&pool, &template, template.salary_cap).is_ok());
        }

        let mut sim = SimulationRequest::new(&pool, &template, &analytics);
        sim.iterations = Some(1_000);
        let results = config.simulator().simulate_many(&sim, &outcome.lineups).unwrap();
        assert_eq!(results.len(), 3);
        for (result, lineup) in results.iter().zip(&outcome.lineups) {
            assert_eq!(result.iterations_completed, 1_000);
            assert!(result.min <= result.mean && result.mean <= result.max);
            assert!((result.projection - lineup.projection).abs() < 1e-9);
        }
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(SCHEMA_VERSION, 1);
    }
}
