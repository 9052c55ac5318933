//! JSON boundary: request in, response out, `schema_version == 1`.
//!
//! Each operation has a typed entry point (`optimize`, `simulate`,
//! `build_correlation`) and a string wrapper for callers that only speak
//! JSON. String errors carry a stable code prefix, `CODE: message`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsTable;
use crate::budget::RunBudget;
use crate::config::EngineConfig;
use crate::correlation::{CorrelationContext, DecompositionStatus};
use crate::error::{DfsError, Result};
use crate::models::{assign_to_slots, Lineup, Platform, Player, PlayerPool, Sport};
use crate::optimizer::{ExposureConstraints, Infeasibility, OptimizeRequest};
use crate::scoring::Strategy;
use crate::simulation::{rank_by, ContestConfig, EventContext, RankMetric, SimulationRequest, SimulationResult};
use crate::slots::{self, SlotTemplate};

pub const SCHEMA_VERSION: u8 = 1;

pub mod error_codes {
    pub const INVALID_JSON: &str = "E_INVALID_JSON";
    pub const UNSUPPORTED_SCHEMA: &str = "E_UNSUPPORTED_SCHEMA";
    pub const INVALID_REQUEST: &str = "E_INVALID_REQUEST";
    pub const INTERNAL: &str = "E_INTERNAL";
}

fn err_code(code: &str, message: impl std::fmt::Display) -> String {
    format!("{code}: {message}")
}

fn to_wire_error(err: DfsError) -> String {
    if err.is_configuration() {
        err_code(error_codes::INVALID_REQUEST, err)
    } else {
        err_code(error_codes::INTERNAL, err)
    }
}

fn check_schema(version: u8) -> Result<()> {
    if version != SCHEMA_VERSION {
        return Err(DfsError::InvalidParameter(format!("Unsupported schema version: {}", version)));
    }
    Ok(())
}

fn default_count() -> usize {
    1
}

// ============================================================================
// Optimize
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeJsonRequest {
    pub schema_version: u8,
    pub sport: Sport,
    pub platform: Platform,
    pub players: Vec<Player>,
    /// Realized points by player id
    #[serde(default)]
    pub histories: HashMap<String, Vec<f64>>,
    /// Defaults to the platform cap
    #[serde(default)]
    pub salary_cap: Option<u32>,
    #[serde(default = "default_count")]
    pub num_lineups: usize,
    #[serde(default = "default_count")]
    pub min_different_players: usize,
    /// Defaults to the config's strategy
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub constraints: ExposureConstraints,
    #[serde(default)]
    pub correlation_context: CorrelationContext,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    /// Replaces the caller's engine config for this request
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub slot: String,
    pub id: String,
    pub name: String,
    pub position: String,
    pub team: String,
    pub salary: u32,
    pub projection: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupView {
    pub slots: Vec<SlotView>,
    pub total_salary: u32,
    pub projection: f64,
    pub score: f64,
}

impl LineupView {
    pub fn new(lineup: &Lineup, pool: &PlayerPool, template: &SlotTemplate) -> Self {
        let slots = lineup
            .assignments
            .iter()
            .map(|a| {
                let p = pool.get(a.player);
                SlotView {
                    slot: template.slots[a.slot].name.clone(),
                    id: p.id.clone(),
                    name: p.name.clone(),
                    position: p.position.code().to_string(),
                    team: p.team.clone(),
                    salary: p.salary,
                    projection: p.projection,
                }
            })
            .collect();
        Self { slots, total_salary: lineup.total_salary, projection: lineup.projection, score: lineup.score }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub schema_version: u8,
    pub lineups: Vec<LineupView>,
    pub requested: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub infeasible_slots: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infeasibility: Option<Infeasibility>,
    pub incomplete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_reason: Option<String>,
    /// Set when the correlation-weighted strategy needed a matrix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_to_independent: Option<bool>,
    pub nodes_explored: u64,
}

pub fn optimize(request: OptimizeJsonRequest, config: &EngineConfig) -> Result<OptimizeResponse> {
    check_schema(request.schema_version)?;
    let config = match request.config {
        Some(cfg) => cfg,
        None => config.clone(),
    };
    config.validate()?;

    let template = slots::resolve(request.sport, request.platform)?;
    let pool = PlayerPool::new(request.players)?;
    tracing::info!("Loaded pool of {} players for {:?}/{:?}", pool.len(), request.sport, request.platform);
    let analytics = AnalyticsTable::build(&pool, &request.histories, &config.analytics);

    let strategy = request.strategy.unwrap_or(config.strategy);
    let correlation = if strategy == Strategy::CorrelationWeighted {
        Some(config.correlation_engine().build(&pool, request.sport, &request.correlation_context))
    } else {
        None
    };
    let budget = RunBudget::from_deadline_ms(request.deadline_ms);

    let mut optimize = OptimizeRequest::new(&pool, &template, &analytics);
    optimize.salary_cap = request.salary_cap.unwrap_or(template.salary_cap);
    optimize.num_lineups = request.num_lineups;
    optimize.min_different_players = request.min_different_players;
    optimize.strategy = strategy;
    optimize.correlation = correlation.as_ref().map(|c| &c.matrix);
    optimize.constraints = request.constraints;
    optimize.budget = Some(&budget);

    let outcome = config.optimizer().optimize(&optimize)?;
    Ok(OptimizeResponse {
        schema_version: SCHEMA_VERSION,
        lineups: outcome.lineups.iter().map(|l| LineupView::new(l, &pool, &template)).collect(),
        requested: outcome.requested,
        shortfall: outcome.shortfall,
        infeasible_slots: outcome.infeasible_slots,
        infeasibility: outcome.infeasibility,
        incomplete: outcome.incomplete,
        incomplete_reason: outcome.incomplete_reason,
        degraded_to_independent: correlation.map(|c| c.degraded_to_independent),
        nodes_explored: outcome.nodes_explored,
    })
}

pub fn optimize_json(request_json: &str) -> std::result::Result<String, String> {
    optimize_json_with(request_json, &EngineConfig::default())
}

pub fn optimize_json_with(request_json: &str, config: &EngineConfig) -> std::result::Result<String, String> {
    let request: OptimizeJsonRequest = serde_json::from_str(request_json)
        .map_err(|e| err_code(error_codes::INVALID_JSON, format!("Invalid JSON request: {}", e)))?;
    if request.schema_version != SCHEMA_VERSION {
        return Err(err_code(
            error_codes::UNSUPPORTED_SCHEMA,
            format!("Unsupported schema version: {}", request.schema_version),
        ));
    }
    let response = optimize(request, config).map_err(to_wire_error)?;
    serde_json::to_string(&response).map_err(|e| err_code(error_codes::INTERNAL, e))
}

// ============================================================================
// Simulate
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SimulateJsonRequest {
    pub schema_version: u8,
    pub sport: Sport,
    pub platform: Platform,
    pub players: Vec<Player>,
    #[serde(default)]
    pub histories: HashMap<String, Vec<f64>>,
    /// Lineups as player ids; each must fill the platform template
    pub lineups: Vec<Vec<String>>,
    #[serde(default)]
    pub salary_cap: Option<u32>,
    #[serde(default)]
    pub iterations: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub target_score: Option<f64>,
    #[serde(default)]
    pub correlation_context: CorrelationContext,
    #[serde(default)]
    pub events: EventContext,
    #[serde(default)]
    pub contest: Option<ContestConfig>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
    #[serde(default)]
    pub rank_by: RankMetric,
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub schema_version: u8,
    /// One per requested lineup, in request order
    pub results: Vec<SimulationResult>,
    /// Indices into `results`, best first under `rank_by`
    pub ranking: Vec<usize>,
    pub incomplete: bool,
}

/// Resolve id lists into slot-assigned lineups.
fn place_lineups(ids: &[Vec<String>], pool: &PlayerPool, template: &SlotTemplate) -> Result<Vec<Lineup>> {
    ids.iter()
        .enumerate()
        .map(|(k, lineup)| {
            let players = lineup.iter().map(|id| pool.require(id)).collect::<Result<Vec<usize>>>()?;
            let assignments = assign_to_slots(&players, pool, template).ok_or_else(|| {
                DfsError::InvalidParameter(format!("lineup {} does not fill the {} slot template", k, template.len()))
            })?;
            let projection = players.iter().map(|&p| pool.get(p).projection).sum();
            Ok(Lineup::from_assignments(assignments, pool, projection))
        })
        .collect()
}

pub fn simulate(request: SimulateJsonRequest, config: &EngineConfig) -> Result<SimulateResponse> {
    check_schema(request.schema_version)?;
    let config = match request.config {
        Some(cfg) => cfg,
        None => config.clone(),
    };
    config.validate()?;

    let template = slots::resolve(request.sport, request.platform)?;
    let pool = PlayerPool::new(request.players)?;
    let analytics = AnalyticsTable::build(&pool, &request.histories, &config.analytics);
    let lineups = place_lineups(&request.lineups, &pool, &template)?;
    let budget = RunBudget::from_deadline_ms(request.deadline_ms);

    let mut simulate = SimulationRequest::new(&pool, &template, &analytics);
    simulate.histories = Some(&request.histories);
    simulate.correlation = request.correlation_context;
    simulate.events = request.events;
    simulate.contest = request.contest.as_ref();
    simulate.salary_cap = request.salary_cap.unwrap_or(template.salary_cap);
    simulate.iterations = request.iterations;
    simulate.seed = request.seed;
    simulate.target_score = request.target_score;
    simulate.budget = Some(&budget);

    let results = config.simulator().simulate_many(&simulate, &lineups)?;
    let ranking = rank_by(&results, request.rank_by);
    let incomplete = results.iter().any(|r| r.incomplete);
    Ok(SimulateResponse { schema_version: SCHEMA_VERSION, results, ranking, incomplete })
}

pub fn simulate_json(request_json: &str) -> std::result::Result<String, String> {
    simulate_json_with(request_json, &EngineConfig::default())
}

pub fn simulate_json_with(request_json: &str, config: &EngineConfig) -> std::result::Result<String, String> {
    let request: SimulateJsonRequest = serde_json::from_str(request_json)
        .map_err(|e| err_code(error_codes::INVALID_JSON, format!("Invalid JSON request: {}", e)))?;
    if request.schema_version != SCHEMA_VERSION {
        return Err(err_code(
            error_codes::UNSUPPORTED_SCHEMA,
            format!("Unsupported schema version: {}", request.schema_version),
        ));
    }
    let response = simulate(request, config).map_err(to_wire_error)?;
    serde_json::to_string(&response).map_err(|e| err_code(error_codes::INTERNAL, e))
}

// ============================================================================
// Build correlation
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationJsonRequest {
    pub schema_version: u8,
    pub sport: Sport,
    pub players: Vec<Player>,
    #[serde(default)]
    pub context: CorrelationContext,
    #[serde(default)]
    pub config: Option<EngineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResponse {
    pub schema_version: u8,
    /// Row/column order of `matrix`
    pub player_ids: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub status: DecompositionStatus,
    pub degraded_to_independent: bool,
}

pub fn build_correlation(request: CorrelationJsonRequest, config: &EngineConfig) -> Result<CorrelationResponse> {
    check_schema(request.schema_version)?;
    let config = match request.config {
        Some(cfg) => cfg,
        None => config.clone(),
    };
    config.validate()?;

    let pool = PlayerPool::new(request.players)?;
    let build = config.correlation_engine().build(&pool, request.sport, &request.context);
    let n = build.matrix.size();
    Ok(CorrelationResponse {
        schema_version: SCHEMA_VERSION,
        player_ids: pool.players().iter().map(|p| p.id.clone()).collect(),
        matrix: (0..n).map(|i| build.matrix.row(i).to_vec()).collect(),
        status: build.status(),
        degraded_to_independent: build.degraded_to_independent,
    })
}

pub fn build_correlation_json(request_json: &str) -> std::result::Result<String, String> {
    build_correlation_json_with(request_json, &EngineConfig::default())
}

pub fn build_correlation_json_with(request_json: &str, config: &EngineConfig) -> std::result::Result<String, String> {
    let request: CorrelationJsonRequest = serde_json::from_str(request_json)
        .map_err(|e| err_code(error_codes::INVALID_JSON, format!("Invalid JSON request: {}", e)))?;
    if request.schema_version != SCHEMA_VERSION {
        return Err(err_code(
            error_codes::UNSUPPORTED_SCHEMA,
            format!("Unsupported schema version: {}", request.schema_version),
        ));
    }
    let response = build_correlation(request, config).map_err(to_wire_error)?;
    serde_json::to_string(&response).map_err(|e| err_code(error_codes::INTERNAL, e))
}
