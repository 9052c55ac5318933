//! External entry points: typed functions and their JSON string wrappers.

pub mod json_api;

pub use json_api::{
    build_correlation, build_correlation_json, build_correlation_json_with, optimize, optimize_json,
    optimize_json_with, simulate, simulate_json, simulate_json_with, CorrelationJsonRequest,
    CorrelationResponse, LineupView, OptimizeJsonRequest, OptimizeResponse, SimulateJsonRequest,
    SimulateResponse, SlotView, SCHEMA_VERSION,
};
