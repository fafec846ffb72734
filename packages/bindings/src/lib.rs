use napi::bindgen_prelude::AsyncTask;
use napi::{Env, Result as NapiResult, Task};
use napi_derive::napi;
use serde::de::DeserializeOwned;
use serde::Serialize;

use portfolio_analytics_core::black_litterman::engine::{self, BlackLittermanInput};
use portfolio_analytics_core::optimization::analysis::{
    self, FrontierInput, OptimizationInput, PortfolioAnalysisInput,
};
use portfolio_analytics_core::simulation::heston::{self, HestonInput};
use portfolio_analytics_core::simulation::monte_carlo::{self, MonteCarloInput};
use portfolio_analytics_core::stress_testing::replay::{self, StressTestInput};
use portfolio_analytics_core::{AnalyticsError, AnalyticsResult, ErrorResponse};

/// Convert an engine error into a napi::Error whose message is the JSON
/// error payload, so callers can `JSON.parse(err.message)`.
fn to_napi_error(e: AnalyticsError) -> napi::Error {
    let body = serde_json::to_string(&ErrorResponse::from(&e)).unwrap_or_else(|_| e.to_string());
    napi::Error::from_reason(body)
}

/// Parse a request, run `op` and serialise its output.
fn call<I, O>(input_json: &str, op: impl FnOnce(&I) -> AnalyticsResult<O>) -> NapiResult<String>
where
    I: DeserializeOwned,
    O: Serialize,
{
    let input: I = serde_json::from_str(input_json).map_err(|e| to_napi_error(e.into()))?;
    let output = op(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(|e| to_napi_error(e.into()))
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_portfolio(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &PortfolioAnalysisInput| analysis::analyze_portfolio(i))
}

#[napi]
pub fn optimize_portfolio(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &OptimizationInput| analysis::optimize_portfolio(i))
}

#[napi]
pub fn efficient_frontier(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &FrontierInput| analysis::efficient_frontier(i))
}

// ---------------------------------------------------------------------------
// Black-Litterman and stress testing
// ---------------------------------------------------------------------------

#[napi]
pub fn black_litterman(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &BlackLittermanInput| engine::run_black_litterman(i))
}

#[napi]
pub fn stress_test(input_json: String) -> NapiResult<String> {
    call(&input_json, |i: &StressTestInput| replay::run_stress_test(i))
}

// ---------------------------------------------------------------------------
// Simulations (off the JS thread)
// ---------------------------------------------------------------------------

pub struct MonteCarloTask {
    input_json: String,
}

impl Task for MonteCarloTask {
    type Output = String;
    type JsValue = String;

    fn compute(&mut self) -> NapiResult<Self::Output> {
        call(&self.input_json, |i: &MonteCarloInput| monte_carlo::run_monte_carlo(i))
    }

    fn resolve(&mut self, _env: Env, output: Self::Output) -> NapiResult<Self::JsValue> {
        Ok(output)
    }
}

pub struct HestonTask {
    input_json: String,
}

impl Task for HestonTask {
    type Output = String;
    type JsValue = String;

    fn compute(&mut self) -> NapiResult<Self::Output> {
        call(&self.input_json, |i: &HestonInput| heston::run_heston(i))
    }

    fn resolve(&mut self, _env: Env, output: Self::Output) -> NapiResult<Self::JsValue> {
        Ok(output)
    }
}

/// Resolves to the Monte Carlo output JSON.
#[napi]
pub fn monte_carlo_simulation(input_json: String) -> AsyncTask<MonteCarloTask> {
    AsyncTask::new(MonteCarloTask { input_json })
}

/// Resolves to the Heston output JSON.
#[napi]
pub fn heston_simulation(input_json: String) -> AsyncTask<HestonTask> {
    AsyncTask::new(HestonTask { input_json })
}

#[napi]
pub fn engine_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
