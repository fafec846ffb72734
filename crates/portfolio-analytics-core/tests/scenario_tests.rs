mod common;

use common::*;
use portfolio_analytics_core::analytics::returns::ReturnKind;
use portfolio_analytics_core::analytics::statistics::sample_standard_deviation;
use portfolio_analytics_core::market_data::MarketData;
use portfolio_analytics_core::optimization::analysis::{analyze_portfolio, PortfolioAnalysisInput};
use portfolio_analytics_core::simulation::heston::{run_heston, CalibrationMethod, HestonInput, HestonParameters};
use portfolio_analytics_core::simulation::monte_carlo::{run_monte_carlo, MonteCarloInput};
use portfolio_analytics_core::config::WeightBounds;
use portfolio_analytics_core::{EngineConfig, Holding, PortfolioDefinition};

fn seeded() -> EngineConfig {
    EngineConfig {
        seed: Some(SEED),
        ..EngineConfig::default()
    }
}

fn holding(ticker: &str, weight: f64) -> Holding {
    Holding {
        ticker: ticker.into(),
        weight,
        sector: None,
        name: None,
        market_cap: None,
    }
}

// ---------------------------------------------------------------------------
// Scenario A: two assets, equal weights, two years of prices
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_a_sharpe_identity() {
    let input = PortfolioAnalysisInput {
        portfolio: PortfolioDefinition {
            stocks: vec![holding("AAPL", 0.5), holding("MSFT", 0.5)],
            initial_value: 10_000.0,
            risk_free_rate: Some(0.02),
        },
        market_data: universe(),
        start_date: None,
        end_date: None,
        config: seeded(),
    };
    let out = analyze_portfolio(&input).unwrap();
    let current = &out.result.current_portfolio;

    assert!(current.volatility > 0.0);
    let expected = (current.expected_return - 0.02) / current.volatility;
    assert!(
        (current.sharpe - expected).abs() < 1e-12,
        "sharpe {} vs {}",
        current.sharpe,
        expected
    );
    for v in [
        current.expected_return,
        current.volatility,
        current.sharpe,
        current.sortino,
        current.max_drawdown,
        current.risk_index,
    ] {
        assert!(v.is_finite());
    }
    // Two assets cannot satisfy a 30% cap; the bounds are relaxed.
    assert!(out.warnings.iter().any(|w| w.contains("relaxed")));
}

#[test]
fn test_analysis_skips_benchmark_without_history() {
    let market_data = MarketData::new(vec![
        random_walk("AAPL", 1, TWO_YEARS, 150.0, 0.0006, 0.030),
        random_walk("MSFT", 2, TWO_YEARS, 300.0, 0.0005, 0.025),
        random_walk("SPY", 5, 1, 450.0, 0.0003, 0.018),
    ]);
    let input = PortfolioAnalysisInput {
        portfolio: PortfolioDefinition {
            stocks: vec![holding("AAPL", 0.5), holding("MSFT", 0.5)],
            initial_value: 10_000.0,
            risk_free_rate: Some(0.02),
        },
        market_data,
        start_date: None,
        end_date: None,
        config: seeded(),
    };
    let out = analyze_portfolio(&input).unwrap();

    assert!(out.result.benchmark_results.is_empty());
    assert!(
        out.warnings.iter().any(|w| w.starts_with("Benchmark SPY skipped")),
        "{:?}",
        out.warnings
    );
    assert!(out.result.current_portfolio.volatility > 0.0);
}

#[test]
fn test_analysis_reports_repaired_frontier_samples() {
    let mut config = seeded();
    config.weight_bounds = WeightBounds::new(0.20, 0.30).unwrap();
    let input = PortfolioAnalysisInput {
        portfolio: PortfolioDefinition {
            stocks: ["AAPL", "MSFT", "JNJ", "XOM"]
                .into_iter()
                .map(|t| holding(t, 0.25))
                .collect(),
            initial_value: 10_000.0,
            risk_free_rate: None,
        },
        market_data: universe(),
        start_date: None,
        end_date: None,
        config,
    };
    let out = analyze_portfolio(&input).unwrap();

    // Clipping to [0.20, 0.30] almost always breaks the sum, so renormalized
    // draws leave the box and get projected.
    assert!(
        out.warnings
            .iter()
            .any(|w| w.contains("frontier samples left their bounds")),
        "{:?}",
        out.warnings
    );
    assert_eq!(out.result.bounds_used, WeightBounds::new(0.20, 0.30).unwrap());
}

// ---------------------------------------------------------------------------
// Scenario B: zero drift, zero volatility Monte Carlo
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_b_flat_paths() {
    let input = MonteCarloInput {
        tickers: tickers(&["CASH"]),
        weights: vec![1.0],
        market_data: MarketData::new(vec![flat("CASH", 300, 25.0)]),
        start_date: None,
        end_date: None,
        initial_value: 50_000.0,
        n_simulations: 10_000,
        n_days: 252,
        benchmark: None,
        config: seeded(),
    };
    let out = run_monte_carlo(&input).unwrap().result;

    assert_eq!(out.final_distribution.len(), 10_000);
    assert!(out.final_distribution.iter().all(|v| *v == 50_000.0));
    assert!(out.mean_path.iter().all(|v| *v == 50_000.0));
    assert!(out.percentiles.p10.iter().all(|v| *v == 50_000.0));
    assert_eq!(out.probability_of_loss, 0.0);
    assert_eq!(out.var_5, 50_000.0);
}

// ---------------------------------------------------------------------------
// Scenario C: single asset holds its own volatility
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_c_single_asset_volatility() {
    let data = universe();
    let input = PortfolioAnalysisInput {
        portfolio: PortfolioDefinition {
            stocks: vec![holding("JNJ", 1.0)],
            initial_value: 10_000.0,
            risk_free_rate: None,
        },
        market_data: data.clone(),
        start_date: None,
        end_date: None,
        config: seeded(),
    };
    let out = analyze_portfolio(&input).unwrap().result;

    let returns = data
        .align(&tickers(&["JNJ"]), None, None)
        .unwrap()
        .returns(ReturnKind::Simple)
        .unwrap();
    let own = sample_standard_deviation(returns.row(0)) * 252.0_f64.sqrt();
    assert_eq!(out.current_portfolio.volatility, own);
}

// ---------------------------------------------------------------------------
// Scenario D: Heston tail average never beats the threshold
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_d_cvar_not_better_than_var() {
    let data = universe();
    for (seed, calibration) in [(1_u64, CalibrationMethod::MethodOfMoments), (7, CalibrationMethod::Fixed)] {
        let input = HestonInput {
            tickers: tickers(&["AAPL", "XOM"]),
            weights: vec![0.6, 0.4],
            market_data: data.clone(),
            start_date: None,
            end_date: None,
            initial_value: 100_000.0,
            n_paths: 2_000,
            n_days: 126,
            confidence_level: 0.90,
            parameters: HestonParameters::default(),
            calibration,
            realized_window: 21,
            include_paths: false,
            max_paths_returned: 100,
            config: EngineConfig {
                seed: Some(seed),
                ..EngineConfig::default()
            },
        };
        let out = run_heston(&input).unwrap().result;
        assert!(out.cvar_value <= out.var_value, "{calibration:?}");
        assert!(out.cvar_dollar >= out.var_dollar, "{calibration:?}");
        assert!(out.lower_bound <= out.upper_bound);
    }
}
