#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use portfolio_analytics_core::market_data::{MarketData, PricePoint, PriceSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SEED: u64 = 42;

/// About two years of trading days.
pub const TWO_YEARS: usize = 504;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

/// Weekday calendar starting at `start_date()`.
pub fn trading_dates(n: usize) -> Vec<NaiveDate> {
    start_date()
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

/// Multiplicative random walk with uniform shocks of half-width `vol`.
pub fn random_walk(ticker: &str, seed: u64, n: usize, start: f64, drift: f64, vol: f64) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut p = start;
    let points = trading_dates(n)
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            if i > 0 {
                let shock: f64 = rng.gen_range(-1.0..1.0);
                p *= 1.0 + drift + vol * shock;
            }
            PricePoint { date, price: p }
        })
        .collect();
    PriceSeries::new(ticker, points)
}

pub fn flat(ticker: &str, n: usize, price: f64) -> PriceSeries {
    PriceSeries::new(
        ticker,
        trading_dates(n)
            .into_iter()
            .map(|date| PricePoint { date, price })
            .collect(),
    )
}

/// Four independent equities plus the SPY and XLK benchmarks.
pub fn universe() -> MarketData {
    MarketData::new(vec![
        random_walk("AAPL", 1, TWO_YEARS, 150.0, 0.0006, 0.030),
        random_walk("MSFT", 2, TWO_YEARS, 300.0, 0.0005, 0.025),
        random_walk("JNJ", 3, TWO_YEARS, 160.0, 0.0002, 0.015),
        random_walk("XOM", 4, TWO_YEARS, 60.0, 0.0004, 0.035),
        random_walk("SPY", 5, TWO_YEARS, 450.0, 0.0003, 0.018),
        random_walk("XLK", 6, TWO_YEARS, 140.0, 0.0004, 0.022),
    ])
}

pub fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
