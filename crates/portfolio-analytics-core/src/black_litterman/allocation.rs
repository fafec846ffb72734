//! Turning blended weights into an order ticket and a readable summary.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::types::{Money, Sector};
use crate::AnalyticsResult;

/// Difference from the market weight that counts as a deliberate tilt.
pub const TILT_THRESHOLD: f64 = 0.02;

/// Portfolio yield above which the dividend contribution is called out.
pub const DIVIDEND_INSIGHT_THRESHOLD: f64 = 0.01;

/// Per-asset inputs to the allocation summary, in universe order.
#[derive(Debug, Clone)]
pub struct AssetAllocationInput<'a> {
    pub ticker: &'a str,
    pub name: Option<&'a str>,
    pub sector: Option<Sector>,
    pub final_weight: f64,
    pub market_cap_weight: f64,
    pub latest_price: f64,
    pub expected_return: f64,
    pub equilibrium_return: f64,
    pub dividend_yield: f64,
    pub risk_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRow {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<Sector>,
    pub final_weight: f64,
    pub market_cap_weight: f64,
    pub investment_amount: Money,
    pub shares_to_buy: Decimal,
    pub latest_price: f64,
    pub expected_return: f64,
    pub dividend_yield: f64,
    pub risk_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub ticker: String,
    pub market_implied_return: f64,
    pub posterior_return: f64,
    pub view_vs_market: f64,
    pub portfolio_weight: f64,
    pub market_cap_weight: f64,
    pub weight_vs_market: f64,
    pub dividend_yield: f64,
    /// Posterior return less the dividend yield.
    pub expected_price_return: f64,
}

/// Rows sorted by final weight, largest first. Amounts are rounded to
/// cents; share counts are truncated to four decimals so the order never
/// exceeds the budget.
pub fn allocation_summary(assets: &[AssetAllocationInput<'_>], portfolio_value: f64) -> AnalyticsResult<Vec<AllocationRow>> {
    let budget = to_decimal(portfolio_value, "portfolio_value")?;
    let mut rows = assets
        .iter()
        .map(|a| {
            let weight = to_decimal(a.final_weight, a.ticker)?;
            let price = to_decimal(a.latest_price, a.ticker)?;
            let investment = (budget * weight).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            let shares = if price > Decimal::ZERO {
                (investment / price).round_dp_with_strategy(4, RoundingStrategy::ToZero)
            } else {
                Decimal::ZERO
            };
            Ok(AllocationRow {
                ticker: a.ticker.to_string(),
                name: a.name.map(str::to_string),
                sector: a.sector,
                final_weight: a.final_weight,
                market_cap_weight: a.market_cap_weight,
                investment_amount: investment,
                shares_to_buy: shares,
                latest_price: a.latest_price,
                expected_return: a.expected_return,
                dividend_yield: a.dividend_yield,
                risk_contribution: a.risk_contribution,
            })
        })
        .collect::<AnalyticsResult<Vec<_>>>()?;
    rows.sort_by(|a, b| b.final_weight.total_cmp(&a.final_weight));
    Ok(rows)
}

pub fn comparison_table(assets: &[AssetAllocationInput<'_>]) -> Vec<ComparisonRow> {
    assets
        .iter()
        .map(|a| ComparisonRow {
            ticker: a.ticker.to_string(),
            market_implied_return: a.equilibrium_return,
            posterior_return: a.expected_return,
            view_vs_market: a.expected_return - a.equilibrium_return,
            portfolio_weight: a.final_weight,
            market_cap_weight: a.market_cap_weight,
            weight_vs_market: a.final_weight - a.market_cap_weight,
            dividend_yield: a.dividend_yield,
            expected_price_return: a.expected_return - a.dividend_yield,
        })
        .collect()
}

/// Plain-language observations about a summary sorted by weight.
pub fn key_insights(rows: &[AllocationRow], portfolio_dividend_yield: f64) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(top) = rows.first() {
        out.push(format!(
            "Largest position: {} ({:.1}%)",
            top.ticker,
            top.final_weight * 100.0
        ));
    }

    let over: Vec<&str> = rows
        .iter()
        .filter(|r| r.final_weight - r.market_cap_weight > TILT_THRESHOLD)
        .map(|r| r.ticker.as_str())
        .collect();
    if !over.is_empty() {
        out.push(format!("Overweight vs market: {}", over.join(", ")));
    }
    let under: Vec<&str> = rows
        .iter()
        .filter(|r| r.market_cap_weight - r.final_weight > TILT_THRESHOLD)
        .map(|r| r.ticker.as_str())
        .collect();
    if !under.is_empty() {
        out.push(format!("Underweight vs market: {}", under.join(", ")));
    }

    if portfolio_dividend_yield > DIVIDEND_INSIGHT_THRESHOLD {
        out.push(format!(
            "Dividend-paying stocks contribute {:.1}% to portfolio yield",
            portfolio_dividend_yield * 100.0
        ));
    }
    out
}

/// Sum of invested amounts, for reconciling against the budget.
pub fn total_invested(rows: &[AllocationRow]) -> Money {
    rows.iter().map(|r| r.investment_amount).sum::<Decimal>()
}

/// Uninvested cash after rounding, never negative.
pub fn residual_cash(rows: &[AllocationRow], portfolio_value: f64) -> AnalyticsResult<Money> {
    let budget = to_decimal(portfolio_value, "portfolio_value")?;
    Ok((budget - total_invested(rows)).max(dec!(0)))
}

fn to_decimal(x: f64, field: &str) -> AnalyticsResult<Decimal> {
    Decimal::from_f64(x).ok_or_else(|| {
        AnalyticsError::Numerical(format!("{field}: {x} cannot be represented as a decimal amount"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn asset<'a>(ticker: &'a str, w: f64, mkt: f64, price: f64, dy: f64) -> AssetAllocationInput<'a> {
        AssetAllocationInput {
            ticker,
            name: None,
            sector: None,
            final_weight: w,
            market_cap_weight: mkt,
            latest_price: price,
            expected_return: 0.08,
            equilibrium_return: 0.07,
            dividend_yield: dy,
            risk_contribution: w,
        }
    }

    #[test]
    fn test_allocation_sorted_and_rounded() {
        let assets = [asset("AAA", 0.25, 0.5, 33.0, 0.0), asset("BBB", 0.75, 0.5, 7.0, 0.0)];
        let rows = allocation_summary(&assets, 100_000.0).unwrap();
        assert_eq!(rows[0].ticker, "BBB");
        assert_eq!(rows[0].investment_amount, dec!(75000.00));
        assert_eq!(rows[1].investment_amount, dec!(25000.00));
        // 25000 / 33 = 757.5757...
        assert_eq!(rows[1].shares_to_buy, dec!(757.5757));
        assert_eq!(total_invested(&rows), dec!(100000.00));
        assert_eq!(residual_cash(&rows, 100_000.0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_residual_cash_after_rounding() {
        // 1/3 of 100 rounds to 33.33 three times
        let third = 1.0 / 3.0;
        let assets = [
            asset("AAA", third, third, 10.0, 0.0),
            asset("BBB", third, third, 10.0, 0.0),
            asset("CCC", third, third, 10.0, 0.0),
        ];
        let rows = allocation_summary(&assets, 100.0).unwrap();
        assert_eq!(total_invested(&rows), dec!(99.99));
        assert_eq!(residual_cash(&rows, 100.0).unwrap(), dec!(0.01));
    }

    #[test]
    fn test_insights_tilts() {
        let assets = [
            asset("AAA", 0.60, 0.40, 10.0, 0.03),
            asset("BBB", 0.39, 0.40, 10.0, 0.0),
            asset("CCC", 0.01, 0.20, 10.0, 0.0),
        ];
        let rows = allocation_summary(&assets, 10_000.0).unwrap();
        let insights = key_insights(&rows, 0.018);
        assert_eq!(
            insights,
            vec![
                "Largest position: AAA (60.0%)".to_string(),
                "Overweight vs market: AAA".to_string(),
                "Underweight vs market: CCC".to_string(),
                "Dividend-paying stocks contribute 1.8% to portfolio yield".to_string(),
            ]
        );
    }

    #[test]
    fn test_comparison_differences() {
        let rows = comparison_table(&[asset("AAA", 0.3, 0.2, 10.0, 0.01)]);
        assert!((rows[0].view_vs_market - 0.01).abs() < 1e-12);
        assert!((rows[0].weight_vs_market - 0.1).abs() < 1e-12);
        assert!((rows[0].expected_price_return - 0.07).abs() < 1e-12);
    }
}
