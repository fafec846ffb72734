//! Cash dividends folded into daily returns, and trailing yield estimates.

use chrono::NaiveDate;

use crate::market_data::{DividendEvent, MarketData, PriceMatrix};

/// Days in a calendar year, used to turn a payment cadence into a frequency.
const DAYS_PER_YEAR: f64 = 365.0;

/// Add `amount / price` to the return of the first trading date on or after
/// each ex-date. `returns[k]` covers `dates[k] → dates[k + 1]`, so a
/// dividend going ex on `dates[j]` lands in `returns[j - 1]`. Events on or
/// before the first date, or after the last, fall outside every return
/// interval and are ignored. Returns how many events were applied.
pub fn apply_dividends(
    returns: &mut [f64],
    dates: &[NaiveDate],
    prices: &[f64],
    events: &[DividendEvent],
) -> usize {
    let mut applied = 0;
    for ev in events {
        let Some(j) = dates.iter().position(|d| *d >= ev.date) else {
            continue;
        };
        if j == 0 || j > returns.len() || prices[j] <= 0.0 {
            continue;
        }
        returns[j - 1] += ev.amount / prices[j];
        applied += 1;
    }
    applied
}

/// Forward annual yield from the payments inside `[start, end]`.
///
/// With several payments the frequency is inferred from the mean gap
/// between them and applied to the latest amount. A single payment is
/// treated as the whole year's distribution.
pub fn annual_dividend_yield(
    events: &[DividendEvent],
    start: NaiveDate,
    end: NaiveDate,
    latest_price: f64,
) -> f64 {
    if latest_price <= 0.0 {
        return 0.0;
    }
    let mut window: Vec<&DividendEvent> = events
        .iter()
        .filter(|e| e.date >= start && e.date <= end && e.amount > 0.0)
        .collect();
    window.sort_by_key(|e| e.date);

    let annual = match window.as_slice() {
        [] => 0.0,
        [only] => only.amount,
        [first, .., last] => {
            let gaps = (window.len() - 1) as f64;
            let mean_gap = (last.date - first.date).num_days() as f64 / gaps;
            if mean_gap > 0.0 {
                last.amount * DAYS_PER_YEAR / mean_gap
            } else {
                window.iter().map(|e| e.amount).sum()
            }
        }
    };
    annual / latest_price
}

/// Total-return rows for every ticker of `prices`: `base` plus dividends.
/// Also returns the number of events applied.
pub fn total_returns(
    prices: &PriceMatrix,
    base: &[Vec<f64>],
    market_data: &MarketData,
) -> (Vec<Vec<f64>>, usize) {
    let mut applied = 0;
    let rows = prices
        .tickers
        .iter()
        .zip(&prices.prices)
        .zip(base)
        .map(|((ticker, row), returns)| {
            let mut r = returns.clone();
            applied += apply_dividends(&mut r, &prices.dates, row, market_data.dividends_for(ticker));
            r
        })
        .collect();
    (rows, applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_dividend_lands_on_next_trading_day() {
        // 2024-01-06 is a Saturday; the next trading date is the 8th.
        let dates = vec![d(2024, 1, 4), d(2024, 1, 5), d(2024, 1, 8), d(2024, 1, 9)];
        let prices = vec![100.0, 100.0, 50.0, 50.0];
        let mut r = vec![0.0, 0.0, 0.0];
        let events = [DividendEvent {
            date: d(2024, 1, 6),
            amount: 1.0,
        }];
        assert_eq!(apply_dividends(&mut r, &dates, &prices, &events), 1);
        assert_eq!(r, vec![0.0, 0.02, 0.0]);
    }

    #[test]
    fn test_dividend_outside_window_ignored() {
        let dates = vec![d(2024, 1, 4), d(2024, 1, 5)];
        let mut r = vec![0.0];
        let events = [
            DividendEvent {
                date: d(2023, 12, 1),
                amount: 1.0,
            },
            DividendEvent {
                date: d(2024, 2, 1),
                amount: 1.0,
            },
        ];
        assert_eq!(apply_dividends(&mut r, &dates, &[10.0, 10.0], &events), 0);
        assert_eq!(r, vec![0.0]);
    }

    #[test]
    fn test_quarterly_yield() {
        let events: Vec<DividendEvent> = [(2023, 2, 10), (2023, 5, 12), (2023, 8, 11), (2023, 11, 10)]
            .iter()
            .map(|(y, m, day)| DividendEvent {
                date: d(*y, *m, *day),
                amount: 0.5,
            })
            .collect();
        let y = annual_dividend_yield(&events, d(2023, 1, 1), d(2023, 12, 31), 100.0);
        // Mean gap 91 days → ~4.01 payments a year.
        assert!((y - 0.5 * 365.0 / 91.0 / 100.0).abs() < 1e-12, "yield {y}");
    }

    #[test]
    fn test_single_payment_yield() {
        let events = [DividendEvent {
            date: d(2023, 6, 1),
            amount: 2.0,
        }];
        let y = annual_dividend_yield(&events, d(2023, 1, 1), d(2023, 12, 31), 50.0);
        assert_eq!(y, 0.04);
        assert_eq!(annual_dividend_yield(&[], d(2023, 1, 1), d(2023, 12, 31), 50.0), 0.0);
    }
}
