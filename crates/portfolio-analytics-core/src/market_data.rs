//! Price series supplied by the external market-data provider, and their
//! alignment onto a common trading calendar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::analytics::returns::{self, ReturnKind, ReturnsMatrix};
use crate::error::AnalyticsError;
use crate::AnalyticsResult;

/// One adjusted close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    #[serde(alias = "adjClose", alias = "adj_close", alias = "close")]
    pub price: f64,
}

/// Ticker plus its adjusted closes in ascending date order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<PricePoint>,
}

/// A cash dividend keyed by its ex-date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

impl PriceSeries {
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Self {
        PriceSeries {
            ticker: ticker.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Dates must be strictly increasing and every price finite and positive.
    pub fn validate(&self) -> AnalyticsResult<()> {
        for (i, p) in self.points.iter().enumerate() {
            if !(p.price.is_finite() && p.price > 0.0) {
                return Err(AnalyticsError::Data(format!(
                    "{}: non-positive price {} on {}",
                    self.ticker, p.price, p.date
                )));
            }
            if i > 0 && self.points[i - 1].date >= p.date {
                return Err(AnalyticsError::Data(format!(
                    "{}: dates not strictly ascending at {}",
                    self.ticker, p.date
                )));
            }
        }
        Ok(())
    }

    /// Points falling inside `[start, end]` (either side open when `None`).
    pub fn window(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceSeries {
        let points = self
            .points
            .iter()
            .filter(|p| start.is_none_or(|s| p.date >= s) && end.is_none_or(|e| p.date <= e))
            .copied()
            .collect();
        PriceSeries {
            ticker: self.ticker.clone(),
            points,
        }
    }
}

/// Everything the external data layer fetched for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    pub series: Vec<PriceSeries>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dividends: BTreeMap<String, Vec<DividendEvent>>,
}

impl MarketData {
    pub fn new(series: Vec<PriceSeries>) -> Self {
        MarketData {
            series,
            dividends: BTreeMap::new(),
        }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.series.iter().any(|s| s.ticker == ticker)
    }

    pub fn get(&self, ticker: &str) -> AnalyticsResult<&PriceSeries> {
        self.series
            .iter()
            .find(|s| s.ticker == ticker)
            .ok_or_else(|| AnalyticsError::UnknownTicker(ticker.to_string()))
    }

    pub fn dividends_for(&self, ticker: &str) -> &[DividendEvent] {
        self.dividends.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Restrict the named series to the window and keep only the dates
    /// every one of them traded on.
    pub fn align(
        &self,
        tickers: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> AnalyticsResult<PriceMatrix> {
        if tickers.is_empty() {
            return Err(AnalyticsError::validation(
                "tickers",
                "At least one ticker is required",
            ));
        }

        let mut windows = Vec::with_capacity(tickers.len());
        for t in tickers {
            let series = self.get(t)?;
            series.validate()?;
            let w = series.window(start, end);
            if w.len() < 2 {
                return Err(AnalyticsError::InsufficientHistory {
                    ticker: t.clone(),
                    observations: w.len(),
                    required: 2,
                });
            }
            windows.push(w);
        }

        let mut common: BTreeSet<NaiveDate> = windows[0].points.iter().map(|p| p.date).collect();
        for w in &windows[1..] {
            let dates: BTreeSet<NaiveDate> = w.points.iter().map(|p| p.date).collect();
            common = common.intersection(&dates).copied().collect();
        }
        if common.len() < 2 {
            return Err(AnalyticsError::Data(format!(
                "Only {} common trading days across {}",
                common.len(),
                tickers.join(", ")
            )));
        }

        let dates: Vec<NaiveDate> = common.into_iter().collect();
        let prices = windows
            .iter()
            .map(|w| {
                let by_date: BTreeMap<NaiveDate, f64> =
                    w.points.iter().map(|p| (p.date, p.price)).collect();
                dates.iter().map(|d| by_date[d]).collect()
            })
            .collect();

        Ok(PriceMatrix {
            tickers: tickers.to_vec(),
            dates,
            prices,
        })
    }
}

/// Prices of several assets on a shared calendar. Row `i` belongs to `tickers[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceMatrix {
    pub tickers: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub prices: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn n_assets(&self) -> usize {
        self.tickers.len()
    }

    pub fn n_observations(&self) -> usize {
        self.dates.len()
    }

    pub fn latest_prices(&self) -> Vec<f64> {
        self.prices
            .iter()
            .map(|row| row.last().copied().unwrap_or(0.0))
            .collect()
    }

    pub fn returns(&self, kind: ReturnKind) -> AnalyticsResult<ReturnsMatrix> {
        let rows = self
            .prices
            .iter()
            .zip(&self.tickers)
            .map(|(row, t)| {
                returns::compute(row, kind).map_err(|e| match e {
                    AnalyticsError::Data(reason) => AnalyticsError::Data(format!("{t}: {reason}")),
                    other => other,
                })
            })
            .collect::<AnalyticsResult<Vec<_>>>()?;
        ReturnsMatrix::new(self.tickers.clone(), self.dates[1..].to_vec(), rows)
    }

    /// Each series rebased so its first observation equals `base`.
    pub fn normalized(&self, base: f64) -> BTreeMap<String, Vec<f64>> {
        self.tickers
            .iter()
            .zip(&self.prices)
            .map(|(t, row)| {
                let first = row[0];
                (t.clone(), row.iter().map(|p| p / first * base).collect())
            })
            .collect()
    }

    /// `"first to last"` description of the covered period.
    pub fn period_label(&self) -> String {
        match (self.dates.first(), self.dates.last()) {
            (Some(a), Some(b)) => format!("{a} to {b}"),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(ticker: &str, rows: &[(NaiveDate, f64)]) -> PriceSeries {
        PriceSeries::new(
            ticker,
            rows.iter()
                .map(|(date, price)| PricePoint {
                    date: *date,
                    price: *price,
                })
                .collect(),
        )
    }

    #[test]
    fn test_align_intersects_dates() {
        let a = series("A", &[(d(2024, 1, 2), 10.0), (d(2024, 1, 3), 11.0), (d(2024, 1, 4), 12.0)]);
        let b = series("B", &[(d(2024, 1, 2), 20.0), (d(2024, 1, 4), 22.0), (d(2024, 1, 5), 23.0)]);
        let md = MarketData::new(vec![a, b]);
        let m = md.align(&["A".into(), "B".into()], None, None).unwrap();
        assert_eq!(m.dates, vec![d(2024, 1, 2), d(2024, 1, 4)]);
        assert_eq!(m.prices[0], vec![10.0, 12.0]);
        assert_eq!(m.prices[1], vec![20.0, 22.0]);
    }

    #[test]
    fn test_align_unknown_ticker() {
        let md = MarketData::new(vec![]);
        let err = md.align(&["NOPE".into()], None, None).unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownTicker(t) if t == "NOPE"));
    }

    #[test]
    fn test_align_window_too_short() {
        let a = series("A", &[(d(2024, 1, 2), 10.0), (d(2024, 1, 3), 11.0)]);
        let md = MarketData::new(vec![a]);
        let err = md
            .align(&["A".into()], Some(d(2024, 1, 3)), None)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientHistory { observations: 1, .. }));
    }

    #[test]
    fn test_validate_rejects_unsorted_and_non_positive() {
        let unsorted = series("A", &[(d(2024, 1, 3), 10.0), (d(2024, 1, 2), 11.0)]);
        assert!(unsorted.validate().is_err());
        let zero = series("A", &[(d(2024, 1, 2), 10.0), (d(2024, 1, 3), 0.0)]);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_normalized_base_100() {
        let a = series("A", &[(d(2024, 1, 2), 50.0), (d(2024, 1, 3), 55.0)]);
        let md = MarketData::new(vec![a]);
        let m = md.align(&["A".into()], None, None).unwrap();
        let n = m.normalized(100.0);
        assert_eq!(n["A"][0], 100.0);
        assert!((n["A"][1] - 110.0).abs() < 1e-9);
        assert_eq!(m.period_label(), "2024-01-02 to 2024-01-03");
    }
}
