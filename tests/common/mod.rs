#![allow(dead_code)]

use barwise::prelude::*;
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

//daily bars whose open, high, low and close are all the close
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(start() + Duration::days(i as i64), c, c, c, c, 1000.0).unwrap())
        .collect()
}

//daily bars with explicit opens, high and low widened to cover both prices
pub fn bars_with_opens(opens: &[f64], closes: &[f64]) -> Vec<Bar> {
    opens
        .iter()
        .zip(closes.iter())
        .enumerate()
        .map(|(i, (&o, &c))| {
            Bar::new(start() + Duration::days(i as i64), o, o.max(c), o.min(c), c, 1000.0).unwrap()
        })
        .collect()
}

pub fn series(closes: &[f64]) -> BarSeries {
    BarSeries::new(flat_bars(closes)).unwrap()
}

//config with the given windows, no costs and a fixed unit size
pub fn frictionless(fast: usize, slow: usize, qty: u64) -> BacktestConfig {
    BacktestConfig {
        fast_window: fast,
        slow_window: slow,
        sizing_rule: SizingRule::FixedQuantity(qty),
        commission_model: CostModel::zero(),
        slippage_model: CostModel::zero(),
        ..BacktestConfig::default()
    }
}

pub fn non_flat_signals(result: &BacktestResult) -> Vec<SignalEvent> {
    result
        .signals
        .iter()
        .filter(|e| !e.signal.is_flat())
        .copied()
        .collect()
}
