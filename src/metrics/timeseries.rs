use crate::portfolio::PortfolioSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//a point in the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
    pub drawdown: f64,
    pub returns: f64,
}

//fractional decline from the running peak, zero when the peak is not positive
fn drawdown_from(peak: f64, equity: f64) -> f64 {
    if peak > 0.0 {
        (peak - equity) / peak
    } else {
        0.0
    }
}

//simple return between two equity values, zero when the base is zero
fn simple_return(prev: f64, current: f64) -> f64 {
    if prev == 0.0 {
        0.0
    } else {
        (current - prev) / prev
    }
}

//calculates the equity curve with drawdowns from the ledger snapshots
pub fn calculate_equity_curve(
    snapshots: &[PortfolioSnapshot],
    initial_cash: f64,
) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(snapshots.len());
    let mut peak = initial_cash;
    let mut prev_equity = initial_cash;

    for (i, snapshot) in snapshots.iter().enumerate() {
        let equity = snapshot.equity;

        //update peak
        if equity > peak {
            peak = equity;
        }

        let returns = if i == 0 {
            0.0
        } else {
            simple_return(prev_equity, equity)
        };

        curve.push(EquityPoint {
            bar_index: snapshot.bar_index,
            timestamp: snapshot.timestamp,
            equity,
            drawdown: drawdown_from(peak, equity),
            returns,
        });
        prev_equity = equity;
    }

    curve
}

//maximum peak-to-trough decline in one forward pass
pub fn max_drawdown(equity_values: &[f64], initial_cash: f64) -> f64 {
    let mut peak = initial_cash;
    let mut worst = 0.0_f64;

    for &equity in equity_values {
        if equity > peak {
            peak = equity;
        }
        worst = worst.max(drawdown_from(peak, equity));
    }

    worst
}

//calculates returns from equity values
pub fn calculate_returns(equity_values: &[f64]) -> Vec<f64> {
    equity_values
        .windows(2)
        .map(|pair| simple_return(pair[0], pair[1]))
        .collect()
}
