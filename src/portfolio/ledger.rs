use crate::data::Bar;
use crate::engine::execution::Fill;
use crate::portfolio::position::{ClosedTrade, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("Equity is not finite at bar {bar_index} (cash {cash}, position value {position_market_value})")]
    NonFiniteEquity {
        bar_index: usize,
        cash: f64,
        position_market_value: f64,
    },
}

//portfolio state at the close of one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub position_quantity: i64,
    pub position_market_value: f64,
    pub equity: f64,
}

//cash and position for the single traded instrument
//mutated only through apply, never performs io
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    //initial account balance
    initial_cash: f64,

    //current cash, after trade notional, commissions and slippage
    cash: f64,

    position: Position,

    //complete fill log
    fills: Vec<Fill>,

    //one entry per reducing fill
    closed_trades: Vec<ClosedTrade>,
}

impl PortfolioLedger {
    //creates a new ledger with a flat position
    pub fn new(initial_cash: f64) -> Self {
        PortfolioLedger {
            initial_cash,
            cash: initial_cash,
            position: Position::new(),
            fills: Vec::new(),
            closed_trades: Vec::new(),
        }
    }

    //applies a fill: cash moves by -(side * price * qty) - commission - slippage
    pub fn apply(&mut self, fill: &Fill) {
        self.cash += fill.cash_delta();

        if let Some(trade) = self.position.update_with_fill(fill) {
            self.closed_trades.push(trade);
        }

        self.fills.push(fill.clone());
    }

    //values the position at the bar's close and records the state
    pub fn mark_to_market(
        &self,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<PortfolioSnapshot, LedgerError> {
        let position_market_value = self.position.market_value(bar.close);
        let equity = self.cash + position_market_value;

        if !equity.is_finite() {
            return Err(LedgerError::NonFiniteEquity {
                bar_index,
                cash: self.cash,
                position_market_value,
            });
        }

        Ok(PortfolioSnapshot {
            bar_index,
            timestamp: bar.timestamp,
            cash: self.cash,
            position_quantity: self.position.quantity,
            position_market_value,
            equity,
        })
    }

    //total equity if the position were valued at `price`
    pub fn equity_at(&self, price: f64) -> f64 {
        self.cash + self.position.market_value(price)
    }

    //whether paying `outlay` leaves cash non-negative
    pub fn can_afford(&self, outlay: f64) -> bool {
        self.cash - outlay >= 0.0
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    //returns total realized pnl before costs
    pub fn realized_pnl(&self) -> f64 {
        self.position.realized_pnl
    }

    //returns total commission and slippage paid
    pub fn total_costs(&self) -> f64 {
        self.fills.iter().map(Fill::total_costs).sum()
    }

    //hands over the fill and closed trade logs
    pub fn into_history(self) -> (Vec<Fill>, Vec<ClosedTrade>) {
        (self.fills, self.closed_trades)
    }
}
