use crate::config::{BacktestConfig, ConfigError};
use crate::data::{Bar, BarSeries, DataError};
use crate::engine::execution::{ExecutionEvent, ExecutionSimulator, Fill, Order};
use crate::indicator::Indicator;
use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
use crate::portfolio::{ClosedTrade, LedgerError, PortfolioLedger, PortfolioSnapshot};
use crate::signal::{CrossoverSignal, SignalEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

//errors that stop a run before its first bar
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BacktestError {
    #[error("Invalid bar data: {0}")]
    Data(#[from] DataError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

//fatal condition met while bars were being processed
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbortReason {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    Initialized,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Aborted { bar_index: usize, reason: AbortReason },
}

//result of a backtest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub status: RunStatus,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub signals: Vec<SignalEvent>,
    pub orders: Vec<Order>,
    pub fills: Vec<Fill>,
    pub closed_trades: Vec<ClosedTrade>,
    pub summary: SummaryMetrics,
}

impl BacktestResult {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    //orders that were rejected by the execution simulator
    pub fn rejected_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.is_rejected())
    }

    //equity curve with drawdown and per-bar returns
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        calculate_equity_curve(&self.snapshots, self.summary.initial_cash)
    }
}

//deterministic bar-by-bar driver for one run
//owns every piece of mutable state, the bar series is only borrowed
pub struct Backtest<'a> {
    config: BacktestConfig,
    bars: &'a BarSeries,
    fast: Box<dyn Indicator>,
    slow: Box<dyn Indicator>,
    signals: CrossoverSignal,
    execution: ExecutionSimulator,
    ledger: PortfolioLedger,
    state: DriverState,
    cursor: usize,
    signal_log: Vec<SignalEvent>,
    snapshots: Vec<PortfolioSnapshot>,
    abort: Option<(usize, AbortReason)>,
}

impl<'a> Backtest<'a> {
    //validates the configuration, fails before any bar is touched
    pub fn new(config: BacktestConfig, bars: &'a BarSeries) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Backtest {
            fast: config.ma_kind.build(config.fast_window),
            slow: config.ma_kind.build(config.slow_window),
            signals: CrossoverSignal::new(),
            execution: ExecutionSimulator::new(&config),
            ledger: PortfolioLedger::new(config.initial_cash),
            state: DriverState::Initialized,
            cursor: 0,
            signal_log: Vec::with_capacity(bars.len()),
            snapshots: Vec::with_capacity(bars.len()),
            abort: None,
            config,
            bars,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    //processes the next bar
    //returns Ok(true) while bars remain, Ok(false) once the series is exhausted
    pub fn step(&mut self) -> Result<bool, AbortReason> {
        match self.state {
            DriverState::Completed => return Ok(false),
            DriverState::Aborted => {
                if let Some((_, reason)) = &self.abort {
                    return Err(reason.clone());
                }
                return Ok(false);
            }
            DriverState::Initialized => {
                info!(
                    bars = self.bars.len(),
                    fast = %self.fast.name(),
                    slow = %self.slow.name(),
                    "backtest started"
                );
                self.state = DriverState::Running;
            }
            DriverState::Running => {}
        }

        let bars = self.bars;
        let Some(bar) = bars.get(self.cursor) else {
            self.state = DriverState::Completed;
            return Ok(false);
        };
        let bar_index = self.cursor;

        if let Err(reason) = self.process_bar(bar, bar_index) {
            error!(bar_index, %reason, "backtest aborted");
            self.state = DriverState::Aborted;
            self.abort = Some((bar_index, reason.clone()));
            return Err(reason);
        }

        self.cursor += 1;
        if self.cursor == self.bars.len() {
            self.state = DriverState::Completed;
            return Ok(false);
        }
        Ok(true)
    }

    fn process_bar(&mut self, bar: &Bar, bar_index: usize) -> Result<(), AbortReason> {
        //the order decided on an earlier bar fills at this bar's open
        if let Some(ExecutionEvent::Filled(fill)) =
            self.execution.fill_pending(bar, bar_index, &self.ledger)
        {
            self.ledger.apply(&fill);
        }

        //indicators see every bar in the same order
        let fast = self.fast.update(bar);
        let slow = self.slow.update(bar);

        let signal = self.signals.classify(fast, slow);
        self.signal_log.push(SignalEvent { bar_index, signal });

        //a new order is decided at this close and waits for the next bar
        self.execution.on_signal(signal, bar_index, bar.close, &self.ledger);
        //protective exits only act when no signal order is waiting
        self.execution.check_exits(bar, bar_index, &self.ledger);

        let snapshot = self.ledger.mark_to_market(bar, bar_index)?;
        self.snapshots.push(snapshot);
        Ok(())
    }

    //runs every remaining bar and builds the result
    pub fn run(mut self) -> BacktestResult {
        while let Ok(true) = self.step() {}
        self.finish()
    }

    fn finish(self) -> BacktestResult {
        let status = match self.abort {
            Some((bar_index, reason)) => RunStatus::Aborted { bar_index, reason },
            None => RunStatus::Completed,
        };

        let initial_cash = self.ledger.initial_cash();
        let (fills, closed_trades) = self.ledger.into_history();
        let orders = self.execution.into_orders();

        let summary = SummaryMetrics::from_history(
            &self.snapshots,
            &closed_trades,
            initial_cash,
            self.config.periods_per_year,
        );

        info!(
            status = ?status,
            fills = fills.len(),
            final_equity = summary.final_equity,
            "backtest finished"
        );

        BacktestResult {
            status,
            snapshots: self.snapshots,
            signals: self.signal_log,
            orders,
            fills,
            closed_trades,
            summary,
        }
    }
}

//validates bars and config, then runs to completion
pub fn run_backtest(bars: Vec<Bar>, config: BacktestConfig) -> Result<BacktestResult, BacktestError> {
    let series = BarSeries::new(bars)?;
    let engine = Backtest::new(config, &series)?;
    Ok(engine.run())
}
