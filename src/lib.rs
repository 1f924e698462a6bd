//a deterministic bar-by-bar backtesting engine for moving-average crossover strategies

pub mod config;
pub mod data;
pub mod engine;
pub mod indicator;
pub mod metrics;
pub mod portfolio;
pub mod signal;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfig, ConfigError, CostModel, Direction, RunConfiguration, SizingRule, MAX_UNITS,
    };
    pub use crate::data::{load_csv, Bar, BarError, BarSeries, DataError};
    pub use crate::engine::{
        rank_by_sharpe, run_backtest, AbortReason, Backtest, BacktestError, BacktestResult,
        DriverState, ExecutionEvent, ExecutionSimulator, ExitTrigger, Fill, Order, OrderSide, OrderStatus,
        OrderType, ParamGrid, ParamSweep, RejectReason, RunStatus, SweepOutcome,
    };
    pub use crate::indicator::{Ema, Indicator, MovingAverageKind, Sma};
    pub use crate::metrics::{calculate_equity_curve, EquityPoint, SummaryMetrics};
    pub use crate::portfolio::{
        ClosedTrade, Exposure, LedgerError, PortfolioLedger, PortfolioSnapshot, Position,
    };
    pub use crate::signal::{CrossoverSignal, Signal, SignalEvent};
}
