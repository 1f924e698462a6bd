pub mod backtest;
pub mod execution;
pub mod sweep;

pub use backtest::{
    run_backtest, AbortReason, Backtest, BacktestError, BacktestResult, DriverState, RunStatus,
};
pub use execution::{
    ExecutionEvent, ExecutionSimulator, ExitTrigger, Fill, Order, OrderSide, OrderStatus, OrderType,
    RejectReason,
};
pub use sweep::{rank_by_sharpe, ParamGrid, ParamSweep, SweepOutcome};
