pub mod backtest_config;

pub use backtest_config::{
    BacktestConfig, ConfigError, CostModel, Direction, RunConfiguration, SizingRule, MAX_UNITS,
};
