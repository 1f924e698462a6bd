use crate::indicator::MovingAverageKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Window lengths must be positive")]
    ZeroWindow,
    #[error("Fast window ({fast}) must be shorter than slow window ({slow})")]
    WindowOrder { fast: usize, slow: usize },
    #[error("Sizing fraction must be in (0, 1], got {0}")]
    InvalidFraction(f64),
    #[error("Fixed sizing quantity must be positive")]
    ZeroQuantity,
    #[error("Fixed sizing quantity {0} does not fit a signed position")]
    QuantityTooLarge(u64),
    #[error("Invalid {what}: {value}")]
    InvalidCost { what: &'static str, value: f64 },
    #[error("Initial cash must be positive and finite, got {0}")]
    InvalidInitialCash(f64),
    #[error("Periods per year must be positive and finite, got {0}")]
    InvalidPeriodsPerYear(f64),
    #[error("Invalid {what} level: {value}")]
    InvalidExitLevel { what: &'static str, value: f64 },
}

//largest unit count a single order or position may hold
pub const MAX_UNITS: u64 = i64::MAX as u64;

//how many units a new position opens with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizingRule {
    //share of current equity, valued at the signal bar's close
    FixedFraction(f64),
    //constant number of units
    FixedQuantity(u64),
}

impl SizingRule {
    //whole units to open given the equity and reference price at the signal bar
    //none when the size cannot be held as a signed quantity
    pub fn units(&self, equity: f64, price: f64) -> Option<u64> {
        let units = match *self {
            SizingRule::FixedFraction(fraction) => {
                if price <= 0.0 || equity <= 0.0 {
                    return Some(0);
                }
                let units = (fraction * equity / price).floor();
                if !units.is_finite() || units >= MAX_UNITS as f64 {
                    return None;
                }
                units as u64
            }
            SizingRule::FixedQuantity(qty) => qty,
        };
        (units <= MAX_UNITS).then_some(units)
    }
}

//cost charged per fill, used for both commission and slippage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostModel {
    //commission: flat amount per order; slippage: amount per unit
    Fixed(f64),
    //rate applied to the fill's notional value
    Proportional(f64),
}

impl CostModel {
    pub fn zero() -> Self {
        CostModel::Fixed(0.0)
    }

    pub fn amount(&self) -> f64 {
        match *self {
            CostModel::Fixed(v) | CostModel::Proportional(v) => v,
        }
    }

    //commission for one fill
    pub fn commission(&self, price: f64, qty: u64) -> f64 {
        match *self {
            CostModel::Fixed(amount) => amount,
            CostModel::Proportional(rate) => rate * price * qty as f64,
        }
    }

    //slippage cost for one fill
    pub fn slippage(&self, price: f64, qty: u64) -> f64 {
        match *self {
            CostModel::Fixed(per_unit) => per_unit * qty as f64,
            CostModel::Proportional(rate) => rate * price * qty as f64,
        }
    }

    fn validate(&self, what: &'static str) -> Result<(), ConfigError> {
        let value = self.amount();
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidCost { what, value });
        }
        Ok(())
    }
}

//which exposures the crossover may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    //short crossovers only close the long
    #[default]
    LongOnly,
    //short crossovers reverse into a short position
    LongShort,
}

impl Direction {
    //parse direction from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "long" | "long_only" | "long-only" => Some(Direction::LongOnly),
            "both" | "long_short" | "long-short" => Some(Direction::LongShort),
            _ => None,
        }
    }
}

//parameters of a single backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_cash: f64,
    pub fast_window: usize,
    pub slow_window: usize,
    pub ma_kind: MovingAverageKind,
    pub direction: Direction,
    pub sizing_rule: SizingRule,
    pub commission_model: CostModel,
    pub slippage_model: CostModel,
    pub allow_margin: bool,
    //exit when the close is this fraction worse than the entry price
    pub stop_loss_pct: Option<f64>,
    //exit when the close is this fraction better than the entry price
    pub take_profit_pct: Option<f64>,
    //exit when the close gives back this fraction from the best close since entry
    pub trailing_stop_pct: Option<f64>,
    //used to annualize volatility and returns (252 for daily bars)
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: 100000.0,
            fast_window: 5,
            slow_window: 20,
            ma_kind: MovingAverageKind::Sma,
            direction: Direction::LongOnly,
            sizing_rule: SizingRule::FixedFraction(0.95),
            commission_model: CostModel::Proportional(0.001),
            slippage_model: CostModel::zero(),
            allow_margin: false,
            stop_loss_pct: None,
            take_profit_pct: None,
            trailing_stop_pct: None,
            periods_per_year: 252.0,
        }
    }
}

impl BacktestConfig {
    //checks every parameter, called before the first bar is processed
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(ConfigError::InvalidInitialCash(self.initial_cash));
        }

        if self.fast_window == 0 || self.slow_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }

        if self.fast_window >= self.slow_window {
            return Err(ConfigError::WindowOrder {
                fast: self.fast_window,
                slow: self.slow_window,
            });
        }

        match self.sizing_rule {
            SizingRule::FixedFraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(ConfigError::InvalidFraction(f));
                }
            }
            SizingRule::FixedQuantity(0) => return Err(ConfigError::ZeroQuantity),
            SizingRule::FixedQuantity(qty) if qty > MAX_UNITS => {
                return Err(ConfigError::QuantityTooLarge(qty))
            }
            SizingRule::FixedQuantity(_) => {}
        }

        self.commission_model.validate("commission")?;
        self.slippage_model.validate("slippage")?;

        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(ConfigError::InvalidPeriodsPerYear(self.periods_per_year));
        }

        //stops must sit strictly between entry and zero, take profit only needs to be positive
        let exits = [
            ("stop loss", self.stop_loss_pct, 1.0),
            ("take profit", self.take_profit_pct, f64::INFINITY),
            ("trailing stop", self.trailing_stop_pct, 1.0),
        ];
        for (what, level, upper) in exits {
            if let Some(value) = level {
                if !(value.is_finite() && value > 0.0 && value < upper) {
                    return Err(ConfigError::InvalidExitLevel { what, value });
                }
            }
        }

        Ok(())
    }

    //same config with different crossover windows
    pub fn with_windows(&self, fast_window: usize, slow_window: usize) -> Self {
        BacktestConfig {
            fast_window,
            slow_window,
            ..self.clone()
        }
    }
}

//complete run configuration as read from a json file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfiguration {
    //data
    pub data_path: PathBuf,

    //engine parameters
    #[serde(default)]
    pub backtest: BacktestConfig,

    //optional output paths
    #[serde(default)]
    pub output_equity_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_fills_csv: Option<PathBuf>,
    #[serde(default)]
    pub output_orders_csv: Option<PathBuf>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        RunConfiguration {
            data_path: PathBuf::from("data.csv"),
            backtest: BacktestConfig::default(),
            output_equity_csv: None,
            output_fills_csv: None,
            output_orders_csv: None,
        }
    }
}

impl RunConfiguration {
    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfiguration = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
