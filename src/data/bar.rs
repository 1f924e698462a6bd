use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },
    #[error("{field} is negative: {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close ({close}) outside high-low range [{low}, {high}]")]
    InvalidClose { close: f64, high: f64, low: f64 },
    #[error("Invalid OHLC values: open ({open}) outside high-low range [{low}, {high}]")]
    InvalidOpen { open: f64, high: f64, low: f64 },
    #[error("Split ratio must be positive, got {0}")]
    InvalidSplitRatio(f64),
}

//represents a single ohlcv bar (candlestick) of market data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub dividends: Option<f64>,
    #[serde(default)]
    pub split_ratio: Option<f64>,
}

impl Bar {
    //creates a new Bar with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, BarError> {
        let bar = Bar::new_unchecked(timestamp, open, high, low, close, volume);
        bar.validate()?;
        Ok(bar)
    }

    //creates a Bar without validation
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            dividends: None,
            split_ratio: None,
        }
    }

    pub fn with_dividends(mut self, dividends: f64) -> Self {
        self.dividends = Some(dividends);
        self
    }

    pub fn with_split_ratio(mut self, split_ratio: f64) -> Self {
        self.split_ratio = Some(split_ratio);
        self
    }

    //checks every numeric field and the ohlc ordering
    pub fn validate(&self) -> Result<(), BarError> {
        let mut fields = vec![
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        if let Some(dividends) = self.dividends {
            fields.push(("dividends", dividends));
        }
        if let Some(split_ratio) = self.split_ratio {
            fields.push(("split_ratio", split_ratio));
        }

        for (field, value) in fields {
            if !value.is_finite() {
                return Err(BarError::NonFinite { field });
            }
            if value < 0.0 {
                return Err(BarError::Negative { field, value });
            }
        }

        if let Some(split_ratio) = self.split_ratio {
            if split_ratio == 0.0 {
                return Err(BarError::InvalidSplitRatio(split_ratio));
            }
        }

        //validate high >= low
        if self.high < self.low {
            return Err(BarError::InvalidHighLow {
                high: self.high,
                low: self.low,
            });
        }

        //validate close within [low, high]
        if self.close < self.low || self.close > self.high {
            return Err(BarError::InvalidClose {
                close: self.close,
                high: self.high,
                low: self.low,
            });
        }

        //validate open within [low, high]
        if self.open < self.low || self.open > self.high {
            return Err(BarError::InvalidOpen {
                open: self.open,
                high: self.high,
                low: self.low,
            });
        }

        Ok(())
    }
}
