pub mod ema;
pub mod sma;

pub use ema::Ema;
pub use sma::Sma;

use crate::data::Bar;
use serde::{Deserialize, Serialize};

//incremental indicator fed one bar at a time
//the value after bar t depends only on bars up to and including t
pub trait Indicator: Send {
    //feeds the next bar and returns the value, or none while warming up
    fn update(&mut self, bar: &Bar) -> Option<f64>;

    //last computed value, none until the window is full
    fn value(&self) -> Option<f64>;

    //number of bars needed before a value is produced
    fn window(&self) -> usize;

    //clears all state
    fn reset(&mut self);

    fn is_ready(&self) -> bool {
        self.value().is_some()
    }

    //returns the indicator name
    fn name(&self) -> String;
}

//moving average family used for both crossover lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovingAverageKind {
    #[default]
    Sma,
    Ema,
}

impl MovingAverageKind {
    //parse kind from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sma" | "simple" => Some(MovingAverageKind::Sma),
            "ema" | "exponential" => Some(MovingAverageKind::Ema),
            _ => None,
        }
    }

    //builds a fresh indicator of this kind
    pub fn build(self, window: usize) -> Box<dyn Indicator> {
        match self {
            MovingAverageKind::Sma => Box::new(Sma::new(window)),
            MovingAverageKind::Ema => Box::new(Ema::new(window)),
        }
    }
}

#[cfg(test)]
pub(crate) fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new_unchecked(start + Duration::days(i as i64), c, c, c, c, 0.0))
        .collect()
}
