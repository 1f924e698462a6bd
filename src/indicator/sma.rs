use crate::data::Bar;
use crate::indicator::Indicator;
use std::collections::VecDeque;

//simple moving average of closes
//keeps a running sum so each update is o(1)
#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    buffer: VecDeque<f64>,
    sum: f64,
    value: Option<f64>,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "SMA window must be >= 1");
        Sma {
            window,
            buffer: VecDeque::with_capacity(window),
            sum: 0.0,
            value: None,
        }
    }
}

impl Indicator for Sma {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        self.buffer.push_back(bar.close);
        self.sum += bar.close;

        if self.buffer.len() > self.window {
            if let Some(leaving) = self.buffer.pop_front() {
                self.sum -= leaving;
            }
        }

        self.value = if self.buffer.len() == self.window {
            Some(self.sum / self.window as f64)
        } else {
            None
        };
        self.value
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn window(&self) -> usize {
        self.window
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.sum = 0.0;
        self.value = None;
    }

    fn name(&self) -> String {
        format!("SMA({})", self.window)
    }
}
