use crate::data::Bar;
use crate::indicator::Indicator;

//exponential moving average of closes
//seeded with the simple average of the first `window` closes, alpha = 2 / (window + 1)
#[derive(Debug, Clone)]
pub struct Ema {
    window: usize,
    alpha: f64,
    seen: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "EMA window must be >= 1");
        Ema {
            window,
            alpha: 2.0 / (window as f64 + 1.0),
            seen: 0,
            seed_sum: 0.0,
            value: None,
        }
    }
}

impl Indicator for Ema {
    fn update(&mut self, bar: &Bar) -> Option<f64> {
        match self.value {
            Some(prev) => {
                self.value = Some(prev + self.alpha * (bar.close - prev));
            }
            None => {
                self.seen += 1;
                self.seed_sum += bar.close;
                if self.seen == self.window {
                    self.value = Some(self.seed_sum / self.window as f64);
                }
            }
        }
        self.value
    }

    fn value(&self) -> Option<f64> {
        self.value
    }

    fn window(&self) -> usize {
        self.window
    }

    fn reset(&mut self) {
        self.seen = 0;
        self.seed_sum = 0.0;
        self.value = None;
    }

    fn name(&self) -> String {
        format!("EMA({})", self.window)
    }
}
