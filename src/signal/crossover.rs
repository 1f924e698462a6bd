use crate::signal::Signal;
use std::cmp::Ordering;

//detects crossovers of a fast line over a slow line
//a crossover is a change in the sign of (fast - slow); a bar where fast == slow
//keeps the previously established sign, so equality never triggers on its own.
//before any sign is established the baseline is neutral, which makes the
//first bar with a non-zero spread a crossover in that direction.
#[derive(Debug, Clone, Default)]
pub struct CrossoverSignal {
    //last non-zero sign of the spread, none until one is established
    last_sign: Option<Ordering>,
}

impl CrossoverSignal {
    pub fn new() -> Self {
        CrossoverSignal { last_sign: None }
    }

    //classifies the current bar from this bar's indicator values
    //returns flat while either value is undefined
    pub fn classify(&mut self, fast: Option<f64>, slow: Option<f64>) -> Signal {
        let (fast, slow) = match (fast, slow) {
            (Some(fast), Some(slow)) => (fast, slow),
            _ => return Signal::Flat,
        };

        let sign = match fast.partial_cmp(&slow) {
            Some(Ordering::Equal) | None => return Signal::Flat,
            Some(sign) => sign,
        };

        if self.last_sign == Some(sign) {
            return Signal::Flat;
        }
        self.last_sign = Some(sign);

        match sign {
            Ordering::Greater => Signal::Long,
            Ordering::Less => Signal::Short,
            Ordering::Equal => Signal::Flat,
        }
    }

    //classifies whole precomputed indicator series with a fresh detector
    pub fn replay(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<Signal> {
        let mut detector = CrossoverSignal::new();
        fast.iter()
            .zip(slow.iter())
            .map(|(&f, &s)| detector.classify(f, s))
            .collect()
    }

    pub fn reset(&mut self) {
        self.last_sign = None;
    }
}
