pub mod crossover;

pub use crossover::CrossoverSignal;

use serde::{Deserialize, Serialize};

//per-bar classification emitted by the signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
    Flat,
}

impl Signal {
    pub fn is_flat(&self) -> bool {
        matches!(self, Signal::Flat)
    }
}

//a signal attached to the bar it was decided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub bar_index: usize,
    pub signal: Signal,
}
