use crate::data::bar::{Bar, BarError};
use std::ops::Deref;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Bar series is empty")]
    EmptySeries,
    #[error("Timestamp at index {index} is not after the previous bar")]
    NonMonotonicTimestamp { index: usize },
    #[error("Invalid bar at index {index}: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarError,
    },
}

//a non-empty, strictly time-ordered, validated sequence of bars
//immutable once built so independent runs can share it
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    //validates the bars and fails on the first violation, no repair is attempted
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::EmptySeries);
        }

        for (index, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|source| DataError::InvalidBar { index, source })?;

            if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
                return Err(DataError::NonMonotonicTimestamp { index });
            }
        }

        Ok(BarSeries { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn into_inner(self) -> Vec<Bar> {
        self.bars
    }
}

impl Deref for BarSeries {
    type Target = [Bar];

    fn deref(&self) -> &[Bar] {
        &self.bars
    }
}
