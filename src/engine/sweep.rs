//parallel parameter sweeps over crossover windows
//each run owns its ledger and execution state, the only shared input is the
//read-only bar series

use crate::config::{BacktestConfig, ConfigError};
use crate::data::BarSeries;
use crate::engine::backtest::{Backtest, RunStatus};
use crate::metrics::SummaryMetrics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

//fast/slow window combinations to test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub fast_windows: Vec<usize>,
    pub slow_windows: Vec<usize>,
}

impl ParamGrid {
    pub fn new(fast_windows: Vec<usize>, slow_windows: Vec<usize>) -> Self {
        ParamGrid {
            fast_windows,
            slow_windows,
        }
    }

    //window pairs in (fast, slow) order, skipping pairs where fast >= slow
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_windows {
            for &slow in &self.slow_windows {
                if fast > 0 && fast < slow {
                    pairs.push((fast, slow));
                }
            }
        }
        pairs.sort_unstable();
        pairs.dedup();
        pairs
    }

    pub fn size(&self) -> usize {
        self.pairs().len()
    }
}

//outcome of one run in a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepOutcome {
    pub fast_window: usize,
    pub slow_window: usize,
    pub status: RunStatus,
    pub num_fills: usize,
    pub num_rejected: usize,
    pub summary: SummaryMetrics,
}

//runs a grid of backtests that differ only in their windows
pub struct ParamSweep {
    base: BacktestConfig,
    parallel: bool,
}

impl ParamSweep {
    pub fn new(base: BacktestConfig) -> Self {
        ParamSweep {
            base,
            parallel: true,
        }
    }

    //enables or disables parallel execution
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn run_one(&self, bars: &BarSeries, fast: usize, slow: usize) -> Result<SweepOutcome, ConfigError> {
        let config = self.base.with_windows(fast, slow);
        let result = Backtest::new(config, bars)?.run();

        Ok(SweepOutcome {
            fast_window: fast,
            slow_window: slow,
            num_fills: result.fills.len(),
            num_rejected: result.rejected_orders().count(),
            status: result.status,
            summary: result.summary,
        })
    }

    //executes every pair in the grid
    //outcomes come back in (fast, slow) order whether or not the runs were
    //parallel, a configuration error in any pair fails the whole sweep
    pub fn sweep(&self, grid: &ParamGrid, bars: &BarSeries) -> Result<Vec<SweepOutcome>, ConfigError> {
        let pairs = grid.pairs();
        info!(runs = pairs.len(), parallel = self.parallel, "starting parameter sweep");

        if self.parallel {
            pairs
                .par_iter()
                .map(|&(fast, slow)| self.run_one(bars, fast, slow))
                .collect()
        } else {
            pairs
                .iter()
                .map(|&(fast, slow)| self.run_one(bars, fast, slow))
                .collect()
        }
    }
}

//sorts outcomes best first by the sharpe-like ratio, ties broken by window pair
pub fn rank_by_sharpe(outcomes: &mut [SweepOutcome]) {
    outcomes.sort_by(|a, b| {
        b.summary
            .sharpe_like_ratio
            .partial_cmp(&a.summary.sharpe_like_ratio)
            .unwrap_or(Ordering::Equal)
            .then_with(|| (a.fast_window, a.slow_window).cmp(&(b.fast_window, b.slow_window)))
    });
}
