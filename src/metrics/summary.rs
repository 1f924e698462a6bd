use crate::metrics::timeseries::{calculate_returns, max_drawdown};
use crate::portfolio::{ClosedTrade, PortfolioSnapshot};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_cash: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    pub sharpe_like_ratio: f64,
    pub sortino_ratio: f64,
    pub win_rate_over_fills: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub num_trades: usize,
    pub num_winning_trades: usize,
    pub num_losing_trades: usize,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub exposure: f64,
}

impl SummaryMetrics {
    //derives every statistic from the ledger history alone
    pub fn from_history(
        snapshots: &[PortfolioSnapshot],
        closed_trades: &[ClosedTrade],
        initial_cash: f64,
        periods_per_year: f64,
    ) -> Self {
        let equity_values: Vec<f64> = snapshots.iter().map(|s| s.equity).collect();

        let final_equity = equity_values.last().copied().unwrap_or(initial_cash);
        let total_return = final_equity / initial_cash - 1.0;

        //geometric, scaled by the number of bars observed
        let annualized_return = if !snapshots.is_empty() && final_equity > 0.0 {
            let years = snapshots.len() as f64 / periods_per_year;
            (final_equity / initial_cash).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let returns = calculate_returns(&equity_values);
        let (annualized_volatility, sharpe_like_ratio) = volatility_and_sharpe(&returns, periods_per_year);
        let sortino_ratio = calculate_sortino_ratio(&returns, periods_per_year);

        let trade_stats = calculate_trade_statistics(closed_trades);

        let exposure = if snapshots.is_empty() {
            0.0
        } else {
            let in_market = snapshots.iter().filter(|s| s.position_quantity != 0).count();
            in_market as f64 / snapshots.len() as f64
        };

        SummaryMetrics {
            initial_cash,
            final_equity,
            total_return,
            annualized_return,
            max_drawdown: max_drawdown(&equity_values, initial_cash),
            annualized_volatility,
            sharpe_like_ratio,
            sortino_ratio,
            win_rate_over_fills: trade_stats.win_rate,
            avg_win: trade_stats.avg_win,
            avg_loss: trade_stats.avg_loss,
            profit_factor: trade_stats.profit_factor,
            num_trades: trade_stats.num_trades,
            num_winning_trades: trade_stats.num_winning_trades,
            num_losing_trades: trade_stats.num_losing_trades,
            largest_win: trade_stats.largest_win,
            largest_loss: trade_stats.largest_loss,
            exposure,
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let rows = [
            ("Initial Cash", format!("${:.2}", self.initial_cash)),
            ("Final Equity", format!("${:.2}", self.final_equity)),
            ("Total Return", format!("{:.2}%", self.total_return * 100.0)),
            ("Annualized Return", format!("{:.2}%", self.annualized_return * 100.0)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Annualized Volatility", format!("{:.2}%", self.annualized_volatility * 100.0)),
            ("Sharpe-like Ratio", format!("{:.3}", self.sharpe_like_ratio)),
            ("Sortino Ratio", format!("{:.3}", self.sortino_ratio)),
            ("Closed Trades", format!("{}", self.num_trades)),
            ("Win Rate", format!("{:.2}%", self.win_rate_over_fills * 100.0)),
            ("Avg Win", format!("${:.2}", self.avg_win)),
            ("Avg Loss", format!("${:.2}", self.avg_loss)),
            ("Largest Win", format!("${:.2}", self.largest_win)),
            ("Largest Loss", format!("${:.2}", self.largest_loss)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Exposure", format!("{:.2}%", self.exposure * 100.0)),
        ];

        let mut table = Table::new();
        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));
        for (name, value) in rows.iter() {
            table.add_row(Row::new(vec![Cell::new(name), Cell::new(value)]));
        }
        table.printstd();
    }
}

struct TradeStats {
    num_trades: usize,
    num_winning_trades: usize,
    num_losing_trades: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    largest_win: f64,
    largest_loss: f64,
}

//statistics over closed trades, judged on pnl net of costs
fn calculate_trade_statistics(trades: &[ClosedTrade]) -> TradeStats {
    let winning_trades: Vec<f64> = trades
        .iter()
        .map(|t| t.net_pnl)
        .filter(|&pnl| pnl > 0.0)
        .collect();
    let losing_trades: Vec<f64> = trades
        .iter()
        .map(|t| t.net_pnl)
        .filter(|&pnl| pnl < 0.0)
        .collect();

    let num_winning = winning_trades.len();
    let num_losing = losing_trades.len();
    let total = trades.len();

    let win_rate = if total > 0 {
        num_winning as f64 / total as f64
    } else {
        0.0
    };

    let avg_win = if num_winning > 0 {
        winning_trades.iter().sum::<f64>() / num_winning as f64
    } else {
        0.0
    };

    let avg_loss = if num_losing > 0 {
        losing_trades.iter().sum::<f64>() / num_losing as f64
    } else {
        0.0
    };

    let total_wins: f64 = winning_trades.iter().sum();
    let total_losses: f64 = losing_trades.iter().sum::<f64>().abs();

    let profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let largest_win = winning_trades.iter().fold(0.0f64, |a, &b| a.max(b));
    let largest_loss = losing_trades.iter().fold(0.0f64, |a, &b| a.min(b));

    TradeStats {
        num_trades: total,
        num_winning_trades: num_winning,
        num_losing_trades: num_losing,
        win_rate,
        avg_win,
        avg_loss,
        profit_factor,
        largest_win,
        largest_loss,
    }
}

//annualized volatility of per-bar returns and the mean/std ratio scaled the same way
fn volatility_and_sharpe(returns: &[f64], periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if !std_dev.is_finite() || std_dev == 0.0 {
        return (0.0, 0.0);
    }

    let scale = periods_per_year.sqrt();
    (std_dev * scale, (mean / std_dev) * scale)
}

fn calculate_sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }

    let mean = returns.mean();

    //calculate downside deviation (only negative returns)
    let negative_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();

    if negative_returns.is_empty() {
        return if mean > 0.0 { f64::INFINITY } else { 0.0 };
    }

    let downside_dev = negative_returns.std_dev();

    if !downside_dev.is_finite() || downside_dev == 0.0 {
        return 0.0;
    }

    (mean / downside_dev) * periods_per_year.sqrt()
}
