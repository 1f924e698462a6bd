mod common;

use approx::assert_relative_eq;
use barwise::prelude::*;
use common::*;
use std::io::Write;

const CROSSING: [f64; 10] = [10.0, 10.0, 10.0, 12.0, 14.0, 16.0, 14.0, 12.0, 10.0, 8.0];

#[test]
fn crossover_emits_one_long_then_one_short() {
    let bars = series(&CROSSING);
    let result = Backtest::new(frictionless(2, 4, 100), &bars).unwrap().run();

    assert!(result.is_completed());
    assert_eq!(result.signals.len(), CROSSING.len());
    assert_eq!(
        non_flat_signals(&result),
        vec![
            SignalEvent { bar_index: 3, signal: Signal::Long },
            SignalEvent { bar_index: 7, signal: Signal::Short },
        ]
    );
}

#[test]
fn crossover_round_trip_books_costs() {
    let bars = series(&CROSSING);
    let config = BacktestConfig {
        commission_model: CostModel::Proportional(0.001),
        ..frictionless(2, 4, 100)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.fills[0].bar_index, 4);
    assert_eq!(result.fills[0].side, OrderSide::Buy);
    assert_eq!(result.fills[0].fill_price, 14.0);
    assert_eq!(result.fills[1].bar_index, 8);
    assert_eq!(result.fills[1].side, OrderSide::Sell);
    assert_eq!(result.fills[1].fill_price, 10.0);

    assert_eq!(result.closed_trades.len(), 1);
    assert_relative_eq!(result.closed_trades[0].gross_pnl, -400.0, epsilon = 1e-9);
    assert_relative_eq!(result.closed_trades[0].net_pnl, -402.4, epsilon = 1e-9);

    let last = result.snapshots.last().unwrap();
    assert_eq!(last.position_quantity, 0);
    assert_relative_eq!(last.cash, 99597.6, epsilon = 1e-6);
    assert_relative_eq!(result.summary.final_equity, 99597.6, epsilon = 1e-6);
}

#[test]
fn long_short_reverses_on_short_crossover() {
    let bars = series(&CROSSING);
    let config = BacktestConfig {
        direction: Direction::LongShort,
        ..frictionless(2, 4, 100)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.fills[1].side, OrderSide::Sell);
    assert_eq!(result.fills[1].fill_quantity, 200);
    assert_eq!(result.snapshots.last().unwrap().position_quantity, -100);
    //short from 10 marked at 8
    assert_relative_eq!(
        result.summary.final_equity,
        100000.0 - 400.0 + 200.0,
        epsilon = 1e-9
    );
}

#[test]
fn fixed_commission_reduces_cash_by_notional_plus_fee() {
    let bars = series(&[90.0, 100.0, 100.0]);
    let config = BacktestConfig {
        initial_cash: 1050.0,
        fast_window: 1,
        slow_window: 2,
        sizing_rule: SizingRule::FixedFraction(1.0),
        commission_model: CostModel::Fixed(1.0),
        slippage_model: CostModel::zero(),
        ..BacktestConfig::default()
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.fills.len(), 1);
    let fill = &result.fills[0];
    assert_eq!(fill.fill_quantity, 10);
    assert_eq!(fill.fill_price, 100.0);
    assert_eq!(fill.commission, 1.0);
    assert_eq!(fill.slippage_cost, 0.0);

    assert_eq!(result.snapshots[1].cash, 1050.0);
    assert_eq!(result.snapshots[2].cash, 1050.0 - 1001.0);
    assert_eq!(result.snapshots[2].position_quantity, 10);
}

#[test]
fn unaffordable_order_is_rejected_without_touching_the_ledger() {
    let bars = series(&[90.0, 100.0, 100.0]);
    let config = BacktestConfig {
        initial_cash: 500.0,
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert!(result.fills.is_empty());
    assert_eq!(result.orders.len(), 1);
    assert_eq!(
        result.orders[0].status,
        OrderStatus::Rejected(RejectReason::InsufficientFunds {
            required: 1000.0,
            available: 500.0,
        })
    );
    for snapshot in &result.snapshots {
        assert_eq!(snapshot.cash, 500.0);
        assert_eq!(snapshot.position_quantity, 0);
    }
}

#[test]
fn margin_allows_negative_cash() {
    let bars = series(&[90.0, 100.0, 100.0]);
    let config = BacktestConfig {
        initial_cash: 500.0,
        allow_margin: true,
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.fills.len(), 1);
    let last = result.snapshots.last().unwrap();
    assert_eq!(last.cash, -500.0);
    assert_eq!(last.equity, 500.0);
}

#[test]
fn flat_round_trip_loses_only_costs() {
    //opens stay at 100 while closes cross up then down
    let opens = [100.0, 100.0, 100.0, 100.0, 100.0];
    let closes = [100.0, 101.0, 102.0, 99.0, 98.0];
    let bars = BarSeries::new(bars_with_opens(&opens, &closes)).unwrap();
    let config = BacktestConfig {
        commission_model: CostModel::Fixed(1.0),
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.closed_trades.len(), 1);
    let trade = &result.closed_trades[0];
    assert_eq!(trade.gross_pnl, 0.0);
    assert_relative_eq!(trade.net_pnl, -2.0, epsilon = 1e-12);

    let last = result.snapshots.last().unwrap();
    assert_eq!(last.position_quantity, 0);
    assert_relative_eq!(last.equity, 100000.0 - 2.0, epsilon = 1e-9);
}

#[test]
fn slippage_is_charged_against_the_trade() {
    let bars = series(&[90.0, 100.0, 100.0]);
    let config = BacktestConfig {
        slippage_model: CostModel::Fixed(0.5),
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    let fill = &result.fills[0];
    assert_eq!(fill.fill_price, 100.0);
    assert_eq!(fill.slippage_cost, 5.0);
    assert_eq!(fill.effective_price(), 100.5);
    assert_eq!(result.snapshots[2].cash, 100000.0 - 1005.0);
}

#[test]
fn fills_never_happen_on_the_originating_bar() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + 10.0 * (i as f64 / 7.0).sin())
        .collect();
    let bars = series(&closes);
    let result = Backtest::new(frictionless(3, 8, 5), &bars).unwrap().run();

    assert!(!result.fills.is_empty());
    for fill in &result.fills {
        let order = result
            .orders
            .iter()
            .find(|o| o.id == fill.order_id)
            .unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(fill.bar_index > order.originating_bar_index);
        assert_eq!(fill.fill_price, bars[fill.bar_index].open);
    }
}

#[test]
fn order_from_the_last_bar_stays_pending() {
    let bars = series(&[10.0, 10.0, 12.0]);
    let result = Backtest::new(frictionless(1, 2, 1), &bars).unwrap().run();

    assert!(result.is_completed());
    assert!(result.fills.is_empty());
    assert_eq!(result.orders.len(), 1);
    assert_eq!(result.orders[0].originating_bar_index, 2);
    assert_eq!(result.orders[0].status, OrderStatus::Pending);
}

#[test]
fn snapshot_equity_is_cash_plus_position_value() {
    let closes: Vec<f64> = (0..80).map(|i| 50.0 + ((i * 37) % 23) as f64).collect();
    let bars = series(&closes);
    let config = BacktestConfig {
        direction: Direction::LongShort,
        commission_model: CostModel::Proportional(0.002),
        slippage_model: CostModel::Proportional(0.001),
        ..frictionless(2, 5, 3)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.snapshots.len(), bars.len());
    for (i, snapshot) in result.snapshots.iter().enumerate() {
        assert_eq!(snapshot.bar_index, i);
        assert_eq!(snapshot.equity, snapshot.cash + snapshot.position_market_value);
        assert_eq!(
            snapshot.position_market_value,
            snapshot.position_quantity as f64 * bars[i].close
        );
    }
}

#[test]
fn identical_inputs_give_identical_results() {
    let closes: Vec<f64> = (0..200)
        .map(|i| 100.0 + 15.0 * (i as f64 / 11.0).sin() + (i % 5) as f64)
        .collect();
    let bars = series(&closes);
    let config = BacktestConfig {
        fast_window: 4,
        slow_window: 15,
        ..BacktestConfig::default()
    };

    let first = Backtest::new(config.clone(), &bars).unwrap().run();
    let second = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn non_finite_equity_aborts_with_partial_result() {
    let bars = series(&[1.0, 2.0, 1e308]);
    let config = BacktestConfig {
        allow_margin: true,
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    match &result.status {
        RunStatus::Aborted { bar_index, reason } => {
            assert_eq!(*bar_index, 2);
            assert!(matches!(
                reason,
                AbortReason::Ledger(LedgerError::NonFiniteEquity { bar_index: 2, .. })
            ));
        }
        RunStatus::Completed => panic!("expected the run to abort"),
    }
    assert!(!result.is_completed());
    assert_eq!(result.snapshots.len(), 2);
    assert_eq!(result.fills.len(), 1);
}

#[test]
fn stepping_moves_through_driver_states() {
    let bars = series(&[1.0, 2.0, 3.0]);
    let mut engine = Backtest::new(frictionless(1, 2, 1), &bars).unwrap();
    assert_eq!(engine.state(), DriverState::Initialized);

    assert_eq!(engine.step(), Ok(true));
    assert_eq!(engine.state(), DriverState::Running);
    assert_eq!(engine.snapshots().len(), 1);

    assert_eq!(engine.step(), Ok(true));
    assert_eq!(engine.step(), Ok(false));
    assert_eq!(engine.state(), DriverState::Completed);
    assert_eq!(engine.snapshots().len(), 3);

    //further steps are no-ops
    assert_eq!(engine.step(), Ok(false));
    assert_eq!(engine.snapshots().len(), 3);
}

#[test]
fn invalid_inputs_fail_before_any_bar() {
    assert_eq!(
        run_backtest(Vec::new(), BacktestConfig::default()).unwrap_err(),
        BacktestError::Data(DataError::EmptySeries)
    );

    let mut bars = flat_bars(&[1.0, 2.0, 3.0]);
    bars.swap(1, 2);
    assert_eq!(
        run_backtest(bars, BacktestConfig::default()).unwrap_err(),
        BacktestError::Data(DataError::NonMonotonicTimestamp { index: 2 })
    );

    let config = BacktestConfig::default().with_windows(10, 10);
    assert_eq!(
        run_backtest(flat_bars(&[1.0, 2.0]), config).unwrap_err(),
        BacktestError::Config(ConfigError::WindowOrder { fast: 10, slow: 10 })
    );
}

#[test]
fn csv_file_runs_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for (i, close) in CROSSING.iter().enumerate() {
        writeln!(
            file,
            "2024-02-{:02},{c},{c},{c},{c},500",
            i + 1,
            c = close
        )
        .unwrap();
    }
    file.flush().unwrap();

    let bars = load_csv(file.path()).unwrap();
    let result = run_backtest(bars, frictionless(2, 4, 100)).unwrap();

    assert!(result.is_completed());
    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.equity_curve().len(), CROSSING.len());
}

#[test]
fn sweep_is_the_same_in_parallel_and_sequentially() {
    let closes: Vec<f64> = (0..150)
        .map(|i| 100.0 + 20.0 * (i as f64 / 13.0).sin())
        .collect();
    let bars = series(&closes);
    let grid = ParamGrid::new(vec![2, 3, 5, 8], vec![5, 10, 20]);

    let parallel = ParamSweep::new(BacktestConfig::default())
        .sweep(&grid, &bars)
        .unwrap();
    let sequential = ParamSweep::new(BacktestConfig::default())
        .with_parallelism(false)
        .sweep(&grid, &bars)
        .unwrap();

    assert_eq!(parallel.len(), grid.size());
    assert_eq!(parallel, sequential);

    //each outcome matches a standalone run of the same windows
    let single = Backtest::new(BacktestConfig::default().with_windows(3, 10), &bars)
        .unwrap()
        .run();
    let outcome = parallel
        .iter()
        .find(|o| o.fast_window == 3 && o.slow_window == 10)
        .unwrap();
    assert_eq!(outcome.summary, single.summary);
    assert_eq!(outcome.num_fills, single.fills.len());
}

#[test]
fn ranking_puts_best_sharpe_first() {
    let closes: Vec<f64> = (0..150)
        .map(|i| 100.0 + 20.0 * (i as f64 / 13.0).sin())
        .collect();
    let bars = series(&closes);
    let grid = ParamGrid::new(vec![2, 3, 5], vec![8, 13]);

    let mut outcomes = ParamSweep::new(BacktestConfig::default())
        .sweep(&grid, &bars)
        .unwrap();
    rank_by_sharpe(&mut outcomes);

    for pair in outcomes.windows(2) {
        assert!(pair[0].summary.sharpe_like_ratio >= pair[1].summary.sharpe_like_ratio);
    }
}

#[test]
fn huge_equity_never_turns_a_long_into_a_sell() {
    let bars = series(&[90.0, 100.0, 100.0]);
    let config = BacktestConfig {
        initial_cash: 1e300,
        fast_window: 1,
        slow_window: 2,
        sizing_rule: SizingRule::FixedFraction(1.0),
        ..BacktestConfig::default()
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(
        non_flat_signals(&result),
        vec![SignalEvent { bar_index: 1, signal: Signal::Long }]
    );
    assert_eq!(result.orders.len(), 1);
    assert_eq!(
        result.orders[0].status,
        OrderStatus::Rejected(RejectReason::DegenerateQuantity)
    );
    assert!(result.fills.is_empty());
    for snapshot in &result.snapshots {
        assert_eq!(snapshot.position_quantity, 0);
    }
}

#[test]
fn unrepresentable_fixed_quantity_is_a_config_error() {
    let config = frictionless(1, 2, u64::MAX);
    assert_eq!(
        run_backtest(flat_bars(&[90.0, 100.0, 100.0]), config).unwrap_err(),
        BacktestError::Config(ConfigError::QuantityTooLarge(u64::MAX))
    );
}

#[test]
fn take_profit_exits_and_waits_for_a_fresh_crossover() {
    let bars = series(&[100.0, 100.0, 101.0, 102.0, 110.0, 125.0, 126.0, 127.0]);
    let config = BacktestConfig {
        take_profit_pct: Some(0.15),
        ..frictionless(1, 2, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(result.orders.len(), 2);
    assert_eq!(result.orders[0].exit, None);
    assert_eq!(result.orders[0].originating_bar_index, 2);

    let exit = &result.orders[1];
    assert_eq!(exit.exit, Some(ExitTrigger::TakeProfit));
    assert_eq!(exit.side, OrderSide::Sell);
    assert_eq!(exit.originating_bar_index, 5);

    assert_eq!(result.fills.len(), 2);
    assert_eq!(result.fills[0].fill_price, 102.0);
    assert_eq!(result.fills[1].bar_index, 6);
    assert_eq!(result.fills[1].fill_price, 126.0);
    assert_relative_eq!(result.closed_trades[0].gross_pnl, 240.0, epsilon = 1e-9);
    assert_eq!(result.snapshots.last().unwrap().position_quantity, 0);
}

#[test]
fn trailing_stop_exits_while_crossover_still_long() {
    let closes = [100.0, 100.0, 100.0, 100.0, 100.0, 101.0, 110.0, 120.0, 113.0, 112.0];
    let bars = series(&closes);
    let config = BacktestConfig {
        trailing_stop_pct: Some(0.05),
        ..frictionless(1, 5, 10)
    };
    let result = Backtest::new(config, &bars).unwrap().run();

    assert_eq!(
        non_flat_signals(&result),
        vec![SignalEvent { bar_index: 5, signal: Signal::Long }]
    );
    assert_eq!(result.orders.len(), 2);
    assert_eq!(result.orders[1].exit, Some(ExitTrigger::TrailingStop));
    assert_eq!(result.orders[1].originating_bar_index, 8);
    assert_eq!(result.fills[1].bar_index, 9);
    assert_relative_eq!(result.closed_trades[0].gross_pnl, 20.0, epsilon = 1e-9);
}

#[test]
fn exits_are_off_by_default() {
    let closes = [100.0, 100.0, 100.0, 100.0, 100.0, 101.0, 110.0, 120.0, 113.0, 112.0];
    let bars = series(&closes);
    let result = Backtest::new(frictionless(1, 5, 10), &bars).unwrap().run();

    assert_eq!(result.orders.len(), 1);
    assert_eq!(result.snapshots.last().unwrap().position_quantity, 10);
}
