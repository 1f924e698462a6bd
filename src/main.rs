use anyhow::{Context, Result};
use barwise::prelude::*;
use clap::{Args, Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "barwise")]
#[command(about = "A deterministic moving-average crossover backtesting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a single backtest
    Run {
        //json run configuration, used instead of --data and the engine flags
        //output paths given on the command line override the file's
        #[arg(
            long,
            conflicts_with_all = [
                "data", "fast", "slow", "initial_cash", "ma", "direction", "fraction", "qty",
                "commission", "slippage", "allow_margin", "stop_loss", "take_profit",
                "trailing_stop", "periods_per_year",
            ]
        )]
        config: Option<PathBuf>,

        //path to csv data file
        #[arg(long, required_unless_present = "config")]
        data: Option<PathBuf>,

        //fast moving average window
        #[arg(long, default_value = "5")]
        fast: usize,

        //slow moving average window
        #[arg(long, default_value = "20")]
        slow: usize,

        #[command(flatten)]
        engine: EngineArgs,

        //output path for equity curve csv
        #[arg(long)]
        output_equity_csv: Option<PathBuf>,

        //output path for fills csv
        #[arg(long)]
        output_fills_csv: Option<PathBuf>,

        //output path for orders csv
        #[arg(long)]
        output_orders_csv: Option<PathBuf>,
    },
    //run a grid of fast/slow windows in parallel
    Sweep {
        //path to csv data file
        #[arg(long)]
        data: PathBuf,

        //comma separated fast windows
        #[arg(long, value_delimiter = ',', default_value = "3,5,10,20")]
        fast: Vec<usize>,

        //comma separated slow windows
        #[arg(long, value_delimiter = ',', default_value = "20,30,60,120")]
        slow: Vec<usize>,

        #[command(flatten)]
        engine: EngineArgs,

        //run sequentially instead of in parallel
        #[arg(long)]
        sequential: bool,

        //number of rows to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

#[derive(Args)]
struct EngineArgs {
    //initial cash
    #[arg(long, default_value = "100000")]
    initial_cash: f64,

    //moving average kind (sma, ema)
    #[arg(long, default_value = "sma")]
    ma: String,

    //long (long only) or both (long and short)
    #[arg(long, default_value = "long")]
    direction: String,

    //fraction of equity per entry
    #[arg(long, default_value = "0.95")]
    fraction: f64,

    //fixed units per entry, overrides --fraction
    #[arg(long)]
    qty: Option<u64>,

    //commission model, fixed:<amount per order> or pct:<rate>
    #[arg(long, default_value = "pct:0.001", value_parser = parse_cost)]
    commission: CostModel,

    //slippage model, fixed:<amount per unit> or pct:<rate>
    #[arg(long, default_value = "fixed:0", value_parser = parse_cost)]
    slippage: CostModel,

    //allow cash to go negative
    #[arg(long)]
    allow_margin: bool,

    //exit when the close falls this fraction below entry (eg 0.08)
    #[arg(long)]
    stop_loss: Option<f64>,

    //exit when the close rises this fraction above entry (eg 0.15)
    #[arg(long)]
    take_profit: Option<f64>,

    //exit when the close gives back this fraction from its best since entry (eg 0.05)
    #[arg(long)]
    trailing_stop: Option<f64>,

    //bars per year used for annualization
    #[arg(long, default_value = "252")]
    periods_per_year: f64,
}

impl EngineArgs {
    fn to_config(&self, fast_window: usize, slow_window: usize) -> Result<BacktestConfig> {
        let ma_kind = MovingAverageKind::parse(&self.ma)
            .ok_or_else(|| anyhow::anyhow!("Unknown moving average: {}", self.ma))?;
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| anyhow::anyhow!("Unknown direction: {}", self.direction))?;
        let sizing_rule = match self.qty {
            Some(qty) => SizingRule::FixedQuantity(qty),
            None => SizingRule::FixedFraction(self.fraction),
        };

        Ok(BacktestConfig {
            initial_cash: self.initial_cash,
            fast_window,
            slow_window,
            ma_kind,
            direction,
            sizing_rule,
            commission_model: self.commission,
            slippage_model: self.slippage,
            allow_margin: self.allow_margin,
            stop_loss_pct: self.stop_loss,
            take_profit_pct: self.take_profit,
            trailing_stop_pct: self.trailing_stop,
            periods_per_year: self.periods_per_year,
        })
    }
}

fn parse_cost(raw: &str) -> Result<CostModel, String> {
    let (kind, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected fixed:<value> or pct:<value>, got '{}'", raw))?;
    let value: f64 = value
        .parse()
        .map_err(|e| format!("invalid number '{}': {}", value, e))?;

    match kind.to_lowercase().as_str() {
        "fixed" => Ok(CostModel::Fixed(value)),
        "pct" | "proportional" => Ok(CostModel::Proportional(value)),
        other => Err(format!("unknown cost model '{}'", other)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            fast,
            slow,
            engine,
            output_equity_csv,
            output_fills_csv,
            output_orders_csv,
        } => {
            let run = match config {
                Some(path) => {
                    let mut run = RunConfiguration::from_json_file(&path)
                        .context(format!("Failed to read configuration {:?}", path))?;
                    run.output_equity_csv = output_equity_csv.or(run.output_equity_csv);
                    run.output_fills_csv = output_fills_csv.or(run.output_fills_csv);
                    run.output_orders_csv = output_orders_csv.or(run.output_orders_csv);
                    run
                }
                None => RunConfiguration {
                    data_path: data.context("--data is required without --config")?,
                    backtest: engine.to_config(fast, slow)?,
                    output_equity_csv,
                    output_fills_csv,
                    output_orders_csv,
                },
            };
            run_single(run)?;
        }
        Commands::Sweep {
            data,
            fast,
            slow,
            engine,
            sequential,
            top,
        } => {
            let base = engine.to_config(1, 2)?;
            run_sweep(&data, ParamGrid::new(fast, slow), base, !sequential, top)?;
        }
    }

    Ok(())
}

fn load_series(path: &Path) -> Result<BarSeries> {
    info!(path = ?path, "loading bars");
    let bars = load_csv(path).context(format!("Failed to load data from {:?}", path))?;
    let series = BarSeries::new(bars).context("Bar data failed validation")?;

    info!(
        bars = series.len(),
        first = %series.first().timestamp,
        last = %series.last().timestamp,
        "bars loaded"
    );
    Ok(series)
}

fn run_single(run: RunConfiguration) -> Result<()> {
    let series = load_series(&run.data_path)?;
    let config = run.backtest.clone();

    println!(
        "Strategy: {:?} crossover (fast={}, slow={}, {:?})",
        config.ma_kind, config.fast_window, config.slow_window, config.direction
    );
    println!("Sizing: {:?}", config.sizing_rule);
    println!("Commission: {:?}", config.commission_model);
    println!("Slippage: {:?}", config.slippage_model);
    println!(
        "Exits: stop loss {:?}, take profit {:?}, trailing stop {:?}\n",
        config.stop_loss_pct, config.take_profit_pct, config.trailing_stop_pct
    );

    let mut engine = Backtest::new(config, &series).context("Invalid backtest configuration")?;
    while let Ok(true) = engine.step() {}

    let ledger = engine.ledger();
    let last_close = series.last().close;
    let realized = ledger.realized_pnl();
    let costs = ledger.total_costs();
    let unrealized = ledger.position().unrealized_pnl(last_close);

    let result = engine.run();

    if let RunStatus::Aborted { bar_index, reason } = &result.status {
        warn!(bar_index, %reason, "run aborted, reporting partial result");
    }

    println!("Backtest Results");
    println!("================\n");
    result.summary.pretty_print_table();
    println!(
        "\nFills: {}  Rejected orders: {}",
        result.fills.len(),
        result.rejected_orders().count()
    );
    println!(
        "Realized PnL: ${:.2}  Costs paid: ${:.2}  Open PnL at last close: ${:.2}",
        realized, costs, unrealized
    );

    //save outputs if requested
    if let Some(path) = &run.output_equity_csv {
        write_csv(&result.equity_curve(), path)?;
        println!("Equity curve saved to {:?}", path);
    }

    if let Some(path) = &run.output_fills_csv {
        write_csv(&result.fills, path)?;
        println!("Fills saved to {:?}", path);
    }

    if let Some(path) = &run.output_orders_csv {
        let rows: Vec<OrderRow> = result.orders.iter().map(OrderRow::from).collect();
        write_csv(&rows, path)?;
        println!("Orders saved to {:?}", path);
    }

    Ok(())
}

fn run_sweep(
    data: &Path,
    grid: ParamGrid,
    base: BacktestConfig,
    parallel: bool,
    top: usize,
) -> Result<()> {
    let series = load_series(data)?;

    let mut outcomes = ParamSweep::new(base)
        .with_parallelism(parallel)
        .sweep(&grid, &series)
        .context("Sweep configuration is invalid")?;
    rank_by_sharpe(&mut outcomes);

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Fast"),
        Cell::new("Slow"),
        Cell::new("Return"),
        Cell::new("Max DD"),
        Cell::new("Sharpe"),
        Cell::new("Win Rate"),
        Cell::new("Fills"),
        Cell::new("Rejected"),
    ]));

    for outcome in outcomes.iter().take(top) {
        let s = &outcome.summary;
        table.add_row(Row::new(vec![
            Cell::new(&outcome.fast_window.to_string()),
            Cell::new(&outcome.slow_window.to_string()),
            Cell::new(&format!("{:.2}%", s.total_return * 100.0)),
            Cell::new(&format!("{:.2}%", s.max_drawdown * 100.0)),
            Cell::new(&format!("{:.3}", s.sharpe_like_ratio)),
            Cell::new(&format!("{:.2}%", s.win_rate_over_fills * 100.0)),
            Cell::new(&outcome.num_fills.to_string()),
            Cell::new(&outcome.num_rejected.to_string()),
        ]));
    }

    println!("Sweep Results ({} runs)", outcomes.len());
    table.printstd();
    Ok(())
}

//flat view of an order for csv export
#[derive(Serialize)]
struct OrderRow {
    id: u64,
    originating_bar_index: usize,
    side: OrderSide,
    quantity: u64,
    exit: String,
    status: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        let status = match order.status {
            OrderStatus::Pending => "pending".to_string(),
            OrderStatus::Filled => "filled".to_string(),
            OrderStatus::Cancelled => "cancelled".to_string(),
            OrderStatus::Rejected(RejectReason::DegenerateQuantity) => {
                "rejected: no usable quantity".to_string()
            }
            OrderStatus::Rejected(RejectReason::InsufficientFunds {
                required,
                available,
            }) => format!(
                "rejected: needs {:.2}, has {:.2}",
                required, available
            ),
        };

        OrderRow {
            id: order.id,
            originating_bar_index: order.originating_bar_index,
            side: order.side,
            quantity: order.quantity,
            exit: order.exit.map(|e| format!("{:?}", e)).unwrap_or_default(),
            status,
        }
    }
}

fn write_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).context(format!("Failed to create {:?}", path))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
