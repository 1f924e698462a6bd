use crate::config::{BacktestConfig, CostModel, Direction, SizingRule};
use crate::data::Bar;
use crate::portfolio::{Exposure, PortfolioLedger};
use crate::signal::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

//order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    //converts to quantity sign (Buy = +1, Sell = -1)
    pub fn to_qty_sign(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

//signed quantity, quantities never exceed MAX_UNITS once sized
fn signed(quantity: u64, side: OrderSide) -> i64 {
    i64::try_from(quantity).unwrap_or(i64::MAX) * side.to_qty_sign()
}

//order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    //fills at the open of the first bar after the one that created it
    MarketOnNextOpen,
}

//protective rule that closed a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
    TrailingStop,
}

//why an order did not fill
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    //the fill would drive cash negative while margin is disallowed
    InsufficientFunds { required: f64, available: f64 },
    //sizing produced no units, or more than a signed position can hold
    DegenerateQuantity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Rejected(RejectReason),
    //superseded by a newer decision before it could fill
    Cancelled,
}

//represents a trading order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: OrderSide,
    pub quantity: u64,
    pub order_type: OrderType,
    pub originating_bar_index: usize,
    pub status: OrderStatus,
    //set when a protective exit created the order rather than a signal
    #[serde(default)]
    pub exit: Option<ExitTrigger>,
}

impl Order {
    //creates a new market order
    pub fn market(id: u64, side: OrderSide, quantity: u64, originating_bar_index: usize) -> Self {
        Order {
            id,
            side,
            quantity,
            order_type: OrderType::MarketOnNextOpen,
            originating_bar_index,
            status: OrderStatus::Pending,
            exit: None,
        }
    }

    //returns the signed quantity (positive for buy, negative for sell)
    pub fn signed_qty(&self) -> i64 {
        signed(self.quantity, self.side)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, OrderStatus::Rejected(_))
    }
}

//represents a filled order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: u64,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    //quoted open of the fill bar, slippage is charged separately
    pub fill_price: f64,
    pub fill_quantity: u64,
    pub commission: f64,
    pub slippage_cost: f64,
}

impl Fill {
    //returns the signed quantity (positive for buy, negative for sell)
    pub fn signed_qty(&self) -> i64 {
        signed(self.fill_quantity, self.side)
    }

    //returns the notional value of the fill
    pub fn notional_value(&self) -> f64 {
        self.fill_price * self.fill_quantity as f64
    }

    //commission plus slippage
    pub fn total_costs(&self) -> f64 {
        self.commission + self.slippage_cost
    }

    //price per unit after slippage, worse than the quote in the trade's direction
    pub fn effective_price(&self) -> f64 {
        if self.fill_quantity == 0 {
            return self.fill_price;
        }
        let per_unit = self.slippage_cost / self.fill_quantity as f64;
        self.fill_price + per_unit * self.side.to_qty_sign() as f64
    }

    //net cash change caused by this fill
    pub fn cash_delta(&self) -> f64 {
        -(self.side.to_qty_sign() as f64) * self.notional_value() - self.total_costs()
    }
}

//outcome of resolving the pending order on a bar
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    Filled(Fill),
    Rejected(Order),
}

//stop loss, take profit and trailing stop levels as fractions of price
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct ProtectiveExits {
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    trailing_stop: Option<f64>,
}

impl ProtectiveExits {
    fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none() && self.trailing_stop.is_none()
    }

    //first rule hit at `close`, with gains and losses measured in the position's favour
    //`best` is the most favourable close since entry
    fn triggered(&self, exposure: Exposure, entry: f64, best: f64, close: f64) -> Option<ExitTrigger> {
        let sign = match exposure {
            Exposure::Long => 1.0,
            Exposure::Short => -1.0,
            Exposure::Flat => return None,
        };
        let gain = sign * (close - entry) / entry;
        let giveback = sign * (best - close) / best;

        if matches!(self.stop_loss, Some(level) if -gain >= level) {
            return Some(ExitTrigger::StopLoss);
        }
        if matches!(self.take_profit, Some(level) if gain >= level) {
            return Some(ExitTrigger::TakeProfit);
        }
        if matches!(self.trailing_stop, Some(level) if giveback >= level) {
            return Some(ExitTrigger::TrailingStop);
        }
        None
    }
}

//turns signal transitions into orders and fills them one bar later
pub struct ExecutionSimulator {
    sizing_rule: SizingRule,
    commission_model: CostModel,
    slippage_model: CostModel,
    direction: Direction,
    allow_margin: bool,
    exits: ProtectiveExits,
    next_order_id: u64,
    next_fill_id: u64,
    //exposure the simulator is holding or working towards
    target: Exposure,
    //most favourable close seen since the current position opened
    best_close: Option<(Exposure, f64)>,
    //at most one order waits for the next bar
    pending: Option<Order>,
    //every resolved order in creation order
    order_log: Vec<Order>,
}

impl ExecutionSimulator {
    pub fn new(config: &BacktestConfig) -> Self {
        ExecutionSimulator {
            sizing_rule: config.sizing_rule,
            commission_model: config.commission_model,
            slippage_model: config.slippage_model,
            direction: config.direction,
            allow_margin: config.allow_margin,
            exits: ProtectiveExits {
                stop_loss: config.stop_loss_pct,
                take_profit: config.take_profit_pct,
                trailing_stop: config.trailing_stop_pct,
            },
            next_order_id: 1,
            next_fill_id: 1,
            target: Exposure::Flat,
            best_close: None,
            pending: None,
            order_log: Vec::new(),
        }
    }

    //maps a signal to the exposure it asks for, none keeps the current one
    fn desired_exposure(&self, signal: Signal) -> Option<Exposure> {
        match signal {
            Signal::Long => Some(Exposure::Long),
            Signal::Short => match self.direction {
                Direction::LongOnly => Some(Exposure::Flat),
                Direction::LongShort => Some(Exposure::Short),
            },
            Signal::Flat => None,
        }
    }

    //signed change needed to move from `current_qty` to the desired exposure
    //none when the sizes involved do not fit a signed position
    fn order_delta(&self, desired: Exposure, current_qty: i64, open_units: Option<u64>) -> Option<i64> {
        let desired_qty = match desired {
            Exposure::Flat => 0,
            Exposure::Long => i64::try_from(open_units?).ok()?,
            Exposure::Short => -i64::try_from(open_units?).ok()?,
        };
        let delta = desired_qty.checked_sub(current_qty)?;
        //i64::MIN has no positive counterpart
        (delta != i64::MIN).then_some(delta)
    }

    fn next_order(&mut self, side: OrderSide, quantity: u64, bar_index: usize) -> Order {
        let order = Order::market(self.next_order_id, side, quantity, bar_index);
        self.next_order_id += 1;
        order
    }

    //parks an order for the next bar, cancelling whatever still waits
    fn park(&mut self, order: Order, target: Exposure) {
        if let Some(mut stale) = self.pending.take() {
            warn!(order_id = stale.id, "cancelling unfilled pending order");
            stale.status = OrderStatus::Cancelled;
            self.order_log.push(stale);
        }

        debug!(
            order_id = order.id,
            bar_index = order.originating_bar_index,
            side = ?order.side,
            quantity = order.quantity,
            exit = ?order.exit,
            "order queued for next bar"
        );
        self.target = target;
        self.pending = Some(order);
    }

    //reacts to the signal decided at the close of `bar_index`
    //sizing uses the ledger valued at `reference_price` (that bar's close)
    //returns the order created, which is pending or already rejected
    pub fn on_signal(
        &mut self,
        signal: Signal,
        bar_index: usize,
        reference_price: f64,
        ledger: &PortfolioLedger,
    ) -> Option<Order> {
        let desired = self.desired_exposure(signal)?;
        if desired == self.target {
            return None;
        }

        let current_qty = ledger.position().quantity;
        let open_units = match desired {
            Exposure::Flat => Some(0),
            Exposure::Long | Exposure::Short => self
                .sizing_rule
                .units(ledger.equity_at(reference_price), reference_price),
        };
        let delta = self.order_delta(desired, current_qty, open_units).unwrap_or(0);

        let side = if delta >= 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let mut order = self.next_order(side, delta.unsigned_abs(), bar_index);

        if order.quantity == 0 {
            order.status = OrderStatus::Rejected(RejectReason::DegenerateQuantity);
            warn!(
                order_id = order.id,
                bar_index,
                ?desired,
                ?open_units,
                "rejecting order with no representable quantity"
            );
            self.order_log.push(order.clone());
            return Some(order);
        }

        self.park(order.clone(), desired);
        Some(order)
    }

    //evaluates the protective exits against the close of `bar.close`
    //the best close only ever includes closes up to and including this bar
    //returns the exit order parked for the next bar, if a rule fired
    pub fn check_exits(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        ledger: &PortfolioLedger,
    ) -> Option<Order> {
        let position = ledger.position();
        let exposure = position.exposure();
        if exposure == Exposure::Flat {
            self.best_close = None;
            return None;
        }

        let entry = position.average_cost;
        let previous = match self.best_close {
            Some((side, best)) if side == exposure => best,
            _ => entry,
        };
        let best = match exposure {
            Exposure::Long => previous.max(bar.close),
            _ => previous.min(bar.close),
        };
        self.best_close = Some((exposure, best));

        //a decision already waiting for the next bar takes precedence
        if self.exits.is_empty() || self.pending.is_some() || entry <= 0.0 {
            return None;
        }

        let trigger = self.exits.triggered(exposure, entry, best, bar.close)?;
        let quantity = position.quantity.unsigned_abs();
        let side = if position.quantity > 0 {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        let mut order = self.next_order(side, quantity, bar_index);
        order.exit = Some(trigger);
        info!(
            order_id = order.id,
            bar_index,
            ?trigger,
            entry,
            best,
            close = bar.close,
            "protective exit triggered"
        );
        self.park(order.clone(), Exposure::Flat);
        Some(order)
    }

    //fills the pending order at this bar's open, or rejects it
    //orders never fill on the bar that created them
    pub fn fill_pending(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        ledger: &PortfolioLedger,
    ) -> Option<ExecutionEvent> {
        match &self.pending {
            Some(order) if bar_index > order.originating_bar_index => {}
            _ => return None,
        }
        let mut order = self.pending.take()?;

        let price = bar.open;
        let commission = self.commission_model.commission(price, order.quantity);
        let slippage_cost = self.slippage_model.slippage(price, order.quantity);
        let notional = price * order.quantity as f64;
        //cash leaving the account, negative when a sale brings cash in
        let outlay = order.side.to_qty_sign() as f64 * notional + commission + slippage_cost;

        if !self.allow_margin && !ledger.can_afford(outlay) {
            order.status = OrderStatus::Rejected(RejectReason::InsufficientFunds {
                required: outlay,
                available: ledger.cash(),
            });
            warn!(
                order_id = order.id,
                bar_index,
                required = outlay,
                available = ledger.cash(),
                "rejecting order for insufficient funds"
            );
            self.target = ledger.position().exposure();
            self.order_log.push(order.clone());
            return Some(ExecutionEvent::Rejected(order));
        }

        let fill = Fill {
            id: self.next_fill_id,
            order_id: order.id,
            bar_index,
            timestamp: bar.timestamp,
            side: order.side,
            fill_price: price,
            fill_quantity: order.quantity,
            commission,
            slippage_cost,
        };
        self.next_fill_id += 1;

        debug!(
            order_id = order.id,
            fill_id = fill.id,
            bar_index,
            price,
            quantity = fill.fill_quantity,
            "order filled"
        );

        let resulting = ledger.position().quantity.saturating_add(order.signed_qty());
        self.target = Exposure::from_quantity(resulting);
        order.status = OrderStatus::Filled;
        self.order_log.push(order);
        Some(ExecutionEvent::Filled(fill))
    }

    pub fn pending_order(&self) -> Option<&Order> {
        self.pending.as_ref()
    }

    pub fn target(&self) -> Exposure {
        self.target
    }

    //returns all resolved orders followed by the unfilled pending one, if any
    pub fn into_orders(mut self) -> Vec<Order> {
        if let Some(order) = self.pending.take() {
            self.order_log.push(order);
        }
        self.order_log
    }

    //resolved orders so far
    pub fn orders(&self) -> &[Order] {
        &self.order_log
    }
}
