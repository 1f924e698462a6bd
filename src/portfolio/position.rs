use crate::engine::execution::Fill;
use serde::{Deserialize, Serialize};

//direction of a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposure {
    Long,
    Short,
    Flat,
}

impl Exposure {
    pub fn from_quantity(quantity: i64) -> Self {
        match quantity {
            q if q > 0 => Exposure::Long,
            q if q < 0 => Exposure::Short,
            _ => Exposure::Flat,
        }
    }
}

//realized result of a fill that reduced or reversed the position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub fill_id: u64,
    pub bar_index: usize,
    //side of the position that was closed
    pub closed: Exposure,
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    //price move only
    pub gross_pnl: f64,
    //after the entry costs attributed to the closed units and this fill's share of costs
    pub net_pnl: f64,
}

//the single instrument holding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    //net quantity (positive for long, negative for short, 0 for flat)
    pub quantity: i64,

    //weighted average entry price of the open quantity
    pub average_cost: f64,

    //gross pnl from closed units
    pub realized_pnl: f64,

    //commission and slippage paid to open the units still held
    pub open_costs: f64,
}

impl Position {
    //creates a new flat position
    pub fn new() -> Self {
        Position::default()
    }

    //signed market value at a given price
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    //calculates unrealized pnl at a given price
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.quantity == 0 {
            return 0.0;
        }
        (price - self.average_cost) * self.quantity as f64
    }

    pub fn exposure(&self) -> Exposure {
        Exposure::from_quantity(self.quantity)
    }

    //returns true if the position is flat (no open position)
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    //updates position with a new fill
    //returns the closed trade if the fill reduced or reversed the position
    pub fn update_with_fill(&mut self, fill: &Fill) -> Option<ClosedTrade> {
        let fill_qty = fill.signed_qty();
        let fill_costs = fill.total_costs();
        let price = fill.fill_price;

        if fill_qty == 0 {
            return None;
        }

        //if position is flat, just establish new position
        if self.quantity == 0 {
            self.quantity = fill_qty;
            self.average_cost = price;
            self.open_costs = fill_costs;
            return None;
        }

        let same_direction = (self.quantity > 0) == (fill_qty > 0);

        if same_direction {
            //adding to position - update average entry price
            let held = self.quantity.unsigned_abs() as f64;
            let added = fill_qty.unsigned_abs() as f64;
            self.average_cost = (self.average_cost * held + price * added) / (held + added);
            //sized orders stay within i64, this only guards hand-built fills
            self.quantity = self.quantity.saturating_add(fill_qty);
            self.open_costs += fill_costs;
            return None;
        }

        //reducing or reversing position
        let held = self.quantity.unsigned_abs();
        let traded = fill_qty.unsigned_abs();
        let close_qty = traded.min(held);
        let closed = self.exposure();

        let price_diff = match closed {
            Exposure::Long => price - self.average_cost,
            _ => self.average_cost - price,
        };
        let gross_pnl = price_diff * close_qty as f64;
        let entry_costs = self.open_costs * close_qty as f64 / held as f64;
        let exit_costs = fill_costs * close_qty as f64 / traded as f64;

        let trade = ClosedTrade {
            fill_id: fill.id,
            bar_index: fill.bar_index,
            closed,
            quantity: close_qty,
            entry_price: self.average_cost,
            exit_price: price,
            gross_pnl,
            net_pnl: gross_pnl - entry_costs - exit_costs,
        };

        self.realized_pnl += gross_pnl;
        self.open_costs -= entry_costs;
        self.quantity += fill_qty;

        if self.quantity == 0 {
            //if flat, reset entry price
            self.average_cost = 0.0;
            self.open_costs = 0.0;
        } else if traded > held {
            //reversed, the remainder opens at the fill price
            self.average_cost = price;
            self.open_costs = fill_costs - exit_costs;
        }

        Some(trade)
    }
}
