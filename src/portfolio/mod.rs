pub mod ledger;
pub mod position;

pub use ledger::{LedgerError, PortfolioLedger, PortfolioSnapshot};
pub use position::{ClosedTrade, Exposure, Position};
