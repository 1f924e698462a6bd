pub mod bar;
pub mod loader;
pub mod series;

pub use bar::{Bar, BarError};
pub use loader::load_csv;
pub use series::{BarSeries, DataError};
