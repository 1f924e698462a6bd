use crate::data::bar::Bar;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    dividends: Option<f64>,
    #[serde(default)]
    split_ratio: Option<f64>,
}

//parses an rfc3339 timestamp or a plain yyyy-mm-dd date (taken as midnight utc)
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .context(format!("Unrecognized timestamp '{}'", raw))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context(format!("Invalid date '{}'", raw))?;

    Ok(midnight.and_utc())
}

//loads bars from a csv file in file order
//ordering and field validity are checked by BarSeries, not here
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let record: CsvRecord =
            result.context(format!("Failed to parse CSV record at line {}", index + 2))?;

        let timestamp = parse_timestamp(&record.timestamp)
            .context(format!("Bad timestamp at line {}", index + 2))?;

        let mut bar = Bar::new_unchecked(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        );
        bar.dividends = record.dividends;
        bar.split_ratio = record.split_ratio;

        bars.push(bar);
    }

    Ok(bars)
}
