//! CSV file bar source.
//!
//! One file per symbol (`<symbol>.csv`). The header row decides the feed's
//! schema: `date` and `close` are required, `open`/`high`/`low` optional.
//! Blank numeric fields parse to the missing sentinel, so partial bars
//! round-trip through files.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::bar::{Bar, Schema};
use crate::domain::error::TreefolioError;
use crate::domain::series::{BarFrame, Timestamp};
use crate::ports::data_port::BarSource;

pub struct CsvSource {
    base_path: PathBuf,
}

impl CsvSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

fn parse_timestamp(text: &str) -> Result<Timestamp, TreefolioError> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|e| TreefolioError::DataParse {
            reason: format!("invalid timestamp {text:?}: {e}"),
        })
}

fn parse_field(record: &csv::StringRecord, col: Option<usize>) -> Result<f64, TreefolioError> {
    let Some(col) = col else {
        return Ok(f64::NAN);
    };
    let text = record.get(col).unwrap_or("").trim();
    if text.is_empty() {
        return Ok(f64::NAN);
    }
    text.parse().map_err(|e| TreefolioError::DataParse {
        reason: format!("invalid numeric field {text:?}: {e}"),
    })
}

impl BarSource for CsvSource {
    fn load(&self, symbol: &str) -> Result<BarFrame, TreefolioError> {
        let path = self.csv_path(symbol);
        let mut reader = csv::Reader::from_path(&path)?;

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();
        let date_col = *columns.get("date").ok_or_else(|| TreefolioError::DataParse {
            reason: format!("{}: missing date column", path.display()),
        })?;
        let close_col = *columns
            .get("close")
            .ok_or_else(|| TreefolioError::DataParse {
                reason: format!("{}: missing close column", path.display()),
            })?;
        let open_col = columns.get("open").copied();
        let high_col = columns.get("high").copied();
        let low_col = columns.get("low").copied();

        let schema = Schema {
            open: open_col.is_some(),
            high: high_col.is_some(),
            low: low_col.is_some(),
        };
        let mut frame = BarFrame::new(schema);

        for result in reader.records() {
            let record = result?;
            let ts = parse_timestamp(record.get(date_col).unwrap_or("").trim())?;
            let bar = Bar {
                open: parse_field(&record, open_col)?,
                high: parse_field(&record, high_col)?,
                low: parse_field(&record, low_col)?,
                close: parse_field(&record, Some(close_col))?,
            };
            frame.upsert(ts, bar);
        }
        Ok(frame)
    }

    fn symbols(&self) -> Result<Vec<String>, TreefolioError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(content: &str) -> (TempDir, CsvSource) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("DOW.csv"), content).unwrap();
        let source = CsvSource::new(dir.path().to_path_buf());
        (dir, source)
    }

    #[test]
    fn loads_ohlc_frame() {
        let (_dir, source) = setup(
            "date,open,high,low,close\n\
             2024-01-15,100.0,110.0,90.0,105.0\n\
             2024-01-16,105.0,115.0,100.0,110.0\n",
        );
        let frame = source.load("DOW").unwrap();
        assert_eq!(frame.schema(), Schema::OHLC);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.series().values()[0].close, 105.0);
        assert_eq!(frame.series().values()[1].open, 105.0);
    }

    #[test]
    fn close_only_header_gives_close_only_schema() {
        let (_dir, source) = setup("date,close\n2024-01-15,105.0\n");
        let frame = source.load("DOW").unwrap();
        assert_eq!(frame.schema(), Schema::CLOSE_ONLY);
        assert!(frame.series().values()[0].open.is_nan());
    }

    #[test]
    fn blank_close_loads_as_partial_bar() {
        let (_dir, source) = setup(
            "date,open,close\n\
             2024-01-15,100.0,\n",
        );
        let frame = source.load("DOW").unwrap();
        let bar = frame.series().values()[0];
        assert_eq!(bar.open, 100.0);
        assert!(bar.close.is_nan());
        assert!(bar.is_partial(frame.schema()));
    }

    #[test]
    fn intraday_timestamps_parse() {
        let (_dir, source) = setup("date,close\n2024-01-15 14:30:00,105.0\n");
        let frame = source.load("DOW").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(frame.series().stamps()[0], expected);
    }

    #[test]
    fn missing_close_column_fails() {
        let (_dir, source) = setup("date,open\n2024-01-15,100.0\n");
        let err = source.load("DOW").unwrap_err();
        assert!(matches!(err, TreefolioError::DataParse { .. }));
    }

    #[test]
    fn bad_number_fails() {
        let (_dir, source) = setup("date,close\n2024-01-15,abc\n");
        let err = source.load("DOW").unwrap_err();
        assert!(matches!(err, TreefolioError::DataParse { .. }));
    }

    #[test]
    fn missing_file_fails() {
        let (_dir, source) = setup("date,close\n");
        assert!(source.load("SPX").is_err());
    }

    #[test]
    fn symbols_lists_csv_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("DOW.csv"), "date,close\n").unwrap();
        fs::write(dir.path().join("SPX.csv"), "date,close\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let source = CsvSource::new(dir.path().to_path_buf());
        assert_eq!(source.symbols().unwrap(), vec!["DOW", "SPX"]);
    }
}
