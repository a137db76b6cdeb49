//! Ordered, timestamp-indexed series and the raw bar frame.
//!
//! `Series<T>` is the one container the whole engine is built on: strictly
//! increasing timestamps, no duplicates, upsert-by-timestamp. `BarFrame`
//! pairs a bar series with its declared [`Schema`] and carries the merge
//! semantics for incoming market data, including partial-bar correction.

use chrono::NaiveDateTime;

use super::bar::{Bar, Schema};
use super::error::TreefolioError;

pub type Timestamp = NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    stamps: Vec<Timestamp>,
    values: Vec<T>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Series<T> {
    pub fn new() -> Self {
        Series {
            stamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn stamps(&self) -> &[Timestamp] {
        &self.stamps
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn at(&self, pos: usize) -> (Timestamp, &T) {
        (self.stamps[pos], &self.values[pos])
    }

    pub fn last(&self) -> Option<(Timestamp, &T)> {
        self.stamps.last().map(|ts| (*ts, &self.values[self.len() - 1]))
    }

    pub fn get(&self, ts: Timestamp) -> Option<&T> {
        self.position(ts).map(|pos| &self.values[pos])
    }

    /// Exact position of `ts`, if present.
    pub fn position(&self, ts: Timestamp) -> Option<usize> {
        self.stamps.binary_search(&ts).ok()
    }

    /// Position of the first entry with timestamp >= `ts`.
    pub fn lower_bound(&self, ts: Timestamp) -> usize {
        self.stamps.partition_point(|s| *s < ts)
    }

    /// Insert or replace the value at `ts`, keeping sort order. Returns the
    /// position of the affected entry.
    pub fn upsert(&mut self, ts: Timestamp, value: T) -> usize {
        match self.stamps.binary_search(&ts) {
            Ok(pos) => {
                self.values[pos] = value;
                pos
            }
            Err(pos) => {
                self.stamps.insert(pos, ts);
                self.values.insert(pos, value);
                pos
            }
        }
    }

    /// Drop every entry at position >= `pos`.
    pub fn truncate(&mut self, pos: usize) {
        self.stamps.truncate(pos);
        self.values.truncate(pos);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &T)> {
        self.stamps.iter().copied().zip(self.values.iter())
    }
}

/// A schema-tagged bar series: the unit of raw market data.
#[derive(Debug, Clone, PartialEq)]
pub struct BarFrame {
    schema: Schema,
    series: Series<Bar>,
}

impl BarFrame {
    pub fn new(schema: Schema) -> Self {
        BarFrame {
            schema,
            series: Series::new(),
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn series(&self) -> &Series<Bar> {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn upsert(&mut self, ts: Timestamp, bar: Bar) -> usize {
        self.series.upsert(ts, bar)
    }

    pub fn truncate(&mut self, pos: usize) {
        self.series.truncate(pos)
    }

    /// Upsert every row of `incoming` into this frame: rows at new timestamps
    /// are inserted in order, rows at existing timestamps replace the whole
    /// stored row. A partial bar overwritten later by its complete version is
    /// indistinguishable from having received the complete bar directly.
    ///
    /// Returns the earliest affected timestamp, or `None` when `incoming` is
    /// empty.
    pub fn merge(&mut self, incoming: &BarFrame) -> Result<Option<Timestamp>, TreefolioError> {
        if incoming.schema != self.schema {
            return Err(TreefolioError::SchemaMismatch {
                existing: self.schema.describe(),
                incoming: incoming.schema.describe(),
            });
        }
        let mut earliest: Option<Timestamp> = None;
        for (ts, bar) in incoming.series.iter() {
            self.series.upsert(ts, *bar);
            earliest = Some(match earliest {
                Some(e) if e <= ts => e,
                _ => ts,
            });
        }
        Ok(earliest)
    }
}
