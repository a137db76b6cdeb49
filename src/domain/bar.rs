//! Bar representation and feed schemas.
//!
//! A bar field holding `f64::NAN` is the explicit missing-value sentinel: a
//! *partial* bar is an intrabar snapshot whose final print has not arrived
//! yet. Partial bars are first-class data, not errors; a later complete bar
//! at the same timestamp overwrites the whole row.

/// One timestamped record of market data. Fields not declared by the feed's
/// [`Schema`], or not yet printed, hold `f64::NAN`.
#[derive(Debug, Clone, Copy)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Field equality under the missing-value sentinel: NaN equals NaN.
fn field_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for Bar {
    fn eq(&self, other: &Self) -> bool {
        field_eq(self.open, other.open)
            && field_eq(self.high, other.high)
            && field_eq(self.low, other.low)
            && field_eq(self.close, other.close)
    }
}

impl Bar {
    pub fn ohlc(open: f64, high: f64, low: f64, close: f64) -> Self {
        Bar {
            open,
            high,
            low,
            close,
        }
    }

    /// A bar from a close-only feed.
    pub fn close_only(close: f64) -> Self {
        Bar {
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close,
        }
    }

    /// A bar from an open/close feed.
    pub fn open_close(open: f64, close: f64) -> Self {
        Bar {
            open,
            high: f64::NAN,
            low: f64::NAN,
            close,
        }
    }

    /// True when any field the schema declares is still missing.
    pub fn is_partial(&self, schema: Schema) -> bool {
        (schema.open && self.open.is_nan())
            || (schema.high && self.high.is_nan())
            || (schema.low && self.low.is_nan())
            || self.close.is_nan()
    }
}

/// The set of fields a feed declares. Close is always declared; merging
/// frames with different schemas is a hard error, not a coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub open: bool,
    pub high: bool,
    pub low: bool,
}

impl Schema {
    pub const OHLC: Schema = Schema {
        open: true,
        high: true,
        low: true,
    };

    pub const OPEN_CLOSE: Schema = Schema {
        open: true,
        high: false,
        low: false,
    };

    pub const CLOSE_ONLY: Schema = Schema {
        open: false,
        high: false,
        low: false,
    };

    /// Field list for error messages, e.g. "open,high,low,close".
    pub fn describe(&self) -> String {
        let mut fields = Vec::new();
        if self.open {
            fields.push("open");
        }
        if self.high {
            fields.push("high");
        }
        if self.low {
            fields.push("low");
        }
        fields.push("close");
        fields.join(",")
    }
}
