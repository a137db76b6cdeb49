//! Per-timestamp trade signals and period returns.
//!
//! Every period splits in two legs: the `bar` leg carries the move from the
//! previous close into this bar's open, the `gap` leg the intrabar move from
//! open to close. A feed without opens puts the whole close-to-close move on
//! the bar leg. Model signals are valued in {-1, 0, +1}; optimizer weights
//! reuse the same shape with fractional values.

/// Directional signal (or portfolio weight) for one child at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub bar: f64,
    pub gap: f64,
}

impl Signal {
    pub const ZERO: Signal = Signal { bar: 0.0, gap: 0.0 };
}

/// Two-leg period return of a node at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodReturn {
    pub bar: f64,
    pub gap: f64,
}

impl PeriodReturn {
    pub const FLAT: PeriodReturn = PeriodReturn { bar: 0.0, gap: 0.0 };

    /// The scalar close-to-close return over both legs.
    pub fn compounded(&self) -> f64 {
        (1.0 + self.bar) * (1.0 + self.gap) - 1.0
    }
}

/// Sign in {-1, 0, +1}; NaN maps to 0 (neutral).
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
