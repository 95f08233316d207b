use serde::{Deserialize, Serialize};
use std::fmt;

/// A monetary amount in the smallest currency unit (e.g. cents). Arithmetic
/// only ever touches this integer; no float ever represents money anywhere
/// in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn zero() -> Self {
        Money(0)
    }

    pub fn smallest_units(&self) -> i64 {
        self.0
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl fmt::Display for Money {
    /// Major-unit rendering for logs only; never used in comparisons.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}
