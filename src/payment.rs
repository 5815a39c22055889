use chrono::NaiveDate;
use std::fmt;

use crate::money::Money;

/// An amount paid into a single loan on a given date.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Payment {
    pub amount: Money,
    pub paid_on: NaiveDate,
}

impl Payment {
    pub fn new(amount: Money, paid_on: NaiveDate) -> Self {
        Self { amount, paid_on }
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payment ${:.2} on {}", self.amount, self.paid_on)
    }
}
