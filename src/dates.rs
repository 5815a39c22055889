use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;

use crate::error::{LoanError, LoanResult};

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// December 31 of the year containing `date`.
pub(crate) fn last_day_of_year(date: NaiveDate) -> LoanResult<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).ok_or(LoanError::DateOverflow(date))
}

/// How often a payment is made during a repayment simulation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaymentSchedule {
    Weekly,
    Biweekly,
    SemiMonthly,
    #[default]
    Monthly,
    Quarterly,
    SemiAnnually,
    Annually,
}

impl fmt::Display for PaymentSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentSchedule::Weekly => "weekly",
            PaymentSchedule::Biweekly => "biweekly",
            PaymentSchedule::SemiMonthly => "semi-monthly",
            PaymentSchedule::Monthly => "monthly",
            PaymentSchedule::Quarterly => "quarterly",
            PaymentSchedule::SemiAnnually => "semi-annually",
            PaymentSchedule::Annually => "annually",
        };
        write!(f, "{}", label)
    }
}

impl PaymentSchedule {
    fn months_per_payment(&self) -> Option<u32> {
        match self {
            PaymentSchedule::Monthly => Some(1),
            PaymentSchedule::Quarterly => Some(3),
            PaymentSchedule::SemiAnnually => Some(6),
            PaymentSchedule::Annually => Some(12),
            _ => None,
        }
    }

    /// The payment date that follows `begin_date`.
    pub fn next_payment_date(&self, begin_date: NaiveDate) -> LoanResult<NaiveDate> {
        let day = begin_date.day();
        let mon = begin_date.month();
        let yr = begin_date.year();

        let end_date = match self {
            PaymentSchedule::Weekly => begin_date.checked_add_days(Days::new(7)),
            PaymentSchedule::Biweekly => begin_date.checked_add_days(Days::new(14)),
            // semi-monthly payments are made on the 1st and 15th of each month
            PaymentSchedule::SemiMonthly => {
                if day == 1 {
                    NaiveDate::from_ymd_opt(yr, mon, 15)
                } else if mon == 12 {
                    NaiveDate::from_ymd_opt(yr + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(yr, mon + 1, 1)
                }
            }
            other => other
                .months_per_payment()
                .and_then(|months| begin_date.checked_add_months(Months::new(months))),
        };

        end_date.ok_or(LoanError::DateOverflow(begin_date))
    }
}
