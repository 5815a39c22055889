use chrono::NaiveDate;
use thiserror::Error;

use crate::loan::LoanId;
use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoanError {
    #[error("cannot {operation} loan {loan} as of {requested}: its balance is effective {effective}")]
    TemporalOrder {
        loan: LoanId,
        operation: &'static str,
        effective: NaiveDate,
        requested: NaiveDate,
    },

    #[error("{strategy} repayment did not converge after {payments} payments (${remaining:.2} still owed)")]
    DidNotConverge {
        strategy: String,
        payments: u32,
        remaining: Money,
    },

    #[error("date arithmetic overflowed from {0}")]
    DateOverflow(NaiveDate),

    #[error("loan id sequence is exhausted")]
    IdsExhausted,

    #[error("invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

pub type LoanResult<T> = Result<T, LoanError>;
