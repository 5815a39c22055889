//! Loan repayment projection.
//!
//! Models interest accruing on a set of loans, splits a periodic payment across them
//! under several repayment strategies, and simulates payments until every loan is paid off.

pub mod bundle;
pub mod dates;
pub mod error;
pub mod loan;
pub mod money;
pub mod payment;
pub mod strategy;

pub use bundle::{EstimatedRepaymentModel, LoanBundle, SimulationConfig};
pub use dates::PaymentSchedule;
pub use error::{LoanError, LoanResult};
pub use loan::{Loan, LoanId, LoanIdSequence};
pub use money::{Money, Rate};
pub use payment::Payment;
pub use strategy::{Allocation, EqualSplit, RepaymentStrategy};
