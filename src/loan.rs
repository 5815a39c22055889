use chrono::{Datelike, NaiveDate};
use log::{debug, trace};
use rust_decimal::Decimal;
use std::fmt;

use crate::dates::{days_in_year, last_day_of_year};
use crate::error::{LoanError, LoanResult};
use crate::money::{round_cents, Money, Rate};
use crate::payment::Payment;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanId(u32);

impl LoanId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out loan ids in increasing order.
///
/// There is no process-wide counter: every caller that builds a loan set owns a sequence,
/// so separate runs (and separate tests) never share or leak ids.
#[derive(Debug, Default)]
pub struct LoanIdSequence {
    next: u32,
}

impl LoanIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> LoanResult<LoanId> {
        let id = LoanId(self.next);
        self.next = self.next.checked_add(1).ok_or(LoanError::IdsExhausted)?;
        Ok(id)
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// A snapshot of an interest-bearing loan.
///
/// Snapshots are never changed in place. Projecting, paying or resetting the balance
/// returns a new snapshot that keeps the same id, and the effective date of a lineage
/// never moves backward.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loan {
    id: LoanId,
    name: String,
    principal: Money,
    accrued_interest: Money,
    interest_rate: Rate,
    minimum_payment: Money,
    principal_effective_date: NaiveDate,
}

impl Loan {
    pub fn new(
        ids: &mut LoanIdSequence,
        name: impl Into<String>,
        principal: Money,
        interest_rate: Rate,
        minimum_payment: Money,
        principal_effective_date: NaiveDate,
    ) -> LoanResult<Self> {
        non_negative("principal", principal)?;
        non_negative("interest_rate", interest_rate)?;
        non_negative("minimum_payment", minimum_payment)?;

        Ok(Self {
            id: ids.next_id()?,
            name: name.into(),
            principal,
            accrued_interest: Decimal::ZERO,
            interest_rate,
            minimum_payment,
            principal_effective_date,
        })
    }

    pub fn id(&self) -> LoanId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Balance excluding accrued interest.
    pub fn principal(&self) -> Money {
        self.principal
    }

    pub fn accrued_interest(&self) -> Money {
        self.accrued_interest
    }

    pub fn interest_rate(&self) -> Rate {
        self.interest_rate
    }

    /// The configured monthly floor, regardless of what is owed.
    pub fn minimum_payment(&self) -> Money {
        self.minimum_payment
    }

    pub fn principal_effective_date(&self) -> NaiveDate {
        self.principal_effective_date
    }

    pub fn total_owed(&self) -> Money {
        self.principal + self.accrued_interest
    }

    /// The minimum payment, but never more than is owed.
    pub fn effective_minimum_payment(&self) -> Money {
        self.minimum_payment.min(self.total_owed())
    }

    /// Interest accruing per day on the principal, using the day count of the
    /// effective date's year.
    pub fn daily_interest_rate(&self) -> Money {
        self.daily_rate_in(self.principal_effective_date.year())
    }

    fn daily_rate_in(&self, year: i32) -> Money {
        self.principal * self.interest_rate / Decimal::from(days_in_year(year))
    }

    /// Unrounded interest accrued on the principal between the effective date and `as_of`.
    ///
    /// The interval is split by calendar year. The partial first and last years accrue
    /// day by day at their own year's day count. The first year is counted up to December
    /// 31 and the last from January 1, so a span that crosses New Year accrues one day
    /// fewer than its length. Each whole year in between accrues one flat year of simple
    /// interest (`principal * interest_rate`); interest is never charged on accrued interest.
    pub fn calculate_interest(&self, as_of: NaiveDate) -> LoanResult<Money> {
        self.check_not_before("accrue interest on", as_of)?;

        let start = self.principal_effective_date;
        if start.year() == as_of.year() {
            let days = as_of.signed_duration_since(start).num_days();
            return Ok(self.daily_rate_in(start.year()) * Decimal::from(days));
        }

        let first_year_end = last_day_of_year(start)?;
        let first_days = first_year_end.signed_duration_since(start).num_days();
        let mut interest = self.daily_rate_in(start.year()) * Decimal::from(first_days);

        let whole_years = as_of.year() - start.year() - 1;
        interest += self.principal * self.interest_rate * Decimal::from(whole_years);

        let last_year_start =
            NaiveDate::from_ymd_opt(as_of.year(), 1, 1).ok_or(LoanError::DateOverflow(as_of))?;
        let last_days = as_of.signed_duration_since(last_year_start).num_days();
        interest += self.daily_rate_in(as_of.year()) * Decimal::from(last_days);

        trace!(
            "loan {}: {} days + {} whole years + {} days of interest to {} = {}",
            self.id,
            first_days,
            whole_years,
            last_days,
            as_of,
            interest
        );
        Ok(interest)
    }

    /// Accrue interest up to `as_of` with no payment activity.
    pub fn project_forward(&self, as_of: NaiveDate) -> LoanResult<Loan> {
        self.check_not_before("project", as_of)?;
        if as_of == self.principal_effective_date {
            return Ok(self.clone());
        }

        let interest = round_cents(self.calculate_interest(as_of)?);
        debug!(
            "loan {} projected {} -> {}, interest ${}",
            self.id, self.principal_effective_date, as_of, interest
        );

        Ok(Loan {
            accrued_interest: self.accrued_interest + interest,
            principal_effective_date: as_of,
            ..self.clone()
        })
    }

    /// Apply a payment to accrued interest first and the remainder to principal.
    ///
    /// No interest is accrued here and the amount is not capped: callers project the loan
    /// to the payment date beforehand and never pay more than `total_owed`.
    pub fn make_payment(&self, payment: &Payment) -> LoanResult<Loan> {
        self.check_not_before("pay", payment.paid_on)?;

        let interest_reduction = payment.amount.min(self.accrued_interest);
        let principal_reduction = payment.amount - interest_reduction;
        debug!(
            "loan {} paid ${} on {}: ${} interest, ${} principal",
            self.id, payment.amount, payment.paid_on, interest_reduction, principal_reduction
        );

        Ok(Loan {
            principal: self.principal - principal_reduction,
            accrued_interest: self.accrued_interest - interest_reduction,
            principal_effective_date: payment.paid_on,
            ..self.clone()
        })
    }

    /// Replace the balance with known figures as of `as_of`, e.g. from a lender statement.
    pub fn set_balance(
        &self,
        principal: Money,
        accrued_interest: Money,
        as_of: NaiveDate,
    ) -> LoanResult<Loan> {
        self.check_not_before("set the balance of", as_of)?;
        non_negative("principal", principal)?;
        non_negative("accrued_interest", accrued_interest)?;

        Ok(Loan {
            principal,
            accrued_interest,
            principal_effective_date: as_of,
            ..self.clone()
        })
    }

    fn check_not_before(&self, operation: &'static str, requested: NaiveDate) -> LoanResult<()> {
        if requested < self.principal_effective_date {
            Err(LoanError::TemporalOrder {
                loan: self.id,
                operation,
                effective: self.principal_effective_date,
                requested,
            })
        } else {
            Ok(())
        }
    }
}

fn non_negative(field: &str, value: Decimal) -> LoanResult<()> {
    if value < Decimal::ZERO {
        Err(LoanError::InvalidInput {
            field: field.to_string(),
            reason: format!("must not be negative, got {}", value),
        })
    } else {
        Ok(())
    }
}

impl fmt::Display for Loan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loan {} ({}), principal ${:.2}, accrued interest ${:.2}, rate {:.3}%, minimum ${:.2}, as of {}",
            self.id,
            self.name,
            self.principal,
            self.accrued_interest,
            self.interest_rate * Decimal::ONE_HUNDRED,
            self.minimum_payment,
            self.principal_effective_date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Loan, LoanIdSequence};
    use crate::error::LoanError;
    use crate::payment::Payment;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use test_log::test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn basic_loan(ids: &mut LoanIdSequence) -> Loan {
        Loan::new(ids, "Visa", dec!(1000.00), dec!(0.05), dec!(25), date(2021, 1, 1)).unwrap()
    }

    fn no_minimum(
        ids: &mut LoanIdSequence,
        principal: Decimal,
        rate: Decimal,
        from: NaiveDate,
    ) -> Loan {
        Loan::new(ids, "test", principal, rate, dec!(0), from).unwrap()
    }

    #[test]
    fn test_id_sequence() {
        let mut ids = LoanIdSequence::new();
        let first = basic_loan(&mut ids);
        let second = basic_loan(&mut ids);
        assert_eq!(first.id().value(), 0);
        assert_eq!(second.id().value(), 1);

        // an independent sequence starts over
        let mut other = LoanIdSequence::new();
        assert_eq!(basic_loan(&mut other).id().value(), 0);

        ids.reset();
        assert_eq!(basic_loan(&mut ids).id(), first.id());
    }

    #[test]
    fn test_id_sequence_exhausted() {
        let mut ids = LoanIdSequence { next: u32::MAX - 1 };
        assert_eq!(ids.next_id().unwrap().value(), u32::MAX - 1);
        assert_eq!(ids.next_id(), Err(LoanError::IdsExhausted));

        let result = Loan::new(&mut ids, "Visa", dec!(1), dec!(0.05), dec!(0), date(2021, 1, 1));
        assert_eq!(result, Err(LoanError::IdsExhausted));
    }

    #[test]
    fn test_new_rejects_negative_figures() {
        let mut ids = LoanIdSequence::new();
        let result = Loan::new(&mut ids, "bad", dec!(-1), dec!(0.05), dec!(0), date(2021, 1, 1));
        assert!(matches!(
            result,
            Err(LoanError::InvalidInput { ref field, .. }) if field == "principal"
        ));
        let result = Loan::new(&mut ids, "bad", dec!(1), dec!(-0.05), dec!(0), date(2021, 1, 1));
        assert!(result.is_err());

        // rejected loans do not consume an id
        assert_eq!(basic_loan(&mut ids).id().value(), 0);
    }

    #[test]
    fn test_project_forward_single_year() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);

        // 1000 * 0.05 / 365 * 30 = 4.1096
        let projected = loan.project_forward(date(2021, 1, 31)).unwrap();
        assert_eq!(projected.accrued_interest(), dec!(4.11));
        assert_eq!(projected.principal(), dec!(1000.00));
        assert_eq!(projected.principal_effective_date(), date(2021, 1, 31));
        assert_eq!(projected.id(), loan.id());
        assert_eq!(projected.total_owed(), dec!(1004.11));
    }

    #[test]
    fn test_project_forward_identity() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);
        assert_eq!(loan.project_forward(loan.principal_effective_date()).unwrap(), loan);
    }

    #[test]
    fn test_project_backward_fails() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);
        assert_eq!(
            loan.project_forward(date(2020, 12, 31)),
            Err(LoanError::TemporalOrder {
                loan: loan.id(),
                operation: "project",
                effective: date(2021, 1, 1),
                requested: date(2020, 12, 31),
            })
        );
        assert!(loan.calculate_interest(date(2020, 12, 31)).is_err());
    }

    #[test]
    fn test_leap_year_day_count() {
        let mut ids = LoanIdSequence::new();
        // exactly $1.00 a day in both years
        let leap = no_minimum(&mut ids, dec!(3660), dec!(0.10), date(2016, 1, 1));
        let common = no_minimum(&mut ids, dec!(3650), dec!(0.10), date(2017, 1, 1));

        assert_eq!(leap.daily_interest_rate(), dec!(1));
        assert_eq!(common.daily_interest_rate(), dec!(1));
        assert_eq!(leap.calculate_interest(date(2016, 1, 11)).unwrap(), dec!(10));
        assert_eq!(common.calculate_interest(date(2017, 1, 11)).unwrap(), dec!(10));
        assert_eq!(leap.calculate_interest(date(2016, 3, 1)).unwrap(), dec!(60));
        assert_eq!(common.calculate_interest(date(2017, 3, 1)).unwrap(), dec!(59));
    }

    #[test]
    fn test_interest_across_year_end() {
        let mut ids = LoanIdSequence::new();
        let loan = no_minimum(&mut ids, dec!(1000), dec!(0.05), date(2021, 12, 17));

        // 14 days to December 31 and 15 from January 1: the 30-day span accrues 29 days
        let projected = loan.project_forward(date(2022, 1, 16)).unwrap();
        assert_eq!(projected.accrued_interest(), dec!(3.97));

        // January 1 itself adds nothing to the 14 days of the old year
        let interest = loan.calculate_interest(date(2022, 1, 1)).unwrap();
        assert_eq!(interest.round_dp(2), dec!(1.92));
        assert_eq!(interest, loan.calculate_interest(date(2021, 12, 31)).unwrap());

        // 14 days at 365 + 15 days at 366 = 3.9670
        let loan = no_minimum(&mut ids, dec!(1000), dec!(0.05), date(2023, 12, 17));
        let projected = loan.project_forward(date(2024, 1, 16)).unwrap();
        assert_eq!(projected.accrued_interest(), dec!(3.97));
    }

    #[test]
    fn test_interest_whole_years_are_simple() {
        let mut ids = LoanIdSequence::new();
        let loan = no_minimum(&mut ids, dec!(1000), dec!(0.10), date(2019, 7, 1));

        // 183 days of 2019 + all of 2020 flat + 59 days of 2021
        let interest = loan.calculate_interest(date(2021, 3, 1)).unwrap();
        assert_eq!(interest.round_dp(2), dec!(166.30));

        // 364 days of 2018 + 2019 and 2020 flat
        let loan = no_minimum(&mut ids, dec!(1000), dec!(0.10), date(2018, 1, 1));
        let interest = loan.calculate_interest(date(2021, 1, 1)).unwrap();
        assert_eq!(interest.round_dp(2), dec!(299.73));
    }

    #[test]
    fn test_interest_is_monotonic() {
        let mut ids = LoanIdSequence::new();
        let loan = no_minimum(&mut ids, dec!(12345.67), dec!(0.068), date(2019, 11, 20));

        let mut previous = Decimal::ZERO;
        let mut as_of = loan.principal_effective_date();
        while as_of < date(2023, 3, 1) {
            let interest = loan.calculate_interest(as_of).unwrap();
            assert!(interest >= previous, "interest fell at {}", as_of);
            previous = interest;
            as_of = as_of.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_make_payment_interest_first() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids).project_forward(date(2021, 1, 31)).unwrap();

        let small = loan.make_payment(&Payment::new(dec!(3), date(2021, 1, 31))).unwrap();
        assert_eq!(small.accrued_interest(), dec!(1.11));
        assert_eq!(small.principal(), dec!(1000.00));

        let large = loan.make_payment(&Payment::new(dec!(50), date(2021, 1, 31))).unwrap();
        assert_eq!(large.accrued_interest(), dec!(0));
        assert_eq!(large.principal(), dec!(954.11));
        assert_eq!(large.total_owed(), loan.total_owed() - dec!(50));

        let payoff = loan
            .make_payment(&Payment::new(loan.total_owed(), date(2021, 1, 31)))
            .unwrap();
        assert_eq!(payoff.total_owed(), Decimal::ZERO);
    }

    #[test]
    fn test_make_payment_moves_effective_date_without_accrual() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);

        let paid = loan.make_payment(&Payment::new(dec!(100), date(2021, 2, 1))).unwrap();
        assert_eq!(paid.principal_effective_date(), date(2021, 2, 1));
        assert_eq!(paid.total_owed(), dec!(900.00));

        assert!(matches!(
            paid.make_payment(&Payment::new(dec!(1), date(2021, 1, 15))),
            Err(LoanError::TemporalOrder { operation: "pay", .. })
        ));
    }

    #[test]
    fn test_set_balance() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);

        let reset = loan.set_balance(dec!(800), dec!(2.50), date(2021, 6, 1)).unwrap();
        assert_eq!(reset.principal(), dec!(800));
        assert_eq!(reset.accrued_interest(), dec!(2.50));
        assert_eq!(reset.principal_effective_date(), date(2021, 6, 1));
        assert_eq!(reset.minimum_payment(), loan.minimum_payment());

        assert!(reset.set_balance(dec!(800), dec!(0), date(2021, 5, 1)).is_err());
        assert!(reset.set_balance(dec!(-1), dec!(0), date(2021, 7, 1)).is_err());
    }

    #[test]
    fn test_effective_minimum_payment() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids);
        assert_eq!(loan.effective_minimum_payment(), dec!(25));

        let nearly_paid = loan.set_balance(dec!(9.50), dec!(0.50), date(2021, 2, 1)).unwrap();
        assert_eq!(nearly_paid.effective_minimum_payment(), dec!(10.00));

        let paid = loan.set_balance(dec!(0), dec!(0), date(2021, 2, 1)).unwrap();
        assert_eq!(paid.effective_minimum_payment(), Decimal::ZERO);
    }

    #[test]
    fn test_display() {
        let mut ids = LoanIdSequence::new();
        let loan = basic_loan(&mut ids).project_forward(date(2021, 1, 31)).unwrap();
        assert_eq!(
            loan.to_string(),
            "loan 0 (Visa), principal $1000.00, accrued interest $4.11, rate 5.000%, minimum $25.00, as of 2021-01-31"
        );
    }
}
