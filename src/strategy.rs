use chrono::NaiveDate;
use log::{debug, trace};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::LoanResult;
use crate::loan::{Loan, LoanId};
use crate::money::{floor_cents, Money};
use crate::payment::Payment;

/// Which loans the Equal strategy divides the payment between.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EqualSplit {
    /// Only loans that still have a balance.
    #[default]
    Outstanding,
    /// Every loan in the set. Paid-off loans still receive nothing, so their share goes unused.
    AllLoans,
}

/// A policy for splitting one payment across several loans.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepaymentStrategy {
    /// The same amount to every loan.
    Equal(EqualSplit),
    /// Only the minimum payment on each loan.
    MinimumOnly,
    /// Minimums, then everything left to the highest interest rate first.
    Avalanche,
    /// Minimums, then everything left to the smallest balance first.
    Snowball,
    /// In proportion to the interest each loan accrues per day.
    Proportional,
}

impl fmt::Display for RepaymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of splitting a payment.
#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Allocation {
    /// One payment per input loan, zero for loans with nothing owed.
    pub payments: BTreeMap<LoanId, Payment>,
    /// How far the payment fell short of the minimums it had to cover.
    pub shortfall: Money,
}

impl Allocation {
    pub fn total(&self) -> Money {
        self.payments.values().map(|p| p.amount).sum()
    }

    pub fn amount_for(&self, id: LoanId) -> Money {
        self.payments
            .get(&id)
            .map(|p| p.amount)
            .unwrap_or(Decimal::ZERO)
    }
}

impl RepaymentStrategy {
    pub const ALL: [RepaymentStrategy; 5] = [
        RepaymentStrategy::Equal(EqualSplit::Outstanding),
        RepaymentStrategy::MinimumOnly,
        RepaymentStrategy::Avalanche,
        RepaymentStrategy::Snowball,
        RepaymentStrategy::Proportional,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RepaymentStrategy::Equal(EqualSplit::Outstanding) => "Equal",
            RepaymentStrategy::Equal(EqualSplit::AllLoans) => "Equal (all loans)",
            RepaymentStrategy::MinimumOnly => "Minimum Only",
            RepaymentStrategy::Avalanche => "Avalanche",
            RepaymentStrategy::Snowball => "Snowball",
            RepaymentStrategy::Proportional => "Proportional",
        }
    }

    /// Split `total_payment` across `loans`, paying on `payment_date`.
    ///
    /// Loans are projected to `payment_date` first, so the result accounts for interest
    /// accrued up to that day. No loan is ever allocated more than it owes. Fails only if
    /// a loan is effective after `payment_date`.
    pub fn allocate(
        &self,
        loans: &[Loan],
        total_payment: Money,
        payment_date: NaiveDate,
    ) -> LoanResult<Allocation> {
        let projected = loans
            .iter()
            .map(|loan| loan.project_forward(payment_date))
            .collect::<LoanResult<Vec<_>>>()?;
        let total_payment = total_payment.max(Decimal::ZERO);

        let (amounts, shortfall) = match self {
            RepaymentStrategy::Equal(split) => {
                (equal(&projected, total_payment, *split), Decimal::ZERO)
            }
            RepaymentStrategy::MinimumOnly => minimum_only(&projected, total_payment),
            RepaymentStrategy::Avalanche => {
                let mut ordered: Vec<&Loan> = projected.iter().collect();
                ordered.sort_by(|a, b| {
                    b.interest_rate()
                        .cmp(&a.interest_rate())
                        .then_with(|| b.principal().cmp(&a.principal()))
                        .then_with(|| a.id().cmp(&b.id()))
                });
                cascade(&ordered, total_payment)
            }
            RepaymentStrategy::Snowball => {
                let mut ordered: Vec<&Loan> = projected.iter().collect();
                ordered.sort_by(|a, b| {
                    a.total_owed()
                        .cmp(&b.total_owed())
                        .then_with(|| a.id().cmp(&b.id()))
                });
                cascade(&ordered, total_payment)
            }
            RepaymentStrategy::Proportional => proportional(&projected, total_payment),
        };

        if shortfall > Decimal::ZERO {
            debug!(
                "{}: ${} on {} is ${} short of the minimum payments",
                self.name(),
                total_payment,
                payment_date,
                shortfall
            );
        }

        let payments = projected
            .iter()
            .map(|loan| {
                let amount = amounts.get(&loan.id()).copied().unwrap_or(Decimal::ZERO);
                trace!("{}: loan {} gets ${} on {}", self.name(), loan.id(), amount, payment_date);
                (loan.id(), Payment::new(amount, payment_date))
            })
            .collect();

        Ok(Allocation { payments, shortfall })
    }
}

fn equal(loans: &[Loan], total: Money, split: EqualSplit) -> BTreeMap<LoanId, Money> {
    let outstanding = loans.iter().filter(|l| l.total_owed() > Decimal::ZERO).count();
    let divisor = match split {
        EqualSplit::Outstanding => outstanding,
        EqualSplit::AllLoans => loans.len(),
    };
    if divisor == 0 {
        return BTreeMap::new();
    }

    let share = floor_cents(total / Decimal::from(divisor));
    loans
        .iter()
        .filter(|l| l.total_owed() > Decimal::ZERO)
        .map(|l| (l.id(), share.min(l.total_owed())))
        .collect()
}

fn minimum_only(loans: &[Loan], total: Money) -> (BTreeMap<LoanId, Money>, Money) {
    let mut amounts: BTreeMap<LoanId, Money> = loans
        .iter()
        .map(|l| (l.id(), l.effective_minimum_payment()))
        .collect();
    let minimums: Money = amounts.values().copied().sum();
    let leftover = total - minimums;
    if leftover < Decimal::ZERO {
        return (amounts, -leftover);
    }

    // leftover only goes to loans that have no minimum of their own
    let no_minimum: Vec<&Loan> = loans
        .iter()
        .filter(|l| l.total_owed() > Decimal::ZERO && l.minimum_payment().is_zero())
        .collect();
    if !no_minimum.is_empty() {
        let share = floor_cents(leftover / Decimal::from(no_minimum.len()));
        for loan in no_minimum {
            amounts.insert(loan.id(), share.min(loan.total_owed()));
        }
    }

    (amounts, Decimal::ZERO)
}

/// Pay every minimum, then pour what is left into `ordered` loans one at a time until
/// each is paid off or the money runs out.
fn cascade(ordered: &[&Loan], total: Money) -> (BTreeMap<LoanId, Money>, Money) {
    let mut amounts: BTreeMap<LoanId, Money> = ordered
        .iter()
        .map(|l| (l.id(), l.effective_minimum_payment()))
        .collect();
    let minimums: Money = amounts.values().copied().sum();
    let mut leftover = total - minimums;
    if leftover < Decimal::ZERO {
        return (amounts, -leftover);
    }

    for loan in ordered {
        if leftover.is_zero() {
            break;
        }
        let room = loan.total_owed() - loan.effective_minimum_payment();
        if leftover >= room {
            leftover -= room;
            amounts.insert(loan.id(), loan.total_owed());
        } else {
            amounts.insert(loan.id(), loan.effective_minimum_payment() + leftover);
            break;
        }
    }

    (amounts, Decimal::ZERO)
}

/// Split in proportion to each loan's daily interest, or to its balance when nothing is
/// accruing (e.g. every loan in forbearance).
///
/// Weights come from principal alone. A loan whose balance is all accrued interest gets
/// only its minimum while any other loan accrues, and is paid by the balance fallback once
/// none does.
///
/// A loan whose share falls below its minimum is pinned at the minimum and the rest of the
/// money is split again among the other loans, so the total never exceeds `total` unless
/// the minimums alone do.
fn proportional(loans: &[Loan], total: Money) -> (BTreeMap<LoanId, Money>, Money) {
    let outstanding: Vec<&Loan> = loans
        .iter()
        .filter(|l| l.total_owed() > Decimal::ZERO)
        .collect();

    let minimums: Money = outstanding.iter().map(|l| l.effective_minimum_payment()).sum();
    if minimums >= total {
        let amounts = outstanding
            .iter()
            .map(|l| (l.id(), l.effective_minimum_payment()))
            .collect();
        return (amounts, minimums - total);
    }

    let total_daily: Money = outstanding.iter().map(|l| l.daily_interest_rate()).sum();
    let by_interest = !total_daily.is_zero();
    let weight = |loan: &Loan| {
        if by_interest {
            loan.daily_interest_rate()
        } else {
            loan.total_owed()
        }
    };

    let mut amounts = BTreeMap::new();
    let mut pinned: BTreeSet<LoanId> = BTreeSet::new();
    loop {
        let open: Vec<&Loan> = outstanding
            .iter()
            .copied()
            .filter(|l| !pinned.contains(&l.id()))
            .collect();
        let budget = total
            - outstanding
                .iter()
                .filter(|l| pinned.contains(&l.id()))
                .map(|l| l.effective_minimum_payment())
                .sum::<Money>();
        let total_weight: Money = open.iter().map(|&l| weight(l)).sum();

        let mut repinned = false;
        for loan in open {
            let share = if total_weight.is_zero() {
                Decimal::ZERO
            } else {
                floor_cents(budget * weight(loan) / total_weight)
            };
            if share < loan.effective_minimum_payment() {
                pinned.insert(loan.id());
                repinned = true;
            } else {
                amounts.insert(loan.id(), share.min(loan.total_owed()));
            }
        }
        if !repinned {
            break;
        }
    }

    for loan in outstanding.iter().filter(|l| pinned.contains(&l.id())) {
        amounts.insert(loan.id(), loan.effective_minimum_payment());
    }
    (amounts, Decimal::ZERO)
}
