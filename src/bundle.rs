use chrono::NaiveDate;
use log::{info, trace, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::dates::PaymentSchedule;
use crate::error::{LoanError, LoanResult};
use crate::loan::{Loan, LoanId};
use crate::money::Money;
use crate::strategy::{Allocation, RepaymentStrategy};

const DEFAULT_MAX_PAYMENTS: u32 = 1200;

/// Settings for a repayment simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// How often the payment is made.
    pub schedule: PaymentSchedule,

    /// Payments to simulate before giving up on payoff.
    pub max_payments: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            schedule: PaymentSchedule::Monthly,
            max_payments: DEFAULT_MAX_PAYMENTS, // 100 years of monthly payments
        }
    }
}

/// Outcome of simulating a strategy until every loan is paid off.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatedRepaymentModel {
    pub strategy_name: String,

    /// The scheduled date after the final payment; `NaiveDate::MAX` when no payment is made.
    pub repayment_date: NaiveDate,

    pub total_paid: Money,

    /// Lifetime amount paid into each loan.
    pub payment_breakdown: BTreeMap<LoanId, Money>,

    pub payments_made: u32,

    /// Sum over all periods of how far the payment fell short of the minimums.
    pub total_shortfall: Money,
}

impl EstimatedRepaymentModel {
    pub fn is_reachable(&self) -> bool {
        self.repayment_date != NaiveDate::MAX
    }
}

/// A set of loans repaid together under one strategy.
#[derive(Debug, Clone)]
pub struct LoanBundle {
    loans: Vec<Loan>,
    strategy: RepaymentStrategy,
    config: SimulationConfig,
}

impl LoanBundle {
    pub fn new(loans: Vec<Loan>, strategy: RepaymentStrategy) -> Self {
        Self {
            loans,
            strategy,
            config: SimulationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loans(&self) -> &[Loan] {
        &self.loans
    }

    pub fn strategy(&self) -> RepaymentStrategy {
        self.strategy
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn total_owed(&self) -> Money {
        total_owed(&self.loans)
    }

    /// Every loan as it will stand on `date` with no payments made.
    pub fn project_to(&self, date: NaiveDate) -> LoanResult<Vec<Loan>> {
        self.loans.iter().map(|loan| loan.project_forward(date)).collect()
    }

    /// How the bound strategy would split `total_funds` paid on `date`.
    pub fn recommended_payments(
        &self,
        total_funds: Money,
        date: NaiveDate,
    ) -> LoanResult<Allocation> {
        self.strategy.allocate(&self.loans, total_funds, date)
    }

    /// Pay `avg_payment` on every scheduled date from `first_payment` until nothing is owed.
    ///
    /// Each date is one schedule step after the previous one, so a monthly run that starts
    /// on the 31st pays on the 28th from the end of February onward.
    ///
    /// Fails with `DidNotConverge` once `max_payments` payments have been made with a
    /// balance still outstanding.
    pub fn estimate_repayment(
        &self,
        avg_payment: Money,
        first_payment: NaiveDate,
    ) -> LoanResult<EstimatedRepaymentModel> {
        let strategy_name = self.strategy.name().to_string();
        let mut breakdown: BTreeMap<LoanId, Money> = self
            .loans
            .iter()
            .map(|loan| (loan.id(), Decimal::ZERO))
            .collect();

        if avg_payment <= Decimal::ZERO {
            warn!("{}: a payment of ${} never repays anything", strategy_name, avg_payment);
            return Ok(EstimatedRepaymentModel {
                strategy_name,
                repayment_date: NaiveDate::MAX,
                total_paid: Decimal::ZERO,
                payment_breakdown: breakdown,
                payments_made: 0,
                total_shortfall: Decimal::ZERO,
            });
        }

        let first_interest = self.first_period_interest(first_payment)?;
        if avg_payment < first_interest {
            warn!(
                "{}: ${} {} does not cover the ${} of interest accruing in the first period",
                strategy_name, avg_payment, self.config.schedule, first_interest
            );
        }

        let mut loans = self.loans.clone();
        let mut now = first_payment;
        let mut payments_made = 0;
        let mut total_shortfall = Decimal::ZERO;

        loop {
            let remaining = total_owed(&loans);
            if remaining <= Decimal::ZERO {
                break;
            }
            if payments_made >= self.config.max_payments {
                warn!(
                    "{}: ${} still owed after {} payments, giving up",
                    strategy_name, remaining, payments_made
                );
                return Err(LoanError::DidNotConverge {
                    strategy: strategy_name,
                    payments: payments_made,
                    remaining,
                });
            }

            let allocation = self.strategy.allocate(&loans, avg_payment, now)?;
            if allocation.shortfall > Decimal::ZERO {
                warn!(
                    "{}: ${} on {} is ${} short of the minimum payments",
                    strategy_name, avg_payment, now, allocation.shortfall
                );
                total_shortfall += allocation.shortfall;
            }

            loans = loans
                .iter()
                .map(|loan| {
                    let current = loan.project_forward(now)?;
                    match allocation.payments.get(&loan.id()) {
                        Some(payment) => {
                            *breakdown.entry(loan.id()).or_insert(Decimal::ZERO) += payment.amount;
                            current.make_payment(payment)
                        }
                        None => Ok(current),
                    }
                })
                .collect::<LoanResult<Vec<_>>>()?;

            payments_made += 1;
            trace!(
                "{}: payment {} on {}, ${} still owed",
                strategy_name,
                payments_made,
                now,
                total_owed(&loans)
            );
            now = self.config.schedule.next_payment_date(now)?;
        }

        let total_paid = breakdown.values().copied().sum();
        info!(
            "{}: repaid ${} in {} payments by {}",
            strategy_name, total_paid, payments_made, now
        );

        Ok(EstimatedRepaymentModel {
            strategy_name,
            repayment_date: now,
            total_paid,
            payment_breakdown: breakdown,
            payments_made,
            total_shortfall,
        })
    }

    /// Run the same loans and payment through each strategy independently.
    pub fn compare(
        &self,
        strategies: &[RepaymentStrategy],
        avg_payment: Money,
        first_payment: NaiveDate,
    ) -> Vec<(RepaymentStrategy, LoanResult<EstimatedRepaymentModel>)> {
        strategies
            .iter()
            .map(|&strategy| {
                let bundle = LoanBundle {
                    strategy,
                    ..self.clone()
                };
                (strategy, bundle.estimate_repayment(avg_payment, first_payment))
            })
            .collect()
    }

    /// Interest the current balances accrue between the first and second payment.
    fn first_period_interest(&self, first_payment: NaiveDate) -> LoanResult<Money> {
        let second_payment = self.config.schedule.next_payment_date(first_payment)?;
        let days = Decimal::from(second_payment.signed_duration_since(first_payment).num_days());
        Ok(self
            .loans
            .iter()
            .map(|loan| loan.daily_interest_rate() * days)
            .sum())
    }
}

fn total_owed(loans: &[Loan]) -> Money {
    loans.iter().map(|loan| loan.total_owed()).sum()
}
