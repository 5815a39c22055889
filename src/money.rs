use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amounts. Always decimal, never f64.
pub type Money = Decimal;

/// Annual nominal rates as fractions (0.05 = 5%).
pub type Rate = Decimal;

/// Decimal places kept on a division result before it is cut to cents.
const DIVISION_SCALE: u32 = 10;

/// Round to whole cents, midpoint to even.
pub fn round_cents(amount: Money) -> Money {
    amount.round_dp(2)
}

/// Cut a divided share down to whole cents.
///
/// The share is rounded to `DIVISION_SCALE` places first so that a quotient such as
/// 199.9999999999999999999999999 lands on 200.00 instead of 199.99. Truncating the rest
/// keeps the sum of several shares from exceeding the amount they were divided from.
pub fn floor_cents(amount: Money) -> Money {
    amount
        .round_dp(DIVISION_SCALE)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}
