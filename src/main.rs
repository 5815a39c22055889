use chrono::NaiveDate;
use log::error;
use repayment::{Loan, LoanBundle, LoanIdSequence, LoanResult, RepaymentStrategy};
use rust_decimal_macros::dec;
use simple_logger::SimpleLogger;

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> LoanResult<()> {
    let opened = NaiveDate::from_ymd_opt(2016, 10, 13).unwrap();
    let first_payment = NaiveDate::from_ymd_opt(2016, 11, 1).unwrap();
    let mut ids = LoanIdSequence::new();

    let loans = vec![
        Loan::new(&mut ids, "Auto", dec!(14250.00), dec!(0.0449), dec!(325), opened)?,
        Loan::new(&mut ids, "Student A", dec!(8700.00), dec!(0.068), dec!(95), opened)?,
        Loan::new(&mut ids, "Student B", dec!(3500.00), dec!(0.0386), dec!(0), opened)?,
        Loan::new(&mut ids, "Visa", dec!(2200.00), dec!(0.1899), dec!(45), opened)?,
    ];
    let bundle = LoanBundle::new(loans, RepaymentStrategy::Avalanche);

    for loan in bundle.project_to(first_payment)? {
        println!("{}", loan);
    }
    println!();

    for (strategy, result) in bundle.compare(&RepaymentStrategy::ALL, dec!(900), first_payment) {
        match result {
            Ok(model) => println!(
                "{:<14} paid off {} after {} payments, ${:.2} in total",
                strategy.name(),
                model.repayment_date,
                model.payments_made,
                model.total_paid
            ),
            Err(e) => println!("{:<14} {}", strategy.name(), e),
        }
    }
    Ok(())
}

// verifies that types can implement the gated traits below
#[cfg(test)]
fn is_normal<T: Sized + Send + Sync + Unpin>() {}

#[test]
fn normal_types() {
    is_normal::<Loan>();
    is_normal::<LoanBundle>();
    is_normal::<repayment::EstimatedRepaymentModel>();
}
