use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use simple_logger::SimpleLogger;
use std::process::ExitCode;

use loanportal::amortization::{repayment, RepaymentSchedule};
use loanportal::config::{parse_log_level, PortalConfig};
use loanportal::eligibility::{ApplicantIncome, EligibilityEvaluator, LoanParameters};
use loanportal::LoanResult;

#[derive(Parser, Debug)]
#[command(name = "loanportal", about = "EMI and loan eligibility calculator", version)]
struct Cli {
    /// Log level (off, error, warn, info, debug, trace); overrides LOAN_LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Monthly installment and totals for a loan
    Emi {
        #[arg(long)]
        principal: f64,
        /// Annual interest rate in percent, e.g. 9.5
        #[arg(long)]
        rate: f64,
        /// Tenure in years
        #[arg(long)]
        years: f64,
    },
    /// Affordability of a loan against monthly income
    Eligibility {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        years: f64,
        #[arg(long)]
        income: f64,
    },
    /// Month-by-month repayment schedule
    Schedule {
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        months: u32,
        /// Date of the first installment (YYYY-MM-DD), defaults to today
        #[arg(long)]
        first_payment: Option<NaiveDate>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PortalConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let level = match cli.log_level.as_deref().map(parse_log_level).transpose() {
        Ok(level) => level.unwrap_or(config.log_level),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialise logging: {err}");
    }

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &PortalConfig) -> LoanResult<()> {
    match command {
        Command::Emi {
            principal,
            rate,
            years,
        } => {
            let repay = repayment(principal, rate, years)?;
            println!("monthly emi    {:>14.2}", repay.monthly_emi);
            println!("total payment  {:>14.2}", repay.total_payment);
            println!("total interest {:>14.2}", repay.total_interest);
        }
        Command::Eligibility {
            principal,
            rate,
            years,
            income,
        } => {
            let evaluator = EligibilityEvaluator::new(config.policy.clone());
            let result = evaluator.evaluate(
                &LoanParameters::new(principal, rate, years)?,
                &ApplicantIncome::new(income)?,
            )?;
            println!("monthly emi          {:>14.2}", result.monthly_emi);
            println!("max eligible amount  {:>14.2}", result.max_eligible_principal);
            println!("total payment        {:>14.2}", result.total_payment);
            println!("total interest       {:>14.2}", result.total_interest);
            if result.is_affordable() {
                println!("requested amount is within your eligibility");
            } else {
                println!("requested amount exceeds eligibility by {:.2}", result.shortfall());
            }
            println!("recommended lenders: {}", result.recommended_lenders.join(", "));
        }
        Command::Schedule {
            principal,
            rate,
            months,
            first_payment,
        } => {
            let first = first_payment.unwrap_or_else(|| Local::now().date_naive());
            let schedule = RepaymentSchedule::new(principal, rate, months, first)?;
            for pmt in schedule.payments() {
                println!("{}", pmt);
            }
            println!(
                "total payment {:.2}, total interest {:.2}",
                schedule.total_payment(),
                schedule.total_interest()
            );
        }
    }
    Ok(())
}

// verifies that types can implement the gated traits below
#[cfg(test)]
fn is_normal<T: Sized + Send + Sync + Unpin>() {}

#[test]
fn normal_types() {
    is_normal::<loanportal::eligibility::EligibilityResult>();
    is_normal::<loanportal::eligibility::EligibilityEvaluator>();
    is_normal::<loanportal::amortization::LoanPayment>();
    is_normal::<loanportal::wizard::WizardState>();
}

#[test]
fn cli_parses() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
    let cli = Cli::try_parse_from([
        "loanportal",
        "schedule",
        "--principal",
        "1000",
        "--rate",
        "5",
        "--months",
        "12",
        "--first-payment",
        "2025-01-01",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Command::Schedule { months: 12, first_payment: Some(_), .. }
    ));
}
