//! Lending policy screen for a concrete loan product, and the quote produced
//! when an applicant applies for one.

use chrono::{Datelike, NaiveDate};
use log::{debug, info};

use crate::amortization::{
    check_non_negative, check_positive, installment, monthly_rate, principal_for_installment,
    repayment_months, round, to_cents, Repayment, DEFAULT_AFFORDABILITY_RATIO,
};
use crate::error::{LoanError, LoanResult};

pub const MINIMUM_AGE_YEARS: u32 = 21;
pub const MINIMUM_MONTHLY_INCOME: f64 = 20000.;
pub const MINIMUM_STUDENT_INCOME: f64 = 10000.;
pub const MAX_DEBT_TO_INCOME_PERCENT: f64 = 40.;
pub const MAX_ACTIVE_LOANS: u32 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EmploymentStatus {
    Salaried,
    SelfEmployed,
    Student,
    Retired,
    Unemployed,
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApplicantProfile {
    pub date_of_birth: Option<NaiveDate>,
    pub employment_status: EmploymentStatus,
    pub monthly_income: f64,
    pub other_income: f64,
    pub existing_monthly_emi: f64,
    pub active_loans: u32,
}

impl ApplicantProfile {
    pub fn total_monthly_income(&self) -> f64 {
        self.monthly_income + self.other_income
    }

    /// Whole years of age on `as_of`, if a birth date is on file.
    pub fn age_on(&self, as_of: NaiveDate) -> Option<u32> {
        let dob = self.date_of_birth?;
        let mut years = as_of.year() - dob.year();
        if (as_of.month(), as_of.day()) < (dob.month(), dob.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    fn validate(&self) -> LoanResult<()> {
        check_non_negative("monthly_income", self.monthly_income)?;
        check_non_negative("other_income", self.other_income)?;
        check_non_negative("existing_monthly_emi", self.existing_monthly_emi)?;
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanProduct {
    pub product_name: String,
    pub lender: String,
    pub min_amount: f64,
    pub max_amount: f64,
    pub annual_rate_percent: f64,
}

/// Figures for an application against a product.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanQuote {
    pub product_name: String,
    pub lender: String,
    pub loan_amount: f64,
    pub tenure_months: u32,
    pub annual_rate_percent: f64,
    pub repayment: Repayment,
}

impl LoanProduct {
    fn validate(&self) -> LoanResult<()> {
        check_non_negative("min_amount", self.min_amount)?;
        check_positive("max_amount", self.max_amount)?;
        check_non_negative("annual_rate_percent", self.annual_rate_percent)?;
        if self.min_amount > self.max_amount {
            return Err(LoanError::invalid(
                "min_amount",
                "must not exceed max_amount",
            ));
        }
        Ok(())
    }

    /// EMI at the product rate without range checks.
    pub fn indicative_emi(&self, loan_amount: f64, tenure_months: u32) -> LoanResult<f64> {
        let loan_amount = check_positive("loan_amount", loan_amount)?;
        if tenure_months == 0 {
            return Err(LoanError::invalid("tenure_months", "must be at least 1"));
        }
        Ok(to_cents(installment(
            loan_amount,
            monthly_rate(self.annual_rate_percent),
            f64::from(tenure_months),
        )))
    }

    /// Prices an application for `loan_amount` over `tenure_months` at the
    /// product rate.
    pub fn quote(&self, loan_amount: f64, tenure_months: u32) -> LoanResult<LoanQuote> {
        self.validate()?;
        let loan_amount = check_positive("loan_amount", loan_amount)?;
        if loan_amount < self.min_amount || loan_amount > self.max_amount {
            return Err(LoanError::AmountOutOfRange {
                amount: loan_amount,
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        let repayment = repayment_months(loan_amount, self.annual_rate_percent, tenure_months)?;
        info!(
            "quoted {} from {} for {} over {} months at emi {}",
            self.product_name, self.lender, loan_amount, tenure_months, repayment.monthly_emi
        );

        Ok(LoanQuote {
            product_name: self.product_name.clone(),
            lender: self.lender.clone(),
            loan_amount,
            tenure_months,
            annual_rate_percent: self.annual_rate_percent,
            repayment,
        })
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreeningOutcome {
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub recommendations: Vec<String>,
    pub maximum_eligible_amount: Option<f64>,
    pub debt_to_income_percent: Option<f64>,
}

impl ScreeningOutcome {
    fn reject(&mut self, reason: String) {
        self.eligible = false;
        self.reasons.push(reason);
    }
}

/// Runs the lending policy for `profile` against `product`.
///
/// Every failing rule contributes a reason; the eligible amount is only
/// worked out for applicants who pass all of them.
pub fn screen(
    profile: &ApplicantProfile,
    product: &LoanProduct,
    tenure_months: u32,
    as_of: NaiveDate,
) -> LoanResult<ScreeningOutcome> {
    profile.validate()?;
    product.validate()?;
    if profile.date_of_birth.is_some_and(|dob| dob > as_of) {
        return Err(LoanError::invalid(
            "date_of_birth",
            format!("must not be after {}", as_of),
        ));
    }
    if tenure_months == 0 {
        return Err(LoanError::invalid("tenure_months", "must be at least 1"));
    }

    let mut outcome = ScreeningOutcome {
        eligible: true,
        ..Default::default()
    };
    let total_income = profile.total_monthly_income();

    if let Some(age) = profile.age_on(as_of) {
        if age < MINIMUM_AGE_YEARS {
            outcome.reject(format!(
                "Minimum age requirement not met ({} years)",
                MINIMUM_AGE_YEARS
            ));
        }
    }

    match profile.employment_status {
        EmploymentStatus::Unemployed => {
            outcome.reject("Unemployed applicants are not eligible".to_string())
        }
        EmploymentStatus::Student if total_income < MINIMUM_STUDENT_INCOME => {
            outcome.reject("Minimum monthly income not met".to_string())
        }
        _ => {}
    }

    if total_income < MINIMUM_MONTHLY_INCOME {
        outcome.reject(format!(
            "Monthly income below minimum requirement ({:.0})",
            MINIMUM_MONTHLY_INCOME
        ));
        outcome
            .recommendations
            .push("Increase your monthly income".to_string());
    }

    if total_income > 0. {
        let dti = profile.existing_monthly_emi / total_income * 100.;
        outcome.debt_to_income_percent = Some(round_dti(dti));
        if dti > MAX_DEBT_TO_INCOME_PERCENT {
            outcome.reject(format!("Debt-to-income ratio too high ({:.1}%)", dti));
            outcome
                .recommendations
                .push("Reduce existing debt".to_string());
        }
    }

    if profile.active_loans >= MAX_ACTIVE_LOANS {
        outcome.reject(format!(
            "Maximum number of active loans reached ({})",
            MAX_ACTIVE_LOANS
        ));
    }

    if outcome.eligible {
        let max_emi = (total_income - profile.existing_monthly_emi) * DEFAULT_AFFORDABILITY_RATIO;
        if max_emi > 0. {
            let amount = principal_for_installment(
                max_emi,
                monthly_rate(product.annual_rate_percent),
                f64::from(tenure_months),
            );
            outcome.maximum_eligible_amount = Some(to_cents(amount.min(product.max_amount)));
        }
    }

    debug!(
        "screened {} for {}: eligible {}, reasons {:?}",
        product.product_name, product.lender, outcome.eligible, outcome.reasons
    );
    Ok(outcome)
}

fn round_dti(dti: f64) -> f64 {
    round(dti, 1.)
}
