//! EMI, affordability and repayment schedule calculations.
//!
//! Everything here is computed in full `f64` precision and only rounded to
//! cents where a figure is handed back to the caller.

use chrono::{Months, NaiveDate};
use log::{debug, trace};
use std::fmt;

use crate::error::{LoanError, LoanResult};

/// Share of monthly income that may go towards an installment.
pub const DEFAULT_AFFORDABILITY_RATIO: f64 = 0.4;

/// Decimal places used for every figure returned to a caller.
pub const CURRENCY_DEC_PLACES: f64 = 2.;

/// Longest repayment schedule that will be generated (50 years).
pub const MAX_SCHEDULE_MONTHS: u32 = 600;

pub(crate) fn round(amt: f64, dec: f64) -> f64 {
    if amt == 0. {
        0.
    } else {
        (amt * 10_f64.powf(dec)).round() / 10_f64.powf(dec)
    }
}

pub(crate) fn to_cents(amt: f64) -> f64 {
    round(amt, CURRENCY_DEC_PLACES)
}

/// Monthly rate as a decimal from an annual percentage (9.5 -> 0.0079166..).
pub fn monthly_rate(annual_rate_percent: f64) -> f64 {
    annual_rate_percent / 12. / 100.
}

pub(crate) fn check_non_negative(field: &str, value: f64) -> LoanResult<f64> {
    if !value.is_finite() {
        return Err(LoanError::invalid(field, "must be a finite number"));
    }
    if value < 0. {
        return Err(LoanError::invalid(field, "must not be negative"));
    }
    Ok(value)
}

pub(crate) fn check_positive(field: &str, value: f64) -> LoanResult<f64> {
    let value = check_non_negative(field, value)?;
    if value == 0. {
        return Err(LoanError::invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

fn check_ratio(ratio: f64) -> LoanResult<f64> {
    let ratio = check_positive("affordability_ratio", ratio)?;
    if ratio > 1. {
        return Err(LoanError::invalid(
            "affordability_ratio",
            "must not exceed 1.0",
        ));
    }
    Ok(ratio)
}

// (1 + rate)^installments - 1, accurate for rates near zero
fn growth(rate: f64, installments: f64) -> f64 {
    (installments * rate.ln_1p()).exp_m1()
}

// installment for `installments` periods at periodic rate `rate`, unrounded
pub(crate) fn installment(principal: f64, rate: f64, installments: f64) -> f64 {
    if rate == 0. {
        return principal / installments;
    }
    let growth = growth(rate, installments);
    (principal * rate * (growth + 1.)) / growth
}

// inverse of `installment`: the principal a given installment will service
pub(crate) fn principal_for_installment(emi: f64, rate: f64, installments: f64) -> f64 {
    if rate == 0. {
        return emi * installments;
    }
    let growth = growth(rate, installments);
    emi * growth / (rate * (growth + 1.))
}

fn finite_or_reject(value: f64) -> LoanResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(LoanError::invalid(
            "inputs",
            "produce a result outside the representable range",
        ))
    }
}

/// Installment, total payment and total interest for one loan.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Repayment {
    pub monthly_emi: f64,
    pub total_payment: f64,
    pub total_interest: f64,
    pub installments: f64,
}

impl Repayment {
    fn from_exact(principal: f64, emi: f64, installments: f64) -> Self {
        let total_payment = emi * installments;
        Self {
            monthly_emi: to_cents(emi),
            total_payment: to_cents(total_payment),
            total_interest: to_cents(total_payment - principal),
            installments,
        }
    }
}

/// Equated monthly installment for a tenure given in years.
///
/// A zero rate is a valid loan: the principal is split evenly across the
/// installments.
pub fn compute_emi(principal: f64, annual_rate_percent: f64, tenure_years: f64) -> LoanResult<f64> {
    Ok(repayment(principal, annual_rate_percent, tenure_years)?.monthly_emi)
}

/// Equated monthly installment for a tenure given in whole months.
pub fn compute_emi_months(
    principal: f64,
    annual_rate_percent: f64,
    tenure_months: u32,
) -> LoanResult<f64> {
    Ok(repayment_months(principal, annual_rate_percent, tenure_months)?.monthly_emi)
}

/// EMI plus the totals derived from it, tenure in years.
pub fn repayment(principal: f64, annual_rate_percent: f64, tenure_years: f64) -> LoanResult<Repayment> {
    let tenure_years = check_positive("tenure_years", tenure_years)?;
    repayment_for_installments(principal, annual_rate_percent, tenure_years * 12.)
}

/// EMI plus the totals derived from it, tenure in months.
pub fn repayment_months(
    principal: f64,
    annual_rate_percent: f64,
    tenure_months: u32,
) -> LoanResult<Repayment> {
    if tenure_months == 0 {
        return Err(LoanError::invalid("tenure_months", "must be at least 1"));
    }
    repayment_for_installments(principal, annual_rate_percent, f64::from(tenure_months))
}

fn repayment_for_installments(
    principal: f64,
    annual_rate_percent: f64,
    installments: f64,
) -> LoanResult<Repayment> {
    let principal = check_positive("principal", principal)?;
    let annual_rate_percent = check_non_negative("annual_rate_percent", annual_rate_percent)?;

    let rate = monthly_rate(annual_rate_percent);
    let emi = finite_or_reject(installment(principal, rate, installments))?;
    trace!(
        "principal {}, monthly rate {}, installments {}, emi {}",
        principal,
        rate,
        installments,
        emi
    );

    Ok(Repayment::from_exact(principal, emi, installments))
}

/// Largest principal whose EMI stays within the default share (40%) of
/// monthly income.
pub fn compute_max_eligible_principal(
    monthly_income: f64,
    annual_rate_percent: f64,
    tenure_years: f64,
) -> LoanResult<f64> {
    compute_max_eligible_principal_with_ratio(
        monthly_income,
        annual_rate_percent,
        tenure_years,
        DEFAULT_AFFORDABILITY_RATIO,
    )
}

pub fn compute_max_eligible_principal_with_ratio(
    monthly_income: f64,
    annual_rate_percent: f64,
    tenure_years: f64,
    affordability_ratio: f64,
) -> LoanResult<f64> {
    let monthly_income = check_non_negative("monthly_income", monthly_income)?;
    let annual_rate_percent = check_non_negative("annual_rate_percent", annual_rate_percent)?;
    let tenure_years = check_positive("tenure_years", tenure_years)?;
    let affordability_ratio = check_ratio(affordability_ratio)?;

    let max_emi = monthly_income * affordability_ratio;
    let max_principal = principal_for_installment(
        max_emi,
        monthly_rate(annual_rate_percent),
        tenure_years * 12.,
    );
    let max_principal = finite_or_reject(max_principal)?;
    debug!(
        "income {} at ratio {} supports emi {} and principal {}",
        monthly_income, affordability_ratio, max_emi, max_principal
    );

    Ok(to_cents(max_principal))
}

/// One row of a repayment schedule.
#[derive(PartialEq, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanPayment {
    pub pmt_number: u32,
    pub pmt_date: NaiveDate,
    pub pmt_amount: f64,
    pub pmt_interest_paid: f64,
    pub pmt_principal_paid: f64,
    pub pmt_end_balance: f64,
}

impl fmt::Display for LoanPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pmt number {}, date {}, payment {:.2}, interest paid {:.2}, principal paid {:.2}, ending balance {:.2}",
            self.pmt_number,
            self.pmt_date,
            self.pmt_amount,
            self.pmt_interest_paid,
            self.pmt_principal_paid,
            self.pmt_end_balance
        )
    }
}

/// Month-by-month repayment of a fixed-rate loan.
#[derive(PartialEq, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepaymentSchedule {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub first_pmt_date: NaiveDate,
    pmt_amount: f64,
    total_payment: f64,
    total_interest: f64,
    scheduled_pmts: Vec<LoanPayment>,
}

impl RepaymentSchedule {
    pub fn new(
        principal: f64,
        annual_rate_percent: f64,
        tenure_months: u32,
        first_pmt_date: NaiveDate,
    ) -> LoanResult<Self> {
        let principal = check_positive("principal", principal)?;
        let annual_rate_percent = check_non_negative("annual_rate_percent", annual_rate_percent)?;
        if tenure_months == 0 {
            return Err(LoanError::invalid("tenure_months", "must be at least 1"));
        }
        if tenure_months > MAX_SCHEDULE_MONTHS {
            return Err(LoanError::invalid(
                "tenure_months",
                format!("must not exceed {}", MAX_SCHEDULE_MONTHS),
            ));
        }

        let rate = monthly_rate(annual_rate_percent);
        let emi = finite_or_reject(installment(principal, rate, f64::from(tenure_months)))?;

        let mut scheduled_pmts = Vec::with_capacity(tenure_months as usize);
        let mut begin_balance = principal;
        let mut total_payment = 0.;
        let mut total_interest = 0.;

        for pmt_number in 1..=tenure_months {
            let pmt_date = first_pmt_date
                .checked_add_months(Months::new(pmt_number - 1))
                .ok_or_else(|| {
                    LoanError::invalid(
                        "first_pmt_date",
                        "schedule runs past the supported calendar range",
                    )
                })?;

            let interest = begin_balance * rate;
            // the final installment clears whatever float residue is left
            let (pmt_amount, end_balance) = if pmt_number == tenure_months {
                (begin_balance + interest, 0.)
            } else {
                (emi, (begin_balance - (emi - interest)).max(0.))
            };
            trace!(
                "pmt # {}, date {}, interest {}, end bal {}",
                pmt_number,
                pmt_date,
                interest,
                end_balance
            );

            total_payment += pmt_amount;
            total_interest += interest;
            scheduled_pmts.push(LoanPayment {
                pmt_number,
                pmt_date,
                pmt_amount: to_cents(pmt_amount),
                pmt_interest_paid: to_cents(interest),
                pmt_principal_paid: to_cents(pmt_amount - interest),
                pmt_end_balance: to_cents(end_balance),
            });
            begin_balance = end_balance;
        }

        Ok(Self {
            principal,
            annual_rate_percent,
            first_pmt_date,
            pmt_amount: to_cents(emi),
            total_payment: to_cents(total_payment),
            total_interest: to_cents(total_interest),
            scheduled_pmts,
        })
    }

    pub fn get_pmt_amount(&self) -> f64 {
        self.pmt_amount
    }

    pub fn get_pmt_count(&self) -> usize {
        self.scheduled_pmts.len()
    }

    /// Payment by its 1-based number.
    pub fn get_pmt_detail(&self, pmt_number: usize) -> Option<&LoanPayment> {
        pmt_number
            .checked_sub(1)
            .and_then(|idx| self.scheduled_pmts.get(idx))
    }

    pub fn payments(&self) -> &[LoanPayment] {
        &self.scheduled_pmts
    }

    pub fn total_payment(&self) -> f64 {
        self.total_payment
    }

    pub fn total_interest(&self) -> f64 {
        self.total_interest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_log::test;

    #[test]
    fn test_compute_emi() {
        // r = 0.0079167, n = 60
        assert_eq!(compute_emi(500000., 9.5, 5.).unwrap(), 10500.93);
        assert_eq!(compute_emi(200000., 7., 15.).unwrap(), 1797.66);
        assert_eq!(compute_emi_months(200000., 7., 180).unwrap(), 1797.66);
    }

    #[test]
    fn test_zero_rate_emi() {
        assert_eq!(compute_emi(120000., 0., 1.).unwrap(), 120000. / 12.);
        assert_eq!(compute_emi_months(90000., 0., 36).unwrap(), 2500.);
    }

    #[test]
    fn test_totals_follow_emi() {
        for (p, r, t) in [(500000., 9.5, 5.), (75000., 12., 2.5), (1000., 0., 3.)] {
            let rep = repayment(p, r, t).unwrap();
            assert_abs_diff_eq!(rep.monthly_emi * t * 12., rep.total_payment, epsilon = 0.01 * t * 12.);
            assert_abs_diff_eq!(rep.total_payment - p, rep.total_interest, epsilon = 0.01);
        }
    }

    #[test]
    fn test_max_principal_inverts_emi() {
        let income = 50000.;
        let max = compute_max_eligible_principal(income, 9.5, 5.).unwrap();
        assert_eq!(max, 952296.55);
        assert_abs_diff_eq!(compute_emi(max, 9.5, 5.).unwrap(), income * 0.4, epsilon = 0.01);

        let zero_rate = compute_max_eligible_principal(30000., 0., 2.).unwrap();
        assert_eq!(zero_rate, 30000. * 0.4 * 24.);
    }

    #[test]
    fn test_custom_ratio() {
        let half = compute_max_eligible_principal_with_ratio(10000., 0., 1., 0.5).unwrap();
        assert_eq!(half, 60000.);
        assert!(compute_max_eligible_principal_with_ratio(10000., 0., 1., 1.5).is_err());
        assert!(compute_max_eligible_principal_with_ratio(10000., 0., 1., 0.).is_err());
    }

    #[test]
    fn test_rejects_bad_input() {
        let field_of = |err: LoanError| match err {
            LoanError::InvalidInput { field, .. } => field,
            other => panic!("unexpected error {other:?}"),
        };
        assert_eq!(field_of(compute_emi(0., 9.5, 5.).unwrap_err()), "principal");
        assert_eq!(field_of(compute_emi(-1., 9.5, 5.).unwrap_err()), "principal");
        assert_eq!(field_of(compute_emi(1000., -2., 5.).unwrap_err()), "annual_rate_percent");
        assert_eq!(field_of(compute_emi(1000., 9.5, 0.).unwrap_err()), "tenure_years");
        assert_eq!(field_of(compute_emi(f64::NAN, 9.5, 5.).unwrap_err()), "principal");
        assert_eq!(field_of(compute_emi(1000., f64::INFINITY, 5.).unwrap_err()), "annual_rate_percent");
        assert_eq!(field_of(compute_emi_months(1000., 9.5, 0).unwrap_err()), "tenure_months");
        assert_eq!(
            field_of(compute_max_eligible_principal(-5., 9.5, 5.).unwrap_err()),
            "monthly_income"
        );
    }

    #[test]
    fn test_tiny_rate_behaves_like_zero_rate() {
        assert_abs_diff_eq!(compute_emi(120000., 1e-15, 1.).unwrap(), 10000., epsilon = 0.01);
        assert_abs_diff_eq!(compute_emi_months(90000., 1e-12, 36).unwrap(), 2500., epsilon = 0.01);
        assert_abs_diff_eq!(
            compute_max_eligible_principal(30000., 1e-15, 2.).unwrap(),
            288000.,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_overflow_names_no_single_field() {
        let overflow = |result: LoanResult<f64>| {
            matches!(result, Err(LoanError::InvalidInput { field, .. }) if field == "inputs")
        };
        assert!(overflow(compute_emi(1000., 10., 1e6)));
        assert!(overflow(compute_max_eligible_principal(f64::MAX, 0., 2.)));
    }

    #[test]
    fn test_zero_income_is_not_an_error() {
        assert_eq!(compute_max_eligible_principal(0., 9.5, 5.).unwrap(), 0.);
    }

    #[test]
    fn test_monthly_schedule() {
        let schedule = RepaymentSchedule::new(
            200000.,
            7.,
            180,
            NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        )
        .unwrap();

        assert_eq!(schedule.get_pmt_amount(), 1797.66);
        assert_eq!(schedule.get_pmt_count(), 180);
        let first = schedule.get_pmt_detail(1).unwrap();
        assert_eq!(first.pmt_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(first.pmt_interest_paid, 1166.67);
        assert_eq!(first.pmt_end_balance, 199369.01);
        let last = schedule.get_pmt_detail(180).unwrap();
        assert_eq!(last.pmt_date, NaiveDate::from_ymd_opt(2039, 3, 1).unwrap());
        assert_eq!(last.pmt_end_balance, 0.);
        assert_abs_diff_eq!(last.pmt_amount, 1797.66, epsilon = 0.01);
        assert!(schedule.get_pmt_detail(0).is_none());
        assert!(schedule.get_pmt_detail(181).is_none());

        assert_abs_diff_eq!(schedule.total_payment(), 1797.6565 * 180., epsilon = 0.05);
        assert_abs_diff_eq!(
            schedule.total_payment() - schedule.total_interest(),
            200000.,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_schedule_month_end_dates() {
        let schedule = RepaymentSchedule::new(
            12000.,
            0.,
            3,
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        let dates: Vec<NaiveDate> = schedule.payments().iter().map(|p| p.pmt_date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            ]
        );
        assert!(schedule.payments().iter().all(|p| p.pmt_amount == 4000.));
        assert_eq!(schedule.total_interest(), 0.);
    }

    #[test]
    fn test_schedule_rejects_long_tenure() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(RepaymentSchedule::new(1000., 5., MAX_SCHEDULE_MONTHS + 1, start).is_err());
        assert!(RepaymentSchedule::new(1000., 5., 0, start).is_err());
    }

    #[test]
    fn test_payment_display() {
        let schedule =
            RepaymentSchedule::new(1200., 0., 1, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
                .unwrap();
        assert_eq!(
            schedule.get_pmt_detail(1).unwrap().to_string(),
            "pmt number 1, date 2024-05-01, payment 1200.00, interest paid 0.00, principal paid 1200.00, ending balance 0.00"
        );
    }
}
