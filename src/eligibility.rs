//! Affordability check against a requested loan, plus lender recommendation.

use log::{debug, warn};

use crate::amortization::{
    check_non_negative, check_positive, compute_max_eligible_principal_with_ratio, repayment,
    DEFAULT_AFFORDABILITY_RATIO,
};
use crate::error::{LoanError, LoanResult};

pub const DEFAULT_LENDERS: [&str; 5] = [
    "HDFC Bank",
    "ICICI Bank",
    "SBI",
    "Axis Bank",
    "Kotak Mahindra",
];

pub const DEFAULT_RECOMMENDATION_COUNT: usize = 3;

/// Upper bound on recommended lenders, whatever the policy asks for.
pub const MAX_RECOMMENDED_LENDERS: usize = 3;

// parse an optional raw form field into a number
fn parse_field(field: &str, raw: Option<&str>) -> LoanResult<f64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        warn!("missing required field {}", field);
        LoanError::invalid(field, "is required")
    })?;
    raw.parse::<f64>().map_err(|_| {
        warn!("non-numeric value {:?} for {}", raw, field);
        LoanError::invalid(field, format!("{:?} is not a number", raw))
    })
}

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoanParameters {
    principal: f64,
    annual_rate_percent: f64,
    tenure_years: f64,
}

impl LoanParameters {
    pub fn new(principal: f64, annual_rate_percent: f64, tenure_years: f64) -> LoanResult<Self> {
        Ok(Self {
            principal: check_non_negative("principal", principal)?,
            annual_rate_percent: check_non_negative("annual_rate_percent", annual_rate_percent)?,
            tenure_years: check_positive("tenure_years", tenure_years)?,
        })
    }

    /// Builds parameters from raw form input, where any field may be absent.
    pub fn from_fields(
        principal: Option<&str>,
        annual_rate_percent: Option<&str>,
        tenure_years: Option<&str>,
    ) -> LoanResult<Self> {
        Self::new(
            parse_field("principal", principal)?,
            parse_field("annual_rate_percent", annual_rate_percent)?,
            parse_field("tenure_years", tenure_years)?,
        )
    }

    pub fn principal(&self) -> f64 {
        self.principal
    }

    pub fn annual_rate_percent(&self) -> f64 {
        self.annual_rate_percent
    }

    pub fn tenure_years(&self) -> f64 {
        self.tenure_years
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApplicantIncome {
    monthly_income: f64,
}

impl ApplicantIncome {
    pub fn new(monthly_income: f64) -> LoanResult<Self> {
        Ok(Self {
            monthly_income: check_non_negative("monthly_income", monthly_income)?,
        })
    }

    pub fn from_field(monthly_income: Option<&str>) -> LoanResult<Self> {
        Self::new(parse_field("monthly_income", monthly_income)?)
    }

    pub fn monthly_income(&self) -> f64 {
        self.monthly_income
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EligibilityResult {
    pub monthly_emi: f64,
    pub max_eligible_principal: f64,
    pub total_payment: f64,
    pub total_interest: f64,
    pub recommended_lenders: Vec<String>,
    pub requested_principal: f64,
}

impl EligibilityResult {
    /// Whether the requested principal fits within what the income supports.
    pub fn is_affordable(&self) -> bool {
        self.requested_principal <= self.max_eligible_principal
    }

    /// How far the request exceeds the eligible maximum, zero if it fits.
    pub fn shortfall(&self) -> f64 {
        (self.requested_principal - self.max_eligible_principal).max(0.)
    }
}

/// Tunable knobs of the eligibility decision.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EligibilityPolicy {
    pub affordability_ratio: f64,
    pub lenders: Vec<String>,
    pub recommendation_count: usize,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            affordability_ratio: DEFAULT_AFFORDABILITY_RATIO,
            lenders: DEFAULT_LENDERS.iter().map(|l| l.to_string()).collect(),
            recommendation_count: DEFAULT_RECOMMENDATION_COUNT,
        }
    }
}

/// Stateless evaluator; share it freely across threads.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct EligibilityEvaluator {
    policy: EligibilityPolicy,
}

impl EligibilityEvaluator {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn evaluate(
        &self,
        params: &LoanParameters,
        income: &ApplicantIncome,
    ) -> LoanResult<EligibilityResult> {
        let repay = repayment(
            params.principal,
            params.annual_rate_percent,
            params.tenure_years,
        )?;
        let max_eligible_principal = compute_max_eligible_principal_with_ratio(
            income.monthly_income,
            params.annual_rate_percent,
            params.tenure_years,
            self.policy.affordability_ratio,
        )?;

        let result = EligibilityResult {
            monthly_emi: repay.monthly_emi,
            max_eligible_principal,
            total_payment: repay.total_payment,
            total_interest: repay.total_interest,
            recommended_lenders: self.recommended_lenders(),
            requested_principal: params.principal,
        };
        debug!(
            "evaluated principal {} at {}% over {} years: emi {}, max eligible {}, affordable {}",
            params.principal,
            params.annual_rate_percent,
            params.tenure_years,
            result.monthly_emi,
            result.max_eligible_principal,
            result.is_affordable()
        );
        Ok(result)
    }

    // not filtered by amount or rate; the product catalog owns that
    fn recommended_lenders(&self) -> Vec<String> {
        self.policy
            .lenders
            .iter()
            .take(self.policy.recommendation_count.min(MAX_RECOMMENDED_LENDERS))
            .cloned()
            .collect()
    }
}

/// Evaluates with the default policy (40% affordability, first 3 lenders).
pub fn evaluate(params: &LoanParameters, income: &ApplicantIncome) -> LoanResult<EligibilityResult> {
    EligibilityEvaluator::default().evaluate(params, income)
}
