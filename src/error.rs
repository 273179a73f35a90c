use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoanError {
    #[error("invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("{missing} application section(s) still incomplete")]
    SectionsIncomplete { missing: usize },

    #[error("application has already been submitted")]
    AlreadySubmitted,

    #[error("loan amount {amount:.2} must be between {min:.2} and {max:.2}")]
    AmountOutOfRange { amount: f64, min: f64, max: f64 },

    #[error("registration rejected: {0}")]
    Registration(String),
}

impl LoanError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LoanError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type LoanResult<T> = Result<T, LoanError>;
