//! Loan portal core: EMI and eligibility calculations, the lending policy
//! screen, and the multi-section application form.

pub mod amortization;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod screening;
pub mod wizard;

pub use error::{LoanError, LoanResult};
