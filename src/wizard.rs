//! Multi-section application form state.
//!
//! A section counts as complete as soon as it has been updated once, whether
//! or not its fields are filled in. Submission only needs all four sections
//! to have been visited.

use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::error::{LoanError, LoanResult};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApplicationSection {
    Personal,
    Financial,
    Employment,
    Kyc,
}

impl ApplicationSection {
    /// Every section, in display order.
    pub const ALL: [ApplicationSection; 4] = [
        ApplicationSection::Personal,
        ApplicationSection::Financial,
        ApplicationSection::Employment,
        ApplicationSection::Kyc,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ApplicationSection::Personal => "Personal Details",
            ApplicationSection::Financial => "Financial Details",
            ApplicationSection::Employment => "Employment Details",
            ApplicationSection::Kyc => "KYC / Document Uploads",
        }
    }
}

impl fmt::Display for ApplicationSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A single form value. Documents are carried by reference only.
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Flag(bool),
    Document(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

pub type FieldValues = HashMap<String, FieldValue>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WizardPhase {
    Empty,
    /// Number of sections completed so far, between 1 and 3.
    InProgress(usize),
    Ready,
    Submitted,
}

/// Receives the accumulated form once every section is complete.
pub trait RegistrationSink {
    type Error: fmt::Display;

    fn register(&mut self, payload: &FieldValues) -> Result<(), Self::Error>;
}

// collects payloads in memory
impl RegistrationSink for Vec<FieldValues> {
    type Error = std::convert::Infallible;

    fn register(&mut self, payload: &FieldValues) -> Result<(), Self::Error> {
        self.push(payload.clone());
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct WizardState {
    field_values: FieldValues,
    completed_sections: BTreeSet<ApplicationSection>,
    submitted: bool,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `partial` into the form and marks `section` complete.
    ///
    /// Later values overwrite earlier ones for the same field name.
    pub fn update_section<I, K, V>(
        &mut self,
        section: ApplicationSection,
        partial: I,
    ) -> LoanResult<WizardPhase>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if self.submitted {
            warn!("update to {} after submission ignored", section);
            return Err(LoanError::AlreadySubmitted);
        }

        let mut merged = 0;
        for (name, value) in partial {
            self.field_values.insert(name.into(), value.into());
            merged += 1;
        }
        let newly_completed = self.completed_sections.insert(section);
        debug!("merged {} field(s) into {}", merged, section);
        if newly_completed {
            info!(
                "{} complete, {} of {} sections done",
                section,
                self.completed_count(),
                ApplicationSection::ALL.len()
            );
        }
        Ok(self.phase())
    }

    pub fn field_values(&self) -> &FieldValues {
        &self.field_values
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.field_values.get(name)
    }

    pub fn is_complete(&self, section: ApplicationSection) -> bool {
        self.completed_sections.contains(&section)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_sections.len()
    }

    /// Incomplete sections in display order.
    pub fn missing_sections(&self) -> Vec<ApplicationSection> {
        ApplicationSection::ALL
            .into_iter()
            .filter(|s| !self.completed_sections.contains(s))
            .collect()
    }

    pub fn progress_percent(&self) -> f64 {
        self.completed_count() as f64 / ApplicationSection::ALL.len() as f64 * 100.
    }

    pub fn can_submit(&self) -> bool {
        !self.submitted && self.completed_count() == ApplicationSection::ALL.len()
    }

    pub fn phase(&self) -> WizardPhase {
        if self.submitted {
            return WizardPhase::Submitted;
        }
        match self.completed_count() {
            0 => WizardPhase::Empty,
            n if n < ApplicationSection::ALL.len() => WizardPhase::InProgress(n),
            _ => WizardPhase::Ready,
        }
    }

    /// Hands the accumulated form to `sink` and closes the wizard.
    ///
    /// If the sink refuses the payload the wizard stays ready so the caller
    /// can retry.
    pub fn submit<S: RegistrationSink>(&mut self, sink: &mut S) -> LoanResult<()> {
        if self.submitted {
            return Err(LoanError::AlreadySubmitted);
        }
        if !self.can_submit() {
            let missing = self.missing_sections().len();
            warn!("submission blocked, {} section(s) incomplete", missing);
            return Err(LoanError::SectionsIncomplete { missing });
        }

        sink.register(&self.field_values)
            .map_err(|e| LoanError::Registration(e.to_string()))?;

        self.field_values.clear();
        self.submitted = true;
        info!("application submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct RejectingSink;

    impl RegistrationSink for RejectingSink {
        type Error = String;

        fn register(&mut self, _payload: &FieldValues) -> Result<(), Self::Error> {
            Err("email already registered".to_string())
        }
    }

    fn complete_all(wizard: &mut WizardState) {
        for section in ApplicationSection::ALL {
            wizard.update_section(section, FieldValues::new()).unwrap();
        }
    }

    #[test]
    fn test_progress() {
        let mut wizard = WizardState::new();
        assert_eq!(wizard.progress_percent(), 0.);
        assert_eq!(wizard.phase(), WizardPhase::Empty);

        wizard
            .update_section(ApplicationSection::Personal, FieldValues::new())
            .unwrap();
        assert_eq!(wizard.progress_percent(), 25.);

        wizard
            .update_section(ApplicationSection::Personal, [("fullName", "Asha Rao")])
            .unwrap();
        assert_eq!(wizard.progress_percent(), 25.);
        assert_eq!(wizard.phase(), WizardPhase::InProgress(1));

        complete_all(&mut wizard);
        assert!(wizard.can_submit());
        assert_eq!(wizard.progress_percent(), 100.);
        assert_eq!(wizard.phase(), WizardPhase::Ready);
    }

    #[test]
    fn test_update_returns_phase() {
        let mut wizard = WizardState::new();
        let phases: Vec<WizardPhase> = ApplicationSection::ALL
            .into_iter()
            .map(|s| wizard.update_section(s, FieldValues::new()).unwrap())
            .collect();
        assert_eq!(
            phases,
            vec![
                WizardPhase::InProgress(1),
                WizardPhase::InProgress(2),
                WizardPhase::InProgress(3),
                WizardPhase::Ready,
            ]
        );
    }

    #[test]
    fn test_later_values_overwrite() {
        let mut wizard = WizardState::new();
        wizard
            .update_section(
                ApplicationSection::Employment,
                [("income", FieldValue::from(45000.)), ("employerName", "Acme".into())],
            )
            .unwrap();
        wizard
            .update_section(ApplicationSection::Financial, [("income", 52000.)])
            .unwrap();

        assert_eq!(wizard.field("income"), Some(&FieldValue::Number(52000.)));
        assert_eq!(wizard.field("employerName"), Some(&FieldValue::Text("Acme".into())));
        assert_eq!(wizard.field_values().len(), 2);
    }

    #[test]
    fn test_submit_incomplete() {
        let mut wizard = WizardState::new();
        wizard
            .update_section(ApplicationSection::Personal, FieldValues::new())
            .unwrap();
        wizard
            .update_section(ApplicationSection::Kyc, [("panCard", FieldValue::Document("pan.pdf".into()))])
            .unwrap();

        let mut sink: Vec<FieldValues> = Vec::new();
        assert_eq!(
            wizard.submit(&mut sink),
            Err(LoanError::SectionsIncomplete { missing: 2 })
        );
        assert_eq!(
            wizard.missing_sections(),
            vec![ApplicationSection::Financial, ApplicationSection::Employment]
        );
        assert!(sink.is_empty());
        assert_eq!(wizard.phase(), WizardPhase::InProgress(2));
    }

    #[test]
    fn test_submit_hands_over_payload() {
        let mut wizard = WizardState::new();
        wizard
            .update_section(ApplicationSection::Personal, [("email", "asha@example.com")])
            .unwrap();
        complete_all(&mut wizard);

        let mut sink: Vec<FieldValues> = Vec::new();
        wizard.submit(&mut sink).unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(
            sink[0].get("email"),
            Some(&FieldValue::Text("asha@example.com".into()))
        );
        assert_eq!(wizard.phase(), WizardPhase::Submitted);
        assert!(wizard.field_values().is_empty());
        assert!(!wizard.can_submit());
        assert_eq!(wizard.progress_percent(), 100.);

        assert_eq!(wizard.submit(&mut sink), Err(LoanError::AlreadySubmitted));
        assert_eq!(
            wizard.update_section(ApplicationSection::Personal, FieldValues::new()),
            Err(LoanError::AlreadySubmitted)
        );
    }

    #[test]
    fn test_rejected_registration_keeps_state() {
        let mut wizard = WizardState::new();
        wizard
            .update_section(ApplicationSection::Personal, [("email", "asha@example.com")])
            .unwrap();
        complete_all(&mut wizard);

        assert_eq!(
            wizard.submit(&mut RejectingSink),
            Err(LoanError::Registration("email already registered".into()))
        );
        assert_eq!(wizard.phase(), WizardPhase::Ready);
        assert!(wizard.field("email").is_some());
    }

    #[test]
    fn test_completion_is_monotonic() {
        let mut wizard = WizardState::new();
        let sequence = [
            ApplicationSection::Kyc,
            ApplicationSection::Kyc,
            ApplicationSection::Personal,
            ApplicationSection::Kyc,
            ApplicationSection::Employment,
            ApplicationSection::Personal,
            ApplicationSection::Financial,
            ApplicationSection::Financial,
        ];
        let mut last = 0;
        for section in sequence {
            wizard.update_section(section, FieldValues::new()).unwrap();
            assert!(wizard.completed_count() >= last);
            assert!(wizard.completed_count() <= ApplicationSection::ALL.len());
            last = wizard.completed_count();
        }
        assert!(wizard.can_submit());
    }
}
