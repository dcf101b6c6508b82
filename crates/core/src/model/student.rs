use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::StudentId;
use crate::model::payment::PaymentDraft;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudentError {
    #[error("last name cannot be empty")]
    EmptyLastName,

    #[error("first name cannot be empty")]
    EmptyFirstName,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

/// An enrolled student. Inactive students cannot log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Only visible to admins and to the student right after registration.
    pub auth_code: Option<String>,
    pub active: bool,
    pub enrolled_at: Option<DateTime<Utc>>,
}

impl Student {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }

    /// Case-insensitive match over names, email and auth code. Blank terms match everything.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.last_name.as_str()),
            Some(self.first_name.as_str()),
            Some(self.email.as_str()),
            self.auth_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudentStatusFilter {
    #[default]
    All,
    Active,
    Suspended,
}

impl StudentStatusFilter {
    #[must_use]
    pub fn matches(self, student: &Student) -> bool {
        match self {
            StudentStatusFilter::All => true,
            StudentStatusFilter::Active => student.active,
            StudentStatusFilter::Suspended => !student.active,
        }
    }
}

/// Fields an admin fills in to enroll a student directly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudentDraft {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl StudentDraft {
    /// # Errors
    ///
    /// Returns the first missing or malformed field.
    pub fn validate(&self) -> Result<(), StudentError> {
        if self.last_name.trim().is_empty() {
            return Err(StudentError::EmptyLastName);
        }
        if self.first_name.trim().is_empty() {
            return Err(StudentError::EmptyFirstName);
        }
        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !well_formed {
            return Err(StudentError::InvalidEmail(email.to_owned()));
        }
        Ok(())
    }
}

/// Self-registration: a student profile plus the first payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub student: StudentDraft,
    pub payment: PaymentDraft,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Student {
        Student {
            id: StudentId::new(4),
            last_name: "Rakoto".into(),
            first_name: "Hery".into(),
            email: "hery@example.mg".into(),
            phone: None,
            auth_code: Some("AB12CD".into()),
            active: false,
            enrolled_at: None,
        }
    }

    #[test]
    fn search_covers_names_email_and_code() {
        let student = sample();
        assert!(student.matches_search("rako"));
        assert!(student.matches_search("HERY@"));
        assert!(student.matches_search("ab12"));
        assert!(student.matches_search("  "));
        assert!(!student.matches_search("paul"));
    }

    #[test]
    fn status_filter() {
        let student = sample();
        assert!(StudentStatusFilter::All.matches(&student));
        assert!(StudentStatusFilter::Suspended.matches(&student));
        assert!(!StudentStatusFilter::Active.matches(&student));
    }

    #[test]
    fn draft_requires_a_plausible_email() {
        let mut draft = StudentDraft {
            last_name: "Rakoto".into(),
            first_name: "Hery".into(),
            email: "hery".into(),
            phone: None,
        };
        assert_eq!(
            draft.validate(),
            Err(StudentError::InvalidEmail("hery".into()))
        );
        draft.email = "hery@example.mg".into();
        assert_eq!(draft.validate(), Ok(()));
    }
}
