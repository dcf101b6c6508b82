use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{PaymentId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PaymentError {
    #[error("payment amount must be > 0")]
    InvalidAmount,

    #[error("mvola payments need a transaction reference")]
    MissingReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaymentMode {
    #[default]
    Mvola,
    Cash,
}

impl PaymentMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMode::Mvola => "mvola",
            PaymentMode::Cash => "espece",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mvola" => Some(PaymentMode::Mvola),
            "espece" | "especes" | "cash" => Some(PaymentMode::Cash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaymentStatus {
    Complete,
    Installment,
    #[default]
    Pending,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Complete => "complet",
            PaymentStatus::Installment => "par_tranche",
            PaymentStatus::Pending => "en_attente",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "complet" | "complete" => Some(PaymentStatus::Complete),
            "par_tranche" | "partial" => Some(PaymentStatus::Installment),
            "en_attente" | "pending" => Some(PaymentStatus::Pending),
            _ => None,
        }
    }
}

/// A tuition payment. Amounts are in ariary.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub student_id: StudentId,
    pub mode: PaymentMode,
    pub mvola_reference: Option<String>,
    pub amount: f64,
    pub status: PaymentStatus,
    pub remaining_installment: f64,
    pub paid_at: Option<DateTime<Utc>>,
    /// Joined in by the admin listing; absent on the student's own listing.
    pub student_name: Option<String>,
    pub student_email: Option<String>,
}

impl Payment {
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            self.student_name.as_deref(),
            self.student_email.as_deref(),
            self.mvola_reference.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    pub mode: PaymentMode,
    pub mvola_reference: Option<String>,
    pub amount: f64,
    pub status: PaymentStatus,
    pub remaining_installment: f64,
}

impl PaymentDraft {
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for non-positive or non-finite
    /// amounts and `PaymentError::MissingReference` for Mvola payments without one.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(PaymentError::InvalidAmount);
        }
        let has_reference = self
            .mvola_reference
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if self.mode == PaymentMode::Mvola && !has_reference {
            return Err(PaymentError::MissingReference);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PaymentDraft {
        PaymentDraft {
            mode: PaymentMode::Mvola,
            mvola_reference: Some("MV-001".into()),
            amount: 50_000.0,
            status: PaymentStatus::Pending,
            remaining_installment: 0.0,
        }
    }

    #[test]
    fn mvola_requires_reference() {
        let mut d = draft();
        assert_eq!(d.validate(), Ok(()));
        d.mvola_reference = Some("  ".into());
        assert_eq!(d.validate(), Err(PaymentError::MissingReference));
        d.mode = PaymentMode::Cash;
        assert_eq!(d.validate(), Ok(()));
    }

    #[test]
    fn amount_must_be_positive() {
        let mut d = draft();
        d.amount = 0.0;
        assert_eq!(d.validate(), Err(PaymentError::InvalidAmount));
        d.amount = f64::NAN;
        assert_eq!(d.validate(), Err(PaymentError::InvalidAmount));
    }

    #[test]
    fn status_codes() {
        assert_eq!(PaymentStatus::parse("par_tranche"), Some(PaymentStatus::Installment));
        assert_eq!(PaymentStatus::Complete.as_str(), "complet");
        assert_eq!(PaymentMode::parse("ESPECE"), Some(PaymentMode::Cash));
        assert_eq!(PaymentStatus::parse("refunded"), None);
    }
}
