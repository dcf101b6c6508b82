use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz duration must be > 0 minutes")]
    InvalidDuration,

    #[error("quiz ends before it starts")]
    InvalidWindow,

    #[error("quiz is closed and can no longer be edited")]
    Closed,

    #[error("quiz is not editable")]
    NotEditable,
}

//
// ─── KIND & STATUS ─────────────────────────────────────────────────────────────
//

/// What kind of assessment a quiz represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuizKind {
    #[default]
    Quiz,
    Exam,
    Test,
    Exercise,
}

impl QuizKind {
    /// Wire code used by the portal API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::Quiz => "quiz",
            QuizKind::Exam => "examen",
            QuizKind::Test => "test",
            QuizKind::Exercise => "exercice",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quiz" => Some(QuizKind::Quiz),
            "examen" | "exam" => Some(QuizKind::Exam),
            "test" => Some(QuizKind::Test),
            "exercice" | "exercise" => Some(QuizKind::Exercise),
            _ => None,
        }
    }
}

/// Publication status of a quiz.
///
/// The backend stores drafts as `inactif`; `brouillon` is accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuizStatus {
    #[default]
    Draft,
    Scheduled,
    Active,
    Closed,
}

impl QuizStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Draft => "inactif",
            QuizStatus::Scheduled => "planifie",
            QuizStatus::Active => "actif",
            QuizStatus::Closed => "clos",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "brouillon" | "draft" | "inactif" => Some(QuizStatus::Draft),
            "planifie" | "scheduled" => Some(QuizStatus::Scheduled),
            "actif" | "active" => Some(QuizStatus::Active),
            "clos" | "closed" => Some(QuizStatus::Closed),
            _ => None,
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A quiz as seen by the portal client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    kind: QuizKind,
    total_points: u32,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    duration_minutes: u32,
    status: QuizStatus,
    editable: bool,
}

impl Quiz {
    /// Rehydrate a quiz from normalized backend data.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidDuration` when the duration is zero, and
    /// `QuizError::InvalidWindow` when both bounds are known and inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuizId,
        title: impl Into<String>,
        kind: QuizKind,
        total_points: u32,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
        duration_minutes: u32,
        status: QuizStatus,
        editable: bool,
    ) -> Result<Self, QuizError> {
        if duration_minutes == 0 {
            return Err(QuizError::InvalidDuration);
        }
        if let (Some(start), Some(end)) = (starts_at, ends_at) {
            if end < start {
                return Err(QuizError::InvalidWindow);
            }
        }
        Ok(Self {
            id,
            title: title.into(),
            kind,
            total_points,
            starts_at,
            ends_at,
            duration_minutes,
            status,
            editable,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn kind(&self) -> QuizKind {
        self.kind
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.total_points
    }

    #[must_use]
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at
    }

    #[must_use]
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Allotted time in seconds (`duration_minutes * 60`).
    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn status(&self) -> QuizStatus {
        self.status
    }

    /// A closed quiz is immutable regardless of the stored flag.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.editable && self.status != QuizStatus::Closed
    }

    /// Ensure questions can still be added or changed.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Closed` or `QuizError::NotEditable`.
    pub fn ensure_editable(&self) -> Result<(), QuizError> {
        if self.status == QuizStatus::Closed {
            return Err(QuizError::Closed);
        }
        if !self.editable {
            return Err(QuizError::NotEditable);
        }
        Ok(())
    }

    /// Whether a student can take this quiz at `now`.
    ///
    /// An explicit status wins; the date window is the fallback for quizzes whose
    /// status was never set.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            QuizStatus::Active => true,
            QuizStatus::Closed => false,
            QuizStatus::Draft | QuizStatus::Scheduled => {
                let started = self.starts_at.is_none_or(|start| start <= now);
                let not_ended = self.ends_at.is_none_or(|end| now <= end);
                self.starts_at.is_some() && started && not_ended
            }
        }
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Admin-side input for creating or updating a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizDraft {
    pub title: String,
    pub kind: QuizKind,
    pub total_points: Option<u32>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: QuizStatus,
}

impl QuizDraft {
    /// Check the draft before it is sent to the backend.
    ///
    /// # Errors
    ///
    /// Returns the first `QuizError` found.
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if self.duration_minutes == 0 {
            return Err(QuizError::InvalidDuration);
        }
        if self.ends_at < self.starts_at {
            return Err(QuizError::InvalidWindow);
        }
        Ok(())
    }
}
