use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{NotificationId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("notification title cannot be empty")]
    EmptyTitle,

    #[error("notification message cannot be empty")]
    EmptyMessage,

    #[error("individual notifications need a recipient")]
    MissingRecipient,
}

/// Who receives a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationTarget {
    All,
    Student(StudentId),
}

impl NotificationTarget {
    /// Wire code of the target kind (`tous` / `individuel`).
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            NotificationTarget::All => "tous",
            NotificationTarget::Student(_) => "individuel",
        }
    }

    #[must_use]
    pub fn recipient(self) -> Option<StudentId> {
        match self {
            NotificationTarget::All => None,
            NotificationTarget::Student(id) => Some(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub target: NotificationTarget,
    pub sent_at: Option<DateTime<Utc>>,
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub title: String,
    pub message: String,
    pub individual: bool,
    pub recipient: Option<StudentId>,
}

impl NotificationDraft {
    /// Validate and resolve the target.
    ///
    /// # Errors
    ///
    /// Returns the first empty field, or `NotificationError::MissingRecipient`.
    pub fn validate(&self) -> Result<NotificationTarget, NotificationError> {
        if self.title.trim().is_empty() {
            return Err(NotificationError::EmptyTitle);
        }
        if self.message.trim().is_empty() {
            return Err(NotificationError::EmptyMessage);
        }
        if !self.individual {
            return Ok(NotificationTarget::All);
        }
        self.recipient
            .map(NotificationTarget::Student)
            .ok_or(NotificationError::MissingRecipient)
    }
}
