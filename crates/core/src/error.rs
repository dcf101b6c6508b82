use thiserror::Error;

use crate::model::{
    AttemptError, NotificationError, PaymentError, QuestionError, QuizError, StudentError,
};

/// Any validation or state error raised by the domain layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Student(#[from] StudentError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}
