use async_trait::async_trait;
use portal_core::model::{Question, Quiz, QuizId, Submission, SubmissionReceipt};

use crate::error::ApiError;

/// What a quiz session needs from the server.
///
/// `QuizService` is the production implementation; tests substitute fakes.
#[async_trait]
pub trait QuizBackend: Send + Sync {
    /// Fetch quiz metadata and its questions.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` classified by `ApiError::kind`.
    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<(Quiz, Vec<Question>), ApiError>;

    /// Send a frozen submission.
    ///
    /// # Errors
    ///
    /// Returns `ApiError`; a duplicate submission is reported as
    /// `ApiErrorKind::DuplicateSubmission`.
    async fn submit_answers(
        &self,
        quiz_id: QuizId,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, ApiError>;
}
