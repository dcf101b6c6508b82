use std::sync::Arc;

use portal_core::model::{
    AttemptError, AttemptPhase, QuestionId, QuizAttempt, QuizId, Submission, SubmissionGate,
    SubmissionReceipt, SubmitTrigger, TickOutcome,
};
use tracing::{info, warn};

use crate::error::{ApiError, ApiErrorKind, QuizSessionError};

use super::backend::QuizBackend;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Where the controller is in `idle → loaded → running → submitting → submitted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loaded,
    Running,
    Submitting,
    Submitted,
}

impl From<AttemptPhase> for SessionPhase {
    fn from(phase: AttemptPhase) -> Self {
        match phase {
            AttemptPhase::Loaded => SessionPhase::Loaded,
            AttemptPhase::Running => SessionPhase::Running,
            AttemptPhase::Submitting => SessionPhase::Submitting,
            AttemptPhase::Submitted => SessionPhase::Submitted,
        }
    }
}

/// Result of a submission request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Unanswered questions remain; nothing was sent. Retry with `SubmitTrigger::Confirmed`.
    ConfirmationRequired { unanswered: usize },
    /// Graded by the server. The session is complete.
    Submitted {
        receipt: SubmissionReceipt,
        elapsed_secs: u32,
        trigger: SubmitTrigger,
    },
    /// The server already had a submission. The session is complete and must not retry.
    AlreadySubmitted { message: String },
}

impl SubmitOutcome {
    /// True when the session reached `submitted` and the caller should leave the quiz.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, SubmitOutcome::ConfirmationRequired { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    /// No running session, or a submission is already under way.
    Ignored,
    Counting { remaining_secs: u32 },
    /// Time ran out and the automatic submission went through.
    Expired(SubmitOutcome),
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Owns at most one quiz attempt and drives it against the backend.
///
/// The controller is single-owner: every operation takes `&mut self`, so a tick
/// and a manual submit can never interleave. Whichever reaches the attempt first
/// freezes the submission; the other sees `Submitting` and is ignored or resends
/// the same payload.
pub struct QuizSessionController {
    backend: Arc<dyn QuizBackend>,
    attempt: Option<QuizAttempt>,
}

impl QuizSessionController {
    #[must_use]
    pub fn new(backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            backend,
            attempt: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.attempt
            .as_ref()
            .map_or(SessionPhase::Idle, |attempt| attempt.phase().into())
    }

    #[must_use]
    pub fn attempt(&self) -> Option<&QuizAttempt> {
        self.attempt.as_ref()
    }

    /// Fetch the quiz and its questions and hold them as a loaded attempt.
    ///
    /// A finished attempt is replaced; an unfinished one blocks loading.
    ///
    /// # Errors
    ///
    /// - `QuizSessionError::AlreadyActive` while another attempt is unfinished.
    /// - `QuizSessionError::NotFound` when the quiz is missing, not accessible, or
    ///   has no questions.
    /// - `QuizSessionError::Load` for network and decoding failures.
    pub async fn load_quiz(&mut self, quiz_id: QuizId) -> Result<&QuizAttempt, QuizSessionError> {
        if self.phase() != SessionPhase::Idle && self.phase() != SessionPhase::Submitted {
            return Err(QuizSessionError::AlreadyActive);
        }

        let (quiz, questions) = self.backend.fetch_quiz(quiz_id).await.map_err(|err| {
            match err.kind() {
                ApiErrorKind::NotFound | ApiErrorKind::Forbidden => {
                    QuizSessionError::NotFound(quiz_id)
                }
                _ => QuizSessionError::Load(err),
            }
        })?;

        let attempt = QuizAttempt::new(quiz, questions).map_err(|err| match err {
            AttemptError::NoQuestions => QuizSessionError::NotFound(quiz_id),
            other => QuizSessionError::Attempt(other),
        })?;
        info!(
            quiz_id = %quiz_id,
            questions = attempt.questions().len(),
            remaining_secs = attempt.remaining_secs(),
            "quiz loaded"
        );
        Ok(self.attempt.insert(attempt))
    }

    /// `loaded → running`. The caller starts its countdown after this returns.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NotLoaded` or an attempt transition error.
    pub fn start(&mut self) -> Result<(), QuizSessionError> {
        let attempt = self.attempt_mut()?;
        attempt.start()?;
        info!(quiz_id = %attempt.quiz().id(), "quiz started");
        Ok(())
    }

    /// Upsert an answer.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NotLoaded`, or an attempt error when the session
    /// is not running or the question is foreign.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<(), QuizSessionError> {
        self.attempt_mut()?.record_answer(question_id, value)?;
        Ok(())
    }

    /// Move the visible question. Out-of-range indices are ignored.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NotLoaded` without an attempt.
    pub fn navigate(&mut self, index: usize) -> Result<usize, QuizSessionError> {
        Ok(self.attempt_mut()?.navigate(index))
    }

    /// Forward one countdown tick. Reaching zero submits automatically, once.
    ///
    /// # Errors
    ///
    /// Same as `submit` for the automatic submission. After a retryable failure
    /// the session stays `Submitting`; call `submit` to resend.
    pub async fn tick(&mut self) -> Result<TickEvent, QuizSessionError> {
        let Some(attempt) = self.attempt.as_mut() else {
            return Ok(TickEvent::Ignored);
        };
        match attempt.tick() {
            TickOutcome::Ignored => Ok(TickEvent::Ignored),
            TickOutcome::Counting { remaining_secs } => Ok(TickEvent::Counting { remaining_secs }),
            TickOutcome::Expired(submission) => {
                info!(quiz_id = %attempt.quiz().id(), "time is up, submitting automatically");
                self.send(submission).await.map(TickEvent::Expired)
            }
        }
    }

    /// Submit the attempt.
    ///
    /// While `Submitting`, the frozen payload is resent regardless of `trigger`.
    ///
    /// # Errors
    ///
    /// - `QuizSessionError::SubmissionNetwork`: transient; the session stays
    ///   `Submitting` and the same call may be repeated.
    /// - `QuizSessionError::Validation` / `Unauthorized`: the server refused the
    ///   payload; the session stays `Submitting` and the caller should leave.
    /// - `QuizSessionError::Attempt(AttemptError::Completed)` after completion.
    pub async fn submit(&mut self, trigger: SubmitTrigger) -> Result<SubmitOutcome, QuizSessionError> {
        let gate = self.attempt_mut()?.begin_submission(trigger)?;
        match gate {
            SubmissionGate::ConfirmationRequired { unanswered } => {
                Ok(SubmitOutcome::ConfirmationRequired { unanswered })
            }
            SubmissionGate::Ready(submission) => self.send(submission).await,
        }
    }

    /// Drop the current attempt, whatever its phase. In-flight results are lost.
    pub fn abandon(&mut self) {
        let Some(attempt) = self.attempt.take() else {
            return;
        };
        if attempt.phase() != AttemptPhase::Submitted {
            info!(quiz_id = %attempt.quiz().id(), phase = %attempt.phase(), "quiz abandoned");
        }
    }

    async fn send(&mut self, submission: Submission) -> Result<SubmitOutcome, QuizSessionError> {
        let quiz_id = self.attempt_mut()?.quiz().id();
        let result = self.backend.submit_answers(quiz_id, &submission).await;
        let attempt = self.attempt_mut()?;

        match result {
            Ok(receipt) => {
                attempt.complete()?;
                info!(
                    quiz_id = %quiz_id,
                    elapsed_secs = submission.elapsed_secs,
                    answers = submission.answers.len(),
                    "quiz submitted"
                );
                Ok(SubmitOutcome::Submitted {
                    receipt,
                    elapsed_secs: submission.elapsed_secs,
                    trigger: submission.trigger,
                })
            }
            Err(err) => Self::classify_failure(attempt, quiz_id, err),
        }
    }

    fn classify_failure(
        attempt: &mut QuizAttempt,
        quiz_id: QuizId,
        err: ApiError,
    ) -> Result<SubmitOutcome, QuizSessionError> {
        if err.is_retryable() {
            warn!(quiz_id = %quiz_id, error = %err, "submission failed, can be retried");
            return Err(QuizSessionError::SubmissionNetwork(err));
        }
        match err.kind() {
            ApiErrorKind::DuplicateSubmission => {
                attempt.complete()?;
                info!(quiz_id = %quiz_id, "quiz was already submitted");
                Ok(SubmitOutcome::AlreadySubmitted {
                    message: err.message(),
                })
            }
            ApiErrorKind::Unauthorized => {
                warn!(quiz_id = %quiz_id, "submission refused: session expired");
                Err(QuizSessionError::Unauthorized)
            }
            _ => {
                warn!(quiz_id = %quiz_id, error = %err, "submission rejected");
                Err(QuizSessionError::Validation {
                    message: err.message(),
                })
            }
        }
    }

    fn attempt_mut(&mut self) -> Result<&mut QuizAttempt, QuizSessionError> {
        self.attempt.as_mut().ok_or(QuizSessionError::NotLoaded)
    }
}

impl std::fmt::Debug for QuizSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSessionController")
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
