use async_trait::async_trait;
use portal_core::Clock;
use portal_core::model::{
    Question, QuestionDraft, QuestionId, Quiz, QuizDraft, QuizId, QuizResult, QuizStatus,
    StudentId, Submission, SubmissionReceipt,
};
use serde::Serialize;
use serde_json::Value;

use crate::api::ApiClient;
use crate::api::wire::{
    AnswerBody, Envelope, QuestionBody, QuizBody, RawCreated, RawQuiz, RawQuizDetail, RawResult,
    RawSubmission, SubmitBody, normalize_all,
};
use crate::error::{ApiError, ServiceError};
use crate::sessions::QuizBackend;

/// Quiz listing, authoring and submission.
#[derive(Clone)]
pub struct QuizService {
    client: ApiClient,
    clock: Clock,
}

#[derive(Serialize)]
struct StatusBody {
    statut: &'static str,
}

impl QuizService {
    #[must_use]
    pub fn new(client: ApiClient, clock: Clock) -> Self {
        Self { client, clock }
    }

    /// Every quiz the caller may see: all of them for admins, currently open ones for students.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_quizzes(&self) -> Result<Vec<Quiz>, ServiceError> {
        let envelope: Envelope<Vec<RawQuiz>> = self.client.get_json("quizzes").await?;
        Ok(normalize_all(envelope.into_data()?, RawQuiz::normalize)?)
    }

    /// Quizzes a student can take right now.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn open_quizzes(&self) -> Result<Vec<Quiz>, ServiceError> {
        let now = self.clock.now();
        let mut quizzes = self.list_quizzes().await?;
        quizzes.retain(|quiz| quiz.is_open_at(now));
        Ok(quizzes)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn quiz_with_questions(
        &self,
        quiz_id: QuizId,
    ) -> Result<(Quiz, Vec<Question>), ServiceError> {
        Ok(self.fetch_quiz(quiz_id).await?)
    }

    /// Create a quiz together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` if a draft fails validation, and
    /// `ServiceError::Api` if the backend refuses it.
    pub async fn create_quiz(
        &self,
        draft: &QuizDraft,
        questions: &[QuestionDraft],
    ) -> Result<QuizId, ServiceError> {
        validate_drafts(draft, questions)?;
        let created: RawCreated = self
            .client
            .post_json("quizzes", &QuizBody::new(draft, questions))
            .await?;
        let id = created
            .id("quiz_id")
            .ok_or_else(|| ApiError::Decode("created quiz has no id".into()))?;
        Ok(QuizId::new(id))
    }

    /// Replace a quiz and its questions.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` when the quiz is no longer editable or a
    /// draft is invalid, and `ServiceError::Api` for backend failures.
    pub async fn update_quiz(
        &self,
        quiz: &Quiz,
        draft: &QuizDraft,
        questions: &[QuestionDraft],
    ) -> Result<(), ServiceError> {
        quiz.ensure_editable().map_err(portal_core::Error::from)?;
        validate_drafts(draft, questions)?;
        let _: Value = self
            .client
            .put_json(&format!("admin/quiz/{}", quiz.id()), &QuizBody::new(draft, questions))
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the backend refuses the status.
    pub async fn set_status(&self, quiz_id: QuizId, status: QuizStatus) -> Result<(), ServiceError> {
        let _: Value = self
            .client
            .patch_json(
                &format!("admin/quiz/{quiz_id}/status"),
                &StatusBody {
                    statut: status.as_str(),
                },
            )
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn delete_quiz(&self, quiz_id: QuizId) -> Result<(), ServiceError> {
        self.client.delete(&format!("admin/quiz/{quiz_id}")).await?;
        Ok(())
    }

    /// Append one question to an editable quiz.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` when the quiz is locked or the draft is
    /// invalid, and `ServiceError::Api` for backend failures.
    pub async fn add_question(
        &self,
        quiz: &Quiz,
        draft: &QuestionDraft,
    ) -> Result<QuestionId, ServiceError> {
        quiz.ensure_editable().map_err(portal_core::Error::from)?;
        draft.validate().map_err(portal_core::Error::from)?;
        let created: RawCreated = self
            .client
            .post_json(
                &format!("quizzes/{}/questions", quiz.id()),
                &QuestionBody::from(draft),
            )
            .await?;
        let id = created
            .id("question_id")
            .ok_or_else(|| ApiError::Decode("created question has no id".into()))?;
        Ok(QuestionId::new(id))
    }

    /// Graded attempts of one student, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn results_for(&self, student_id: StudentId) -> Result<Vec<QuizResult>, ServiceError> {
        let envelope: Envelope<Vec<RawResult>> = self
            .client
            .get_json(&format!("student/{student_id}/results"))
            .await?;
        Ok(normalize_all(envelope.data.unwrap_or_default(), RawResult::normalize)?)
    }

    /// Every graded attempt. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn all_results(&self) -> Result<Vec<QuizResult>, ServiceError> {
        let envelope: Envelope<Vec<RawResult>> = self.client.get_json("admin/results").await?;
        Ok(normalize_all(envelope.data.unwrap_or_default(), RawResult::normalize)?)
    }

    /// Graded attempts of one quiz. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn results_for_quiz(&self, quiz_id: QuizId) -> Result<Vec<QuizResult>, ServiceError> {
        let envelope: Envelope<Vec<RawResult>> = self
            .client
            .get_json(&format!("admin/quiz/{quiz_id}/results"))
            .await?;
        Ok(normalize_all(envelope.data.unwrap_or_default(), RawResult::normalize)?)
    }
}

fn validate_drafts(draft: &QuizDraft, questions: &[QuestionDraft]) -> Result<(), ServiceError> {
    draft.validate().map_err(portal_core::Error::from)?;
    for question in questions {
        question.validate().map_err(portal_core::Error::from)?;
    }
    Ok(())
}

#[async_trait]
impl QuizBackend for QuizService {
    async fn fetch_quiz(&self, quiz_id: QuizId) -> Result<(Quiz, Vec<Question>), ApiError> {
        let raw: RawQuizDetail = self.client.get_json(&format!("quizzes/{quiz_id}")).await?;
        raw.normalize()
    }

    async fn submit_answers(
        &self,
        quiz_id: QuizId,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, ApiError> {
        let body = SubmitBody {
            answers: submission
                .answers
                .iter()
                .map(|entry| AnswerBody {
                    question_id: entry.question_id.value(),
                    reponse: entry.answer_text.clone(),
                })
                .collect(),
            temps_utilise: submission.elapsed_secs,
        };
        let reply: Value = self
            .client
            .post_json(&format!("quizzes/{quiz_id}/submit"), &body)
            .await?;
        Ok(RawSubmission::receipt_from(&reply))
    }
}
