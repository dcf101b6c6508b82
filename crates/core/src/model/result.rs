use chrono::{DateTime, Utc};

use crate::model::ids::{QuizId, ResultId, StudentId};

/// A graded attempt as stored by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizResult {
    pub id: ResultId,
    pub quiz_id: QuizId,
    pub student_id: Option<StudentId>,
    pub score: f64,
    /// Total points of the quiz, when the listing includes it.
    pub max_score: Option<f64>,
    pub time_used_secs: u32,
    pub taken_at: Option<DateTime<Utc>>,
}

impl QuizResult {
    /// `score / max_score` in `[0, 1]`, when the maximum is known.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        self.max_score
            .filter(|max| *max > 0.0)
            .map(|max| (self.score / max).clamp(0.0, 1.0))
    }
}

/// What the server tells a student right after grading. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReceipt {
    pub message: Option<String>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub percentage: Option<f64>,
    pub total_questions: Option<u32>,
    pub correct_answers: Option<u32>,
    pub time_used_secs: Option<u32>,
}
