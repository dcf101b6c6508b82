use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must be worth at least one point")]
    InvalidPoints,

    #[error("multiple-choice questions need at least two options")]
    TooFewOptions,

    #[error("correct answer cannot be empty")]
    MissingCorrectAnswer,
}

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuestionKind {
    #[default]
    MultipleChoice,
    TrueFalse,
    FreeText,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "choix_multiple",
            QuestionKind::TrueFalse => "vrai_faux",
            QuestionKind::FreeText => "texte_libre",
        }
    }

    /// `reponse_courte` is an older spelling of free text still found in stored quizzes.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "choix_multiple" | "multiple_choice" => Some(QuestionKind::MultipleChoice),
            "vrai_faux" | "true_false" => Some(QuestionKind::TrueFalse),
            "texte_libre" | "reponse_courte" | "free_text" => Some(QuestionKind::FreeText),
            _ => None,
        }
    }
}

/// A question belonging to a single quiz.
///
/// `correct_answer` is only populated for admins; students receive questions without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    quiz_id: QuizId,
    text: String,
    kind: QuestionKind,
    correct_answer: Option<String>,
    options: Vec<String>,
    points: u32,
}

impl Question {
    #[must_use]
    pub fn from_persisted(
        id: QuestionId,
        quiz_id: QuizId,
        text: impl Into<String>,
        kind: QuestionKind,
        correct_answer: Option<String>,
        options: Vec<String>,
        points: u32,
    ) -> Self {
        Self {
            id,
            quiz_id,
            text: text.into(),
            kind,
            correct_answer,
            options,
            points,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn correct_answer(&self) -> Option<&str> {
        self.correct_answer.as_deref()
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    /// The choices a student picks from, if the kind has fixed choices.
    #[must_use]
    pub fn choices(&self) -> Vec<String> {
        match self.kind {
            QuestionKind::MultipleChoice => self.options.clone(),
            QuestionKind::TrueFalse => vec!["true".to_string(), "false".to_string()],
            QuestionKind::FreeText => Vec::new(),
        }
    }
}

/// Admin-side input for a new question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub text: String,
    pub kind: QuestionKind,
    pub correct_answer: String,
    pub options: Vec<String>,
    pub points: u32,
}

impl QuestionDraft {
    /// # Errors
    ///
    /// Returns the first `QuestionError` found.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.points == 0 {
            return Err(QuestionError::InvalidPoints);
        }
        if self.correct_answer.trim().is_empty() {
            return Err(QuestionError::MissingCorrectAnswer);
        }
        if self.kind == QuestionKind::MultipleChoice
            && self.options.iter().filter(|opt| !opt.trim().is_empty()).count() < 2
        {
            return Err(QuestionError::TooFewOptions);
        }
        Ok(())
    }
}
