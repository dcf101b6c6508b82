//! Client-side state of one student working through one quiz.
//!
//! `QuizAttempt` is a pure state machine: it never performs I/O and never reads the
//! wall clock. Time only advances through [`QuizAttempt::tick`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::model::quiz::Quiz;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("cannot {action} while the attempt is {phase}")]
    InvalidTransition {
        phase: AttemptPhase,
        action: &'static str,
    },

    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(QuestionId),

    #[error("attempt already submitted")]
    Completed,
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of an attempt. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptPhase {
    Loaded,
    Running,
    Submitting,
    Submitted,
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttemptPhase::Loaded => "loaded",
            AttemptPhase::Running => "running",
            AttemptPhase::Submitting => "submitting",
            AttemptPhase::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// Question id → answer text, one entry per answered question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerMap {
    entries: BTreeMap<QuestionId, String>,
}

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an answer, returning the previous value.
    pub fn record(&mut self, question_id: QuestionId, value: impl Into<String>) -> Option<String> {
        self.entries.insert(question_id, value.into())
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&str> {
        self.entries.get(&question_id).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, question_id: QuestionId) -> bool {
        self.entries.contains_key(&question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &str)> {
        self.entries.iter().map(|(id, value)| (*id, value.as_str()))
    }

    fn to_entries(&self) -> Vec<AnswerEntry> {
        self.entries
            .iter()
            .map(|(question_id, answer_text)| AnswerEntry {
                question_id: *question_id,
                answer_text: answer_text.clone(),
            })
            .collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEntry {
    pub question_id: QuestionId,
    pub answer_text: String,
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// Student pressed submit; unanswered questions require confirmation.
    Manual,
    /// Student pressed submit and already confirmed leaving questions unanswered.
    Confirmed,
    /// The countdown reached zero.
    Timeout,
}

impl SubmitTrigger {
    #[must_use]
    pub fn is_auto(self) -> bool {
        matches!(self, SubmitTrigger::Timeout)
    }
}

/// Frozen payload of a submission. Retries resend exactly this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub answers: Vec<AnswerEntry>,
    pub elapsed_secs: u32,
    pub trigger: SubmitTrigger,
}

/// Result of asking the attempt to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionGate {
    /// Nothing was frozen; the caller must confirm before trying again.
    ConfirmationRequired { unanswered: usize },
    /// Payload to send. The attempt is now `Submitting`.
    Ready(Submission),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The attempt is not running; nothing changed.
    Ignored,
    Counting { remaining_secs: u32 },
    /// Time ran out on this tick. A timeout submission has been frozen.
    Expired(Submission),
}

/// Colour band of the remaining time, relative to the allotted time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBand {
    Comfortable,
    Warning,
    Critical,
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct QuizAttempt {
    quiz: Quiz,
    questions: Vec<Question>,
    current: usize,
    answers: AnswerMap,
    remaining_secs: u32,
    phase: AttemptPhase,
    pending: Option<Submission>,
}

impl QuizAttempt {
    /// Build a loaded attempt with the full allotted time remaining.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NoQuestions` if `questions` is empty.
    pub fn new(quiz: Quiz, questions: Vec<Question>) -> Result<Self, AttemptError> {
        if questions.is_empty() {
            return Err(AttemptError::NoQuestions);
        }
        let remaining_secs = quiz.duration_secs();
        Ok(Self {
            quiz,
            questions,
            current: 0,
            answers: AnswerMap::new(),
            remaining_secs,
            phase: AttemptPhase::Loaded,
            pending: None,
        })
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// `duration * 60 - remaining`, never negative.
    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.quiz.duration_secs().saturating_sub(self.remaining_secs)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    #[must_use]
    pub fn pending_submission(&self) -> Option<&Submission> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|q| !self.answers.contains(q.id()))
            .count()
    }

    /// Share of questions answered, 0–100.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        let total = self.questions.len();
        let answered = total - self.unanswered_count();
        u32::try_from(answered * 100 / total).unwrap_or(100)
    }

    /// More than half left is comfortable, more than a fifth is a warning.
    #[must_use]
    pub fn time_band(&self) -> TimeBand {
        let total = u64::from(self.quiz.duration_secs().max(1));
        let remaining = u64::from(self.remaining_secs);
        if remaining * 100 > total * 50 {
            TimeBand::Comfortable
        } else if remaining * 100 > total * 20 {
            TimeBand::Warning
        } else {
            TimeBand::Critical
        }
    }

    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt is `Loaded`.
    pub fn start(&mut self) -> Result<(), AttemptError> {
        self.expect_phase(AttemptPhase::Loaded, "start")?;
        self.phase = AttemptPhase::Running;
        Ok(())
    }

    /// Upsert an answer. The value is not checked against the question kind.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless running, or
    /// `AttemptError::UnknownQuestion` for ids outside this quiz.
    pub fn record_answer(
        &mut self,
        question_id: QuestionId,
        value: impl Into<String>,
    ) -> Result<(), AttemptError> {
        self.expect_phase(AttemptPhase::Running, "record an answer")?;
        if !self.questions.iter().any(|q| q.id() == question_id) {
            return Err(AttemptError::UnknownQuestion(question_id));
        }
        self.answers.record(question_id, value);
        Ok(())
    }

    /// Move the visible-question pointer. Out-of-range indices are ignored.
    pub fn navigate(&mut self, index: usize) -> usize {
        if index < self.questions.len() {
            self.current = index;
        }
        self.current
    }

    /// Advance the countdown by one second.
    ///
    /// Reaching zero freezes a timeout submission and moves to `Submitting`, so a
    /// later tick can never expire the attempt a second time.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != AttemptPhase::Running {
            return TickOutcome::Ignored;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return TickOutcome::Counting {
                remaining_secs: self.remaining_secs,
            };
        }
        TickOutcome::Expired(self.freeze(SubmitTrigger::Timeout))
    }

    /// Request a submission.
    ///
    /// While `Submitting`, the previously frozen payload is returned unchanged so
    /// retries are byte-for-byte identical.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Completed` once submitted and
    /// `AttemptError::InvalidTransition` before the attempt has started.
    pub fn begin_submission(&mut self, trigger: SubmitTrigger) -> Result<SubmissionGate, AttemptError> {
        match self.phase {
            AttemptPhase::Loaded => Err(AttemptError::InvalidTransition {
                phase: self.phase,
                action: "submit",
            }),
            AttemptPhase::Submitted => Err(AttemptError::Completed),
            AttemptPhase::Submitting => self
                .pending
                .clone()
                .map(SubmissionGate::Ready)
                .ok_or(AttemptError::InvalidTransition {
                    phase: self.phase,
                    action: "resend",
                }),
            AttemptPhase::Running => {
                let unanswered = self.unanswered_count();
                if trigger == SubmitTrigger::Manual && unanswered > 0 {
                    return Ok(SubmissionGate::ConfirmationRequired { unanswered });
                }
                Ok(SubmissionGate::Ready(self.freeze(trigger)))
            }
        }
    }

    /// Mark the frozen submission as accepted and drop the answers.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless `Submitting`.
    pub fn complete(&mut self) -> Result<Submission, AttemptError> {
        self.expect_phase(AttemptPhase::Submitting, "complete")?;
        let submission = self.pending.take().ok_or(AttemptError::InvalidTransition {
            phase: self.phase,
            action: "complete",
        })?;
        self.answers.clear();
        self.phase = AttemptPhase::Submitted;
        Ok(submission)
    }

    fn freeze(&mut self, trigger: SubmitTrigger) -> Submission {
        let submission = Submission {
            answers: self.answers.to_entries(),
            elapsed_secs: self.elapsed_secs(),
            trigger,
        };
        self.pending = Some(submission.clone());
        self.phase = AttemptPhase::Submitting;
        submission
    }

    fn expect_phase(&self, expected: AttemptPhase, action: &'static str) -> Result<(), AttemptError> {
        if self.phase == AttemptPhase::Submitted {
            return Err(AttemptError::Completed);
        }
        if self.phase != expected {
            return Err(AttemptError::InvalidTransition {
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for QuizAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizAttempt")
            .field("quiz_id", &self.quiz.id())
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_secs", &self.remaining_secs)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// `MM:SS`, minutes are not wrapped into hours.
#[must_use]
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuizId;
    use crate::model::question::QuestionKind;
    use crate::model::quiz::{QuizKind, QuizStatus};

    fn build_quiz(minutes: u32) -> Quiz {
        Quiz::from_persisted(
            QuizId::new(1),
            "Chemistry",
            QuizKind::Quiz,
            2,
            None,
            None,
            minutes,
            QuizStatus::Active,
            false,
        )
        .unwrap()
    }

    fn build_question(id: u64) -> Question {
        Question::from_persisted(
            QuestionId::new(id),
            QuizId::new(1),
            format!("Q{id}"),
            QuestionKind::FreeText,
            None,
            Vec::new(),
            1,
        )
    }

    fn running(minutes: u32, questions: u64) -> QuizAttempt {
        let mut attempt =
            QuizAttempt::new(build_quiz(minutes), (1..=questions).map(build_question).collect())
                .unwrap();
        attempt.start().unwrap();
        attempt
    }

    #[test]
    fn debug_output_hides_answer_text() {
        let mut attempt = running(10, 2);
        attempt.record_answer(QuestionId::new(1), "secret answer").unwrap();
        let rendered = format!("{attempt:?}");
        assert!(rendered.starts_with("QuizAttempt"));
        assert!(rendered.contains("answers_len: 1"));
        assert!(!rendered.contains("secret answer"));
        let cloned = attempt.clone();
        assert_eq!(cloned.remaining_secs(), attempt.remaining_secs());
    }

    #[test]
    fn empty_quiz_cannot_be_attempted() {
        let err = QuizAttempt::new(build_quiz(10), Vec::new()).unwrap_err();
        assert_eq!(err, AttemptError::NoQuestions);
    }

    #[test]
    fn remaining_time_starts_at_full_duration() {
        let attempt = QuizAttempt::new(build_quiz(60), vec![build_question(1)]).unwrap();
        assert_eq!(attempt.remaining_secs(), 3600);
        assert_eq!(attempt.phase(), AttemptPhase::Loaded);
    }

    #[test]
    fn answers_cannot_be_recorded_before_start() {
        let mut attempt = QuizAttempt::new(build_quiz(1), vec![build_question(1)]).unwrap();
        let err = attempt.record_answer(QuestionId::new(1), "x").unwrap_err();
        assert!(matches!(err, AttemptError::InvalidTransition { .. }));
    }

    #[test]
    fn recording_twice_keeps_latest_value() {
        let mut attempt = running(1, 2);
        attempt.record_answer(QuestionId::new(1), "first").unwrap();
        attempt.record_answer(QuestionId::new(1), "second").unwrap();
        assert_eq!(attempt.answers().len(), 1);
        assert_eq!(attempt.answers().get(QuestionId::new(1)), Some("second"));
    }

    #[test]
    fn unknown_question_is_rejected() {
        let mut attempt = running(1, 2);
        let err = attempt.record_answer(QuestionId::new(99), "x").unwrap_err();
        assert_eq!(err, AttemptError::UnknownQuestion(QuestionId::new(99)));
    }

    #[test]
    fn navigate_ignores_out_of_range() {
        let mut attempt = running(1, 3);
        assert_eq!(attempt.navigate(2), 2);
        assert_eq!(attempt.navigate(3), 2);
        assert_eq!(attempt.navigate(0), 0);
        assert!(attempt.answers().is_empty());
    }

    #[test]
    fn ticks_are_ignored_until_started() {
        let mut attempt = QuizAttempt::new(build_quiz(1), vec![build_question(1)]).unwrap();
        assert_eq!(attempt.tick(), TickOutcome::Ignored);
        assert_eq!(attempt.remaining_secs(), 60);
    }

    #[test]
    fn expiry_freezes_exactly_once() {
        let mut attempt = running(1, 2);
        attempt.record_answer(QuestionId::new(1), "a").unwrap();
        for expected in (1..60).rev() {
            assert_eq!(
                attempt.tick(),
                TickOutcome::Counting {
                    remaining_secs: expected
                }
            );
        }
        let TickOutcome::Expired(submission) = attempt.tick() else {
            panic!("expected expiry");
        };
        assert_eq!(submission.elapsed_secs, 60);
        assert_eq!(submission.answers.len(), 1);
        assert_eq!(submission.trigger, SubmitTrigger::Timeout);
        assert_eq!(attempt.phase(), AttemptPhase::Submitting);

        assert_eq!(attempt.tick(), TickOutcome::Ignored);
        assert_eq!(attempt.remaining_secs(), 0);
    }

    #[test]
    fn manual_submit_with_gaps_requires_confirmation() {
        let mut attempt = running(1, 2);
        attempt.record_answer(QuestionId::new(1), "a").unwrap();
        let gate = attempt.begin_submission(SubmitTrigger::Manual).unwrap();
        assert_eq!(gate, SubmissionGate::ConfirmationRequired { unanswered: 1 });
        assert_eq!(attempt.phase(), AttemptPhase::Running);

        let gate = attempt.begin_submission(SubmitTrigger::Confirmed).unwrap();
        assert!(matches!(gate, SubmissionGate::Ready(_)));
        assert_eq!(attempt.phase(), AttemptPhase::Submitting);
    }

    #[test]
    fn elapsed_is_duration_minus_remaining() {
        let mut attempt = running(60, 1);
        attempt.record_answer(QuestionId::new(1), "a").unwrap();
        for _ in 0..3100 {
            attempt.tick();
        }
        assert_eq!(attempt.remaining_secs(), 500);
        let SubmissionGate::Ready(submission) =
            attempt.begin_submission(SubmitTrigger::Manual).unwrap()
        else {
            panic!("all questions answered");
        };
        assert_eq!(submission.elapsed_secs, 3100);
    }

    #[test]
    fn resubmission_reuses_frozen_payload() {
        let mut attempt = running(1, 1);
        attempt.record_answer(QuestionId::new(1), "a").unwrap();
        attempt.tick();
        let SubmissionGate::Ready(first) = attempt.begin_submission(SubmitTrigger::Manual).unwrap()
        else {
            panic!("ready");
        };
        attempt.tick();
        let SubmissionGate::Ready(second) =
            attempt.begin_submission(SubmitTrigger::Manual).unwrap()
        else {
            panic!("ready");
        };
        assert_eq!(first, second);
        assert_eq!(attempt.remaining_secs(), 59);
    }

    #[test]
    fn completion_is_terminal_and_discards_answers() {
        let mut attempt = running(1, 1);
        attempt.record_answer(QuestionId::new(1), "a").unwrap();
        attempt.begin_submission(SubmitTrigger::Manual).unwrap();
        let submission = attempt.complete().unwrap();
        assert_eq!(submission.answers.len(), 1);
        assert_eq!(attempt.phase(), AttemptPhase::Submitted);
        assert!(attempt.answers().is_empty());
        assert_eq!(
            attempt.begin_submission(SubmitTrigger::Timeout),
            Err(AttemptError::Completed)
        );
        assert_eq!(attempt.start(), Err(AttemptError::Completed));
    }

    #[test]
    fn time_band_thresholds() {
        let mut attempt = running(10, 1);
        assert_eq!(attempt.time_band(), TimeBand::Comfortable);
        for _ in 0..300 {
            attempt.tick();
        }
        assert_eq!(attempt.time_band(), TimeBand::Warning);
        for _ in 0..180 {
            attempt.tick();
        }
        assert_eq!(attempt.remaining_secs(), 120);
        assert_eq!(attempt.time_band(), TimeBand::Critical);
    }

    #[test]
    fn progress_and_countdown_format() {
        let mut attempt = running(1, 4);
        attempt.record_answer(QuestionId::new(2), "x").unwrap();
        assert_eq!(attempt.progress_percent(), 25);
        assert_eq!(format_countdown(3599), "59:59");
        assert_eq!(format_countdown(65), "01:05");
    }
}
