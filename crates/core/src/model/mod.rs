mod attempt;
mod document;
mod identity;
mod ids;
mod notification;
mod payment;
mod question;
mod quiz;
mod result;
mod student;

pub use ids::{DocumentId, NotificationId, PaymentId, QuestionId, QuizId, ResultId, StudentId};

pub use attempt::{
    AnswerEntry, AnswerMap, AttemptError, AttemptPhase, QuizAttempt, Submission, SubmissionGate,
    SubmitTrigger, TickOutcome, TimeBand, format_countdown,
};
pub use document::{Document, DocumentKind, DocumentPatch};
pub use identity::{AdminAccount, AuthToken, Identity};
pub use notification::{Notification, NotificationDraft, NotificationError, NotificationTarget};
pub use payment::{Payment, PaymentDraft, PaymentError, PaymentMode, PaymentStatus};
pub use question::{Question, QuestionDraft, QuestionError, QuestionKind};
pub use quiz::{Quiz, QuizDraft, QuizError, QuizKind, QuizStatus};
pub use result::{QuizResult, SubmissionReceipt};
pub use student::{Registration, Student, StudentDraft, StudentError, StudentStatusFilter};
