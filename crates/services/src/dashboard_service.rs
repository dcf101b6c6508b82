use std::collections::HashMap;

use portal_core::model::{
    Document, Notification, Payment, PaymentStatus, Quiz, QuizId, QuizResult, QuizStatus, Student,
};
use tracing::warn;

use crate::document_service::DocumentService;
use crate::error::DashboardError;
use crate::notification_service::NotificationService;
use crate::payment_service::PaymentService;
use crate::quiz_service::QuizService;
use crate::student_service::StudentService;

/// Share of the maximum score a result needs to count as passed.
pub const PASS_THRESHOLD: f64 = 0.7;

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let value = ((part as f64 / whole as f64) * 100.0).round() as u32;
    value
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}

//
// ─── STUDENT ───────────────────────────────────────────────────────────────────
//

/// Whether a student still owes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Complete,
    Partial,
}

/// Figures shown at the top of the student dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentSummary {
    pub total_paid: f64,
    pub remaining_due: f64,
    pub payment_state: PaymentState,
    pub unread_notifications: usize,
    /// Mean score over all results, rounded. `None` before the first quiz.
    pub average_score: Option<f64>,
    pub open_quizzes: usize,
}

impl StudentSummary {
    #[must_use]
    pub fn compute(
        open_quizzes: &[Quiz],
        payments: &[Payment],
        notifications: &[Notification],
        results: &[QuizResult],
    ) -> Self {
        let total_paid = payments.iter().map(|p| p.amount).sum();
        let remaining_due: f64 = payments.iter().map(|p| p.remaining_installment).sum();
        let payment_state = if remaining_due > 0.0 {
            PaymentState::Partial
        } else {
            PaymentState::Complete
        };
        Self {
            total_paid,
            remaining_due,
            payment_state,
            unread_notifications: notifications.iter().filter(|n| !n.read).count(),
            average_score: mean(results.iter().map(|r| r.score)).map(f64::round),
            open_quizzes: open_quizzes.len(),
        }
    }
}

/// Everything a logged-in student sees on their home screen.
#[derive(Debug, Clone)]
pub struct StudentDashboard {
    pub student: Student,
    pub open_quizzes: Vec<Quiz>,
    pub documents: Vec<Document>,
    pub payments: Vec<Payment>,
    pub notifications: Vec<Notification>,
    pub results: Vec<QuizResult>,
    pub summary: StudentSummary,
}

//
// ─── ADMIN ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentMetrics {
    pub total: usize,
    pub active: usize,
    pub suspended: usize,
    pub engagement_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentMetrics {
    pub revenue: f64,
    pub complete: usize,
    pub pending: usize,
    pub installment: usize,
    pub completion_percent: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizMetrics {
    pub total: usize,
    pub active: usize,
    pub closed: usize,
    pub scheduled: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMetrics {
    pub count: usize,
    pub average_score: Option<f64>,
    pub pass_rate_percent: u32,
    pub average_time_secs: Option<f64>,
}

/// Aggregates for the administrator overview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminMetrics {
    pub students: StudentMetrics,
    pub payments: PaymentMetrics,
    pub quizzes: QuizMetrics,
    /// `None` when results could not be loaded.
    pub results: Option<ResultMetrics>,
}

impl AdminMetrics {
    #[must_use]
    pub fn compute(
        students: &[Student],
        payments: &[Payment],
        quizzes: &[Quiz],
        results: Option<&[QuizResult]>,
    ) -> Self {
        let active = students.iter().filter(|s| s.active).count();
        let student_metrics = StudentMetrics {
            total: students.len(),
            active,
            suspended: students.len() - active,
            engagement_percent: percent(active, students.len()),
        };

        let count_status =
            |status: PaymentStatus| payments.iter().filter(|p| p.status == status).count();
        let complete = count_status(PaymentStatus::Complete);
        let payment_metrics = PaymentMetrics {
            revenue: payments.iter().map(|p| p.amount).sum(),
            complete,
            pending: count_status(PaymentStatus::Pending),
            installment: count_status(PaymentStatus::Installment),
            completion_percent: percent(complete, payments.len()),
        };

        let count_quizzes = |status: QuizStatus| quizzes.iter().filter(|q| q.status() == status).count();
        let quiz_metrics = QuizMetrics {
            total: quizzes.len(),
            active: count_quizzes(QuizStatus::Active),
            closed: count_quizzes(QuizStatus::Closed),
            scheduled: count_quizzes(QuizStatus::Scheduled),
        };

        Self {
            students: student_metrics,
            payments: payment_metrics,
            quizzes: quiz_metrics,
            results: results.map(|results| result_metrics(results, quizzes)),
        }
    }
}

fn result_metrics(results: &[QuizResult], quizzes: &[Quiz]) -> ResultMetrics {
    let max_points: HashMap<QuizId, u32> =
        quizzes.iter().map(|q| (q.id(), q.total_points())).collect();
    let ratio = |result: &QuizResult| {
        result.ratio().or_else(|| {
            max_points
                .get(&result.quiz_id)
                .filter(|max| **max > 0)
                .map(|max| result.score / f64::from(*max))
        })
    };
    let passed = results
        .iter()
        .filter(|r| ratio(r).is_some_and(|ratio| ratio >= PASS_THRESHOLD))
        .count();

    ResultMetrics {
        count: results.len(),
        average_score: mean(results.iter().map(|r| r.score)).map(f64::round),
        pass_rate_percent: percent(passed, results.len()),
        average_time_secs: mean(results.iter().map(|r| f64::from(r.time_used_secs))),
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Loads and aggregates the data behind both dashboards.
#[derive(Clone)]
pub struct DashboardService {
    quizzes: QuizService,
    documents: DocumentService,
    payments: PaymentService,
    notifications: NotificationService,
    students: StudentService,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        quizzes: QuizService,
        documents: DocumentService,
        payments: PaymentService,
        notifications: NotificationService,
        students: StudentService,
    ) -> Self {
        Self {
            quizzes,
            documents,
            payments,
            notifications,
            students,
        }
    }

    /// Load the dashboard of `student`.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Service` if any listing fails.
    pub async fn student_dashboard(&self, student: &Student) -> Result<StudentDashboard, DashboardError> {
        let (open_quizzes, documents, payments, notifications, results) = tokio::try_join!(
            self.quizzes.open_quizzes(),
            self.documents.list(),
            self.payments.list_for_student(student.id),
            self.notifications.list_for_student(student.id),
            self.quizzes.results_for(student.id),
        )?;
        let summary = StudentSummary::compute(&open_quizzes, &payments, &notifications, &results);
        Ok(StudentDashboard {
            student: student.clone(),
            open_quizzes,
            documents,
            payments,
            notifications,
            results,
            summary,
        })
    }

    /// Compute the administrator overview.
    ///
    /// Results are optional: a failing results listing degrades to `results: None`.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Service` if students, payments or quizzes cannot be listed.
    pub async fn admin_metrics(&self) -> Result<AdminMetrics, DashboardError> {
        let (students, payments, quizzes) = tokio::try_join!(
            self.students.list_students(),
            self.payments.list_all(),
            self.quizzes.list_quizzes(),
        )?;
        let results = match self.quizzes.all_results().await {
            Ok(results) => Some(results),
            Err(err) => {
                warn!(error = %err, "results unavailable for dashboard");
                None
            }
        };
        Ok(AdminMetrics::compute(&students, &payments, &quizzes, results.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::model::{
        NotificationId, NotificationTarget, PaymentId, PaymentMode, QuizKind, ResultId, StudentId,
    };

    fn student(id: u64, active: bool) -> Student {
        Student {
            id: StudentId::new(id),
            last_name: "Rakoto".into(),
            first_name: "Jean".into(),
            email: format!("s{id}@example.com"),
            phone: None,
            auth_code: None,
            active,
            enrolled_at: None,
        }
    }

    fn payment(amount: f64, status: PaymentStatus, remaining: f64) -> Payment {
        Payment {
            id: PaymentId::new(1),
            student_id: StudentId::new(1),
            mode: PaymentMode::Cash,
            mvola_reference: None,
            amount,
            status,
            remaining_installment: remaining,
            paid_at: None,
            student_name: None,
            student_email: None,
        }
    }

    fn quiz(id: u64, status: QuizStatus, total_points: u32) -> Quiz {
        Quiz::from_persisted(
            QuizId::new(id),
            "Quiz",
            QuizKind::Quiz,
            total_points,
            None,
            None,
            30,
            status,
            true,
        )
        .unwrap()
    }

    fn result(quiz_id: u64, score: f64, max_score: Option<f64>, time_used_secs: u32) -> QuizResult {
        QuizResult {
            id: ResultId::new(1),
            quiz_id: QuizId::new(quiz_id),
            student_id: Some(StudentId::new(1)),
            score,
            max_score,
            time_used_secs,
            taken_at: None,
        }
    }

    fn notification(read: bool) -> Notification {
        Notification {
            id: NotificationId::new(1),
            title: "Info".into(),
            message: "Cours annulé".into(),
            target: NotificationTarget::All,
            sent_at: None,
            read,
        }
    }

    #[test]
    fn student_summary_tracks_dues_and_unread() {
        let payments = [
            payment(50_000.0, PaymentStatus::Installment, 25_000.0),
            payment(25_000.0, PaymentStatus::Complete, 0.0),
        ];
        let notifications = [notification(false), notification(true), notification(false)];
        let results = [result(1, 7.0, None, 60), result(2, 8.0, None, 60)];
        let summary = StudentSummary::compute(&[], &payments, &notifications, &results);

        assert!((summary.total_paid - 75_000.0).abs() < f64::EPSILON);
        assert!((summary.remaining_due - 25_000.0).abs() < f64::EPSILON);
        assert_eq!(summary.payment_state, PaymentState::Partial);
        assert_eq!(summary.unread_notifications, 2);
        assert_eq!(summary.average_score, Some(8.0));
        assert_eq!(summary.open_quizzes, 0);
    }

    #[test]
    fn student_without_dues_is_complete() {
        let summary = StudentSummary::compute(&[], &[], &[], &[]);
        assert_eq!(summary.payment_state, PaymentState::Complete);
        assert_eq!(summary.average_score, None);
    }

    #[test]
    fn admin_metrics_counts_students_and_payments() {
        let students = [student(1, true), student(2, true), student(3, false)];
        let payments = [
            payment(100.0, PaymentStatus::Complete, 0.0),
            payment(50.0, PaymentStatus::Pending, 0.0),
            payment(30.0, PaymentStatus::Installment, 20.0),
            payment(20.0, PaymentStatus::Complete, 0.0),
        ];
        let quizzes = [
            quiz(1, QuizStatus::Active, 10),
            quiz(2, QuizStatus::Closed, 10),
            quiz(3, QuizStatus::Scheduled, 10),
            quiz(4, QuizStatus::Draft, 10),
        ];
        let metrics = AdminMetrics::compute(&students, &payments, &quizzes, None);

        assert_eq!(
            metrics.students,
            StudentMetrics {
                total: 3,
                active: 2,
                suspended: 1,
                engagement_percent: 67,
            }
        );
        assert!((metrics.payments.revenue - 200.0).abs() < f64::EPSILON);
        assert_eq!(metrics.payments.complete, 2);
        assert_eq!(metrics.payments.pending, 1);
        assert_eq!(metrics.payments.installment, 1);
        assert_eq!(metrics.payments.completion_percent, 50);
        assert_eq!(
            metrics.quizzes,
            QuizMetrics {
                total: 4,
                active: 1,
                closed: 1,
                scheduled: 1,
            }
        );
        assert!(metrics.results.is_none());
    }

    #[test]
    fn pass_rate_uses_quiz_points_when_result_lacks_maximum() {
        let quizzes = [quiz(1, QuizStatus::Active, 20)];
        let results = [
            result(1, 14.0, None, 600),
            result(1, 13.0, None, 300),
            result(9, 9.0, Some(10.0), 900),
            result(9, 1.0, None, 0),
        ];
        let metrics = AdminMetrics::compute(&[], &[], &quizzes, Some(&results));
        let results = metrics.results.unwrap();

        assert_eq!(results.count, 4);
        assert_eq!(results.pass_rate_percent, 50);
        assert_eq!(results.average_score, Some(9.0));
        assert_eq!(results.average_time_secs, Some(450.0));
    }

    #[test]
    fn empty_inputs_yield_zero_percentages() {
        let metrics = AdminMetrics::compute(&[], &[], &[], Some(&[]));
        assert_eq!(metrics.students.engagement_percent, 0);
        assert_eq!(metrics.payments.completion_percent, 0);
        assert_eq!(metrics.results.unwrap().pass_rate_percent, 0);
    }
}
