#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod auth_service;
pub mod dashboard_service;
pub mod document_service;
pub mod error;
pub mod notification_service;
pub mod payment_service;
pub mod quiz_service;
pub mod sessions;
pub mod student_service;

pub use portal_core::Clock;

pub use api::{ApiClient, ApiConfig};
pub use app_services::AppServices;
pub use auth_service::{AuthSession, RegistrationReceipt};
pub use dashboard_service::{AdminMetrics, DashboardService, StudentDashboard, StudentSummary};
pub use document_service::{DocumentService, DocumentUpload};
pub use error::{
    ApiError, ApiErrorKind, AppServicesError, AuthError, DashboardError, QuizSessionError,
    ServiceError,
};
pub use notification_service::NotificationService;
pub use payment_service::{Activation, PaymentService};
pub use quiz_service::QuizService;
pub use sessions::{
    Countdown, CountdownHandle, QuizBackend, QuizSessionController, SessionPhase, SubmitOutcome,
    TickEvent,
};
pub use student_service::{EnrolledStudent, StudentService};
