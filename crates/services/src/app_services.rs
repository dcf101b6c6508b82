use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::api::{ApiClient, ApiConfig};
use crate::auth_service::AuthSession;
use crate::dashboard_service::DashboardService;
use crate::document_service::DocumentService;
use crate::error::{AppServicesError, AuthError};
use crate::notification_service::NotificationService;
use crate::payment_service::PaymentService;
use crate::quiz_service::QuizService;
use crate::sessions::{QuizBackend, QuizSessionController};
use crate::student_service::StudentService;

/// Assembles app-facing services around one authentication context.
///
/// Services are cheap to build and always pick up the current token, so they are
/// created on demand instead of being cached.
pub struct AppServices {
    clock: Clock,
    auth: AuthSession,
}

impl AppServices {
    /// Open local storage, then restore the persisted session against the backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, client construction or
    /// session restore fails.
    pub async fn new(config: &ApiConfig, db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::with_storage(config, storage, clock).await
    }

    /// Same as [`AppServices::new`] over an already-opened `Storage`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if client construction or session restore fails.
    pub async fn with_storage(
        config: &ApiConfig,
        storage: Storage,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let client = ApiClient::new(config)?;
        let auth = AuthSession::init(client, Arc::clone(&storage.auth_sessions), clock).await?;
        Ok(Self { clock, auth })
    }

    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthSession {
        &mut self.auth
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn quizzes(&self) -> Result<QuizService, AuthError> {
        Ok(QuizService::new(self.auth.client()?, self.clock))
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn documents(&self) -> Result<DocumentService, AuthError> {
        Ok(DocumentService::new(self.auth.client()?))
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn payments(&self) -> Result<PaymentService, AuthError> {
        Ok(PaymentService::new(self.auth.client()?))
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn notifications(&self) -> Result<NotificationService, AuthError> {
        Ok(NotificationService::new(self.auth.client()?))
    }

    /// Student management is admin only.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` or `AuthError::AdminRequired`.
    pub fn students(&self) -> Result<StudentService, AuthError> {
        Ok(StudentService::new(self.auth.admin_client()?))
    }

    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn dashboard(&self) -> Result<DashboardService, AuthError> {
        let client = self.auth.client()?;
        Ok(DashboardService::new(
            QuizService::new(client.clone(), self.clock),
            DocumentService::new(client.clone()),
            PaymentService::new(client.clone()),
            NotificationService::new(client.clone()),
            StudentService::new(client),
        ))
    }

    /// A fresh controller for taking one quiz.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a student session.
    pub fn quiz_session(&self) -> Result<QuizSessionController, AuthError> {
        self.auth.student()?;
        let backend: Arc<dyn QuizBackend> = Arc::new(self.quizzes()?);
        Ok(QuizSessionController::new(backend))
    }
}
