use std::sync::Arc;

use portal_core::Clock;
use portal_core::model::{AuthToken, Identity, Registration, Student, StudentId};
use storage::repository::{AuthSessionRepository, PersistedSession, StorageError};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::api::wire::{
    AdminLoginBody, Envelope, RawAdmin, RawLogin, RawRegistration, RawStudent, RawVerify,
    RegistrationBody, StudentBody, StudentLoginBody,
};
use crate::error::{ApiError, ApiErrorKind, AuthError};

/// Credentials issued after self-registration. The code is needed to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub student_id: Option<StudentId>,
    pub auth_code: Option<String>,
}

struct Authenticated {
    token: AuthToken,
    identity: Identity,
}

/// Explicit authentication context.
///
/// Built once at startup with [`AuthSession::init`], which restores and re-verifies
/// the locally persisted session. Every authenticated service is created from
/// [`AuthSession::client`].
pub struct AuthSession {
    client: ApiClient,
    store: Arc<dyn AuthSessionRepository>,
    clock: Clock,
    current: Option<Authenticated>,
}

impl AuthSession {
    /// Restore the persisted session, keeping it only if the backend still accepts it.
    ///
    /// Rejected, mismatching or unverifiable sessions are cleared from the store.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be read or cleared.
    pub async fn init(
        client: ApiClient,
        store: Arc<dyn AuthSessionRepository>,
        clock: Clock,
    ) -> Result<Self, AuthError> {
        let mut session = Self {
            client: client.anonymous(),
            store,
            clock,
            current: None,
        };
        session.restore().await?;
        Ok(session)
    }

    async fn restore(&mut self) -> Result<(), AuthError> {
        let persisted = match self.store.load_session().await {
            Ok(persisted) => persisted,
            Err(StorageError::Serialization(reason)) => {
                warn!(%reason, "discarding unreadable auth session");
                self.store.clear_session().await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let Some(persisted) = persisted else {
            return Ok(());
        };

        match self.verify(&persisted).await {
            Ok(()) => {
                info!(user_id = persisted.identity.user_id(), "session restored");
                self.current = Some(Authenticated {
                    token: persisted.token,
                    identity: persisted.identity,
                });
            }
            Err(reason) => {
                info!(%reason, "stored session no longer valid, clearing");
                self.store.clear_session().await?;
            }
        }
        Ok(())
    }

    async fn verify(&self, persisted: &PersistedSession) -> Result<(), String> {
        let client = self.client.with_token(persisted.token.clone());
        let envelope: Envelope<RawVerify> = client
            .get_json("auth/verify")
            .await
            .map_err(|err| err.to_string())?;
        let verified = envelope.data.ok_or("verification returned no data")?;
        let is_admin = verified.is_admin.unwrap_or(false);
        let verified_id = verified.user.and_then(|user| user.id);

        match &persisted.identity {
            Identity::Admin(_) if is_admin => Ok(()),
            Identity::Student(student) if !is_admin && verified_id == Some(student.id.value()) => {
                Ok(())
            }
            _ => Err("token belongs to a different account".to_owned()),
        }
    }

    /// Log a student in with e-mail and auth code. The code is case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` for wrong credentials or a suspended account,
    /// and `AuthError::Api` / `AuthError::Storage` for other failures.
    pub async fn login_student(&mut self, email: &str, auth_code: &str) -> Result<&Identity, AuthError> {
        let body = StudentLoginBody {
            email: email.trim(),
            code_auth: auth_code.trim().to_uppercase(),
        };
        let envelope: Envelope<RawLogin> = self
            .client
            .post_json("auth/login/student", &body)
            .await
            .map_err(login_error)?;
        let login = envelope.into_data()?;
        if login.is_admin == Some(true) {
            return Err(AuthError::Rejected("not a student account".into()));
        }
        let raw: RawStudent = decode_user(login.user)?;
        let identity = Identity::Student(raw.normalize()?);
        self.establish(login.token, identity).await
    }

    /// Log an administrator in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Rejected` for wrong credentials or a non-admin account,
    /// and `AuthError::Api` / `AuthError::Storage` for other failures.
    pub async fn login_admin(&mut self, email: &str, password: &str) -> Result<&Identity, AuthError> {
        let body = AdminLoginBody {
            email: email.trim(),
            password,
        };
        let envelope: Envelope<RawLogin> = self
            .client
            .post_json("auth/login/admin", &body)
            .await
            .map_err(login_error)?;
        let login = envelope.into_data()?;
        if login.is_admin != Some(true) {
            return Err(AuthError::Rejected("not an administrator account".into()));
        }
        let raw: RawAdmin = decode_user(login.user)?;
        let identity = Identity::Admin(raw.normalize()?);
        self.establish(login.token, identity).await
    }

    /// Self-register a student with a first payment. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for invalid input and `AuthError::Api` if the
    /// backend refuses the registration.
    pub async fn register(&self, registration: &Registration) -> Result<RegistrationReceipt, AuthError> {
        let student = &registration.student;
        let payment = &registration.payment;
        student.validate().map_err(portal_core::Error::from)?;
        payment.validate().map_err(portal_core::Error::from)?;

        let body = RegistrationBody {
            student: StudentBody {
                nom: student.last_name.trim(),
                prenom: student.first_name.trim(),
                email: student.email.trim(),
                telephone: student.phone.as_deref().map(str::trim),
            },
            mode_paiement: payment.mode.as_str(),
            code_ref_mvola: payment.mvola_reference.as_deref().map(str::trim),
            montant: payment.amount,
            statut: payment.status.as_str(),
            tranche_restante: payment.remaining_installment,
        };
        let envelope: Envelope<RawRegistration> =
            self.client.post_json("auth/register", &body).await?;
        let data = envelope.into_data()?;
        info!(student_id = ?data.student_id, "student registered");
        Ok(RegistrationReceipt {
            student_id: data.student_id.map(StudentId::new),
            auth_code: data.auth_code.or(data.code_auth),
        })
    }

    /// Forget the current identity, locally and on disk.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the store cannot be cleared.
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        if let Some(current) = self.current.take() {
            info!(user_id = current.identity.user_id(), "logged out");
        }
        self.store.clear_session().await?;
        Ok(())
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.current.as_ref().map(|c| &c.identity)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.identity().is_some_and(Identity::is_admin)
    }

    /// The logged-in student.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` without a student identity.
    pub fn student(&self) -> Result<&Student, AuthError> {
        self.identity()
            .and_then(Identity::as_student)
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Client carrying the current bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when nobody is logged in.
    pub fn client(&self) -> Result<ApiClient, AuthError> {
        let current = self.current.as_ref().ok_or(AuthError::NotAuthenticated)?;
        Ok(self.client.with_token(current.token.clone()))
    }

    /// Like [`AuthSession::client`], but only for administrators.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` or `AuthError::AdminRequired`.
    pub fn admin_client(&self) -> Result<ApiClient, AuthError> {
        let client = self.client()?;
        if !self.is_admin() {
            return Err(AuthError::AdminRequired);
        }
        Ok(client)
    }

    async fn establish(
        &mut self,
        token: Option<String>,
        identity: Identity,
    ) -> Result<&Identity, AuthError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .map(AuthToken::new)
            .ok_or_else(|| ApiError::Decode("login response has no token".into()))?;
        let persisted = PersistedSession {
            token,
            identity,
            saved_at: self.clock.now(),
        };
        self.store.save_session(&persisted).await?;
        info!(
            user_id = persisted.identity.user_id(),
            admin = persisted.identity.is_admin(),
            "logged in"
        );
        let current = self.current.insert(Authenticated {
            token: persisted.token,
            identity: persisted.identity,
        });
        Ok(&current.identity)
    }
}

fn decode_user<T: serde::de::DeserializeOwned>(user: Option<serde_json::Value>) -> Result<T, AuthError> {
    let user = user.ok_or_else(|| ApiError::Decode("login response has no user".into()))?;
    Ok(serde_json::from_value(user).map_err(ApiError::from)?)
}

fn login_error(err: ApiError) -> AuthError {
    match err.kind() {
        ApiErrorKind::Unauthorized | ApiErrorKind::Forbidden | ApiErrorKind::Validation => {
            AuthError::Rejected(err.message())
        }
        _ => AuthError::Api(err),
    }
}
