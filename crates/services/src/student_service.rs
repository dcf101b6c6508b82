use portal_core::model::{Student, StudentDraft, StudentId, StudentStatusFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ApiClient;
use crate::api::wire::{Envelope, RawStudent, StudentBody, normalize_all};
use crate::error::ServiceError;

/// Student administration.
#[derive(Clone)]
pub struct StudentService {
    client: ApiClient,
}

/// A student created by an admin, with the auth code the backend generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolledStudent {
    pub student_id: Option<StudentId>,
    pub auth_code: Option<String>,
}

#[derive(Deserialize)]
struct RawEnrolled {
    auth_code: Option<String>,
    student: Option<RawStudent>,
}

#[derive(Deserialize)]
struct RawToggled {
    student: Option<RawToggledStudent>,
}

#[derive(Deserialize)]
struct RawToggledStudent {
    actif: Option<bool>,
}

#[derive(Deserialize)]
struct RawCode {
    auth_code: Option<String>,
}

#[derive(Serialize)]
struct ToggleBody {
    actif: bool,
}

impl StudentService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_students(&self) -> Result<Vec<Student>, ServiceError> {
        let envelope: Envelope<Vec<RawStudent>> = self.client.get_json("admin/students").await?;
        Ok(normalize_all(envelope.into_data()?, RawStudent::normalize)?)
    }

    /// List, then keep students matching `search` and `status`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn search_students(
        &self,
        search: &str,
        status: StudentStatusFilter,
    ) -> Result<Vec<Student>, ServiceError> {
        let mut students = self.list_students().await?;
        students.retain(|s| status.matches(s) && s.matches_search(search));
        Ok(students)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn get_student(&self, id: StudentId) -> Result<Student, ServiceError> {
        let envelope: Envelope<RawStudent> = self.client.get_json(&format!("students/{id}")).await?;
        Ok(envelope.into_data()?.normalize()?)
    }

    /// Enroll a student. New students start inactive until a payment is validated.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for an invalid draft and
    /// `ServiceError::Api` if the backend refuses it.
    pub async fn create_student(&self, draft: &StudentDraft) -> Result<EnrolledStudent, ServiceError> {
        draft.validate().map_err(portal_core::Error::from)?;
        let body = StudentBody {
            nom: draft.last_name.trim(),
            prenom: draft.first_name.trim(),
            email: draft.email.trim(),
            telephone: draft.phone.as_deref().map(str::trim),
        };
        let created: RawEnrolled = self.client.post_json("students", &body).await?;
        let student_id = created
            .student
            .and_then(|s| s.id_etudiant.or(s.id))
            .map(StudentId::new);
        Ok(EnrolledStudent {
            student_id,
            auth_code: created.auth_code,
        })
    }

    /// Flip a student's active flag, returning the new value when reported.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn set_active(&self, id: StudentId, active: bool) -> Result<Option<bool>, ServiceError> {
        let toggled: RawToggled = self
            .client
            .post_json(&format!("students/{id}/toggle"), &ToggleBody { actif: active })
            .await?;
        Ok(toggled.student.and_then(|s| s.actif))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn delete_student(&self, id: StudentId) -> Result<(), ServiceError> {
        self.client.delete(&format!("admin/students/{id}")).await?;
        Ok(())
    }

    /// Generate and e-mail a new auth code. Returns the code when the backend echoes it.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn resend_code(&self, id: StudentId) -> Result<Option<String>, ServiceError> {
        let value: Value = self
            .client
            .post_empty(&format!("students/{id}/resend-code"))
            .await?;
        let code: RawCode = serde_json::from_value(value).map_err(crate::error::ApiError::from)?;
        Ok(code.auth_code)
    }
}
