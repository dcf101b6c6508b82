use portal_core::model::{Notification, NotificationDraft, NotificationId, StudentId};
use serde_json::Value;

use crate::api::ApiClient;
use crate::api::wire::{Envelope, NotificationBody, RawNotification, normalize_all};
use crate::error::ServiceError;

#[derive(Clone)]
pub struct NotificationService {
    client: ApiClient,
}

impl NotificationService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_all(&self) -> Result<Vec<Notification>, ServiceError> {
        let envelope: Envelope<Vec<RawNotification>> =
            self.client.get_json("admin/notifications").await?;
        Ok(normalize_all(envelope.into_data()?, RawNotification::normalize)?)
    }

    /// Broadcasts plus notifications addressed to `student_id`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Notification>, ServiceError> {
        let envelope: Envelope<Vec<RawNotification>> = self
            .client
            .get_json(&format!("student/{student_id}/notifications"))
            .await?;
        Ok(normalize_all(envelope.data.unwrap_or_default(), RawNotification::normalize)?)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for an invalid draft and
    /// `ServiceError::Api` if the backend refuses it.
    pub async fn send(&self, draft: &NotificationDraft) -> Result<Option<NotificationId>, ServiceError> {
        let target = draft.validate().map_err(portal_core::Error::from)?;
        let body = NotificationBody {
            titre: draft.title.trim(),
            message: draft.message.trim(),
            type_cible: target.code(),
            id_etudiant: target.recipient().map(|id| id.value()),
        };
        let envelope: Envelope<RawNotification> =
            self.client.post_json("admin/notifications", &body).await?;
        Ok(envelope
            .data
            .and_then(|raw| raw.id_notification.or(raw.id))
            .map(NotificationId::new))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), ServiceError> {
        let _: Value = self
            .client
            .put_json(&format!("notifications/{id}/read"), &serde_json::json!({}))
            .await?;
        Ok(())
    }
}
