use portal_core::model::{
    Payment, PaymentDraft, PaymentId, PaymentStatus, StudentId,
};
use serde::Serialize;

use crate::api::ApiClient;
use crate::api::wire::{Envelope, PaymentBody, RawActivation, RawCreated, RawPayment, normalize_all};
use crate::error::{ApiError, ServiceError};

/// Payment recording and admin validation.
#[derive(Clone)]
pub struct PaymentService {
    client: ApiClient,
}

/// Returned when an admin validates a payment: the student is activated with a new code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub auth_code: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    code: &'a str,
}

impl PaymentService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_all(&self) -> Result<Vec<Payment>, ServiceError> {
        let envelope: Envelope<Vec<RawPayment>> = self.client.get_json("admin/payments").await?;
        Ok(normalize_all(envelope.into_data()?, RawPayment::normalize)?)
    }

    /// Admin listing filtered by search term and optional status.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn search(
        &self,
        search: &str,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Payment>, ServiceError> {
        let mut payments = self.list_all().await?;
        payments.retain(|p| status.is_none_or(|s| p.status == s) && p.matches_search(search));
        Ok(payments)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list_for_student(&self, student_id: StudentId) -> Result<Vec<Payment>, ServiceError> {
        let envelope: Envelope<Vec<RawPayment>> = self
            .client
            .get_json(&format!("student/{student_id}/payments"))
            .await?;
        Ok(normalize_all(envelope.data.unwrap_or_default(), RawPayment::normalize)?)
    }

    /// Record a payment for a student.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for an invalid draft and
    /// `ServiceError::Api` if the backend refuses it.
    pub async fn record(
        &self,
        student_id: StudentId,
        draft: &PaymentDraft,
    ) -> Result<PaymentId, ServiceError> {
        draft.validate().map_err(portal_core::Error::from)?;
        let body = PaymentBody {
            id_etudiant: student_id.value(),
            mode_paiement: draft.mode.as_str(),
            code_ref_mvola: draft.mvola_reference.as_deref().map(str::trim),
            montant: draft.amount,
            statut: draft.status.as_str(),
            tranche_restante: draft.remaining_installment,
        };
        let created: RawCreated = self.client.post_json("payments", &body).await?;
        let id = created
            .id("payment_id")
            .ok_or_else(|| ApiError::Decode("created payment has no id".into()))?;
        Ok(PaymentId::new(id))
    }

    /// Mark the payment complete and activate the student.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn validate(&self, id: PaymentId) -> Result<Activation, ServiceError> {
        self.activate(&format!("admin/payments/{id}/validate")).await
    }

    /// Accept a first installment and activate the student.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn mark_partial(&self, id: PaymentId) -> Result<Activation, ServiceError> {
        self.activate(&format!("admin/payments/{id}/partial")).await
    }

    /// Reject and delete a payment.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn reject(&self, id: PaymentId) -> Result<(), ServiceError> {
        self.client
            .post_empty(&format!("admin/payments/{id}/reject"))
            .await?;
        Ok(())
    }

    /// Ask the backend whether an Mvola reference is known.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails for reasons other than an
    /// unknown code.
    pub async fn verify_mvola(&self, code: &str) -> Result<bool, ServiceError> {
        let result: Result<serde_json::Value, ApiError> = self
            .client
            .post_json("payments/verify-mvola", &VerifyBody { code: code.trim() })
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(ApiError::Rejected { status: 400 | 404, .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn activate(&self, path: &str) -> Result<Activation, ServiceError> {
        let envelope: Envelope<RawActivation> = self
            .client
            .post_json(path, &serde_json::json!({}))
            .await?;
        let data = envelope.data.unwrap_or_default();
        Ok(Activation {
            auth_code: data.code_auth,
            email: data.user_email,
        })
    }
}
