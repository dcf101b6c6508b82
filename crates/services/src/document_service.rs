use std::path::Path;

use portal_core::model::{Document, DocumentId, DocumentKind, DocumentPatch};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::api::ApiClient;
use crate::api::wire::{DocumentPatchBody, Envelope, RawDocument, normalize_all};
use crate::error::{ApiError, ServiceError};

/// Course material listing, upload and download.
#[derive(Clone)]
pub struct DocumentService {
    client: ApiClient,
}

/// A file to publish.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub title: String,
    pub kind: DocumentKind,
    pub downloadable: bool,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    /// Build an upload from a file on disk, guessing the kind from its extension.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub async fn from_path(
        path: &Path,
        title: impl Into<String>,
        downloadable: bool,
    ) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_owned());
        let kind = path
            .extension()
            .and_then(|ext| DocumentKind::from_extension(&ext.to_string_lossy()))
            .unwrap_or_default();
        Ok(Self {
            title: title.into(),
            kind,
            downloadable,
            file_name,
            bytes,
        })
    }
}

impl DocumentService {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request or decoding fails.
    pub async fn list(&self) -> Result<Vec<Document>, ServiceError> {
        let envelope: Envelope<Vec<RawDocument>> = self.client.get_json("documents").await?;
        Ok(normalize_all(envelope.into_data()?, RawDocument::normalize)?)
    }

    /// Upload a document as multipart form data.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidInput` for a blank title and `ServiceError::Api`
    /// if the backend refuses the file.
    pub async fn upload(&self, upload: DocumentUpload) -> Result<DocumentId, ServiceError> {
        if upload.title.trim().is_empty() {
            return Err(ServiceError::InvalidInput("document title cannot be empty"));
        }
        let part = Part::bytes(upload.bytes).file_name(upload.file_name);
        let form = Form::new()
            .part("file", part)
            .text("titre", upload.title.trim().to_owned())
            .text("type", upload.kind.as_str())
            .text("telechargeable", upload.downloadable.to_string());
        let envelope: Envelope<RawDocument> = self.client.post_multipart("documents", form).await?;
        let raw = envelope.into_data()?;
        let id = raw
            .id_document
            .or(raw.id)
            .ok_or_else(|| ApiError::Decode("uploaded document has no id".into()))?;
        Ok(DocumentId::new(id))
    }

    /// Apply a partial update. An empty patch sends nothing.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn update(&self, id: DocumentId, patch: &DocumentPatch) -> Result<(), ServiceError> {
        if patch.is_empty() {
            return Ok(());
        }
        let body = DocumentPatchBody {
            titre: patch.title.as_deref(),
            telechargeable: patch.downloadable,
        };
        let _: Value = self
            .client
            .patch_json(&format!("admin/documents/{id}"), &body)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn delete(&self, id: DocumentId) -> Result<(), ServiceError> {
        self.client.delete(&format!("admin/documents/{id}")).await?;
        Ok(())
    }

    /// Download the file body. Non-downloadable documents are refused by the server.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the request fails.
    pub async fn download(&self, id: DocumentId) -> Result<Vec<u8>, ServiceError> {
        Ok(self
            .client
            .get_bytes(&format!("documents/{id}/download"))
            .await?)
    }
}
