use chrono::{DateTime, Utc};

use crate::model::ids::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentKind {
    #[default]
    Pdf,
    Video,
    Image,
}

impl DocumentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Video => "video",
            DocumentKind::Image => "image",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "video" => Some(DocumentKind::Video),
            "image" => Some(DocumentKind::Image),
            _ => None,
        }
    }

    /// Guess from a file extension, used when uploading.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "mp4" | "webm" | "mov" | "avi" => Some(DocumentKind::Video),
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Some(DocumentKind::Image),
            _ => None,
        }
    }
}

/// Course material published by an admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub kind: DocumentKind,
    pub path: String,
    pub downloadable: bool,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub downloadable: Option<bool>,
}

impl DocumentPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.downloadable.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_extension("MP4"), Some(DocumentKind::Video));
        assert_eq!(DocumentKind::from_extension("pdf"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("docx"), None);
    }
}
