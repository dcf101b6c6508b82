use chrono::{DateTime, Utc};
use portal_core::model::Identity;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn identity_to_json(identity: &Identity) -> Result<String, StorageError> {
    serde_json::to_string(identity).map_err(ser)
}

pub(crate) fn identity_from_json(raw: &str) -> Result<Identity, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn parse_saved_at(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(ser)
}
