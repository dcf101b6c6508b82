//! HTTP access to the portal backend.

mod client;
pub(crate) mod wire;

pub use client::{ApiClient, ApiConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
