#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AuthSessionRepository, InMemoryRepository, PersistedSession, Storage, StorageError,
};
