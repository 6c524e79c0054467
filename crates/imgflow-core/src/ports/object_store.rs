//! ObjectStore port - the images bucket.
//!
//! Implementations emit one change notification per successful mutation,
//! carrying bucket and key only.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ObjectStoreError {
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Store (or replace) an object and emit an object-created notification.
    async fn put_object(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;

    /// Remove an object. Emits an object-removed notification when something
    /// was actually removed; returns whether it was.
    async fn remove_object(&self, key: &str) -> Result<bool, ObjectStoreError>;

    async fn contains(&self, key: &str) -> Result<bool, ObjectStoreError>;
}
