//! MetadataStore port - the `Images` table.
//!
//! Single table, partition key `ImageName`, optional `Description`.
//! Every mutation is idempotent under the natural key; callers rely on that
//! instead of locking, since the same event can arrive more than once and
//! in any order.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ImageRecord;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Table temporarily unreachable; the caller should let the message be redelivered.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or overwrite the record keyed by `record.image_name`.
    async fn put(&self, record: ImageRecord) -> Result<(), StoreError>;

    /// Set `Description` on an existing record.
    ///
    /// Returns `false`, without writing anything, when no record has that
    /// name. This is a conditional update, never an upsert.
    async fn update_description(&self, image_name: &str, description: &str) -> Result<bool, StoreError>;

    /// Delete the record if present. Returns whether something was removed;
    /// a missing key is not an error.
    async fn delete(&self, image_name: &str) -> Result<bool, StoreError>;

    async fn get(&self, image_name: &str) -> Result<Option<ImageRecord>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}
