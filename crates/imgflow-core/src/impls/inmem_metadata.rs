//! InMemoryMetadataStore - 開発用の `Images` テーブル

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ImageRecord;
use crate::ports::{MetadataStore, StoreError};

/// Table keyed by `ImageName`.
///
/// `set_unavailable(true)` makes every call fail with
/// [`StoreError::Unavailable`], which is how tests simulate throttling.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    rows: RwLock<BTreeMap<String, ImageRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every row, ordered by name.
    pub async fn snapshot(&self) -> Vec<ImageRecord> {
        self.rows.read().await.values().cloned().collect()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Images table throttled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, record: ImageRecord) -> Result<(), StoreError> {
        self.check()?;
        self.rows.write().await.insert(record.image_name.clone(), record);
        Ok(())
    }

    async fn update_description(&self, image_name: &str, description: &str) -> Result<bool, StoreError> {
        self.check()?;
        match self.rows.write().await.get_mut(image_name) {
            Some(row) => {
                row.description = Some(description.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, image_name: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self.rows.write().await.remove(image_name).is_some())
    }

    async fn get(&self, image_name: &str) -> Result<Option<ImageRecord>, StoreError> {
        self.check()?;
        Ok(self.rows.read().await.get(image_name).cloned())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.check()?;
        Ok(self.rows.read().await.len())
    }
}
