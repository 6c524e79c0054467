//! Store change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of mutation the object store observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Removed,
}

impl ChangeType {
    /// Value carried in the `changeType` routing attribute.
    pub fn attribute_value(self) -> &'static str {
        match self {
            ChangeType::Created => "ObjectCreated",
            ChangeType::Removed => "ObjectRemoved",
        }
    }

    /// Classify a store `eventName` such as `ObjectCreated:Put` or
    /// `ObjectRemoved:Delete`. Unknown families yield `None`.
    pub fn from_event_name(name: &str) -> Option<Self> {
        let family = name.split(':').next().unwrap_or(name);
        match family {
            "ObjectCreated" => Some(ChangeType::Created),
            "ObjectRemoved" => Some(ChangeType::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute_value())
    }
}

/// One object-store mutation.
///
/// Immutable once built. The same event may reach a consumer more than once,
/// so everything downstream keys off `object_key` and stays idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Decoded object key; doubles as the metadata table's natural key.
    pub object_key: String,
    pub bucket_id: String,
    pub change_type: ChangeType,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        object_key: impl Into<String>,
        bucket_id: impl Into<String>,
        change_type: ChangeType,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            object_key: object_key.into(),
            bucket_id: bucket_id.into(),
            change_type,
            occurred_at,
        }
    }

    pub fn created(
        object_key: impl Into<String>,
        bucket_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(object_key, bucket_id, ChangeType::Created, occurred_at)
    }

    pub fn removed(
        object_key: impl Into<String>,
        bucket_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self::new(object_key, bucket_id, ChangeType::Removed, occurred_at)
    }
}
