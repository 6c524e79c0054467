//! Inbound JSON shapes.
//!
//! Store notifications look like
//! `{"Records": [{"eventName": "...", "eventTime": "...", "s3": {"bucket": {"name": ..}, "object": {"key": ..}}}]}`.
//! Only `s3.bucket.name` and `s3.object.key` are required per record. A record
//! without `eventName` is treated as an upload; a record without `eventTime`
//! takes the time it was decoded.
//!
//! Records are decoded one at a time: a bad record is reported in
//! `DecodedNotification::skipped` and the rest of the batch still goes through.
//! Only an unparseable document (or one without a `Records` array) fails as a whole.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::envelope::{CaptionRequest, NotificationEnvelope};
use super::event::{ChangeEvent, ChangeType};
use super::object_key::decode_object_key;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no `Records` array")]
    MissingRecords,
}

/// A record that was dropped from an otherwise valid notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedNotification {
    pub events: Vec<ChangeEvent>,
    pub skipped: Vec<SkippedRecord>,
}

impl DecodedNotification {
    /// Group the decoded events into one envelope per change type, keeping
    /// record order inside each group.
    pub fn into_envelopes(self) -> Vec<NotificationEnvelope> {
        let (created, removed): (Vec<_>, Vec<_>) = self
            .events
            .into_iter()
            .partition(|e| e.change_type == ChangeType::Created);

        let mut envelopes = Vec::with_capacity(2);
        if !created.is_empty() {
            envelopes.push(NotificationEnvelope::store_events(ChangeType::Created, created));
        }
        if !removed.is_empty() {
            envelopes.push(NotificationEnvelope::store_events(ChangeType::Removed, removed));
        }
        envelopes
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "eventName")]
    event_name: Option<String>,
    #[serde(rename = "eventTime")]
    event_time: Option<DateTime<Utc>>,
    s3: RawS3,
}

#[derive(Debug, Deserialize)]
struct RawS3 {
    bucket: RawBucket,
    object: RawObject,
}

#[derive(Debug, Deserialize)]
struct RawBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    key: String,
}

pub fn decode_store_notification(
    json: &str,
    received_at: DateTime<Utc>,
) -> Result<DecodedNotification, DecodeError> {
    let document: serde_json::Value = serde_json::from_str(json)?;
    let records = document
        .get("Records")
        .and_then(serde_json::Value::as_array)
        .ok_or(DecodeError::MissingRecords)?;

    let mut decoded = DecodedNotification::default();
    for (index, value) in records.iter().enumerate() {
        match decode_record(value, received_at) {
            Ok(event) => decoded.events.push(event),
            Err(reason) => decoded.skipped.push(SkippedRecord { index, reason }),
        }
    }
    Ok(decoded)
}

fn decode_record(value: &serde_json::Value, received_at: DateTime<Utc>) -> Result<ChangeEvent, String> {
    let raw = RawRecord::deserialize(value).map_err(|e| e.to_string())?;

    let change_type = match raw.event_name.as_deref() {
        None => ChangeType::Created,
        Some(name) => ChangeType::from_event_name(name)
            .ok_or_else(|| format!("unsupported event {name:?}"))?,
    };
    let object_key = decode_object_key(&raw.s3.object.key).map_err(|e| e.to_string())?;

    Ok(ChangeEvent::new(
        object_key,
        raw.s3.bucket.name,
        change_type,
        raw.event_time.unwrap_or(received_at),
    ))
}

pub fn decode_caption_request(json: &str) -> Result<CaptionRequest, DecodeError> {
    Ok(serde_json::from_str(json)?)
}
