//! Domain model (ids, events, envelopes, records, boundary decoding).

pub mod envelope;
pub mod event;
pub mod ids;
pub mod image;
pub mod object_key;
pub mod wire;

pub use envelope::{
    CAPTION, CHANGE_TYPE, COMMENT_TYPE, CaptionRequest, EnvelopeBody, MessageAttributes,
    NotificationEnvelope,
};
pub use event::{ChangeEvent, ChangeType};
pub use ids::{MessageId, SubscriptionId};
pub use image::ImageRecord;
pub use object_key::{KeyDecodeError, decode_object_key};
pub use wire::{DecodeError, DecodedNotification, SkippedRecord, decode_caption_request, decode_store_notification};
