//! NotificationEnvelope: what travels over the bus and through the queues.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::event::{ChangeEvent, ChangeType};

/// Routing attribute set on caption update requests.
pub const COMMENT_TYPE: &str = "commentType";

/// Only `commentType` value the update handler reacts to.
pub const CAPTION: &str = "Caption";

/// Routing attribute set on every envelope built from store events.
pub const CHANGE_TYPE: &str = "changeType";

/// Attribute name -> value, as seen by subscription filters.
pub type MessageAttributes = BTreeMap<String, String>;

/// Caption update request: `{ "name": ..., "description": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvelopeBody {
    /// One or more raw store events.
    StoreEvents { events: Vec<ChangeEvent> },
    /// A domain request to (re)describe an existing image.
    Caption(CaptionRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(default)]
    attributes: MessageAttributes,
    body: EnvelopeBody,
}

impl NotificationEnvelope {
    /// Wrap a batch of store events sharing one change type.
    ///
    /// The `changeType` attribute is what lets subscribers route on it.
    pub fn store_events(change_type: ChangeType, events: Vec<ChangeEvent>) -> Self {
        let mut attributes = MessageAttributes::new();
        attributes.insert(
            CHANGE_TYPE.to_string(),
            change_type.attribute_value().to_string(),
        );
        Self {
            attributes,
            body: EnvelopeBody::StoreEvents { events },
        }
    }

    pub fn store_event(event: ChangeEvent) -> Self {
        Self::store_events(event.change_type, vec![event])
    }

    pub fn caption(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut attributes = MessageAttributes::new();
        attributes.insert(COMMENT_TYPE.to_string(), CAPTION.to_string());
        Self {
            attributes,
            body: EnvelopeBody::Caption(CaptionRequest {
                name: name.into(),
                description: description.into(),
            }),
        }
    }

    /// Build an envelope with an explicit attribute set.
    pub fn with_attributes(attributes: MessageAttributes, body: EnvelopeBody) -> Self {
        Self { attributes, body }
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// Store events carried by this envelope, empty for domain requests.
    pub fn events(&self) -> &[ChangeEvent] {
        match &self.body {
            EnvelopeBody::StoreEvents { events } => events,
            EnvelopeBody::Caption(_) => &[],
        }
    }

    pub fn caption_request(&self) -> Option<&CaptionRequest> {
        match &self.body {
            EnvelopeBody::Caption(request) => Some(request),
            EnvelopeBody::StoreEvents { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn store_envelope_carries_change_type_attribute() {
        let env = NotificationEnvelope::store_event(ChangeEvent::removed("a.jpg", "images", Utc::now()));

        assert_eq!(env.attribute(CHANGE_TYPE), Some("ObjectRemoved"));
        assert_eq!(env.attribute(COMMENT_TYPE), None);
        assert_eq!(env.events().len(), 1);
        assert!(env.caption_request().is_none());
    }

    #[test]
    fn caption_envelope_carries_comment_type_attribute() {
        let env = NotificationEnvelope::caption("cat.jpg", "a cat");

        assert_eq!(env.attribute(COMMENT_TYPE), Some(CAPTION));
        assert!(env.events().is_empty());
        let request = env.caption_request().unwrap();
        assert_eq!(request.name, "cat.jpg");
        assert_eq!(request.description, "a cat");
    }
}
