use serde::{Deserialize, Serialize};

/// Row of the `Images` table.
///
/// `image_name` is the partition key and the only identity; there is no
/// surrogate id. Serialized with the table's attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(rename = "ImageName")]
    pub image_name: String,

    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ImageRecord {
    /// Fresh record for a newly accepted object, without description.
    pub fn new(image_name: impl Into<String>) -> Self {
        Self {
            image_name: image_name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
