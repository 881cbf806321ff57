use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lookup::LookupOption;

/// Kind of value a custom field accepts, as seen by the mapping UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    String,
    Number,
    DateTime,
    Options,
    #[serde(other)]
    Other,
}

impl FieldKind {
    /// Map a Businessmap field type. `None` means the type cannot be set
    /// through this integration at all.
    pub fn from_businessmap(kind: &str) -> Option<Self> {
        match kind {
            "contributor" | "file" | "vote" | "card_picker" | "calculated_number"
            | "calculated_date" => None,
            "single_line_text" | "multi_line_text" | "link" => Some(FieldKind::String),
            "number" => Some(FieldKind::Number),
            "date" => Some(FieldKind::DateTime),
            "dropdown" => Some(FieldKind::Options),
            _ => Some(FieldKind::String),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<LookupOption>>,
}

/// Values the user filled in per field id, together with the schema they
/// were entered against.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomFieldMapping {
    #[serde(default)]
    pub value: Map<String, Value>,
    #[serde(default)]
    pub schema: Vec<CustomFieldSchema>,
}

impl CustomFieldMapping {
    pub fn schema_for(&self, field_id: &str) -> Option<&CustomFieldSchema> {
        self.schema.iter().find(|f| f.id == field_id)
    }
}
