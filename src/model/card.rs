use serde_json::{Map, Value};

use super::params::ItemParams;
use crate::error::{NodeError, Result};

/// A card as returned by the API. The shape is owned by Businessmap, so it
/// stays an open JSON object.
pub type CardRecord = Map<String, Value>;

pub const SIMPLIFIED_FIELDS: [&str; 6] = [
    "card_id",
    "custom_id",
    "board_id",
    "column_id",
    "lane_id",
    "title",
];

/// How much of each card ends up in the output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    Raw,
    #[default]
    Simplified,
    Selected(Vec<String>),
}

impl Projection {
    pub fn from_params(params: &ItemParams<'_>) -> Result<Self> {
        match params.string("output").as_str() {
            "" | "simplified" => Ok(Projection::Simplified),
            "raw" => Ok(Projection::Raw),
            "selected" => Ok(Projection::Selected(params.string_list("output_fields"))),
            other => Err(NodeError::validation(format!(
                "Unsupported output mode: {other}"
            ))),
        }
    }

    pub fn apply(&self, card: CardRecord) -> CardRecord {
        match self {
            Projection::Raw => card,
            Projection::Simplified => pick(&card, SIMPLIFIED_FIELDS.iter().copied()),
            Projection::Selected(fields) => pick(&card, fields.iter().map(String::as_str)),
        }
    }
}

fn pick<'a>(card: &CardRecord, fields: impl Iterator<Item = &'a str>) -> CardRecord {
    fields
        .filter_map(|field| card.get(field).map(|v| (field.to_string(), v.clone())))
        .collect()
}
