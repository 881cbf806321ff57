use serde_json::{json, Map, Value};

use crate::error::{NodeError, Result};
use crate::model::custom_field::{CustomFieldMapping, FieldKind};
use crate::model::params::ItemParams;
use crate::model::reference::{positive_integer, Reference};
use crate::util::dates;
use crate::util::markup::line_breaks_to_markup;

pub const INVALID_COLOR: &str = "Invalid color format. Color must be a 6-digit hexadecimal value.";
pub const INVALID_DEADLINE: &str = "Invalid deadline format. Deadline must be a valid date.";

/// Strip an optional leading `#` and require exactly six hex digits.
/// Case is kept as submitted.
pub fn normalize_color(raw: &str) -> Result<String> {
    let color = raw.strip_prefix('#').unwrap_or(raw);
    if color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(color.to_string())
    } else {
        Err(NodeError::validation(INVALID_COLOR))
    }
}

/// Midnight UTC of the given date, ISO-8601.
pub fn normalize_deadline(raw: &str) -> Result<String> {
    dates::parse_loose(raw)
        .map(dates::midnight_iso)
        .ok_or_else(|| NodeError::validation(INVALID_DEADLINE))
}

/// Whole numbers go on the wire as integers.
pub fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Whether a parameter value counts as "supplied".
pub fn is_supplied(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Scalar card attributes shared by create and update. Only supplied values
/// make it into the body so a partial update never clears other fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardFields {
    pub custom_id: Option<Value>,
    pub title: Option<Value>,
    pub description: Option<String>,
    pub priority: Option<Value>,
    pub owner_user_id: Option<Value>,
    pub size: Option<Value>,
    pub color: Option<String>,
    pub deadline: Option<String>,
}

impl CardFields {
    pub fn from_params(params: &ItemParams<'_>) -> Result<Self> {
        let supplied = |name: &str| params.raw(name).filter(|v| is_supplied(v)).cloned();

        let color = params
            .non_empty_string("color")
            .map(|c| normalize_color(&c))
            .transpose()?;
        let deadline = params
            .non_empty_string("deadline")
            .map(|d| normalize_deadline(&d))
            .transpose()?;

        Ok(Self {
            custom_id: supplied("custom_id"),
            title: supplied("title"),
            description: params
                .non_empty_string("description")
                .map(|d| line_breaks_to_markup(&d)),
            priority: supplied("priority"),
            owner_user_id: params
                .reference("owner_id")
                .map(|r| r.value)
                .filter(is_supplied),
            size: supplied("size"),
            color,
            deadline,
        })
    }

    pub fn merge_into(self, body: &mut Map<String, Value>) {
        let entries = [
            ("custom_id", self.custom_id),
            ("title", self.title),
            ("description", self.description.map(Value::String)),
            ("priority", self.priority),
            ("owner_user_id", self.owner_user_id),
            ("size", self.size),
            ("color", self.color.map(Value::String)),
            ("deadline", self.deadline.map(Value::String)),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                body.insert(key.to_string(), value);
            }
        }
    }
}

/// How an entry of the "additional fields" collection lands in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// One or more tag references, sent as `tag_ids_to_add`.
    TagIds,
    /// One or more sticker references, sent as `stickers_to_add`.
    Stickers,
    /// A single id sent under the field's own name.
    Id,
}

pub const CREATE_EXTRA_FIELDS: &[(&str, FieldRule)] = &[
    ("tag_id", FieldRule::TagIds),
    ("sticker_id", FieldRule::Stickers),
    ("type_id", FieldRule::Id),
    ("template_id", FieldRule::Id),
];

pub const UPDATE_EXTRA_FIELDS: &[(&str, FieldRule)] = &[
    ("tag_id", FieldRule::TagIds),
    ("sticker_id", FieldRule::Stickers),
    ("type_id", FieldRule::Id),
];

fn reference_ids(value: &Value) -> Vec<u64> {
    let unwrap = |v: &Value| positive_integer(&Reference::from_value(v).value);
    match value {
        Value::Array(values) => values.iter().filter_map(unwrap).collect(),
        other => unwrap(other).into_iter().collect(),
    }
}

/// Walk `additional` using the given rules. Keys without a rule are ignored
/// and zero or non-numeric ids are dropped.
pub fn merge_additional(
    body: &mut Map<String, Value>,
    additional: &Map<String, Value>,
    rules: &[(&str, FieldRule)],
) {
    for (name, rule) in rules {
        let Some(value) = additional.get(*name) else {
            continue;
        };
        let ids = reference_ids(value);
        if ids.is_empty() {
            continue;
        }
        match rule {
            FieldRule::TagIds => {
                body.insert("tag_ids_to_add".into(), json!(ids));
            }
            FieldRule::Stickers => {
                let stickers: Vec<Value> =
                    ids.iter().map(|id| json!({ "sticker_id": id })).collect();
                body.insert("stickers_to_add".into(), Value::Array(stickers));
            }
            FieldRule::Id => {
                body.insert((*name).to_string(), json!(ids[0]));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomFieldMode {
    Create,
    /// Option fields are also queued in `custom_field_ids_to_remove`.
    Update,
}

/// Fold the mapped custom-field values into the body. Values whose field id
/// has no schema entry are skipped.
pub fn merge_custom_fields(
    body: &mut Map<String, Value>,
    mapping: &CustomFieldMapping,
    mode: CustomFieldMode,
) {
    if mapping.value.is_empty() {
        return;
    }

    let mut updates = Vec::new();
    let mut removals = Vec::new();
    for (field_id, field_value) in &mapping.value {
        let Some(schema) = mapping.schema_for(field_id) else {
            continue;
        };
        if schema.kind == FieldKind::Options {
            updates.push(json!({
                "field_id": field_id,
                "selected_values_to_add_or_update": [{ "value_id": field_value }],
            }));
            removals.push(Value::String(field_id.clone()));
        } else {
            updates.push(json!({ "field_id": field_id, "value": field_value }));
        }
    }

    body.insert(
        "custom_fields_to_add_or_update".into(),
        Value::Array(updates),
    );
    if mode == CustomFieldMode::Update {
        body.insert("custom_field_ids_to_remove".into(), Value::Array(removals));
    }
}

/// Read the `customFields` parameter and merge it, if present.
pub fn merge_custom_field_param(
    body: &mut Map<String, Value>,
    params: &ItemParams<'_>,
    mode: CustomFieldMode,
) -> Result<()> {
    if let Some(mapping) = params.decode::<CustomFieldMapping>("customFields")? {
        merge_custom_fields(body, &mapping, mode);
    }
    Ok(())
}
