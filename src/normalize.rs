use serde_json::{json, Value};

use crate::error::{NodeError, Result};
use crate::model::card::{CardRecord, Projection};
use crate::model::params::ItemParams;

/// Card attributes that can be requested through `fields`.
pub const FIELD_LIST: [&str; 43] = [
    "card_id",
    "title",
    "description",
    "custom_id",
    "owner_user_id",
    "type_id",
    "size",
    "priority",
    "color",
    "deadline",
    "reporter",
    "created_at",
    "revision",
    "last_modified",
    "in_current_position_since",
    "board_id",
    "workflow_id",
    "column_id",
    "lane_id",
    "section",
    "position",
    "last_column_id",
    "last_lane_id",
    "version_id",
    "archived_at",
    "reason_id",
    "discard_comment",
    "discarded_at",
    "is_blocked",
    "block_reason",
    "current_block_time",
    "current_logged_time",
    "current_cycle_time",
    "child_card_stats",
    "finished_subtask_count",
    "unfinished_subtask_count",
    "comment_count",
    "first_request_time",
    "first_start_time",
    "first_end_time",
    "last_request_time",
    "last_start_time",
    "last_end_time",
];

/// Card relations that can be requested through `expand`.
pub const EXPAND_LIST: [&str; 15] = [
    "custom_fields",
    "stickers",
    "tag_ids",
    "co_owner_ids",
    "watcher_ids",
    "attachments",
    "checked_column_checklist_items",
    "initiative_details",
    "annotations",
    "subtasks",
    "linked_cards",
    "transitions",
    "block_times",
    "logged_times",
    "logged_times_for_child_cards",
];

/// Pull the card list out of any of the envelope shapes the API uses:
/// a bare array, `{data: [..]}` or the paginated `{data: {data: [..]}}`.
pub fn card_records(payload: &Value) -> Result<Vec<CardRecord>> {
    let list = match payload {
        Value::Array(list) => list,
        Value::Object(_) => match payload.get("data") {
            Some(Value::Array(list)) => list,
            Some(inner) => match inner.get("data") {
                Some(Value::Array(list)) => list,
                _ => return Err(invalid_format(payload)),
            },
            None => return Err(invalid_format(payload)),
        },
        _ => return Err(invalid_format(payload)),
    };
    Ok(list
        .iter()
        .map(|card| match card {
            Value::Object(map) => map.clone(),
            _ => CardRecord::new(),
        })
        .collect())
}

fn invalid_format(payload: &Value) -> NodeError {
    NodeError::invalid_response(
        "Invalid response format: expected array or paginated object",
        Some(payload.clone()),
    )
}

pub fn normalize(payload: &Value, projection: &Projection) -> Result<Vec<Value>> {
    Ok(card_records(payload)?
        .into_iter()
        .map(|card| Value::Object(projection.apply(card)))
        .collect())
}

/// Query parameters for a card read, split from the chosen output fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    pub fields: String,
    pub expand: String,
}

impl FieldSelection {
    pub fn from_projection(projection: &Projection) -> Self {
        match projection {
            Projection::Selected(chosen) => Self {
                fields: join_allowed(chosen, &FIELD_LIST),
                expand: join_allowed(chosen, &EXPAND_LIST),
            },
            _ => Self::default(),
        }
    }

    pub fn apply(&self, mut query: Vec<(String, String)>) -> Vec<(String, String)> {
        if !self.fields.is_empty() {
            query.push(("fields".into(), self.fields.clone()));
        }
        if !self.expand.is_empty() {
            query.push(("expand".into(), self.expand.clone()));
        }
        query
    }
}

fn join_allowed(chosen: &[String], allowed: &[&str]) -> String {
    chosen
        .iter()
        .filter(|field| allowed.contains(&field.as_str()))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Read the projection and derived query selection for one item.
pub fn select_fields(params: &ItemParams<'_>) -> Result<(Projection, FieldSelection)> {
    let projection = Projection::from_params(params)?;
    let selection = FieldSelection::from_projection(&projection);
    Ok((projection, selection))
}

/// What a card mutation's `data` member says happened.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Vec<Value>),
    Unchanged,
    Unexpected,
}

impl UpdateOutcome {
    pub fn from_body(body: Option<&Value>) -> Self {
        match body.and_then(|b| b.get("data")) {
            Some(Value::Array(list)) if list.is_empty() => UpdateOutcome::Unchanged,
            Some(Value::Array(list)) => UpdateOutcome::Updated(list.clone()),
            _ => UpdateOutcome::Unexpected,
        }
    }
}

/// Status messages reported for a card mutation that did not yield a card.
#[derive(Debug, Clone, Copy)]
pub struct MutationStatus {
    pub unchanged: &'static str,
    pub failed: &'static str,
}

/// Turn a card mutation response into output: the projected cards, a
/// no-op status, or a failure status carrying the raw body.
pub fn mutation_result(
    body: Option<&Value>,
    projection: &Projection,
    status: MutationStatus,
) -> Result<Value> {
    match UpdateOutcome::from_body(body) {
        UpdateOutcome::Updated(cards) => Ok(Value::Array(normalize(&Value::Array(cards), projection)?)),
        UpdateOutcome::Unchanged => Ok(json!({ "status": status.unchanged })),
        UpdateOutcome::Unexpected => Ok(json!({
            "status": status.failed,
            "details": body.cloned().unwrap_or(Value::Null),
        })),
    }
}
