use serde_json::{json, Map, Value};

use super::CardOp;
use crate::error::{NodeError, Result};
use crate::model::params::ItemParams;
use crate::normalize::{mutation_result, select_fields, MutationStatus};
use crate::payload::{is_supplied, json_number, merge_custom_field_param, CustomFieldMode, INVALID_DEADLINE};
use crate::transport::{ApiRequest, Transport};
use crate::util::dates;
use crate::util::markup::line_breaks_to_markup;

/// Relation between two cards, named as the path segment the API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Parents,
    Children,
    Relatives,
    Successors,
    Predecessors,
}

impl LinkType {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "parents" => Ok(LinkType::Parents),
            "children" => Ok(LinkType::Children),
            "relatives" => Ok(LinkType::Relatives),
            "successors" => Ok(LinkType::Successors),
            "predecessors" => Ok(LinkType::Predecessors),
            other => Err(NodeError::validation(format!("Unsupported link type: {other}"))),
        }
    }

    pub fn segment(&self) -> &'static str {
        match self {
            LinkType::Parents => "parents",
            LinkType::Children => "children",
            LinkType::Relatives => "relatives",
            LinkType::Successors => "successors",
            LinkType::Predecessors => "predecessors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Minutes,
    Hours,
    /// A working day of eight hours.
    Days,
}

impl TimeUnit {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            other => Err(NodeError::validation(format!("Unsupported time unit: {other}"))),
        }
    }

    pub fn seconds(&self, duration: f64) -> f64 {
        match self {
            TimeUnit::Minutes => duration * 60.0,
            TimeUnit::Hours => duration * 3600.0,
            TimeUnit::Days => duration * 8.0 * 3600.0,
        }
    }
}

pub async fn handle(op: CardOp, transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    match op {
        CardOp::Link => link(transport, params, false).await,
        CardOp::Unlink => link(transport, params, true).await,
        CardOp::SetCustomFields => set_custom_fields(transport, params).await,
        CardOp::Block
        | CardOp::Unblock
        | CardOp::Archive
        | CardOp::Unarchive
        | CardOp::Discard
        | CardOp::Restore => flag_update(op, transport, params).await,
        CardOp::Comment => comment(transport, params).await,
        CardOp::Subtask => subtask(transport, params).await,
        CardOp::Logtime => logtime(transport, params).await,
    }
}

async fn link(transport: &dyn Transport, params: &ItemParams<'_>, remove: bool) -> Result<Value> {
    let entity = if remove { "Unlink Card" } else { "Card" };
    let card_id = params.positive_id("card_id", entity)?;
    let linked_id = params.positive_id("linked_card_id", "Linked Card")?;
    let link_type = LinkType::parse(&params.string("link_type"))?;

    let path = format!("/cards/{card_id}/{}/{linked_id}", link_type.segment());
    let request = if remove {
        ApiRequest::delete(path)
    } else {
        ApiRequest::put(path)
    };
    let response = transport.request(request).await?;
    Ok(json!({ "status": response.status }))
}

/// Body and status texts of the single-flag card updates.
fn flag_change(op: CardOp, params: &ItemParams<'_>) -> (Value, MutationStatus) {
    let status = |unchanged, failed| MutationStatus { unchanged, failed };
    match op {
        CardOp::Block => {
            let reason_id = params
                .reference("reason_id")
                .map(|r| r.value)
                .unwrap_or(Value::Null);
            (
                json!({ "block_reason": { "reason_id": reason_id, "comment": params.string("comment") } }),
                status("Card already blocked", "Unable to block card"),
            )
        }
        CardOp::Unblock => (
            json!({ "block_reason": null }),
            status("Card is not blocked", "Unable to unblock card"),
        ),
        CardOp::Archive => (
            json!({ "is_archived": 1 }),
            status("Card already archived", "Unable to move card to archive."),
        ),
        CardOp::Unarchive => (
            json!({ "is_archived": 0 }),
            status("Card already active", "Unable to move card from archive"),
        ),
        CardOp::Discard => (
            json!({ "is_discarded": 1 }),
            status("Card already discarded", "Unable to discard card"),
        ),
        _ => (
            json!({ "is_discarded": 0 }),
            status("Card is already active", "Unable to restore card"),
        ),
    }
}

async fn flag_update(op: CardOp, transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let (projection, _) = select_fields(params)?;
    let (body, status) = flag_change(op, params);

    let response = transport
        .request(ApiRequest::patch(format!("/cards/{card_id}")).body(body))
        .await?;
    mutation_result(response.data.as_ref(), &projection, status)
}

async fn set_custom_fields(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let (projection, _) = select_fields(params)?;

    let mut body = Map::new();
    merge_custom_field_param(&mut body, params, CustomFieldMode::Update)?;

    let response = transport
        .request(ApiRequest::patch(format!("/cards/{card_id}")).body(Value::Object(body)))
        .await?;
    mutation_result(
        response.data.as_ref(),
        &projection,
        MutationStatus {
            unchanged: "No update applied — request contained no changes.",
            failed: "Card not updated",
        },
    )
}

async fn comment(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let text = line_breaks_to_markup(&params.string("text"));

    let response = transport
        .request(ApiRequest::post(format!("/cards/{card_id}/comments")).body(json!({ "text": text })))
        .await?;
    Ok(response.body())
}

async fn subtask(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;

    let mut body = Map::new();
    if let Some(text) = params.non_empty_string("text") {
        body.insert("description".into(), Value::String(line_breaks_to_markup(&text)));
    }
    // Sent as local time marked UTC, without further parsing.
    if let Some(deadline) = params.non_empty_string("deadline") {
        body.insert("deadline".into(), Value::String(format!("{deadline}Z")));
    }
    if let Some(owner) = params.reference("owner_id").filter(|r| is_supplied(&r.value)) {
        body.insert("owner_user_id".into(), owner.value);
    }
    if let Some(finished) = params.raw("is_finished").filter(|v| is_supplied(v)) {
        body.insert("is_finished".into(), finished.clone());
    }

    let response = transport
        .request(ApiRequest::post(format!("/cards/{card_id}/subtasks")).body(Value::Object(body)))
        .await?;
    Ok(response.body())
}

async fn logtime(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let date = dates::parse_loose(&params.string("date"))
        .ok_or_else(|| NodeError::validation(INVALID_DEADLINE))?;
    let card_id = params.positive_id("card_id", "Card")?;
    let duration = params
        .number("duration")
        .filter(|d| *d != 0.0)
        .ok_or_else(|| NodeError::validation("Duration must be bigger than 0"))?;
    let unit = TimeUnit::parse(&params.string("time_unit"))?;

    let mut body = Map::new();
    body.insert("card_id".into(), json!(card_id));
    body.insert("time".into(), json_number(unit.seconds(duration)));
    body.insert("date".into(), Value::String(dates::calendar_day(date)));
    if let Some(comment) = params.non_empty_string("comment") {
        body.insert("comment".into(), Value::String(comment));
    }

    let response = transport
        .request(ApiRequest::post("/loggedTime").body(Value::Object(body)))
        .await?;
    Ok(response.body())
}
