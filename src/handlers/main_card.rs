use serde_json::{json, Map, Value};

use super::{render, MainCardOp};
use crate::error::Result;
use crate::model::params::ItemParams;
use crate::model::reference::Reference;
use crate::normalize::{self, mutation_result, select_fields, MutationStatus};
use crate::payload::{
    is_supplied, merge_additional, merge_custom_field_param, CardFields, CustomFieldMode,
    CREATE_EXTRA_FIELDS, UPDATE_EXTRA_FIELDS,
};
use crate::transport::{ApiRequest, ApiResponse, Transport};

const UPDATE_STATUS: MutationStatus = MutationStatus {
    unchanged: "No update applied — request contained no changes.",
    failed: "Card not updated",
};

const MOVE_STATUS: MutationStatus = MutationStatus {
    unchanged: "Card not moved, because it is already there",
    failed: "Card not moved",
};

pub async fn handle(
    op: MainCardOp,
    transport: &dyn Transport,
    params: &ItemParams<'_>,
) -> Result<Value> {
    match op {
        MainCardOp::Create => create(transport, params).await,
        MainCardOp::Update => update(transport, params).await,
        MainCardOp::Move => move_card(transport, params).await,
        MainCardOp::Get => get(transport, params).await,
        MainCardOp::GetCustom => get_custom(transport, params).await,
        MainCardOp::GetAllCardsPerBoard => get_all_per_board(transport, params).await,
    }
}

async fn create(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let column_id = params.positive_id("column_id", "Column")?;
    let lane_id = params.positive_id("lane_id", "Lane")?;
    let (projection, _) = select_fields(params)?;

    let mut body = Map::new();
    body.insert("column_id".into(), json!(column_id));
    body.insert("lane_id".into(), json!(lane_id));
    CardFields::from_params(params)?.merge_into(&mut body);
    merge_additional(
        &mut body,
        &params.collection("additionalFields"),
        CREATE_EXTRA_FIELDS,
    );
    merge_custom_field_param(&mut body, params, CustomFieldMode::Create)?;

    let response = transport
        .request(ApiRequest::post("/cards").body(Value::Object(body)))
        .await?;

    match response.envelope_data() {
        Some(Value::Array(cards)) if !cards.is_empty() => Ok(Value::Array(
            normalize::normalize(&Value::Array(cards.clone()), &projection)?,
        )),
        _ => Ok(json!({ "status": "Card not created", "details": response.body() })),
    }
}

async fn update(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let (projection, _) = select_fields(params)?;

    let mut body = Map::new();
    CardFields::from_params(params)?.merge_into(&mut body);

    let position = params.collection("cardPositionFields");
    for key in ["lane_id", "column_id"] {
        if let Some(raw) = position.get(key) {
            let reference = Reference::from_value(raw);
            if is_supplied(&reference.value) {
                body.insert(key.into(), reference.value);
            }
        }
    }

    merge_additional(
        &mut body,
        &params.collection("additionalFields"),
        UPDATE_EXTRA_FIELDS,
    );
    merge_custom_field_param(&mut body, params, CustomFieldMode::Update)?;

    let response = transport
        .request(ApiRequest::patch(format!("/cards/{card_id}")).body(Value::Object(body)))
        .await?;
    mutation_result(response.data.as_ref(), &projection, UPDATE_STATUS)
}

async fn move_card(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let column_id = params.positive_id("column_id", "Column")?;
    let lane_id = params.positive_id("lane_id", "Lane")?;
    let (projection, _) = select_fields(params)?;

    let response = transport
        .request(
            ApiRequest::patch(format!("/cards/{card_id}"))
                .body(json!({ "column_id": column_id, "lane_id": lane_id })),
        )
        .await?;
    mutation_result(response.data.as_ref(), &projection, MOVE_STATUS)
}

/// Cards of a `GET /cards/` listing, if there are any.
fn listed_cards(response: &ApiResponse) -> Option<&Vec<Value>> {
    response
        .envelope_data()
        .and_then(|data| data.get("data"))
        .and_then(Value::as_array)
        .filter(|cards| !cards.is_empty())
}

async fn get(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let (projection, selection) = select_fields(params)?;

    let mut request = ApiRequest::get("/cards/").query("card_ids", card_id);
    request.query = selection.apply(request.query);

    let response = transport.request(request).await?;
    match listed_cards(&response) {
        Some(cards) => Ok(Value::Array(normalize::normalize(
            &Value::Array(cards.clone()),
            &projection,
        )?)),
        None => Ok(json!({ "status": "Card not found" })),
    }
}

async fn get_custom(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let custom_id = params.required_text("card_id", "Custom Card ID")?;
    let (projection, selection) = select_fields(params)?;

    let mut request = ApiRequest::get("/cards/");
    if let Some(board) = params.reference("board_id").filter(|r| is_supplied(&r.value)) {
        request = request.query("board_ids", render(&board.value));
    }
    request = request.query("custom_ids", custom_id);
    request.query = selection.apply(request.query);

    let response = transport.request(request).await?;
    match listed_cards(&response) {
        Some(cards) => Ok(Value::Array(normalize::normalize(
            &Value::Array(cards.clone()),
            &projection,
        )?)),
        None => Ok(json!({ "status": "Card not found" })),
    }
}

async fn get_all_per_board(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let board_id = params.positive_id("board_id", "Board")?;
    let (projection, selection) = select_fields(params)?;

    let mut request = ApiRequest::get("/cards/").query("board_ids", board_id);
    request.query = selection.apply(request.query);

    let response = transport.request(request).await?;
    if listed_cards(&response).is_none() {
        return Ok(json!({ "status": "No cards found" }));
    }
    Ok(Value::Array(normalize::normalize(
        &response.body(),
        &projection,
    )?))
}
