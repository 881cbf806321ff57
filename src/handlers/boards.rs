use serde_json::{json, Map, Value};

use super::{render, BoardOp};
use crate::error::Result;
use crate::model::params::ItemParams;
use crate::payload::is_supplied;
use crate::transport::{ApiRequest, Transport};

pub async fn handle(op: BoardOp, transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let request = match op {
        BoardOp::Create => {
            let workspace_id = params.positive_id("workspace_id", "Workspace")?;
            ApiRequest::post("/boards")
                .body(json!({ "workspace_id": workspace_id, "name": params.string("name") }))
        }
        BoardOp::Update => update(params)?,
        BoardOp::Get => {
            let board_id = params.positive_id("board_id", "Board")?;
            ApiRequest::get(format!("/boards/{board_id}"))
        }
        BoardOp::GetAllBoards => list(params),
        BoardOp::GetBoardStructure => {
            let board_id = params.positive_id("board_id", "Board")?;
            ApiRequest::get(format!("/boards/{board_id}/currentStructure"))
        }
    };
    Ok(transport.request(request).await?.body())
}

fn update(params: &ItemParams<'_>) -> Result<ApiRequest> {
    let board_id = params.positive_id("board_id", "Board")?;

    let mut body = Map::new();
    if let Some(name) = params.non_empty_string("name") {
        body.insert("name".into(), Value::String(name));
    }
    // Anything but an explicit 0 or 1 leaves the archive flag alone.
    let archived = params.reference("is_archived").and_then(|r| r.as_number());
    if let Some(flag) = archived.filter(|n| *n == 0.0 || *n == 1.0) {
        body.insert("is_archived".into(), json!(flag as i64));
    }
    Ok(ApiRequest::patch(format!("/boards/{board_id}")).body(Value::Object(body)))
}

fn list(params: &ItemParams<'_>) -> ApiRequest {
    let mut request = ApiRequest::get("/boards");
    if let Some(workspace) = params.reference("workspace_id").filter(|r| is_supplied(&r.value)) {
        request = request.query("workspace_ids", render(&workspace.value));
    }
    if let Some(archived) = params.reference("is_archived") {
        request = request.query("is_archived", render(&archived.value));
    }
    request
}
