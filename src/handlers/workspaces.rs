use serde_json::{Map, Value};

use super::WorkspaceOp;
use crate::error::Result;
use crate::model::params::ItemParams;
use crate::payload::is_supplied;
use crate::transport::{ApiRequest, Transport};

pub async fn handle(
    op: WorkspaceOp,
    transport: &dyn Transport,
    params: &ItemParams<'_>,
) -> Result<Value> {
    let request = match op {
        WorkspaceOp::Create => create(params),
        WorkspaceOp::Update => update(params)?,
        WorkspaceOp::Get => {
            let workspace_id = params.positive_id("workspace_id", "Workspace")?;
            ApiRequest::get(format!("/workspaces/{workspace_id}"))
        }
        WorkspaceOp::GetAllWorkspaces => list(params),
    };
    Ok(transport.request(request).await?.body())
}

fn create(params: &ItemParams<'_>) -> ApiRequest {
    let mut body = Map::new();
    if let Some(name) = params.non_empty_string("name") {
        body.insert("name".into(), Value::String(name));
    }
    // 1 = team, 2 = management
    if let Some(kind) = params.reference("type").filter(|r| is_supplied(&r.value)) {
        body.insert("type".into(), kind.value);
    }
    ApiRequest::post("/workspaces").body(Value::Object(body))
}

fn update(params: &ItemParams<'_>) -> Result<ApiRequest> {
    let workspace_id = params.positive_id("workspace_id", "Workspace")?;

    let mut body = Map::new();
    if let Some(name) = params.non_empty_string("name") {
        body.insert("name".into(), Value::String(name));
    }
    if let Some(archived) = params.reference("is_archived") {
        body.insert("is_archived".into(), archived.value);
    }
    Ok(ApiRequest::patch(format!("/workspaces/{workspace_id}")).body(Value::Object(body)))
}

fn list(params: &ItemParams<'_>) -> ApiRequest {
    let mut request = ApiRequest::get("/workspaces/");
    if let Some(kind) = params.reference("type").and_then(|r| r.as_number()) {
        if kind > 0.0 {
            request = request.query("type", kind as i64);
        }
    }
    if let Some(archived) = params.reference("is_archived").and_then(|r| r.as_number()) {
        if archived >= 0.0 {
            request = request.query("is_archived", archived as i64);
        }
    }
    request.query("expand", "boards")
}
