use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, NodeError, Result};
use crate::model::custom_field::{CustomFieldSchema, FieldKind};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// A selectable `{name, value}` pair offered to whoever configures the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOption {
    pub name: String,
    pub value: Value,
}

impl LookupOption {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Parent selections a provider may depend on, plus an optional search
/// filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub board: Option<u64>,
    pub workflow: Option<u64>,
    pub workspace: Option<u64>,
    pub card: Option<u64>,
    pub filter: Option<String>,
}

/// Items that only make sense within one board. The board endpoint yields
/// ids, the detail endpoint yields the labelled objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLookup {
    pub item: &'static str,
    pub board_endpoint: &'static str,
    pub id_field: &'static str,
    pub endpoint: &'static str,
    pub ids_param: &'static str,
    pub label_field: &'static str,
}

pub const BLOCK_REASONS: BoardLookup = BoardLookup {
    item: "Block Reasons",
    board_endpoint: "blockReasons",
    id_field: "reason_id",
    endpoint: "/blockReasons",
    ids_param: "reason_ids",
    label_field: "label",
};

pub const BOARD_USERS: BoardLookup = BoardLookup {
    item: "Users",
    board_endpoint: "userRoles",
    id_field: "user_id",
    endpoint: "/users",
    ids_param: "user_ids",
    label_field: "username",
};

pub const CARD_TEMPLATES: BoardLookup = BoardLookup {
    item: "Card Templates",
    board_endpoint: "cardTemplates",
    id_field: "template_id",
    endpoint: "/cardTemplates",
    ids_param: "template_ids",
    label_field: "name",
};

pub const CARD_TYPES: BoardLookup = BoardLookup {
    item: "Card Types",
    board_endpoint: "cardTypes",
    id_field: "type_id",
    endpoint: "/cardTypes",
    ids_param: "type_ids",
    label_field: "name",
};

pub const BOARD_STICKERS: BoardLookup = BoardLookup {
    item: "Stickers",
    board_endpoint: "stickers",
    id_field: "sticker_id",
    endpoint: "/stickers",
    ids_param: "sticker_ids",
    label_field: "label",
};

pub const BOARD_TAGS: BoardLookup = BoardLookup {
    item: "Tags",
    board_endpoint: "tags",
    id_field: "tag_id",
    endpoint: "/tags",
    ids_param: "tag_ids",
    label_field: "label",
};

pub const BOARD_FIELDS: BoardLookup = BoardLookup {
    item: "Custom Fields",
    board_endpoint: "customFields",
    id_field: "field_id",
    endpoint: "/customFields",
    ids_param: "field_ids",
    label_field: "name",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupProvider {
    WorkspaceTypes,
    WorkspaceArchiveTypes,
    ArchiveTypes,
    Workspaces,
    Boards,
    WorkspaceBoards,
    Workflows,
    Columns,
    Lanes,
    Users,
    BoardUsers,
    BlockReasons,
    CardTypes,
    Templates,
    BoardTags,
    BoardStickers,
    BoardFields,
    Tags,
    Stickers,
    Attachments,
}

impl LookupProvider {
    pub const ALL: [LookupProvider; 20] = [
        LookupProvider::WorkspaceTypes,
        LookupProvider::WorkspaceArchiveTypes,
        LookupProvider::ArchiveTypes,
        LookupProvider::Workspaces,
        LookupProvider::Boards,
        LookupProvider::WorkspaceBoards,
        LookupProvider::Workflows,
        LookupProvider::Columns,
        LookupProvider::Lanes,
        LookupProvider::Users,
        LookupProvider::BoardUsers,
        LookupProvider::BlockReasons,
        LookupProvider::CardTypes,
        LookupProvider::Templates,
        LookupProvider::BoardTags,
        LookupProvider::BoardStickers,
        LookupProvider::BoardFields,
        LookupProvider::Tags,
        LookupProvider::Stickers,
        LookupProvider::Attachments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupProvider::WorkspaceTypes => "workspace-types",
            LookupProvider::WorkspaceArchiveTypes => "workspace-archive-types",
            LookupProvider::ArchiveTypes => "archive-types",
            LookupProvider::Workspaces => "workspaces",
            LookupProvider::Boards => "boards",
            LookupProvider::WorkspaceBoards => "workspace-boards",
            LookupProvider::Workflows => "workflows",
            LookupProvider::Columns => "columns",
            LookupProvider::Lanes => "lanes",
            LookupProvider::Users => "users",
            LookupProvider::BoardUsers => "board-users",
            LookupProvider::BlockReasons => "block-reasons",
            LookupProvider::CardTypes => "card-types",
            LookupProvider::Templates => "templates",
            LookupProvider::BoardTags => "board-tags",
            LookupProvider::BoardStickers => "board-stickers",
            LookupProvider::BoardFields => "board-fields",
            LookupProvider::Tags => "tags",
            LookupProvider::Stickers => "stickers",
            LookupProvider::Attachments => "attachments",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

/// Run one provider and apply the selection's search filter to its result.
pub async fn lookup(
    provider: LookupProvider,
    transport: &dyn Transport,
    selection: &Selection,
) -> Result<Vec<LookupOption>> {
    let options = match provider {
        LookupProvider::WorkspaceTypes => workspace_types(),
        LookupProvider::WorkspaceArchiveTypes => workspace_archive_types(),
        LookupProvider::ArchiveTypes => archive_types(),
        LookupProvider::Workspaces => workspaces(transport).await?,
        LookupProvider::Boards => boards(transport).await?,
        LookupProvider::WorkspaceBoards => workspace_boards(transport, selection.workspace).await?,
        LookupProvider::Workflows => workflows(transport, selection.board).await?,
        LookupProvider::Columns => columns(transport, selection.board, selection.workflow).await?,
        LookupProvider::Lanes => lanes(transport, selection.board, selection.workflow).await?,
        LookupProvider::Users => users(transport).await?,
        LookupProvider::BoardUsers => {
            fetch_board_dependent_items(transport, selection.board, &BOARD_USERS).await?
        }
        LookupProvider::BlockReasons => {
            fetch_board_dependent_items(transport, selection.board, &BLOCK_REASONS).await?
        }
        LookupProvider::CardTypes => {
            fetch_board_dependent_items(transport, selection.board, &CARD_TYPES).await?
        }
        LookupProvider::Templates => {
            fetch_board_dependent_items(transport, selection.board, &CARD_TEMPLATES).await?
        }
        LookupProvider::BoardTags => {
            fetch_board_dependent_items(transport, selection.board, &BOARD_TAGS).await?
        }
        LookupProvider::BoardStickers => {
            fetch_board_dependent_items(transport, selection.board, &BOARD_STICKERS).await?
        }
        LookupProvider::BoardFields => {
            fetch_board_dependent_items(transport, selection.board, &BOARD_FIELDS).await?
        }
        LookupProvider::Tags => all_labels(transport, "/tags", "tag_id", "tags").await?,
        LookupProvider::Stickers => {
            all_labels(transport, "/stickers", "sticker_id", "stickers").await?
        }
        LookupProvider::Attachments => attachments(transport, selection.card).await?,
    };

    Ok(match selection.filter.as_deref() {
        Some(filter) => filter_options(options, filter),
        None => options,
    })
}

/// Case-insensitive substring match on the option label. An empty filter
/// keeps everything.
pub fn filter_options(options: Vec<LookupOption>, filter: &str) -> Vec<LookupOption> {
    if filter.is_empty() {
        return options;
    }
    let needle = filter.to_lowercase();
    options
        .into_iter()
        .filter(|o| o.name.to_lowercase().contains(&needle))
        .collect()
}

pub fn workspace_types() -> Vec<LookupOption> {
    vec![
        LookupOption::new("All Workspaces", -1),
        LookupOption::new("Team Workspaces", 1),
        LookupOption::new("Management Workspaces", 2),
    ]
}

pub fn workspace_archive_types() -> Vec<LookupOption> {
    vec![
        LookupOption::new("All", -1),
        LookupOption::new("Non-Archived", 0),
        LookupOption::new("Archived", 1),
    ]
}

pub fn archive_types() -> Vec<LookupOption> {
    vec![LookupOption::new("No", 0), LookupOption::new("Yes", 1)]
}

/// Resolve the ids a board links to, then fetch their full objects and
/// label them. An empty id list skips the second request.
pub async fn fetch_board_dependent_items(
    transport: &dyn Transport,
    board: Option<u64>,
    kind: &BoardLookup,
) -> Result<Vec<LookupOption>> {
    let board_id = board.ok_or_else(|| {
        NodeError::SelectionRequired(format!(
            "Please select a board above to load {}.",
            kind.item
        ))
    })?;

    let id_response = transport
        .request(ApiRequest::get(format!(
            "/boards/{board_id}/{}",
            kind.board_endpoint
        )))
        .await?;
    let ids = listed(&id_response, kind.item)?
        .iter()
        .filter_map(|entry| entry.get(kind.id_field))
        .map(id_text)
        .filter(|id| !id.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let full_response = transport
        .request(ApiRequest::get(kind.endpoint).query(kind.ids_param, ids))
        .await?;
    let items = listed(&full_response, &format!("full {}", kind.item))?;

    let mut options = labelled(items, kind.label_field, kind.id_field);
    sort_by_name(&mut options);
    Ok(options)
}

async fn workspaces(transport: &dyn Transport) -> Result<Vec<LookupOption>> {
    let response = transport
        .request(ApiRequest::get("/workspaces").query("is_archived", 0))
        .await?;
    let mut options = with_id_suffix(listed(&response, "workspaces")?, "workspace_id");
    sort_by_name(&mut options);
    Ok(options)
}

async fn boards(transport: &dyn Transport) -> Result<Vec<LookupOption>> {
    let response = transport
        .request(ApiRequest::get("/boards").query("is_archived", 0))
        .await?;
    let mut options = with_id_suffix(listed(&response, "boards")?, "board_id");
    sort_by_name(&mut options);
    Ok(options)
}

async fn workspace_boards(
    transport: &dyn Transport,
    workspace: Option<u64>,
) -> Result<Vec<LookupOption>> {
    let Some(workspace_id) = workspace else {
        return Ok(Vec::new());
    };
    let request = ApiRequest::get("/boards")
        .query("workspace_ids", workspace_id)
        .query("is_archived", 0);
    let response = transport.request(request).await?;
    Ok(with_id_suffix(
        listed(&response, "boards per workspace")?,
        "board_id",
    ))
}

async fn workflows(transport: &dyn Transport, board: Option<u64>) -> Result<Vec<LookupOption>> {
    let board_id = board.ok_or_else(|| {
        NodeError::SelectionRequired("Please select a board above to load workflows.".into())
    })?;
    let response = transport
        .request(ApiRequest::get(format!("/boards/{board_id}/workflows")))
        .await?;
    let enabled = listed(&response, "workflows")?
        .iter()
        .filter(|w| w.get("is_enabled").and_then(Value::as_i64) != Some(0))
        .cloned()
        .collect::<Vec<_>>();
    Ok(labelled(&enabled, "name", "workflow_id"))
}

async fn columns(
    transport: &dyn Transport,
    board: Option<u64>,
    workflow: Option<u64>,
) -> Result<Vec<LookupOption>> {
    let mut options = workflow_scoped(transport, board, workflow, "columns", "column_id").await?;
    sort_by_name(&mut options);
    Ok(options)
}

async fn lanes(
    transport: &dyn Transport,
    board: Option<u64>,
    workflow: Option<u64>,
) -> Result<Vec<LookupOption>> {
    workflow_scoped(transport, board, workflow, "lanes", "lane_id").await
}

/// Columns and lanes come back per board; the workflow filter is applied
/// here since the API has no combined endpoint.
async fn workflow_scoped(
    transport: &dyn Transport,
    board: Option<u64>,
    workflow: Option<u64>,
    collection: &str,
    id_field: &str,
) -> Result<Vec<LookupOption>> {
    let (Some(board_id), Some(workflow_id)) = (board, workflow) else {
        return Err(NodeError::SelectionRequired(format!(
            "Please select a board and workflow above to load {collection}."
        )));
    };
    let response = transport
        .request(ApiRequest::get(format!("/boards/{board_id}/{collection}")))
        .await?;
    let scoped = listed(&response, collection)?
        .iter()
        .filter(|entry| entry.get("workflow_id").and_then(Value::as_u64) == Some(workflow_id))
        .cloned()
        .collect::<Vec<_>>();
    Ok(labelled(&scoped, "name", id_field))
}

async fn users(transport: &dyn Transport) -> Result<Vec<LookupOption>> {
    let response = transport.request(ApiRequest::get("/users")).await?;
    Ok(labelled(listed(&response, "users")?, "username", "user_id"))
}

async fn all_labels(
    transport: &dyn Transport,
    path: &str,
    id_field: &str,
    item: &str,
) -> Result<Vec<LookupOption>> {
    let response = transport.request(ApiRequest::get(path)).await?;
    let mut options = labelled(listed(&response, item)?, "label", id_field);
    sort_by_name(&mut options);
    Ok(options)
}

async fn attachments(transport: &dyn Transport, card: Option<u64>) -> Result<Vec<LookupOption>> {
    let Some(card_id) = card else {
        return Ok(Vec::new());
    };
    let response = transport
        .request(ApiRequest::get(format!("/cards/{card_id}/attachments")))
        .await?;
    Ok(labelled(listed(&response, "attachments")?, "file_name", "id"))
}

/// Custom fields of a board that can be set through cards, typed for the
/// mapping UI. Fields whose Businessmap type cannot be written are left out.
pub async fn custom_field_schema(
    transport: &dyn Transport,
    board: Option<u64>,
) -> Result<Vec<CustomFieldSchema>> {
    let Some(board_id) = board else {
        return Ok(Vec::new());
    };

    let id_response = transport
        .request(ApiRequest::get(format!("/boards/{board_id}/customFields")))
        .await?;
    let ids = listed(&id_response, "Custom Fields")?
        .iter()
        .filter_map(|f| f.get("field_id"))
        .map(id_text)
        .filter(|id| !id.is_empty())
        .collect::<Vec<_>>()
        .join(",");
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let request = ApiRequest::get("/customFields")
        .query("field_ids", ids)
        .query("expand", "allowed_values");
    let response = transport.request(request).await?;

    let mut schema = Vec::new();
    for field in listed(&response, "Custom Fields details")? {
        let raw_kind = field.get("type").and_then(Value::as_str).unwrap_or_default();
        let Some(kind) = FieldKind::from_businessmap(raw_kind) else {
            continue;
        };
        let options = match (kind, field.get("allowed_values")) {
            (FieldKind::Options, Some(Value::Array(values))) => Some(
                values
                    .iter()
                    .map(|v| {
                        LookupOption::new(
                            label_text(v.get("value")),
                            v.get("value_id").cloned().unwrap_or(Value::Null),
                        )
                    })
                    .collect(),
            ),
            _ => None,
        };
        schema.push(CustomFieldSchema {
            id: field.get("field_id").map(id_text).unwrap_or_default(),
            kind,
            display_name: field.get("name").map(|n| label_text(Some(n))),
            options,
        });
    }
    Ok(schema)
}

/// The array under the body's `data` key; anything else is an unexpected
/// payload.
fn listed<'a>(response: &'a ApiResponse, item: &str) -> Result<&'a Vec<Value>> {
    match response.envelope_data() {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(NodeError::Api(
            ApiError::new(format!("Unexpected format when loading {item}"))
                .with_status(response.status)
                .with_description(response.raw_body.clone()),
        )),
    }
}

fn labelled(items: &[Value], label_field: &str, id_field: &str) -> Vec<LookupOption> {
    items
        .iter()
        .map(|entry| {
            LookupOption::new(
                label_text(entry.get(label_field)),
                entry.get(id_field).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

/// Label as `name (id)`, which keeps identically named entries apart.
fn with_id_suffix(items: &[Value], id_field: &str) -> Vec<LookupOption> {
    items
        .iter()
        .map(|entry| {
            let id = entry.get(id_field).cloned().unwrap_or(Value::Null);
            let name = format!("{} ({})", label_text(entry.get("name")), id_text(&id));
            LookupOption::new(name, id)
        })
        .collect()
}

fn sort_by_name(options: &mut [LookupOption]) {
    options.sort_by(|a, b| compare_labels(&a.name, &b.name));
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn label_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::error::Severity;
    use crate::mock::MockTransport;

    fn board(id: u64) -> Selection {
        Selection {
            board: Some(id),
            ..Selection::default()
        }
    }

    #[test]
    fn providers_parse_by_name() {
        for provider in LookupProvider::ALL {
            assert_eq!(LookupProvider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(LookupProvider::parse("nope"), None);
    }

    #[test]
    fn static_lists_match_api_values() {
        assert_eq!(workspace_types()[0], LookupOption::new("All Workspaces", -1));
        assert_eq!(workspace_archive_types()[1], LookupOption::new("Non-Archived", 0));
        assert_eq!(archive_types(), vec![LookupOption::new("No", 0), LookupOption::new("Yes", 1)]);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let options = vec![
            LookupOption::new("Backlog", 1),
            LookupOption::new("In Progress", 2),
            LookupOption::new("BLOCKED", 3),
        ];
        let filtered = filter_options(options.clone(), "bl");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].value, json!(3));
        assert_eq!(filter_options(options, "").len(), 3);
    }

    #[tokio::test]
    async fn board_items_resolve_ids_then_details_sorted() {
        let transport = MockTransport::new()
            .reply(200, json!({ "data": [{ "reason_id": 4 }, { "reason_id": 9 }] }))
            .reply(
                200,
                json!({ "data": [
                    { "reason_id": 9, "label": "waiting" },
                    { "reason_id": 4, "label": "Blocked by vendor" }
                ] }),
            );

        let options = fetch_board_dependent_items(&transport, Some(12), &BLOCK_REASONS)
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].path, "/boards/12/blockReasons");
        assert_eq!(requests[1].path, "/blockReasons");
        assert_eq!(requests[1].query_value("reason_ids"), Some("4,9"));
        assert_eq!(
            options,
            vec![
                LookupOption::new("Blocked by vendor", 4),
                LookupOption::new("waiting", 9),
            ]
        );
    }

    #[tokio::test]
    async fn board_items_without_ids_skip_detail_call() {
        let transport = MockTransport::new().reply(200, json!({ "data": [] }));
        let options = fetch_board_dependent_items(&transport, Some(1), &BOARD_TAGS)
            .await
            .unwrap();
        assert!(options.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn board_items_need_a_board() {
        let transport = MockTransport::new();
        let err = fetch_board_dependent_items(&transport, None, &CARD_TYPES)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select a board above to load Card Types.");
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn non_array_payload_is_unexpected_format() {
        let transport = MockTransport::new()
            .reply(200, json!({ "data": [{ "user_id": 2 }] }))
            .reply(200, json!({ "data": { "oops": true } }));
        let err = lookup(LookupProvider::BoardUsers, &transport, &board(3))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unexpected format when loading full Users");
        assert_eq!(err.severity(), Severity::Error);
    }

    #[tokio::test]
    async fn workspaces_are_labelled_with_ids_and_sorted() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "workspace_id": 2, "name": "ops" },
                { "workspace_id": 1, "name": "Engineering" }
            ] }),
        );
        let options = lookup(LookupProvider::Workspaces, &transport, &Selection::default())
            .await
            .unwrap();
        assert_eq!(transport.last_request().query_value("is_archived"), Some("0"));
        assert_eq!(options[0], LookupOption::new("Engineering (1)", 1));
        assert_eq!(options[1], LookupOption::new("ops (2)", 2));
    }

    #[tokio::test]
    async fn workflows_hide_disabled_ones() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "workflow_id": 1, "name": "Cards", "is_enabled": 1 },
                { "workflow_id": 2, "name": "Old", "is_enabled": 0 }
            ] }),
        );
        let options = lookup(LookupProvider::Workflows, &transport, &board(5))
            .await
            .unwrap();
        assert_eq!(options, vec![LookupOption::new("Cards", 1)]);
    }

    #[tokio::test]
    async fn columns_filter_by_workflow_and_sort() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "column_id": 10, "name": "Requested", "workflow_id": 1 },
                { "column_id": 11, "name": "Done", "workflow_id": 1 },
                { "column_id": 12, "name": "Archive", "workflow_id": 2 }
            ] }),
        );
        let selection = Selection {
            board: Some(5),
            workflow: Some(1),
            ..Selection::default()
        };
        let options = lookup(LookupProvider::Columns, &transport, &selection)
            .await
            .unwrap();
        assert_eq!(transport.last_request().path, "/boards/5/columns");
        assert_eq!(
            options,
            vec![LookupOption::new("Done", 11), LookupOption::new("Requested", 10)]
        );
    }

    #[tokio::test]
    async fn lanes_need_board_and_workflow() {
        let err = lookup(LookupProvider::Lanes, &MockTransport::new(), &board(5))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Please select a board and workflow above to load lanes."
        );
    }

    #[tokio::test]
    async fn board_items_with_blank_ids_skip_detail_call() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [{ "type_id": null }, { "name": "no id" }, { "type_id": "" }] }),
        );
        let options = lookup(LookupProvider::CardTypes, &transport, &board(4))
            .await
            .unwrap();
        assert!(options.is_empty());
        assert_eq!(transport.call_count(), 1);
        assert_eq!(transport.last_request().path, "/boards/4/cardTypes");
    }

    #[tokio::test]
    async fn boards_are_labelled_with_ids_and_sorted() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "board_id": 8, "name": "support" },
                { "board_id": 3, "name": "Roadmap" },
                { "board_id": 5, "name": "Roadmap" }
            ] }),
        );
        let options = lookup(LookupProvider::Boards, &transport, &Selection::default())
            .await
            .unwrap();
        let request = transport.last_request();
        assert_eq!(request.path, "/boards");
        assert_eq!(request.query_value("is_archived"), Some("0"));
        assert_eq!(
            options,
            vec![
                LookupOption::new("Roadmap (3)", 3),
                LookupOption::new("Roadmap (5)", 5),
                LookupOption::new("support (8)", 8),
            ]
        );
    }

    #[tokio::test]
    async fn workspace_boards_query_the_selected_workspace() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "board_id": 9, "name": "Sprint" },
                { "board_id": 2, "name": "Backlog" }
            ] }),
        );
        let selection = Selection {
            workspace: Some(6),
            ..Selection::default()
        };
        let options = lookup(LookupProvider::WorkspaceBoards, &transport, &selection)
            .await
            .unwrap();
        let request = transport.last_request();
        assert_eq!(request.query_value("workspace_ids"), Some("6"));
        assert_eq!(request.query_value("is_archived"), Some("0"));
        assert_eq!(
            options,
            vec![LookupOption::new("Sprint (9)", 9), LookupOption::new("Backlog (2)", 2)]
        );
    }

    #[tokio::test]
    async fn workspace_boards_without_workspace_are_empty() {
        let transport = MockTransport::new();
        let options = lookup(LookupProvider::WorkspaceBoards, &transport, &Selection::default())
            .await
            .unwrap();
        assert!(options.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn users_are_labelled_by_username_in_api_order() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "user_id": 4, "username": "zoe", "email": "zoe@example.com" },
                { "user_id": 1, "username": "adam" }
            ] }),
        );
        let options = lookup(LookupProvider::Users, &transport, &Selection::default())
            .await
            .unwrap();
        assert_eq!(transport.last_request().path, "/users");
        assert_eq!(
            options,
            vec![LookupOption::new("zoe", 4), LookupOption::new("adam", 1)]
        );
    }

    #[tokio::test]
    async fn lanes_filter_by_workflow_and_keep_api_order() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "lane_id": 30, "name": "Urgent", "workflow_id": 2 },
                { "lane_id": 31, "name": "Default", "workflow_id": 2 },
                { "lane_id": 32, "name": "Elsewhere", "workflow_id": 1 }
            ] }),
        );
        let selection = Selection {
            board: Some(5),
            workflow: Some(2),
            ..Selection::default()
        };
        let options = lookup(LookupProvider::Lanes, &transport, &selection)
            .await
            .unwrap();
        assert_eq!(transport.last_request().path, "/boards/5/lanes");
        assert_eq!(
            options,
            vec![LookupOption::new("Urgent", 30), LookupOption::new("Default", 31)]
        );
    }

    #[tokio::test]
    async fn workflows_need_a_board() {
        let transport = MockTransport::new();
        let err = lookup(LookupProvider::Workflows, &transport, &Selection::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please select a board above to load workflows.");
        assert_eq!(err.severity(), Severity::Warning);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn attachments_without_card_are_empty() {
        let transport = MockTransport::new();
        let options = lookup(LookupProvider::Attachments, &transport, &Selection::default())
            .await
            .unwrap();
        assert!(options.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn search_filter_applies_after_fetch() {
        let transport = MockTransport::new().reply(
            200,
            json!({ "data": [
                { "tag_id": 1, "label": "urgent" },
                { "tag_id": 2, "label": "Backend" }
            ] }),
        );
        let selection = Selection {
            filter: Some("URG".into()),
            ..Selection::default()
        };
        let options = lookup(LookupProvider::Tags, &transport, &selection)
            .await
            .unwrap();
        assert_eq!(options, vec![LookupOption::new("urgent", 1)]);
    }

    #[tokio::test]
    async fn custom_field_schema_maps_types_and_skips_unsupported() {
        let transport = MockTransport::new()
            .reply(
                200,
                json!({ "data": [{ "field_id": 1 }, { "field_id": 2 }, { "field_id": 3 }] }),
            )
            .reply(
                200,
                json!({ "data": [
                    { "field_id": 1, "name": "Severity", "type": "dropdown",
                      "allowed_values": [{ "value": "High", "value_id": 7 }] },
                    { "field_id": 2, "name": "Voters", "type": "vote" },
                    { "field_id": 3, "name": "Due", "type": "date" }
                ] }),
            );

        let schema = custom_field_schema(&transport, Some(8)).await.unwrap();

        let detail = transport.last_request();
        assert_eq!(detail.query_value("field_ids"), Some("1,2,3"));
        assert_eq!(detail.query_value("expand"), Some("allowed_values"));
        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].id, "1");
        assert_eq!(schema[0].kind, FieldKind::Options);
        assert_eq!(schema[0].options, Some(vec![LookupOption::new("High", 7)]));
        assert_eq!(schema[1].kind, FieldKind::DateTime);
        assert_eq!(schema[1].display_name.as_deref(), Some("Due"));
    }
}
