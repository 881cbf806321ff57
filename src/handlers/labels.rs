use serde_json::{json, Map, Value};

use super::{StickerOp, TagOp};
use crate::error::Result;
use crate::model::params::ItemParams;
use crate::payload::normalize_color;
use crate::transport::{ApiRequest, Transport};

/// Tags and stickers share one API shape and differ only in paths and
/// parameter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelResource {
    /// Collection path segment, e.g. `tags`.
    pub collection: &'static str,
    pub id_param: &'static str,
    /// Parameter choosing lookup by `id` or by `label`.
    pub lookup_param: &'static str,
    pub entity: &'static str,
}

pub const TAGS: LabelResource = LabelResource {
    collection: "tags",
    id_param: "tag_id",
    lookup_param: "tag_type",
    entity: "Tag",
};

pub const STICKERS: LabelResource = LabelResource {
    collection: "stickers",
    id_param: "sticker_id",
    lookup_param: "sticker_type",
    entity: "Sticker",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOp {
    Create,
    Update,
    Delete,
    Get,
    GetAll,
    Assign,
}

impl From<TagOp> for LabelOp {
    fn from(op: TagOp) -> Self {
        match op {
            TagOp::Create => LabelOp::Create,
            TagOp::Update => LabelOp::Update,
            TagOp::Delete => LabelOp::Delete,
            TagOp::Get => LabelOp::Get,
            TagOp::GetAllTags => LabelOp::GetAll,
            TagOp::Assign => LabelOp::Assign,
        }
    }
}

impl From<StickerOp> for LabelOp {
    fn from(op: StickerOp) -> Self {
        match op {
            StickerOp::Create => LabelOp::Create,
            StickerOp::Update => LabelOp::Update,
            StickerOp::Delete => LabelOp::Delete,
            StickerOp::Get => LabelOp::Get,
            StickerOp::GetAllStickers => LabelOp::GetAll,
            StickerOp::Assign => LabelOp::Assign,
        }
    }
}

pub async fn handle(
    resource: LabelResource,
    op: LabelOp,
    transport: &dyn Transport,
    params: &ItemParams<'_>,
) -> Result<Value> {
    let collection = resource.collection;
    match op {
        LabelOp::Create => {
            let mut body = Map::new();
            body.insert("label".into(), Value::String(params.string("label")));
            if let Some(color) = params.non_empty_string("color") {
                body.insert("color".into(), Value::String(normalize_color(&color)?));
            }
            let request = ApiRequest::post(format!("/{collection}")).body(Value::Object(body));
            Ok(transport.request(request).await?.body())
        }
        LabelOp::Update => {
            let id = params.positive_id(resource.id_param, resource.entity)?;
            let mut body = Map::new();
            if let Some(label) = params.non_empty_string("label") {
                body.insert("label".into(), Value::String(label));
            }
            if let Some(color) = params.non_empty_string("color") {
                body.insert("color".into(), Value::String(normalize_color(&color)?));
            }
            let request =
                ApiRequest::patch(format!("/{collection}/{id}")).body(Value::Object(body));
            Ok(transport.request(request).await?.body())
        }
        LabelOp::Delete => {
            let id = params.positive_id(resource.id_param, resource.entity)?;
            transport
                .request(ApiRequest::delete(format!("/{collection}/{id}")))
                .await?;
            Ok(json!({ "success": true }))
        }
        LabelOp::Get => {
            let request = if params.string(resource.lookup_param) == "label" {
                let label = params.required_text(resource.id_param, "Label")?;
                ApiRequest::get(format!("/{collection}/")).query("label", label)
            } else {
                let id = params.positive_id(resource.id_param, resource.entity)?;
                ApiRequest::get(format!("/{collection}/{id}"))
            };
            Ok(transport.request(request).await?.body())
        }
        LabelOp::GetAll => Ok(transport
            .request(ApiRequest::get(format!("/{collection}")))
            .await?
            .body()),
        LabelOp::Assign => {
            let id = params.positive_id(resource.id_param, resource.entity)?;
            let board_id = params.positive_id("board_id", "Board")?;
            let response = transport
                .request(ApiRequest::put(format!("/boards/{board_id}/{collection}/{id}")))
                .await?;
            Ok(json!({ "status": response.status }))
        }
    }
}
