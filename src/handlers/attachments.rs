use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use super::{render, AttachmentOp, HandlerOutput};
use crate::error::{ApiError, NodeError, Result};
use crate::model::binary::BinaryData;
use crate::model::params::ItemParams;
use crate::payload::is_supplied;
use crate::transport::{ApiRequest, FileUpload, Transport, UploadContent};

/// Binary property the downloaded file is stored under.
pub const DOWNLOAD_PROPERTY: &str = "content";

pub async fn handle(
    op: AttachmentOp,
    transport: &dyn Transport,
    params: &ItemParams<'_>,
) -> Result<HandlerOutput> {
    match op {
        AttachmentOp::Get => list(transport, params).await.map(HandlerOutput::Json),
        AttachmentOp::Download => download(transport, params).await,
        AttachmentOp::Upload => upload(transport, params).await.map(HandlerOutput::Json),
    }
}

async fn list(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let response = transport
        .request(ApiRequest::get(format!("/cards/{card_id}/attachments")))
        .await?;
    Ok(response.body())
}

async fn download(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<HandlerOutput> {
    let card_id = params.positive_id("card_id", "Card")?;
    let file_id = params
        .reference("filename")
        .map(|r| r.value)
        .filter(is_supplied)
        .map(|v| render(&v))
        .ok_or_else(|| NodeError::validation("Filename/ID not provided"))?;

    let metadata = transport
        .request(ApiRequest::get(format!("/cards/{card_id}/attachments/{file_id}")))
        .await
        .map_err(|e| {
            NodeError::operation(
                format!("Failed to fetch file metadata for ID \"{file_id}\""),
                e.to_string(),
            )
        })?;

    let info = metadata.envelope_data().cloned().unwrap_or(Value::Null);
    let link = info
        .get("link")
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| {
            ApiError::new(format!(
                "File URL not found in response for file ID {file_id} for card ID {card_id}"
            ))
            .with_description(metadata.raw_body.clone())
        })?;
    let file_name = info
        .get("file_name")
        .and_then(Value::as_str)
        .map(String::from);

    debug!(card_id, %file_id, "Downloading card attachment");
    let file = transport.download(link).await?;

    let mut binary = BTreeMap::new();
    binary.insert(
        DOWNLOAD_PROPERTY.to_string(),
        BinaryData::from_bytes(&file.bytes, file_name, file.mime_type),
    );
    Ok(HandlerOutput::Binary {
        json: json!({}),
        binary,
    })
}

async fn upload(transport: &dyn Transport, params: &ItemParams<'_>) -> Result<Value> {
    let card_id = params.positive_id("card_id", "Card")?;
    let property = params
        .non_empty_string("binaryFileData")
        .ok_or_else(|| NodeError::validation("Binary data not provided"))?;
    let binary = params.binary(&property).ok_or_else(|| {
        NodeError::validation(format!("This item has no binary property \"{property}\""))
    })?;

    let file_name = params
        .non_empty_string("filename")
        .or_else(|| binary.file_name.clone())
        .unwrap_or_else(|| property.clone());
    let content = match &binary.path {
        Some(path) => UploadContent::File(path.clone()),
        None => UploadContent::Buffer(binary.decode()?),
    };

    let uploaded = transport
        .upload(FileUpload {
            file_name,
            mime_type: binary.mime_type_or_default().to_string(),
            content,
        })
        .await?;

    let file = uploaded.resparray.first().cloned().ok_or_else(|| {
        NodeError::invalid_response(
            "Unexpected upload response format or empty resparray",
            serde_json::to_value(&uploaded).ok(),
        )
    })?;
    if file.status != "success" {
        return Err(ApiError::new(format!("Upload failed for file \"{}\"", file.file_name))
            .with_description(serde_json::to_string(&file).unwrap_or_default())
            .into());
    }

    let attached = transport
        .request(
            ApiRequest::post(format!("/cards/{card_id}/attachments"))
                .body(json!({ "file_name": file.file_name, "link": file.link })),
        )
        .await
        .map_err(|e| {
            NodeError::operation(
                format!("Failed to attach \"{}\" to card {card_id}", file.file_name),
                e.to_string(),
            )
        })?;
    Ok(attached.body())
}
