use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{NodeError, Result};

/// Binary payload attached to an item. Content is either held inline as
/// base64 or referenced on disk, in which case it is streamed on upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl BinaryData {
    pub fn from_bytes(bytes: &[u8], file_name: Option<String>, mime_type: Option<String>) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            file_name,
            mime_type,
            path: None,
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| NodeError::validation(format!("Binary data is not valid base64: {e}")))
    }

    pub fn mime_type_or_default(&self) -> &str {
        self.mime_type
            .as_deref()
            .unwrap_or("application/octet-stream")
    }
}
