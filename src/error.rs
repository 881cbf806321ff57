use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = NodeError> = std::result::Result<T, E>;

/// How loudly an error should be surfaced to whoever configured the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A failed call against the Businessmap API, carrying whatever the server
/// sent back so it can be inspected later.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub description: String,
    pub headers: BTreeMap<String, String>,
    pub raw_body: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            description: NO_DETAILS.to_string(),
            headers: BTreeMap::new(),
            raw_body: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

pub const NO_DETAILS: &str = "No further details available";

#[derive(Debug, Error)]
pub enum NodeError {
    /// Bad input caught before any request was sent.
    #[error("{0}")]
    Validation(String),

    /// A lookup needs a parent selection (usually a board) that is missing.
    #[error("{0}")]
    SelectionRequired(String),

    #[error("Operation \"{operation}\" for resource \"{resource}\" is not supported")]
    UnsupportedOperation { resource: String, operation: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{message}")]
    InvalidResponse {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    Operation {
        message: String,
        description: Option<String>,
    },

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Storage(String),
}

impl NodeError {
    pub fn validation(message: impl Into<String>) -> Self {
        NodeError::Validation(message.into())
    }

    pub fn invalid_response(message: impl Into<String>, details: Option<Value>) -> Self {
        NodeError::InvalidResponse {
            message: message.into(),
            details,
        }
    }

    pub fn operation(message: impl Into<String>, description: impl Into<String>) -> Self {
        NodeError::Operation {
            message: message.into(),
            description: Some(description.into()),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            NodeError::Validation(_) | NodeError::SelectionRequired(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn http_code(&self) -> Option<u16> {
        match self {
            NodeError::UnsupportedOperation { .. } => Some(400),
            NodeError::Api(err) => err.status,
            _ => None,
        }
    }

    pub fn description(&self) -> Option<String> {
        match self {
            NodeError::UnsupportedOperation { .. } => {
                Some("Check that the resource and operation combination exists".into())
            }
            NodeError::Api(err) => Some(err.description.clone()),
            NodeError::InvalidResponse { details, .. } => details.as_ref().map(Value::to_string),
            NodeError::Operation { description, .. } => description.clone(),
            _ => None,
        }
    }

    /// Collapse any error into the API error shape handed back to the host.
    /// API errors pass through untouched.
    pub fn into_api_error(self) -> ApiError {
        match self {
            NodeError::Api(err) => err,
            other => {
                let mut err = ApiError::new(other.to_string());
                err.status = other.http_code();
                if let Some(description) = other.description() {
                    err.description = description;
                }
                err
            }
        }
    }
}
