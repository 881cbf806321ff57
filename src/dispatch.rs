use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, NodeError};
use crate::handlers::{self, HandlerOutput, ResourceOperation};
use crate::model::binary::BinaryData;
use crate::model::params::{InputItem, ItemParams};
use crate::transport::Transport;

/// One node execution as the host hands it over.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub resource: String,
    pub operation: String,
    #[serde(default)]
    pub continue_on_fail: bool,
    #[serde(default)]
    pub items: Vec<InputItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    pub item: usize,
}

/// One output record, tagged with the input item it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub json: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, BinaryData>,
    #[serde(rename = "pairedItem")]
    pub paired_item: PairedItem,
}

impl ExecutionRecord {
    fn json(json: Value, item: usize) -> Self {
        Self {
            json,
            binary: BTreeMap::new(),
            paired_item: PairedItem { item },
        }
    }
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn run(&self, input: &NodeInput) -> Result<Vec<ExecutionRecord>, ApiError> {
        self.execute(
            &input.resource,
            &input.operation,
            &input.items,
            input.continue_on_fail,
        )
        .await
    }

    /// Run the selected handler once per item, strictly in order. With
    /// `continue_on_fail` a failing item turns into an `{error}` record;
    /// otherwise the first failure aborts the batch.
    pub async fn execute(
        &self,
        resource: &str,
        operation: &str,
        items: &[InputItem],
        continue_on_fail: bool,
    ) -> Result<Vec<ExecutionRecord>, ApiError> {
        let mut records = Vec::new();

        for (index, item) in items.iter().enumerate() {
            match self.execute_item(resource, operation, index, item).await {
                Ok(mut produced) => records.append(&mut produced),
                Err(err) if continue_on_fail => {
                    warn!(item = index, resource, operation, error = %err, "Item failed, continuing");
                    records.push(ExecutionRecord::json(
                        json!({ "error": err.to_string() }),
                        index,
                    ));
                }
                Err(err) => {
                    warn!(item = index, resource, operation, error = %err, "Item failed");
                    return Err(err.into_api_error());
                }
            }
        }

        Ok(records)
    }

    async fn execute_item(
        &self,
        resource: &str,
        operation: &str,
        index: usize,
        item: &InputItem,
    ) -> Result<Vec<ExecutionRecord>, NodeError> {
        let op = ResourceOperation::resolve(resource, operation)?;
        debug!(item = index, resource, operation, "Dispatching");

        let params = ItemParams::new(index, item);
        let output = handlers::invoke(op, self.transport.as_ref(), &params).await?;
        Ok(records_for(output, index))
    }
}

/// Arrays become one record per element; everything else is a single record.
fn records_for(output: HandlerOutput, index: usize) -> Vec<ExecutionRecord> {
    match output {
        HandlerOutput::Json(Value::Array(values)) => values
            .into_iter()
            .map(|value| ExecutionRecord::json(as_object(value), index))
            .collect(),
        HandlerOutput::Json(value) => vec![ExecutionRecord::json(as_object(value), index)],
        HandlerOutput::Binary { json, binary } => vec![ExecutionRecord {
            json,
            binary,
            paired_item: PairedItem { item: index },
        }],
    }
}

fn as_object(value: Value) -> Value {
    match value {
        Value::Null => json!({}),
        other => other,
    }
}
