//! Pure `(state, item?) -> JSON` evaluation for a step's `input_mapping`.
//!
//! Kept as a small declarative expression tree rather than a scripting
//! language: a closed set of path/literal/object nodes is enough to
//! build any worker input as a pure function of state, without taking
//! on a general expression-eval dependency.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WorkflowError, WorkflowResult};
use crate::model::WorkflowState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputMapping {
    /// A dotted path rooted at `state`, e.g. `"clarify.response"`.
    State { path: String },
    /// A dotted path rooted at the current `foreach` item.
    Item { path: String },
    /// A literal JSON value.
    Literal { value: Value },
    /// An object built from named sub-mappings.
    Object { fields: Vec<(String, InputMapping)> },
}

impl InputMapping {
    pub fn state(path: impl Into<String>) -> Self {
        Self::State { path: path.into() }
    }

    pub fn item(path: impl Into<String>) -> Self {
        Self::Item { path: path.into() }
    }

    pub fn literal(value: Value) -> Self {
        Self::Literal { value }
    }

    pub fn object(fields: Vec<(&str, InputMapping)>) -> Self {
        Self::Object {
            fields: fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    pub fn evaluate(&self, state: &WorkflowState, item: Option<&Value>) -> WorkflowResult<Value> {
        match self {
            InputMapping::State { path } => {
                let root = serde_json::to_value(state)
                    .map_err(|e| WorkflowError::Internal(format!("state serialize: {e}")))?;
                Ok(resolve_path(&root, path).unwrap_or(Value::Null))
            }
            InputMapping::Item { path } => {
                let root = item.ok_or_else(|| {
                    WorkflowError::Internal(
                        "input_mapping referenced item outside a foreach step".into(),
                    )
                })?;
                Ok(resolve_path(root, path).unwrap_or(Value::Null))
            }
            InputMapping::Literal { value } => Ok(value.clone()),
            InputMapping::Object { fields } => {
                let mut map = serde_json::Map::new();
                for (key, mapping) in fields {
                    map.insert(key.clone(), mapping.evaluate(state, item)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Resolves a `foreach` step's `items_path` to a sequence.
    pub fn resolve_items(state: &WorkflowState, items_path: &str) -> WorkflowResult<Vec<Value>> {
        let root = serde_json::to_value(state)
            .map_err(|e| WorkflowError::Internal(format!("state serialize: {e}")))?;
        match resolve_path(&root, items_path) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(WorkflowError::Validation(format!(
                "items_path {items_path} did not resolve to an array, got {other}"
            ))),
        }
    }
}

fn resolve_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = current.get(segment)?;
    }
    Some(current.clone())
}
