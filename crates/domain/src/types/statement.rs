//! Statements as opaque JSON payloads with a stable identifier

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::constants::VERB_VOIDED;
use crate::errors::{LrsError, Result};

/// A learning-activity statement.
///
/// The payload is kept as a JSON object; the library only looks at the
/// `"id"` field (identity) and, for voiding, the `"actor"` field. Two
/// statements are the same statement iff their identifiers match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statement {
    payload: Map<String, Value>,
}

impl Statement {
    /// Wrap a JSON object. Anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(payload) => Ok(Self { payload }),
            other => Err(LrsError::InvalidInput(format!(
                "statement must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parse a statement from its serialized bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.payload.insert("id".to_string(), Value::String(id.into()));
    }

    /// Return the identifier, generating a v4 UUID first if none is set.
    pub fn ensure_id(&mut self) -> String {
        if let Some(id) = self.id() {
            return id.to_string();
        }
        let id = Uuid::new_v4().to_string();
        self.set_id(id.clone());
        id
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    /// True when both statements carry the same identifier.
    pub fn same_statement(&self, other: &Self) -> bool {
        matches!((self.id(), other.id()), (Some(a), Some(b)) if a == b)
    }

    pub fn actor(&self) -> Option<&Value> {
        self.payload.get("actor")
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.payload)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload)?)
    }

    /// Build a statement voiding the statement identified by `target_id`.
    pub fn voiding(target_id: &str, actor: Value) -> Self {
        let value = json!({
            "actor": actor,
            "verb": {
                "id": VERB_VOIDED,
                "display": { "en-US": "voided" }
            },
            "object": {
                "objectType": "StatementRef",
                "id": target_id
            }
        });
        match value {
            Value::Object(payload) => Self { payload },
            _ => Self { payload: Map::new() },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
