//! Every enum in `zoe_core::model` already serializes `snake_case` via serde;
//! this reuses that instead of hand-rolling a second `as_str`/`from_str` pair
//! per enum just to get a CQL `TEXT` column.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::PersistenceError;

pub fn to_text<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        other => other.map(|v| v.to_string()).unwrap_or_default(),
    }
}

pub fn from_text<T: DeserializeOwned>(text: &str) -> Result<T, PersistenceError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|e| PersistenceError::InvalidData(format!("decoding {text}: {e}")))
}
