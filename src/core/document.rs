//! Decoding of HitBox exports and the layout the extractor walks.
//!
//! A HitBox export looks like this (only the keys we read are shown):
//!
//! ```text
//! { "Sessions": [
//!     { "DataSets": { "Data": { "Collection": [
//!         { "Earside": "Right", "Collection": [ { "Frequency": 250, "Level": 10 } ] } ] } } },
//!     { "DataSets": [ { "Data": { "Collection": [
//!         { "Points": [ { "Frequency": 1000, "Input": 50, "Output": 62 } ] } ] } } ] }
//! ] }
//! ```
//!
//! Depending on firmware, `DataSets` is either an object or a list of objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::error::{HitboxError, Result};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Decode raw file bytes into a JSON document.
pub fn decode_document(file_name: &str, bytes: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| HitboxError::malformed(file_name, format!("invalid UTF-8: {}", e)))?;
    decode_str(file_name, text)
}

pub fn decode_str(file_name: &str, text: &str) -> Result<Value> {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    serde_json::from_str(text).map_err(|e| HitboxError::malformed(file_name, e.to_string()))
}

/// Key names and session positions of the export format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentLayout {
    pub sessions_key: String,
    pub datasets_key: String,
    pub data_key: String,
    pub collection_key: String,
    pub ear_key: String,
    pub points_key: String,
    pub frequency_key: String,
    pub level_key: String,
    pub input_key: String,
    pub output_key: String,
    pub audiometric_session: usize,
    pub probe_session: usize,
}

impl Default for DocumentLayout {
    fn default() -> Self {
        Self {
            sessions_key: "Sessions".to_string(),
            datasets_key: "DataSets".to_string(),
            data_key: "Data".to_string(),
            collection_key: "Collection".to_string(),
            ear_key: "Earside".to_string(),
            points_key: "Points".to_string(),
            frequency_key: "Frequency".to_string(),
            level_key: "Level".to_string(),
            input_key: "Input".to_string(),
            output_key: "Output".to_string(),
            audiometric_session: 0,
            probe_session: 1,
        }
    }
}

/// The payload under a session, after collapsing the list-or-object drift.
#[derive(Debug, Clone, Copy)]
pub struct DatasetNode<'a> {
    node: &'a Map<String, Value>,
}

impl<'a> DatasetNode<'a> {
    /// `[obj, ...]` → `obj`, `obj` → `obj`, anything else → `None`.
    pub fn normalize(value: &'a Value) -> Option<Self> {
        let node = match value {
            Value::Array(items) => items.first()?.as_object()?,
            Value::Object(obj) => obj,
            _ => return None,
        };
        Some(Self { node })
    }

    /// `Data.Collection` of the dataset, empty when either key is missing.
    pub fn collection(&self, layout: &DocumentLayout) -> &'a [Value] {
        self.node
            .get(&layout.data_key)
            .and_then(|data| data.get(&layout.collection_key))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Sessions of a document; `None` when the key is missing or not a list.
pub fn sessions<'a>(document: &'a Value, layout: &DocumentLayout) -> Option<&'a [Value]> {
    document
        .get(&layout.sessions_key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

/// Numeric field that may arrive as a JSON number or a numeric string.
pub fn number_field(item: &Value, key: &str) -> Option<f64> {
    let value = match item.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}
