//! Light inspection of snapshot payloads.
//!
//! The controller never interprets a snapshot beyond its known top-level
//! fields: the verification inventory counts, the compressed/payload
//! flags, and entity/tile statistics. Everything else is opaque and an
//! unknown shape yields empty metrics, never an error.

use serde_json::{json, Map, Value};

/// Summarizes the payload for the transfer record's `payload_metrics`.
#[must_use]
pub fn payload_metrics(export_data: &Value, size_bytes: u64) -> Value {
    let mut metrics = Map::new();
    metrics.insert("size_bytes".to_string(), json!(size_bytes));
    metrics.insert(
        "compressed".to_string(),
        json!(export_data
            .get("compressed")
            .and_then(Value::as_bool)
            .unwrap_or(false)),
    );
    metrics.insert(
        "has_payload".to_string(),
        json!(export_data.get("payload").is_some()),
    );
    if let Some(count) = counted(export_data.get("entities")) {
        metrics.insert("entity_count".to_string(), json!(count));
    }
    if let Some(count) = counted(export_data.get("tiles")) {
        metrics.insert("tile_count".to_string(), json!(count));
    }
    Value::Object(metrics)
}

/// Extracts the source-side verification block, augmented with item and
/// fluid totals when the count maps are present. Returns `None` when the
/// payload carries no verification data.
#[must_use]
pub fn source_verification(export_data: &Value) -> Option<Value> {
    let verification = export_data.get("verification")?.as_object()?;
    let mut result = verification.clone();
    if let Some(total) = sum_counts(verification.get("item_counts")) {
        result.insert("item_total".to_string(), json!(total));
    }
    if let Some(total) = sum_counts(verification.get("fluid_counts")) {
        result.insert("fluid_total".to_string(), json!(total));
    }
    Some(Value::Object(result))
}

/// Count of an array field, or the value itself when it is already a
/// number (some serializers emit counts instead of the arrays).
fn counted(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Array(items) => Some(items.len() as u64),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}

/// Sums the values of a `name -> count` map.
fn sum_counts(counts: Option<&Value>) -> Option<f64> {
    let map = counts?.as_object()?;
    Some(map.values().filter_map(Value::as_f64).sum())
}
