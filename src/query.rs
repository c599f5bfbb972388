//! Parse-only validation of filter queries.
//!
//! Generated queries are strings in the extended JSON dialect accepted by
//! the document store (`$or`, `$gt`, `{"$date": ...}` wrappers). Before a
//! response is accepted, the query must round-trip through the same parser
//! the store's driver uses. Queries are never executed here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryParseError {
    #[error("query is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("query is not a valid filter document: {0}")]
    ExtendedJson(#[from] bson::extjson::de::Error),
}

/// Parse a filter query string into a BSON document.
///
/// Accepts the extended JSON dialect, so typed wrappers like
/// `{"$date": "2024-12-08T22:20:51.322Z"}` decode to their BSON
/// counterparts. Parsing is deterministic and side-effect-free.
pub fn parse_filter(query: &str) -> Result<bson::Document, QueryParseError> {
    let value: serde_json::Value = serde_json::from_str(query)?;

    match value {
        serde_json::Value::Object(map) => Ok(bson::Document::try_from(map)?),
        other => Err(QueryParseError::NotAnObject(json_type_name(&other))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
