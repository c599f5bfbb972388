//! Response shapes for the query agent.
//!
//! The model's completion must decode into exactly one of two shapes:
//! a successful translation (`Success`) or a rejection (`InvalidRequest`).
//! The shapes are discriminated by which required fields are present.

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Response for a serviceable request: a filter query plus its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Success {
    /// The query as a JSON string in the document store's extended JSON dialect
    pub mongo_query: String,

    /// Explanation of the query, as markdown
    pub explanation: String,
}

/// Response when the user input cannot be serviced against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRequest {
    /// Reason why the request was invalid
    pub error_message: String,
}

/// One of the two acceptable agent outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(Success),
    InvalidRequest(InvalidRequest),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("completion is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("completion must be a JSON object")]
    NotAnObject,

    #[error("completion matches neither response shape (expected `mongo_query` and `explanation`, or `error_message`)")]
    UnknownShape,

    #[error("`mongo_query` must be a non-empty string")]
    EmptyQuery,
}

/// Decode a raw completion into one of the two response shapes.
///
/// The presence of `mongo_query` selects `Success`, the presence of
/// `error_message` selects `InvalidRequest`. A completion carrying neither
/// is an error, never a bare response.
pub fn decode(raw: &str) -> Result<Response, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(extract_json(raw))?;

    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    if object.contains_key("mongo_query") {
        let success: Success = serde_json::from_value(value.clone())?;
        if success.mongo_query.trim().is_empty() {
            return Err(DecodeError::EmptyQuery);
        }
        Ok(Response::Success(success))
    } else if object.contains_key("error_message") {
        let invalid: InvalidRequest = serde_json::from_value(value.clone())?;
        Ok(Response::InvalidRequest(invalid))
    } else {
        Err(DecodeError::UnknownShape)
    }
}

/// Machine-checkable declaration of the two acceptable output shapes,
/// in the chat completions `response_format` encoding.
pub fn output_schema() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "fixture_query_response",
            "schema": {
                "type": "object",
                "anyOf": [
                    {
                        "properties": {
                            "mongo_query": {
                                "type": "string",
                                "minLength": 1,
                                "description": "MongoDB query as a JSON string that is safe to parse as an extended JSON filter document."
                            },
                            "explanation": {
                                "type": "string",
                                "description": "Explanation of the query, as markdown."
                            }
                        },
                        "required": ["mongo_query", "explanation"]
                    },
                    {
                        "properties": {
                            "error_message": {
                                "type": "string",
                                "description": "Reason why the request was invalid."
                            }
                        },
                        "required": ["error_message"]
                    }
                ]
            }
        }
    })
}

/// Strip a markdown code fence around the completion, if present.
///
/// Some models wrap JSON output in ```json fences even when told not to.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"));

    match without_fence {
        Some(inner) => inner.trim(),
        None => trimmed,
    }
}
