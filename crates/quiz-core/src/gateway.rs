//! The extraction gateway boundary.
//!
//! The session never talks to an extraction service directly. It hands out
//! an [`ExtractionRequest`]; whoever drives the session runs it through an
//! [`ExtractionGateway`] (usually via [`extract_with_timeout`]) and feeds the
//! outcome back.
//!
//! Gateway output is untrusted. [`parse_extraction_response`] accepts only a
//! JSON array of records (optionally fenced in Markdown, or wrapped in an
//! object under `questions`) and drops records of the wrong shape.

use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::document::{Document, PDF_MIME_TYPE};
use crate::error::ExtractionError;
use crate::question::{RawQuestion, MAX_OPTIONS, MIN_OPTIONS};

/// Outcome of a gateway call.
pub type ExtractionResult = std::result::Result<Vec<RawQuestion>, ExtractionError>;

/// Everything a gateway needs to extract questions from a document.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// The document to extract from.
    pub document: Document,
    /// MIME type sent to the gateway.
    pub mime_type: &'static str,
    /// Target schema for the returned records.
    pub schema: Value,
}

impl ExtractionRequest {
    /// Builds a request for a PDF document with the standard schema.
    #[must_use]
    pub fn for_document(document: Document) -> Self {
        Self {
            document,
            mime_type: PDF_MIME_TYPE,
            schema: extraction_schema(),
        }
    }
}

/// A service that turns document bytes into raw question records.
///
/// Implementations report every failure (transport, gateway status,
/// unparsable output) as an [`ExtractionError`]; the session treats them all
/// alike.
pub trait ExtractionGateway: Send + Sync {
    /// Extracts raw question records from the request's document.
    fn extract<'a>(&'a self, request: &'a ExtractionRequest) -> BoxFuture<'a, ExtractionResult>;
}

/// JSON schema describing the records the gateway must return.
///
/// An array of objects, each with a `question` string, an `options` array of
/// 2 to 5 strings, and an `answer` string that must equal one option.
#[must_use]
pub fn extraction_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "options": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": MIN_OPTIONS,
                    "maxItems": MAX_OPTIONS
                },
                "answer": {
                    "type": "string",
                    "description": "Must exactly match one of the options"
                }
            },
            "required": ["question", "options", "answer"]
        }
    })
}

/// Parses a gateway response body into raw records.
///
/// Accepted shapes:
/// - a JSON array of records
/// - the same wrapped in a Markdown code fence
/// - an object with a `questions` array
///
/// Array elements that are not records of the expected shape are dropped.
///
/// # Errors
///
/// Returns `ExtractionError::MalformedResponse` if the body is empty, is not
/// JSON, or has no array of records at the top level.
pub fn parse_extraction_response(text: &str) -> ExtractionResult {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ExtractionError::MalformedResponse(
            "empty response".to_string(),
        ));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ExtractionError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ExtractionError::MalformedResponse(
                    "expected an array of questions".to_string(),
                ))
            }
        },
        other => {
            return Err(ExtractionError::MalformedResponse(format!(
                "expected an array of questions, got {}",
                json_type_name(&other)
            )))
        }
    };

    let total = items.len();
    let records: Vec<RawQuestion> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %e, "Dropping question record with unexpected shape");
                None
            }
        })
        .collect();

    debug!(total, parsed = records.len(), "Parsed extraction response");
    Ok(records)
}

/// Runs a gateway call with an upper bound on its duration.
///
/// An elapsed timeout becomes `ExtractionError::Timeout`.
pub async fn extract_with_timeout<G>(
    gateway: &G,
    request: &ExtractionRequest,
    timeout: Duration,
) -> ExtractionResult
where
    G: ExtractionGateway + ?Sized,
{
    match tokio::time::timeout(timeout, gateway.extract(request)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                document = %request.document.display_name(),
                "Extraction timed out"
            );
            Err(ExtractionError::Timeout {
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

/// Removes a surrounding Markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    // ```json ... ``` or ``` ... ```
    let Ok(re) = Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$") else {
        return trimmed;
    };

    re.captures(trimmed)
        .and_then(|cap| cap.get(1))
        .map_or(trimmed, |m| m.as_str())
}

/// Human-readable name of a JSON value's type.
const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
