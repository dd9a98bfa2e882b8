pub mod types;
pub mod extract;
pub mod executor;
pub mod ollama;

pub use types::*;
pub use extract::*;
pub use executor::*;
pub use ollama::*;

use thiserror::Error;

/// Failures of the model transport itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Request of {size} characters exceeds limit of {limit}")]
    RequestTooLarge { size: usize, limit: usize },
}

/// A payload rejected by a [`ResultValidator`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Field {field} has wrong type, expected {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("Field {field} has {actual} elements, expected {expected}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unrecognized confidence at {field}: {value}")]
    UnknownConfidence { field: String, value: String },

    #[error("Unexpected key: {0}")]
    UnexpectedKey(String),
}

/// Why a single attempt was discarded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttemptError {
    #[error("Transport failure: {0}")]
    Transport(#[from] LlmError),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("No JSON payload in model response")]
    EmptyPayload,

    #[error("JSON parsing error: {0}")]
    Json(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// Every attempt failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Structured query failed after {attempts} attempt(s): {last_error}")]
pub struct QueryFailure {
    pub attempts: u32,
    pub last_error: AttemptError,
}
