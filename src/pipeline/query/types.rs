use super::{LlmError, ValidationError};

/// Text-in, text-out access to a language model.
///
/// Implementations are a thin transport: no content checks, no retries.
/// Model choice and sampling parameters belong to the implementation.
pub trait LlmClient {
    fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Turns a parsed JSON payload into a typed result or rejects it whole.
pub trait ResultValidator {
    type Output;

    fn validate(&self, payload: &serde_json::Value) -> Result<Self::Output, ValidationError>;
}
