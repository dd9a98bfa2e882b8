use super::extract::extract_json_payload;
use super::types::{LlmClient, ResultValidator};
use super::{AttemptError, QueryFailure};

/// Model call + payload extraction + validation, with bounded immediate retry.
///
/// Stateless between calls; each attempt starts from scratch.
pub struct StructuredQueryExecutor<'a> {
    llm: &'a (dyn LlmClient + Send + Sync),
}

impl<'a> StructuredQueryExecutor<'a> {
    pub fn new(llm: &'a (dyn LlmClient + Send + Sync)) -> Self {
        Self { llm }
    }

    /// Run up to `max_attempts` attempts and return the first validated payload.
    ///
    /// A `max_attempts` of 0 is treated as 1.
    pub fn execute<V: ResultValidator>(
        &self,
        system: &str,
        user: &str,
        validator: &V,
        max_attempts: u32,
    ) -> Result<V::Output, QueryFailure> {
        let attempts = max_attempts.max(1);
        let mut last_error = AttemptError::EmptyResponse;

        for attempt in 1..=attempts {
            match self.attempt(system, user, validator) {
                Ok(output) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Structured query succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Structured query attempt failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(QueryFailure {
            attempts,
            last_error,
        })
    }

    fn attempt<V: ResultValidator>(
        &self,
        system: &str,
        user: &str,
        validator: &V,
    ) -> Result<V::Output, AttemptError> {
        let raw = self.llm.generate(system, user)?;
        if raw.trim().is_empty() {
            return Err(AttemptError::EmptyResponse);
        }

        let payload = extract_json_payload(&raw);
        if payload.trim().is_empty() {
            tracing::debug!(raw = %raw, "No payload extracted from model response");
            return Err(AttemptError::EmptyPayload);
        }

        let parsed: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
            tracing::debug!(raw = %raw, extracted = %payload, "Model payload is not valid JSON");
            AttemptError::Json(e.to_string())
        })?;

        validator.validate(&parsed).map_err(|e| {
            tracing::debug!(
                raw = %raw,
                extracted = %payload,
                error = %e,
                "Model payload rejected by validator"
            );
            AttemptError::Validation(e)
        })
    }
}
