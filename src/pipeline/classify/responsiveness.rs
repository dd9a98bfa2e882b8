use std::time::Instant;

use super::prompt::{build_responsiveness_system_prompt, build_responsiveness_user_prompt};
use super::types::ResponsivenessAnalysis;
use super::validation::ResponsivenessValidator;
use crate::models::{CpraRequest, Email, EmailId};
use crate::pipeline::query::{LlmClient, StructuredQueryExecutor};

/// Classifies one email against every request in a single model call.
pub struct ResponsivenessClassifier<'a> {
    llm: &'a (dyn LlmClient + Send + Sync),
    model_name: String,
    max_attempts: u32,
}

impl<'a> ResponsivenessClassifier<'a> {
    pub fn new(llm: &'a (dyn LlmClient + Send + Sync), model_name: &str, max_attempts: u32) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
            max_attempts,
        }
    }

    /// `None` when the request list is empty or every attempt failed.
    pub fn classify(
        &self,
        email_id: &EmailId,
        email: &Email,
        requests: &[CpraRequest],
    ) -> Option<ResponsivenessAnalysis> {
        if requests.is_empty() {
            tracing::warn!(email_id = %email_id, "No requests supplied, skipping responsiveness");
            return None;
        }

        let _span = tracing::info_span!(
            "responsiveness",
            email_id = %email_id,
            requests = requests.len()
        )
        .entered();

        let system = build_responsiveness_system_prompt(requests.len());
        let user = build_responsiveness_user_prompt(&email.display_text, requests);
        let validator = ResponsivenessValidator::new(requests.len());

        let start = Instant::now();
        let result = StructuredQueryExecutor::new(self.llm).execute(
            &system,
            &user,
            &validator,
            self.max_attempts,
        );
        let duration_ms = start.elapsed().as_millis() as u64;

        let determinations = match result {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(email_id = %email_id, error = %e, "Responsiveness analysis failed");
                return None;
            }
        };

        match ResponsivenessAnalysis::new(
            email_id.clone(),
            requests,
            determinations,
            &self.model_name,
            duration_ms,
        ) {
            Ok(analysis) => {
                tracing::debug!(
                    email_id = %email_id,
                    responsive = ?analysis.responsive_requests(),
                    duration_ms,
                    "Responsiveness analysis complete"
                );
                Some(analysis)
            }
            Err(e) => {
                tracing::error!(email_id = %email_id, error = %e, "Responsiveness result inconsistent");
                None
            }
        }
    }
}
