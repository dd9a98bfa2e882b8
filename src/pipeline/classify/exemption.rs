use std::time::Instant;

use super::prompt::{build_exemption_user_prompt, EXEMPTION_SYSTEM_PROMPT};
use super::types::ExemptionAnalysis;
use super::validation::ExemptionValidator;
use crate::models::{Email, EmailId};
use crate::pipeline::query::{LlmClient, StructuredQueryExecutor};

/// Classifies one email against the three fixed exemption categories.
pub struct ExemptionClassifier<'a> {
    llm: &'a (dyn LlmClient + Send + Sync),
    model_name: String,
    max_attempts: u32,
}

impl<'a> ExemptionClassifier<'a> {
    pub fn new(llm: &'a (dyn LlmClient + Send + Sync), model_name: &str, max_attempts: u32) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
            max_attempts,
        }
    }

    pub fn classify(&self, email_id: &EmailId, email: &Email) -> Option<ExemptionAnalysis> {
        let _span = tracing::info_span!("exemption", email_id = %email_id).entered();

        let user = build_exemption_user_prompt(&email.display_text);
        let start = Instant::now();
        let result = StructuredQueryExecutor::new(self.llm).execute(
            EXEMPTION_SYSTEM_PROMPT,
            &user,
            &ExemptionValidator,
            self.max_attempts,
        );
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(findings) => {
                let analysis =
                    ExemptionAnalysis::new(email_id.clone(), findings, &self.model_name, duration_ms);
                tracing::debug!(
                    email_id = %email_id,
                    applicable = ?analysis.applicable(),
                    duration_ms,
                    "Exemption analysis complete"
                );
                Some(analysis)
            }
            Err(e) => {
                tracing::error!(email_id = %email_id, error = %e, "Exemption analysis failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, ExemptionCategory};
    use crate::pipeline::query::MockLlmClient;

    const DELIBERATIVE_ONLY: &str = r#"Here is my analysis:
{"exemptions": {
  "attorney_client": {"applies": false, "confidence": "high", "reasoning": "No attorney involved"},
  "personnel": {"applies": false, "confidence": "high", "reasoning": "No personnel matters"},
  "deliberative": {"applies": true, "confidence": "medium", "reasoning": "Draft recommendation before decision"}
}}"#;

    fn make_email() -> (EmailId, Email) {
        let email = Email::new(None, "Draft memo: recommend approving change order #3");
        (EmailId::assign(&email, 4), email)
    }

    #[test]
    fn maps_findings_by_category() {
        let mock = MockLlmClient::repeating(DELIBERATIVE_ONLY);
        let classifier = ExemptionClassifier::new(&mock, "gemma3:latest", 3);
        let (id, email) = make_email();

        let analysis = classifier.classify(&id, &email).unwrap();
        assert_eq!(analysis.email_id().as_str(), "email_4");
        assert_eq!(analysis.applicable(), vec![ExemptionCategory::Deliberative]);
        let finding = analysis.finding(ExemptionCategory::Deliberative);
        assert_eq!(finding.confidence, ConfidenceLevel::Medium);
        assert_eq!(finding.reasoning, "Draft recommendation before decision");
    }

    #[test]
    fn recovers_after_malformed_first_reply() {
        let mock = MockLlmClient::scripted(vec![
            Ok("I cannot determine that.".into()),
            Ok(DELIBERATIVE_ONLY.into()),
        ]);
        let classifier = ExemptionClassifier::new(&mock, "m", 3);
        let (id, email) = make_email();
        assert!(classifier.classify(&id, &email).is_some());
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn partial_category_set_yields_none() {
        let mock = MockLlmClient::repeating(
            r#"{"exemptions": {"attorney_client": {"applies": false, "confidence": "low", "reasoning": "x"}}}"#,
        );
        let classifier = ExemptionClassifier::new(&mock, "m", 2);
        let (id, email) = make_email();
        assert!(classifier.classify(&id, &email).is_none());
        assert_eq!(mock.call_count(), 2);
    }
}
