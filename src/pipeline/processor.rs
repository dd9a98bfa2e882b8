//! Per-document classification loop over a session.
//!
//! Sequential: responsiveness, then exemptions only for responsive emails.
//! One model call in flight at a time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classify::{ExemptionClassifier, ResponsivenessClassifier};
use super::query::LlmClient;
use crate::config::ModelConfig;
use crate::models::{Email, EmailId};
use crate::session::ProcessingSession;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub total_emails: usize,
    pub processed_emails: usize,
    pub responsive_emails: usize,
    pub exempt_emails: usize,
    pub analysis_errors: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingStats {
    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
            _ => None,
        }
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.total_emails == 0 {
            return 0.0;
        }
        self.processed_emails as f64 / self.total_emails as f64 * 100.0
    }
}

/// Called before each document with `(index, total, id)`.
pub type ProgressFn<'p> = &'p dyn Fn(usize, usize, &EmailId);

pub struct CpraProcessor<'a> {
    responsiveness: ResponsivenessClassifier<'a>,
    exemption: ExemptionClassifier<'a>,
}

impl<'a> CpraProcessor<'a> {
    pub fn new(llm: &'a (dyn LlmClient + Send + Sync), model_name: &str, max_attempts: u32) -> Self {
        Self {
            responsiveness: ResponsivenessClassifier::new(llm, model_name, max_attempts),
            exemption: ExemptionClassifier::new(llm, model_name, max_attempts),
        }
    }

    pub fn from_config(llm: &'a (dyn LlmClient + Send + Sync), config: &ModelConfig) -> Self {
        Self::new(llm, &config.model, config.max_attempts)
    }

    /// Classify every document in the session. Documents that already carry
    /// an analysis keep it, so an interrupted run can be resumed.
    pub fn process_session(
        &self,
        session: &mut ProcessingSession,
        progress_fn: Option<ProgressFn<'_>>,
    ) -> ProcessingStats {
        let documents: Vec<(EmailId, Email)> = session
            .documents()
            .map(|(id, email)| (id.clone(), email.clone()))
            .collect();

        let mut stats = ProcessingStats {
            total_emails: documents.len(),
            started_at: Some(Utc::now()),
            ..ProcessingStats::default()
        };

        tracing::info!(
            session_id = %session.session_id(),
            total = stats.total_emails,
            requests = session.requests().len(),
            "Starting batch analysis"
        );

        for (index, (id, email)) in documents.iter().enumerate() {
            if let Some(progress) = progress_fn {
                progress(index, stats.total_emails, id);
            }
            let _span = tracing::info_span!("document", email_id = %id, index).entered();
            self.process_document(session, id, email, &mut stats);
            stats.processed_emails += 1;
        }

        stats.finished_at = Some(Utc::now());
        tracing::info!(
            processed = stats.processed_emails,
            total = stats.total_emails,
            responsive = stats.responsive_emails,
            exempt = stats.exempt_emails,
            errors = stats.analysis_errors,
            elapsed_secs = stats.elapsed_seconds().unwrap_or_default(),
            "Batch analysis complete"
        );
        stats
    }

    fn process_document(
        &self,
        session: &mut ProcessingSession,
        id: &EmailId,
        email: &Email,
        stats: &mut ProcessingStats,
    ) {
        let responsive = match session.responsiveness(id) {
            Some(existing) => existing.is_responsive_to_any(),
            None => match self.responsiveness.classify(id, email, session.requests()) {
                Some(analysis) => {
                    let responsive = analysis.is_responsive_to_any();
                    if let Err(e) = session.record_responsiveness(analysis) {
                        tracing::error!(email_id = %id, error = %e, "Could not record responsiveness");
                        stats.analysis_errors += 1;
                        return;
                    }
                    responsive
                }
                None => {
                    // Left unanalyzed: not responsive for gating, no exemption pass.
                    tracing::warn!(email_id = %id, "No responsiveness analysis available");
                    stats.analysis_errors += 1;
                    return;
                }
            },
        };

        if !responsive {
            return;
        }
        stats.responsive_emails += 1;

        let exempt = match session.exemption(id) {
            Some(existing) => existing.has_any_exemption(),
            None => match self.exemption.classify(id, email) {
                Some(analysis) => {
                    let exempt = analysis.has_any_exemption();
                    if let Err(e) = session.record_exemption(analysis) {
                        tracing::error!(email_id = %id, error = %e, "Could not record exemptions");
                        stats.analysis_errors += 1;
                        return;
                    }
                    exempt
                }
                None => {
                    tracing::warn!(email_id = %id, "No exemption analysis available");
                    stats.analysis_errors += 1;
                    return;
                }
            },
        };

        if exempt {
            stats.exempt_emails += 1;
        }
    }
}
