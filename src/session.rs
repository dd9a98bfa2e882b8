use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CpraRequest, Email, EmailId, ExemptionCategory, ReviewStatus};
use crate::pipeline::classify::{ExemptionAnalysis, ResponsivenessAnalysis};
use crate::review::{self, AuditEntry, DocumentReview, ReviewError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A session needs at least one request")]
    NoRequests,

    #[error("Duplicate document identity: {0}")]
    DuplicateIdentity(EmailId),

    #[error("Unknown document identity: {0}")]
    UnknownDocument(EmailId),

    #[error("{kind} analysis for {email_id} already recorded")]
    DuplicateAnalysis { email_id: EmailId, kind: &'static str },

    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// Display state of a document's responsiveness analysis.
///
/// `NotAnalyzed` covers both "not yet run" and "classification failed";
/// it is never folded into `NotResponsive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    NotAnalyzed,
    NotResponsive,
    Responsive,
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotAnalyzed => "Not yet analyzed",
            Self::NotResponsive => "Not responsive",
            Self::Responsive => "Responsive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionStatus {
    NotAnalyzed,
    NoExemption,
    Exempt(Vec<ExemptionCategory>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverrideCounts {
    pub responsiveness: usize,
    pub exemptions: usize,
    pub total: usize,
}

/// Derived review statistics; recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub total_documents: usize,
    pub review_status: StatusCounts,
    pub overrides: OverrideCounts,
    /// COMPLETED / total × 100, 0.0 for an empty session.
    pub completion_percentage: f64,
    /// Completed reviews per reviewer.
    pub reviewers: BTreeMap<String, usize>,
}

/// One completed review with what the reviewer changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub email_id: EmailId,
    pub reviewer_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ReviewStatus,
    pub notes: String,
    pub entries: Vec<AuditEntry>,
}

pub const BATCH_APPROVAL_NOTE: &str = "Batch approved - AI determinations accepted";

/// All state for one batch of emails against one request list.
///
/// Identities are assigned once at construction; every map is keyed by them.
#[derive(Debug)]
pub struct ProcessingSession {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    requests: Vec<CpraRequest>,
    order: Vec<EmailId>,
    emails: BTreeMap<EmailId, Email>,
    responsiveness: BTreeMap<EmailId, ResponsivenessAnalysis>,
    exemptions: BTreeMap<EmailId, ExemptionAnalysis>,
    reviews: BTreeMap<EmailId, DocumentReview>,
}

impl ProcessingSession {
    pub fn new(requests: Vec<CpraRequest>, emails: Vec<Email>) -> Result<Self, SessionError> {
        if requests.is_empty() {
            return Err(SessionError::NoRequests);
        }

        let mut seen = HashSet::with_capacity(emails.len());
        let mut order = Vec::with_capacity(emails.len());
        let mut by_id = BTreeMap::new();
        for (ordinal, email) in emails.into_iter().enumerate() {
            let id = EmailId::assign(&email, ordinal);
            if !seen.insert(id.clone()) {
                return Err(SessionError::DuplicateIdentity(id));
            }
            order.push(id.clone());
            by_id.insert(id, email);
        }

        let mut session = Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            requests,
            order,
            emails: by_id,
            responsiveness: BTreeMap::new(),
            exemptions: BTreeMap::new(),
            reviews: BTreeMap::new(),
        };
        session.initialize_reviews();

        tracing::info!(
            session_id = %session.session_id,
            documents = session.order.len(),
            requests = session.requests.len(),
            "Processing session created"
        );
        Ok(session)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn requests(&self) -> &[CpraRequest] {
        &self.requests
    }

    pub fn document_count(&self) -> usize {
        self.order.len()
    }

    /// Documents in processing order.
    pub fn documents(&self) -> impl Iterator<Item = (&EmailId, &Email)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.emails.get(id).map(|email| (id, email)))
    }

    pub fn email(&self, id: &EmailId) -> Result<&Email, SessionError> {
        self.emails
            .get(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))
    }

    fn ensure_known(&self, id: &EmailId) -> Result<(), SessionError> {
        self.email(id).map(|_| ())
    }

    // ── Analyses ──

    /// Each document's analysis is written once.
    pub fn record_responsiveness(
        &mut self,
        analysis: ResponsivenessAnalysis,
    ) -> Result<(), SessionError> {
        let id = analysis.email_id().clone();
        self.ensure_known(&id)?;
        if analysis.request_count() != self.requests.len() {
            return Err(ReviewError::RequestCountMismatch {
                email_id: id,
                expected: self.requests.len(),
                actual: analysis.request_count(),
            }
            .into());
        }
        if self.responsiveness.contains_key(&id) {
            return Err(SessionError::DuplicateAnalysis {
                email_id: id,
                kind: "Responsiveness",
            });
        }
        self.responsiveness.insert(id, analysis);
        Ok(())
    }

    pub fn record_exemption(&mut self, analysis: ExemptionAnalysis) -> Result<(), SessionError> {
        let id = analysis.email_id().clone();
        self.ensure_known(&id)?;
        if self.exemptions.contains_key(&id) {
            return Err(SessionError::DuplicateAnalysis {
                email_id: id,
                kind: "Exemption",
            });
        }
        self.exemptions.insert(id, analysis);
        Ok(())
    }

    pub fn responsiveness(&self, id: &EmailId) -> Option<&ResponsivenessAnalysis> {
        self.responsiveness.get(id)
    }

    pub fn exemption(&self, id: &EmailId) -> Option<&ExemptionAnalysis> {
        self.exemptions.get(id)
    }

    pub fn responsiveness_count(&self) -> usize {
        self.responsiveness.len()
    }

    pub fn exemption_count(&self) -> usize {
        self.exemptions.len()
    }

    pub fn analysis_status(&self, id: &EmailId) -> Result<AnalysisStatus, SessionError> {
        self.ensure_known(id)?;
        Ok(match self.responsiveness.get(id) {
            None => AnalysisStatus::NotAnalyzed,
            Some(a) if a.is_responsive_to_any() => AnalysisStatus::Responsive,
            Some(_) => AnalysisStatus::NotResponsive,
        })
    }

    pub fn exemption_status(&self, id: &EmailId) -> Result<ExemptionStatus, SessionError> {
        self.ensure_known(id)?;
        Ok(match self.exemptions.get(id) {
            None => ExemptionStatus::NotAnalyzed,
            Some(a) => {
                let applicable = a.applicable();
                if applicable.is_empty() {
                    ExemptionStatus::NoExemption
                } else {
                    ExemptionStatus::Exempt(applicable)
                }
            }
        })
    }

    // ── Reviews ──

    /// Create a PENDING review for every document that has none. Existing
    /// reviews are kept.
    pub fn initialize_reviews(&mut self) -> usize {
        let request_count = self.requests.len();
        let mut created = 0;
        for id in &self.order {
            if !self.reviews.contains_key(id) {
                self.reviews
                    .insert(id.clone(), DocumentReview::new(id.clone(), request_count));
                created += 1;
            }
        }
        if created > 0 {
            tracing::debug!(session_id = %self.session_id, created, "Reviews initialized");
        }
        created
    }

    pub fn review(&self, id: &EmailId) -> Result<&DocumentReview, SessionError> {
        self.reviews
            .get(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))
    }

    fn review_mut(&mut self, id: &EmailId) -> Result<&mut DocumentReview, SessionError> {
        self.reviews
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))
    }

    pub fn reviews(&self) -> impl Iterator<Item = &DocumentReview> + '_ {
        self.order.iter().filter_map(move |id| self.reviews.get(id))
    }

    pub fn start_review(&mut self, id: &EmailId, reviewer_id: &str) -> Result<(), SessionError> {
        review::start_review(self.review_mut(id)?, reviewer_id);
        Ok(())
    }

    pub fn reopen_review(&mut self, id: &EmailId, reviewer_id: &str) -> Result<(), SessionError> {
        review::reopen_review(self.review_mut(id)?, reviewer_id);
        Ok(())
    }

    pub fn apply_responsiveness_override(
        &mut self,
        id: &EmailId,
        index: usize,
        value: bool,
    ) -> Result<(), SessionError> {
        let analysis = self.responsiveness.get(id);
        let review = self
            .reviews
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))?;
        review::apply_responsiveness_override(review, index, value, analysis)?;
        Ok(())
    }

    pub fn apply_exemption_override(
        &mut self,
        id: &EmailId,
        category: ExemptionCategory,
        value: bool,
    ) -> Result<(), SessionError> {
        let analysis = self.exemptions.get(id);
        let review = self
            .reviews
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))?;
        review::apply_exemption_override(review, category, value, analysis)?;
        Ok(())
    }

    pub fn clear_responsiveness_override(
        &mut self,
        id: &EmailId,
        index: usize,
    ) -> Result<(), SessionError> {
        review::clear_responsiveness_override(self.review_mut(id)?, index)?;
        Ok(())
    }

    pub fn clear_exemption_override(
        &mut self,
        id: &EmailId,
        category: ExemptionCategory,
    ) -> Result<(), SessionError> {
        review::clear_exemption_override(self.review_mut(id)?, category)?;
        Ok(())
    }

    /// Finalize against whatever analyses the session holds for `id`.
    pub fn finalize_review(&mut self, id: &EmailId, notes: Option<&str>) -> Result<(), SessionError> {
        let responsiveness = self.responsiveness.get(id);
        let exemptions = self.exemptions.get(id);
        let review = self
            .reviews
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownDocument(id.clone()))?;
        review::finalize_review(review, responsiveness, exemptions, notes)?;
        Ok(())
    }

    /// Accept the machine results for every review not yet completed.
    /// Returns how many were approved.
    ///
    /// Documents without the machine results to accept stay open: no
    /// responsiveness analysis, or responsive with no exemption analysis.
    pub fn batch_approve(&mut self, reviewer_id: &str) -> Result<usize, SessionError> {
        let mut approved = 0;
        let mut skipped = 0;
        for id in &self.order {
            let Some(review) = self.reviews.get_mut(id) else {
                continue;
            };
            if review.is_completed() {
                continue;
            }
            let has_results = match self.responsiveness.get(id) {
                None => false,
                Some(a) => !a.is_responsive_to_any() || self.exemptions.contains_key(id),
            };
            if !has_results {
                tracing::warn!(email_id = %id, "No machine results to approve; left for manual review");
                skipped += 1;
                continue;
            }
            review::start_review(review, reviewer_id);
            review::finalize_review(
                review,
                self.responsiveness.get(id),
                self.exemptions.get(id),
                Some(BATCH_APPROVAL_NOTE),
            )?;
            approved += 1;
        }
        tracing::info!(
            session_id = %self.session_id,
            approved,
            skipped,
            reviewer_id,
            "Batch approval complete"
        );
        Ok(approved)
    }

    pub fn pending_reviews(&self) -> Vec<&DocumentReview> {
        self.reviews()
            .filter(|r| r.status() == ReviewStatus::Pending)
            .collect()
    }

    pub fn completed_reviews(&self) -> Vec<&DocumentReview> {
        self.reviews().filter(|r| r.is_completed()).collect()
    }

    /// `(all_reviewed, identities not yet completed)`.
    pub fn validate_review_completion(&self) -> (bool, Vec<EmailId>) {
        let unreviewed: Vec<EmailId> = self
            .reviews()
            .filter(|r| !r.is_completed())
            .map(|r| r.email_id().clone())
            .collect();
        if unreviewed.is_empty() {
            tracing::info!(session_id = %self.session_id, "All documents have been reviewed");
        } else {
            tracing::warn!(
                session_id = %self.session_id,
                unreviewed = unreviewed.len(),
                "Documents remain unreviewed"
            );
        }
        (unreviewed.is_empty(), unreviewed)
    }

    pub fn summary(&self) -> ReviewSummary {
        let mut status = StatusCounts::default();
        let mut overrides = OverrideCounts::default();
        let mut reviewers = BTreeMap::new();

        for review in self.reviews.values() {
            match review.status() {
                ReviewStatus::Pending => status.pending += 1,
                ReviewStatus::InProgress => status.in_progress += 1,
                ReviewStatus::Completed => {
                    status.completed += 1;
                    if let Some(reviewer) = review.reviewer_id() {
                        *reviewers.entry(reviewer.to_string()).or_insert(0) += 1;
                    }
                }
            }
            overrides.responsiveness += review.responsive_override_count();
            overrides.exemptions += review.exemption_override_count();
        }
        overrides.total = overrides.responsiveness + overrides.exemptions;

        let total_documents = self.document_count();
        let completion_percentage = if total_documents == 0 {
            0.0
        } else {
            status.completed as f64 / total_documents as f64 * 100.0
        };

        ReviewSummary {
            total_documents,
            review_status: status,
            overrides,
            completion_percentage,
            reviewers,
        }
    }

    pub fn audit_trail(&self) -> Vec<AuditRecord> {
        self.reviews()
            .filter(|r| r.is_completed())
            .map(|r| {
                let id = r.email_id();
                AuditRecord {
                    email_id: id.clone(),
                    reviewer_id: r.reviewer_id().map(str::to_string),
                    completed_at: r.completed_at(),
                    status: r.status(),
                    notes: r.notes().to_string(),
                    entries: review::audit_entries(
                        r,
                        self.responsiveness.get(id),
                        self.exemptions.get(id),
                    ),
                }
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::pipeline::classify::types::fixtures::{make_exemptions, make_responsiveness};
    use crate::review::AuditField;

    #[test]
    fn identities_use_one_scheme() {
        let requests = vec![CpraRequest::new(ROOF)];
        let emails = vec![
            Email::new(Some("<a@city.gov>"), "one"),
            Email::new(None, "two"),
            Email::new(Some(""), "three"),
        ];
        let session = ProcessingSession::new(requests, emails).unwrap();
        let ids: Vec<&str> = session.documents().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["<a@city.gov>", "email_1", "email_2"]);
        let review_ids: Vec<&str> = session.reviews().map(|r| r.email_id().as_str()).collect();
        assert_eq!(review_ids, ids);
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let requests = vec![CpraRequest::new(ROOF)];
        let emails = vec![
            Email::new(Some("dup"), "one"),
            Email::new(Some(" dup "), "two"),
        ];
        let err = ProcessingSession::new(requests, emails).unwrap_err();
        assert_eq!(err, SessionError::DuplicateIdentity(EmailId::from("dup")));
    }

    #[test]
    fn empty_request_list_is_rejected() {
        let err = ProcessingSession::new(vec![], vec![Email::new(None, "x")]).unwrap_err();
        assert_eq!(err, SessionError::NoRequests);
    }

    #[test]
    fn every_document_starts_pending() {
        let session = make_session(3);
        assert_eq!(session.pending_reviews().len(), 3);
        assert!(session.completed_reviews().is_empty());
    }

    #[test]
    fn initialize_keeps_existing_reviews() {
        let mut session = make_session(2);
        let id = EmailId::from("email_0");
        session.start_review(&id, "r1").unwrap();
        assert_eq!(session.initialize_reviews(), 0);
        assert_eq!(session.review(&id).unwrap().status(), ReviewStatus::InProgress);
    }

    #[test]
    fn unknown_identity_carries_the_value() {
        let mut session = make_session(1);
        let ghost = EmailId::from("ghost");
        assert_eq!(
            session.finalize_review(&ghost, None).unwrap_err(),
            SessionError::UnknownDocument(ghost.clone())
        );
        let err = session
            .record_exemption(make_exemptions("ghost", false, false, false))
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownDocument(ghost));
    }

    #[test]
    fn analysis_is_written_once() {
        let (mut session, _) = make_scenario_session();
        let again = make_responsiveness("email_0", session.requests(), &[false, false]);
        assert!(matches!(
            session.record_responsiveness(again),
            Err(SessionError::DuplicateAnalysis { kind: "Responsiveness", .. })
        ));
    }

    #[test]
    fn not_analyzed_differs_from_not_responsive() {
        let mut session = make_session(2);
        let analyzed = EmailId::from("email_0");
        let skipped = EmailId::from("email_1");
        session
            .record_responsiveness(make_responsiveness("email_0", session.requests(), &[false, false]))
            .unwrap();

        assert_eq!(session.analysis_status(&analyzed).unwrap(), AnalysisStatus::NotResponsive);
        assert_eq!(session.analysis_status(&skipped).unwrap(), AnalysisStatus::NotAnalyzed);
        assert_eq!(session.exemption_status(&skipped).unwrap(), ExemptionStatus::NotAnalyzed);
        assert_ne!(
            AnalysisStatus::NotAnalyzed.label(),
            AnalysisStatus::NotResponsive.label()
        );
    }

    #[test]
    fn exemption_status_lists_categories() {
        let (session, id) = make_scenario_session();
        assert_eq!(session.analysis_status(&id).unwrap(), AnalysisStatus::Responsive);
        assert_eq!(
            session.exemption_status(&id).unwrap(),
            ExemptionStatus::Exempt(vec![ExemptionCategory::Deliberative])
        );
    }

    #[test]
    fn completion_percentage_quarter() {
        let mut session = make_session(4);
        let id = EmailId::from("email_2");
        session.start_review(&id, "r1").unwrap();
        session.finalize_review(&id, None).unwrap();

        let summary = session.summary();
        assert_eq!(summary.total_documents, 4);
        assert_eq!(summary.completion_percentage, 25.0);
        assert_eq!(summary.review_status.completed, 1);
        assert_eq!(summary.review_status.pending, 3);
        assert_eq!(summary.reviewers.get("r1"), Some(&1));
    }

    #[test]
    fn completion_percentage_empty_session() {
        let session = make_session(0);
        let summary = session.summary();
        assert_eq!(summary.total_documents, 0);
        assert_eq!(summary.completion_percentage, 0.0);
    }

    #[test]
    fn summary_counts_overrides() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session.apply_responsiveness_override(&id, 1, true).unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Deliberative, false)
            .unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Personnel, false)
            .unwrap();

        let summary = session.summary();
        assert_eq!(summary.overrides.responsiveness, 1);
        assert_eq!(summary.overrides.exemptions, 2);
        assert_eq!(summary.overrides.total, 3);
        assert_eq!(summary.review_status.in_progress, 1);
    }

    #[test]
    fn finalize_uses_recorded_analyses() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session.finalize_review(&id, Some("looks right")).unwrap();
        let review = session.review(&id).unwrap();
        assert_eq!(review.final_responsive(), &[true, false]);
        assert!(review.final_exemptions().contains(&ExemptionCategory::Deliberative));
        assert_eq!(review.notes(), "looks right");
    }

    #[test]
    fn batch_approve_skips_completed_reviews() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session.finalize_review(&id, Some("manual")).unwrap();

        let mut bigger = make_session(3);
        for i in 0..3 {
            let name = format!("email_{i}");
            bigger
                .record_responsiveness(make_responsiveness(&name, bigger.requests(), &[false, false]))
                .unwrap();
        }
        assert_eq!(bigger.batch_approve("bulk").unwrap(), 3);
        assert_eq!(bigger.batch_approve("bulk").unwrap(), 0);
        let (all_done, missing) = bigger.validate_review_completion();
        assert!(all_done);
        assert!(missing.is_empty());
        assert!(bigger.reviews().all(|r| r.notes() == BATCH_APPROVAL_NOTE));

        assert_eq!(session.batch_approve("bulk").unwrap(), 0);
        assert_eq!(session.review(&id).unwrap().notes(), "manual");
    }

    #[test]
    fn batch_approve_leaves_unanalyzed_documents_open() {
        let mut session = make_session(3);
        session
            .record_responsiveness(make_responsiveness("email_0", session.requests(), &[false, true]))
            .unwrap();
        session
            .record_exemption(make_exemptions("email_0", false, false, false))
            .unwrap();
        // Responsive, but the exemption pass never produced a result.
        session
            .record_responsiveness(make_responsiveness("email_1", session.requests(), &[true, false]))
            .unwrap();

        assert_eq!(session.batch_approve("bulk").unwrap(), 1);
        let (all_done, missing) = session.validate_review_completion();
        assert!(!all_done);
        assert_eq!(missing, vec![EmailId::from("email_1"), EmailId::from("email_2")]);
        assert_eq!(
            session.review(&EmailId::from("email_2")).unwrap().status(),
            ReviewStatus::Pending
        );
        assert_eq!(session.review(&EmailId::from("email_2")).unwrap().notes(), "");
    }

    #[test]
    fn validate_completion_lists_unreviewed_in_order() {
        let mut session = make_session(3);
        let done = EmailId::from("email_1");
        session.finalize_review(&done, None).unwrap();
        let (all_done, missing) = session.validate_review_completion();
        assert!(!all_done);
        assert_eq!(missing, vec![EmailId::from("email_0"), EmailId::from("email_2")]);
    }

    #[test]
    fn audit_trail_covers_completed_reviews_only() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Deliberative, false)
            .unwrap();
        assert!(session.audit_trail().is_empty());

        session.finalize_review(&id, None).unwrap();
        let trail = session.audit_trail();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].reviewer_id.as_deref(), Some("r1"));
        assert_eq!(trail[0].entries.len(), 1);
        let entry = &trail[0].entries[0];
        assert_eq!(
            entry.field,
            AuditField::Exemption {
                category: ExemptionCategory::Deliberative
            }
        );
        assert_eq!(entry.original_value, Some(true));
        assert!(entry.changed);
    }

    #[test]
    fn summary_serializes_for_reporting() {
        let session = make_session(1);
        let json = serde_json::to_value(session.summary()).unwrap();
        assert_eq!(json["review_status"]["pending"], 1);
        assert_eq!(json["completion_percentage"], 0.0);
    }
}
