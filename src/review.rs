//! Human review reconciliation.
//!
//! A `DocumentReview` moves PENDING → IN_PROGRESS → COMPLETED. Reviewer
//! overrides are recorded per request index and per exemption category;
//! `finalize_review` merges them over the machine analyses into the final
//! determinations export logic reads.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EmailId, ExemptionCategory, ReviewStatus};
use crate::pipeline::classify::{ExemptionAnalysis, ResponsivenessAnalysis};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Review for {0} was never started")]
    NotStarted(EmailId),

    #[error("Review for {0} is completed; reopen it before editing")]
    AlreadyCompleted(EmailId),

    #[error("Request index {index} out of range for {email_id} ({request_count} requests)")]
    IndexOutOfRange {
        email_id: EmailId,
        index: usize,
        request_count: usize,
    },

    #[error("Analysis for {analysis} supplied to review for {review}")]
    IdentityMismatch { review: EmailId, analysis: EmailId },

    #[error("Analysis for {email_id} covers {actual} requests, review expects {expected}")]
    RequestCountMismatch {
        email_id: EmailId,
        expected: usize,
        actual: usize,
    },
}

/// A reviewer's position on one field. `Unset` defers to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewerDecision {
    #[default]
    Unset,
    Override(bool),
}

impl ReviewerDecision {
    pub fn value(&self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Override(v) => Some(*v),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Override(_))
    }
}

/// One decision slot per exemption category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExemptionOverrides {
    pub attorney_client: ReviewerDecision,
    pub personnel: ReviewerDecision,
    pub deliberative: ReviewerDecision,
}

impl ExemptionOverrides {
    pub fn get(&self, category: ExemptionCategory) -> ReviewerDecision {
        match category {
            ExemptionCategory::AttorneyClient => self.attorney_client,
            ExemptionCategory::Personnel => self.personnel,
            ExemptionCategory::Deliberative => self.deliberative,
        }
    }

    fn slot(&mut self, category: ExemptionCategory) -> &mut ReviewerDecision {
        match category {
            ExemptionCategory::AttorneyClient => &mut self.attorney_client,
            ExemptionCategory::Personnel => &mut self.personnel,
            ExemptionCategory::Deliberative => &mut self.deliberative,
        }
    }

    pub fn count(&self) -> usize {
        ExemptionCategory::all()
            .iter()
            .filter(|c| self.get(**c).is_set())
            .count()
    }
}

/// Review state for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReview {
    email_id: EmailId,
    status: ReviewStatus,
    responsive_overrides: Vec<ReviewerDecision>,
    exemption_overrides: ExemptionOverrides,
    final_responsive: Vec<bool>,
    final_exemptions: BTreeSet<ExemptionCategory>,
    reviewer_id: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    notes: String,
    responsiveness_supplied: bool,
    exemption_supplied: bool,
}

impl DocumentReview {
    pub fn new(email_id: EmailId, request_count: usize) -> Self {
        Self {
            email_id,
            status: ReviewStatus::Pending,
            responsive_overrides: vec![ReviewerDecision::Unset; request_count],
            exemption_overrides: ExemptionOverrides::default(),
            final_responsive: vec![false; request_count],
            final_exemptions: BTreeSet::new(),
            reviewer_id: None,
            completed_at: None,
            notes: String::new(),
            responsiveness_supplied: false,
            exemption_supplied: false,
        }
    }

    pub fn email_id(&self) -> &EmailId {
        &self.email_id
    }

    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReviewStatus::Completed
    }

    pub fn request_count(&self) -> usize {
        self.responsive_overrides.len()
    }

    pub fn responsive_overrides(&self) -> &[ReviewerDecision] {
        &self.responsive_overrides
    }

    pub fn exemption_overrides(&self) -> &ExemptionOverrides {
        &self.exemption_overrides
    }

    pub fn responsive_override_count(&self) -> usize {
        self.responsive_overrides.iter().filter(|d| d.is_set()).count()
    }

    pub fn exemption_override_count(&self) -> usize {
        self.exemption_overrides.count()
    }

    pub fn has_overrides(&self) -> bool {
        self.responsive_override_count() > 0 || self.exemption_override_count() > 0
    }

    /// Meaningful only once the review is completed.
    pub fn final_responsive(&self) -> &[bool] {
        &self.final_responsive
    }

    pub fn final_exemptions(&self) -> &BTreeSet<ExemptionCategory> {
        &self.final_exemptions
    }

    pub fn reviewer_id(&self) -> Option<&str> {
        self.reviewer_id.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Whether the last finalize had a machine analysis to merge, per kind.
    /// A review finalized with neither is all defaults.
    pub fn analysis_supplied(&self) -> (bool, bool) {
        (self.responsiveness_supplied, self.exemption_supplied)
    }

    /// Every request's final value came from an analysis or a reviewer
    /// decision rather than the `false` default.
    pub fn responsiveness_determined(&self) -> bool {
        self.responsiveness_supplied || self.responsive_overrides.iter().all(|d| d.is_set())
    }

    pub fn exemptions_determined(&self) -> bool {
        self.exemption_supplied
            || ExemptionCategory::all()
                .iter()
                .all(|c| self.exemption_overrides.get(*c).is_set())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// PENDING → IN_PROGRESS. No-op with a warning on a completed review.
pub fn start_review(review: &mut DocumentReview, reviewer_id: &str) {
    match review.status {
        ReviewStatus::Completed => {
            tracing::warn!(
                email_id = %review.email_id,
                reviewer_id,
                "start_review on completed review ignored"
            );
        }
        ReviewStatus::InProgress => {
            review.reviewer_id = Some(reviewer_id.to_string());
        }
        ReviewStatus::Pending => {
            review.status = ReviewStatus::InProgress;
            review.reviewer_id = Some(reviewer_id.to_string());
            tracing::info!(email_id = %review.email_id, reviewer_id, "Review started");
        }
    }
}

/// Explicit COMPLETED → IN_PROGRESS so a finalized review can be edited.
pub fn reopen_review(review: &mut DocumentReview, reviewer_id: &str) {
    if review.status != ReviewStatus::Completed {
        tracing::debug!(email_id = %review.email_id, status = %review.status, "Reopen ignored");
        return;
    }
    tracing::info!(
        email_id = %review.email_id,
        reviewer_id,
        previous_reviewer = review.reviewer_id.as_deref().unwrap_or(""),
        "Completed review reopened"
    );
    review.status = ReviewStatus::InProgress;
    review.reviewer_id = Some(reviewer_id.to_string());
}

fn ensure_editable(review: &DocumentReview) -> Result<(), ReviewError> {
    match review.status {
        ReviewStatus::InProgress => Ok(()),
        ReviewStatus::Pending => Err(ReviewError::NotStarted(review.email_id.clone())),
        ReviewStatus::Completed => Err(ReviewError::AlreadyCompleted(review.email_id.clone())),
    }
}

fn check_responsiveness(
    review: &DocumentReview,
    analysis: &ResponsivenessAnalysis,
) -> Result<(), ReviewError> {
    if analysis.email_id() != &review.email_id {
        return Err(ReviewError::IdentityMismatch {
            review: review.email_id.clone(),
            analysis: analysis.email_id().clone(),
        });
    }
    if analysis.request_count() != review.request_count() {
        return Err(ReviewError::RequestCountMismatch {
            email_id: review.email_id.clone(),
            expected: review.request_count(),
            actual: analysis.request_count(),
        });
    }
    Ok(())
}

fn check_exemption(review: &DocumentReview, analysis: &ExemptionAnalysis) -> Result<(), ReviewError> {
    if analysis.email_id() != &review.email_id {
        return Err(ReviewError::IdentityMismatch {
            review: review.email_id.clone(),
            analysis: analysis.email_id().clone(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Record the reviewer's responsiveness call for one request.
pub fn apply_responsiveness_override(
    review: &mut DocumentReview,
    index: usize,
    value: bool,
    analysis: Option<&ResponsivenessAnalysis>,
) -> Result<(), ReviewError> {
    ensure_editable(review)?;
    let request_count = review.request_count();
    if index >= request_count {
        return Err(ReviewError::IndexOutOfRange {
            email_id: review.email_id.clone(),
            index,
            request_count,
        });
    }
    if let Some(analysis) = analysis {
        check_responsiveness(review, analysis)?;
        let machine = analysis.determinations().get(index).map(|d| d.responsive);
        if machine.is_some_and(|m| m != value) {
            tracing::info!(
                email_id = %review.email_id,
                request_index = index,
                ai = machine,
                reviewer = value,
                "Responsiveness override differs from AI"
            );
        }
    }
    review.responsive_overrides[index] = ReviewerDecision::Override(value);
    Ok(())
}

pub fn apply_exemption_override(
    review: &mut DocumentReview,
    category: ExemptionCategory,
    value: bool,
    analysis: Option<&ExemptionAnalysis>,
) -> Result<(), ReviewError> {
    ensure_editable(review)?;
    if let Some(analysis) = analysis {
        check_exemption(review, analysis)?;
        let machine = analysis.finding(category).applies;
        if machine != value {
            tracing::info!(
                email_id = %review.email_id,
                category = %category,
                ai = machine,
                reviewer = value,
                "Exemption override differs from AI"
            );
        }
    }
    *review.exemption_overrides.slot(category) = ReviewerDecision::Override(value);
    Ok(())
}

pub fn clear_responsiveness_override(
    review: &mut DocumentReview,
    index: usize,
) -> Result<(), ReviewError> {
    ensure_editable(review)?;
    let request_count = review.request_count();
    let slot = review
        .responsive_overrides
        .get_mut(index)
        .ok_or_else(|| ReviewError::IndexOutOfRange {
            email_id: review.email_id.clone(),
            index,
            request_count,
        })?;
    *slot = ReviewerDecision::Unset;
    Ok(())
}

pub fn clear_exemption_override(
    review: &mut DocumentReview,
    category: ExemptionCategory,
) -> Result<(), ReviewError> {
    ensure_editable(review)?;
    *review.exemption_overrides.slot(category) = ReviewerDecision::Unset;
    Ok(())
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge overrides over machine results and mark the review COMPLETED.
///
/// Per field: override, else analysis, else `false`. Final determinations
/// depend only on the overrides and the supplied analyses, so repeating the
/// call with the same inputs changes nothing. `notes` of `None` keeps
/// existing notes.
///
/// A completed review is frozen: a call that would change its result fails
/// with `AlreadyCompleted` until `reopen_review`.
pub fn finalize_review(
    review: &mut DocumentReview,
    responsiveness: Option<&ResponsivenessAnalysis>,
    exemptions: Option<&ExemptionAnalysis>,
    notes: Option<&str>,
) -> Result<(), ReviewError> {
    if let Some(analysis) = responsiveness {
        check_responsiveness(review, analysis)?;
    }
    if let Some(analysis) = exemptions {
        check_exemption(review, analysis)?;
    }

    let final_responsive: Vec<bool> = review
        .responsive_overrides
        .iter()
        .enumerate()
        .map(|(i, decision)| {
            decision
                .value()
                .or_else(|| {
                    responsiveness
                        .and_then(|a| a.determinations().get(i))
                        .map(|d| d.responsive)
                })
                .unwrap_or(false)
        })
        .collect();

    let final_exemptions: BTreeSet<ExemptionCategory> = ExemptionCategory::all()
        .iter()
        .copied()
        .filter(|category| {
            review
                .exemption_overrides
                .get(*category)
                .value()
                .or_else(|| exemptions.map(|a| a.finding(*category).applies))
                .unwrap_or(false)
        })
        .collect();

    if review.status == ReviewStatus::Completed {
        let unchanged = final_responsive == review.final_responsive
            && final_exemptions == review.final_exemptions
            && responsiveness.is_some() == review.responsiveness_supplied
            && exemptions.is_some() == review.exemption_supplied
            && notes.map_or(true, |n| n == review.notes);
        if unchanged {
            tracing::debug!(email_id = %review.email_id, "Review already finalized with same result");
            return Ok(());
        }
        tracing::warn!(
            email_id = %review.email_id,
            "Finalize would change a completed review; reopen it first"
        );
        return Err(ReviewError::AlreadyCompleted(review.email_id.clone()));
    }

    review.final_responsive = final_responsive;
    review.final_exemptions = final_exemptions;
    review.responsiveness_supplied = responsiveness.is_some();
    review.exemption_supplied = exemptions.is_some();
    if let Some(notes) = notes {
        review.notes = notes.to_string();
    }
    review.status = ReviewStatus::Completed;
    review.completed_at = Some(Utc::now());

    tracing::info!(
        email_id = %review.email_id,
        reviewer_id = review.reviewer_id.as_deref().unwrap_or(""),
        final_responsive = ?review.final_responsive,
        final_exemptions = ?review.final_exemptions,
        responsiveness_supplied = review.responsiveness_supplied,
        exemption_supplied = review.exemption_supplied,
        "Review finalized"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditField {
    Responsiveness { request_index: usize },
    Exemption { category: ExemptionCategory },
}

/// What the reviewer set versus what the machine said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub field: AuditField,
    /// `None` when no machine value existed, distinct from `Some(false)`.
    pub original_value: Option<bool>,
    pub override_value: bool,
    pub changed: bool,
}

impl AuditEntry {
    fn new(field: AuditField, original_value: Option<bool>, override_value: bool) -> Self {
        Self {
            field,
            original_value,
            override_value,
            changed: original_value != Some(override_value),
        }
    }
}

/// One entry per set override, responsiveness first then exemptions.
pub fn audit_entries(
    review: &DocumentReview,
    responsiveness: Option<&ResponsivenessAnalysis>,
    exemptions: Option<&ExemptionAnalysis>,
) -> Vec<AuditEntry> {
    let responsiveness = responsiveness
        .filter(|a| a.email_id() == &review.email_id && a.request_count() == review.request_count());
    let exemptions = exemptions.filter(|a| a.email_id() == &review.email_id);

    let mut entries: Vec<AuditEntry> = review
        .responsive_overrides
        .iter()
        .enumerate()
        .filter_map(|(i, decision)| {
            decision.value().map(|value| {
                AuditEntry::new(
                    AuditField::Responsiveness { request_index: i },
                    responsiveness.map(|a| a.determinations()[i].responsive),
                    value,
                )
            })
        })
        .collect();

    for category in ExemptionCategory::all() {
        if let Some(value) = review.exemption_overrides.get(*category).value() {
            entries.push(AuditEntry::new(
                AuditField::Exemption {
                    category: *category,
                },
                exemptions.map(|a| a.finding(*category).applies),
                value,
            ));
        }
    }

    entries
}
