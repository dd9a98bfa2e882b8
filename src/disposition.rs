//! Export-facing views over a reviewed session: the production set, the
//! privilege log and a readiness check. Data only; rendering lives elsewhere.
//!
//! Only COMPLETED reviews decide production and withholding. Documents
//! without one get a provisional, machine-based disposition for display.
//! A review finalized with neither an analysis nor a reviewer decision for
//! a field is undetermined, never withheld as not responsive.

use serde::Serialize;

use crate::models::{EmailId, ExemptionCategory};
use crate::pipeline::classify::ExemptionAnalysis;
use crate::review::DocumentReview;
use crate::session::ProcessingSession;

pub const NOT_RESPONSIVE_JUSTIFICATION: &str = "Document not responsive to CPRA request";
pub const NOT_ANALYZED_JUSTIFICATION: &str =
    "Responsiveness not determined: no analysis or reviewer decision";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Produce,
    Withhold,
    /// No machine result to go on.
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispositionBasis {
    /// From a completed review's final determinations.
    Reviewed,
    /// From machine analyses alone; not for export.
    Provisional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentDisposition {
    pub email_id: EmailId,
    pub disposition: Disposition,
    pub basis: DispositionBasis,
    /// A responsiveness analysis backs this disposition.
    pub analysis_supplied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WithholdingGround {
    NotResponsive,
    Exemption { category: ExemptionCategory },
    /// Withheld on an exemption while responsiveness was never determined.
    NotAnalyzed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Justification {
    pub ground: WithholdingGround,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivilegeLogEntry {
    pub email_id: EmailId,
    pub subject: Option<String>,
    pub responsive: bool,
    pub analysis_supplied: bool,
    pub exemptions: Vec<ExemptionCategory>,
    pub justifications: Vec<Justification>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReadiness {
    pub ready: bool,
    /// Export may proceed over the completed subset.
    pub allow_partial: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Disposition from a review's final determinations.
///
/// Any final exemption withholds. Otherwise a responsive document is
/// produced once exemptions were determined, and a non-responsive one is
/// withheld once responsiveness was determined. Defaults alone decide
/// nothing.
pub fn reviewed_disposition(review: &DocumentReview) -> Disposition {
    if !review.final_exemptions().is_empty() {
        return Disposition::Withhold;
    }
    let responsive = review.final_responsive().iter().any(|r| *r);
    let determined = if responsive {
        review.exemptions_determined()
    } else {
        review.responsiveness_determined()
    };
    match (determined, responsive) {
        (false, _) => Disposition::Undetermined,
        (true, true) => Disposition::Produce,
        (true, false) => Disposition::Withhold,
    }
}

pub fn is_producible(review: &DocumentReview) -> bool {
    reviewed_disposition(review) == Disposition::Produce
}

/// Completed, producible documents in processing order.
pub fn production_set(session: &ProcessingSession) -> Vec<EmailId> {
    session
        .reviews()
        .filter(|r| r.is_completed() && is_producible(r))
        .map(|r| r.email_id().clone())
        .collect()
}

/// One entry per completed, withheld document. Undetermined documents are
/// left out; `export_readiness` reports them.
pub fn privilege_log(session: &ProcessingSession) -> Vec<PrivilegeLogEntry> {
    session
        .reviews()
        .filter(|r| r.is_completed() && reviewed_disposition(r) == Disposition::Withhold)
        .map(|review| {
            let id = review.email_id();
            let responsive = review.final_responsive().iter().any(|r| *r);
            let exemptions: Vec<ExemptionCategory> =
                review.final_exemptions().iter().copied().collect();

            let mut justifications: Vec<Justification> = exemptions
                .iter()
                .map(|category| Justification {
                    ground: WithholdingGround::Exemption {
                        category: *category,
                    },
                    text: exemption_justification(*category, session.exemption(id)),
                })
                .collect();
            if !responsive {
                justifications.push(if review.responsiveness_determined() {
                    Justification {
                        ground: WithholdingGround::NotResponsive,
                        text: NOT_RESPONSIVE_JUSTIFICATION.to_string(),
                    }
                } else {
                    Justification {
                        ground: WithholdingGround::NotAnalyzed,
                        text: NOT_ANALYZED_JUSTIFICATION.to_string(),
                    }
                });
            }

            PrivilegeLogEntry {
                email_id: id.clone(),
                subject: session.email(id).ok().and_then(|e| e.subject.clone()),
                responsive,
                analysis_supplied: review.analysis_supplied().0,
                exemptions,
                justifications,
            }
        })
        .collect()
}

/// The model's reasoning when it found the category applies, else the
/// category's standard wording.
fn exemption_justification(category: ExemptionCategory, analysis: Option<&ExemptionAnalysis>) -> String {
    analysis
        .map(|a| a.finding(category))
        .filter(|f| f.applies && !f.reasoning.trim().is_empty())
        .map(|f| f.reasoning.clone())
        .unwrap_or_else(|| category.default_justification().to_string())
}

/// Disposition for every document, reviewed or provisional.
pub fn dispositions(session: &ProcessingSession) -> Vec<DocumentDisposition> {
    session
        .reviews()
        .map(|review| {
            let id = review.email_id();
            if review.is_completed() {
                return DocumentDisposition {
                    email_id: id.clone(),
                    disposition: reviewed_disposition(review),
                    basis: DispositionBasis::Reviewed,
                    analysis_supplied: review.analysis_supplied().0,
                };
            }

            let disposition = match session.responsiveness(id) {
                None => Disposition::Undetermined,
                Some(a) if !a.is_responsive_to_any() => Disposition::Withhold,
                Some(_) => match session.exemption(id) {
                    None => Disposition::Undetermined,
                    Some(e) if e.has_any_exemption() => Disposition::Withhold,
                    Some(_) => Disposition::Produce,
                },
            };
            DocumentDisposition {
                email_id: id.clone(),
                disposition,
                basis: DispositionBasis::Provisional,
                analysis_supplied: session.responsiveness(id).is_some(),
            }
        })
        .collect()
}

pub fn export_readiness(session: &ProcessingSession) -> ExportReadiness {
    let mut readiness = ExportReadiness {
        ready: true,
        ..ExportReadiness::default()
    };

    let total = session.document_count();
    if total == 0 {
        readiness.ready = false;
        readiness.errors.push("No documents in session".into());
        return readiness;
    }

    let completed = session.completed_reviews().len();
    if completed == 0 {
        readiness.ready = false;
        readiness.errors.push("No reviews completed".into());
        return readiness;
    }

    if completed < total {
        readiness.allow_partial = true;
        readiness
            .warnings
            .push(format!("Only {completed}/{total} documents reviewed"));
    }
    let undetermined = session
        .reviews()
        .filter(|r| r.is_completed() && reviewed_disposition(r) == Disposition::Undetermined)
        .count();
    if undetermined > 0 {
        readiness.warnings.push(format!(
            "{undetermined} reviewed documents have no determination"
        ));
    }
    if session.responsiveness_count() == 0 {
        readiness
            .warnings
            .push("No responsiveness analysis results found".into());
    }
    if session.exemption_count() == 0 {
        readiness
            .warnings
            .push("No exemption analysis results found".into());
    }

    tracing::debug!(
        ready = readiness.ready,
        allow_partial = readiness.allow_partial,
        warnings = readiness.warnings.len(),
        "Export readiness checked"
    );
    readiness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::types::fixtures::make_responsiveness;
    use crate::session::fixtures::{make_scenario_session, make_session};

    #[test]
    fn scenario_exempt_document_is_withheld_with_model_reasoning() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session.finalize_review(&id, None).unwrap();

        assert!(production_set(&session).is_empty());
        let log = privilege_log(&session);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].email_id, id);
        assert!(log[0].responsive);
        assert_eq!(log[0].exemptions, vec![ExemptionCategory::Deliberative]);
        assert_eq!(
            log[0].justifications,
            vec![Justification {
                ground: WithholdingGround::Exemption {
                    category: ExemptionCategory::Deliberative
                },
                text: "deliberative reasoning".into(),
            }]
        );
    }

    #[test]
    fn scenario_cleared_exemption_moves_to_production() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Deliberative, false)
            .unwrap();
        session.finalize_review(&id, None).unwrap();

        assert_eq!(production_set(&session), vec![id]);
        assert!(privilege_log(&session).is_empty());
    }

    #[test]
    fn non_responsive_document_is_logged_as_such() {
        let mut session = make_session(1);
        let id = EmailId::from("email_0");
        session
            .record_responsiveness(make_responsiveness("email_0", session.requests(), &[false, false]))
            .unwrap();
        session.finalize_review(&id, None).unwrap();

        let log = privilege_log(&session);
        assert_eq!(log.len(), 1);
        assert!(!log[0].responsive);
        assert!(log[0].analysis_supplied);
        assert_eq!(log[0].justifications[0].ground, WithholdingGround::NotResponsive);
        assert_eq!(log[0].justifications[0].text, NOT_RESPONSIVE_JUSTIFICATION);
    }

    #[test]
    fn reviewer_added_exemption_uses_standard_wording() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Personnel, true)
            .unwrap();
        session.finalize_review(&id, None).unwrap();

        let log = privilege_log(&session);
        let texts: Vec<&str> = log[0].justifications.iter().map(|j| j.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Personnel records exemption applies", "deliberative reasoning"]
        );
    }

    #[test]
    fn unreviewed_documents_stay_out_of_exports() {
        let (session, id) = make_scenario_session();
        assert!(production_set(&session).is_empty());
        assert!(privilege_log(&session).is_empty());

        let views = dispositions(&session);
        assert_eq!(
            views,
            vec![DocumentDisposition {
                email_id: id,
                disposition: Disposition::Withhold,
                basis: DispositionBasis::Provisional,
                analysis_supplied: true,
            }]
        );
    }

    #[test]
    fn review_without_analysis_is_not_called_non_responsive() {
        let mut session = make_session(1);
        let id = EmailId::from("email_0");
        session.finalize_review(&id, None).unwrap();

        assert!(privilege_log(&session).is_empty());
        assert!(production_set(&session).is_empty());
        assert_eq!(
            dispositions(&session),
            vec![DocumentDisposition {
                email_id: id,
                disposition: Disposition::Undetermined,
                basis: DispositionBasis::Reviewed,
                analysis_supplied: false,
            }]
        );
        assert!(export_readiness(&session)
            .warnings
            .contains(&"1 reviewed documents have no determination".to_string()));
    }

    #[test]
    fn reviewer_exemption_without_analysis_is_marked_not_analyzed() {
        let mut session = make_session(1);
        let id = EmailId::from("email_0");
        session.start_review(&id, "r1").unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Personnel, true)
            .unwrap();
        session.finalize_review(&id, None).unwrap();

        let log = privilege_log(&session);
        assert_eq!(log.len(), 1);
        assert!(!log[0].analysis_supplied);
        let grounds: Vec<WithholdingGround> = log[0].justifications.iter().map(|j| j.ground).collect();
        assert_eq!(
            grounds,
            vec![
                WithholdingGround::Exemption {
                    category: ExemptionCategory::Personnel
                },
                WithholdingGround::NotAnalyzed,
            ]
        );
        assert!(!log[0]
            .justifications
            .iter()
            .any(|j| j.text == NOT_RESPONSIVE_JUSTIFICATION));
    }

    #[test]
    fn reviewer_decisions_alone_determine_non_responsiveness() {
        let mut session = make_session(1);
        let id = EmailId::from("email_0");
        session.start_review(&id, "r1").unwrap();
        session.apply_responsiveness_override(&id, 0, false).unwrap();
        session.apply_responsiveness_override(&id, 1, false).unwrap();
        session.finalize_review(&id, None).unwrap();

        let log = privilege_log(&session);
        assert_eq!(log[0].justifications[0].ground, WithholdingGround::NotResponsive);
        assert_eq!(dispositions(&session)[0].disposition, Disposition::Withhold);
    }

    #[test]
    fn responsive_without_exemption_pass_is_not_produced() {
        let mut session = make_session(1);
        let id = EmailId::from("email_0");
        session
            .record_responsiveness(make_responsiveness("email_0", session.requests(), &[true, false]))
            .unwrap();
        session.finalize_review(&id, None).unwrap();

        assert!(production_set(&session).is_empty());
        assert!(privilege_log(&session).is_empty());
        assert_eq!(dispositions(&session)[0].disposition, Disposition::Undetermined);
    }

    #[test]
    fn missing_analysis_is_undetermined_not_withheld() {
        let session = make_session(1);
        let views = dispositions(&session);
        assert_eq!(views[0].disposition, Disposition::Undetermined);
        assert_eq!(views[0].basis, DispositionBasis::Provisional);
    }

    #[test]
    fn reviewed_disposition_wins_over_machine() {
        let (mut session, id) = make_scenario_session();
        session.start_review(&id, "r1").unwrap();
        session
            .apply_exemption_override(&id, ExemptionCategory::Deliberative, false)
            .unwrap();
        session.finalize_review(&id, None).unwrap();
        let views = dispositions(&session);
        assert_eq!(views[0].disposition, Disposition::Produce);
        assert_eq!(views[0].basis, DispositionBasis::Reviewed);
    }

    #[test]
    fn readiness_empty_session() {
        let readiness = export_readiness(&make_session(0));
        assert!(!readiness.ready);
        assert_eq!(readiness.errors, vec!["No documents in session".to_string()]);
    }

    #[test]
    fn readiness_without_reviews() {
        let readiness = export_readiness(&make_session(2));
        assert!(!readiness.ready);
        assert!(!readiness.allow_partial);
    }

    #[test]
    fn readiness_partial_review_warns() {
        let mut session = make_session(2);
        session.finalize_review(&EmailId::from("email_0"), None).unwrap();
        let readiness = export_readiness(&session);
        assert!(readiness.ready);
        assert!(readiness.allow_partial);
        assert!(readiness.warnings.contains(&"Only 1/2 documents reviewed".to_string()));
        assert!(readiness
            .warnings
            .contains(&"No responsiveness analysis results found".to_string()));
    }

    #[test]
    fn readiness_complete_session() {
        let (mut session, _) = make_scenario_session();
        session.batch_approve("bulk").unwrap();
        let readiness = export_readiness(&session);
        assert!(readiness.ready);
        assert!(!readiness.allow_partial);
        assert!(readiness.warnings.is_empty());
    }
}
