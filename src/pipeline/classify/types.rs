use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ConfidenceLevel, CpraRequest, EmailId, ExemptionCategory};
use crate::pipeline::query::ValidationError;

/// One request's machine determination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetermination {
    pub responsive: bool,
    pub confidence: ConfidenceLevel,
    pub reasoning: String,
}

/// One exemption category's machine determination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionFinding {
    pub applies: bool,
    pub confidence: ConfidenceLevel,
    pub reasoning: String,
}

/// All three categories; a partial set cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionFindings {
    pub attorney_client: ExemptionFinding,
    pub personnel: ExemptionFinding,
    pub deliberative: ExemptionFinding,
}

impl ExemptionFindings {
    pub fn get(&self, category: ExemptionCategory) -> &ExemptionFinding {
        match category {
            ExemptionCategory::AttorneyClient => &self.attorney_client,
            ExemptionCategory::Personnel => &self.personnel,
            ExemptionCategory::Deliberative => &self.deliberative,
        }
    }
}

/// Machine responsiveness result for one email against the ordered request list.
///
/// Immutable; index `i` of every accessor refers to request `i`.
/// Deserializing applies the same length check as `new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponsivenessAnalysis")]
pub struct ResponsivenessAnalysis {
    email_id: EmailId,
    requests: Vec<String>,
    determinations: Vec<RequestDetermination>,
    model_used: String,
    analyzed_at: DateTime<Utc>,
    duration_ms: u64,
}

#[derive(Deserialize)]
struct RawResponsivenessAnalysis {
    email_id: EmailId,
    requests: Vec<String>,
    determinations: Vec<RequestDetermination>,
    model_used: String,
    analyzed_at: DateTime<Utc>,
    duration_ms: u64,
}

impl TryFrom<RawResponsivenessAnalysis> for ResponsivenessAnalysis {
    type Error = ValidationError;

    fn try_from(raw: RawResponsivenessAnalysis) -> Result<Self, Self::Error> {
        if raw.determinations.len() != raw.requests.len() {
            return Err(ValidationError::LengthMismatch {
                field: "determinations".into(),
                expected: raw.requests.len(),
                actual: raw.determinations.len(),
            });
        }
        Ok(Self {
            email_id: raw.email_id,
            requests: raw.requests,
            determinations: raw.determinations,
            model_used: raw.model_used,
            analyzed_at: raw.analyzed_at,
            duration_ms: raw.duration_ms,
        })
    }
}

impl ResponsivenessAnalysis {
    /// Fails when the determination count differs from the request count.
    pub fn new(
        email_id: EmailId,
        requests: &[CpraRequest],
        determinations: Vec<RequestDetermination>,
        model_used: &str,
        duration_ms: u64,
    ) -> Result<Self, ValidationError> {
        if determinations.len() != requests.len() {
            return Err(ValidationError::LengthMismatch {
                field: "determinations".into(),
                expected: requests.len(),
                actual: determinations.len(),
            });
        }
        Ok(Self {
            email_id,
            requests: requests.iter().map(|r| r.text.clone()).collect(),
            determinations,
            model_used: model_used.to_string(),
            analyzed_at: Utc::now(),
            duration_ms,
        })
    }

    pub fn email_id(&self) -> &EmailId {
        &self.email_id
    }

    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub fn determinations(&self) -> &[RequestDetermination] {
        &self.determinations
    }

    pub fn request_count(&self) -> usize {
        self.determinations.len()
    }

    pub fn responsive(&self) -> Vec<bool> {
        self.determinations.iter().map(|d| d.responsive).collect()
    }

    pub fn confidence(&self) -> Vec<ConfidenceLevel> {
        self.determinations.iter().map(|d| d.confidence).collect()
    }

    pub fn reasoning(&self) -> Vec<&str> {
        self.determinations.iter().map(|d| d.reasoning.as_str()).collect()
    }

    pub fn is_responsive_to_any(&self) -> bool {
        self.determinations.iter().any(|d| d.responsive)
    }

    /// Indices of the requests this email was found responsive to.
    pub fn responsive_requests(&self) -> Vec<usize> {
        self.determinations
            .iter()
            .enumerate()
            .filter(|(_, d)| d.responsive)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn model_used(&self) -> &str {
        &self.model_used
    }

    pub fn analyzed_at(&self) -> DateTime<Utc> {
        self.analyzed_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Machine exemption result for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExemptionAnalysis {
    email_id: EmailId,
    findings: ExemptionFindings,
    model_used: String,
    analyzed_at: DateTime<Utc>,
    duration_ms: u64,
}

impl ExemptionAnalysis {
    pub fn new(
        email_id: EmailId,
        findings: ExemptionFindings,
        model_used: &str,
        duration_ms: u64,
    ) -> Self {
        Self {
            email_id,
            findings,
            model_used: model_used.to_string(),
            analyzed_at: Utc::now(),
            duration_ms,
        }
    }

    pub fn email_id(&self) -> &EmailId {
        &self.email_id
    }

    pub fn finding(&self, category: ExemptionCategory) -> &ExemptionFinding {
        self.findings.get(category)
    }

    pub fn findings(&self) -> &ExemptionFindings {
        &self.findings
    }

    /// Categories the model says apply, in fixed category order.
    pub fn applicable(&self) -> Vec<ExemptionCategory> {
        ExemptionCategory::all()
            .iter()
            .copied()
            .filter(|c| self.finding(*c).applies)
            .collect()
    }

    pub fn has_any_exemption(&self) -> bool {
        !self.applicable().is_empty()
    }

    pub fn model_used(&self) -> &str {
        &self.model_used
    }

    pub fn analyzed_at(&self) -> DateTime<Utc> {
        self.analyzed_at
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn analysis_rejects_count_mismatch() {
        let requests = make_requests(&["a", "b"]);
        let err = ResponsivenessAnalysis::new(
            "m1".into(),
            &requests,
            vec![make_determination(true, ConfidenceLevel::High)],
            "model",
            0,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::LengthMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn deserializing_keeps_the_length_check() {
        let requests = make_requests(&["a", "b"]);
        let analysis = make_responsiveness("m1", &requests, &[true, false]);
        let value = serde_json::to_value(&analysis).unwrap();
        let restored: ResponsivenessAnalysis = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(restored, analysis);

        let mut short = value;
        short["determinations"].as_array_mut().unwrap().pop();
        let err = serde_json::from_value::<ResponsivenessAnalysis>(short).unwrap_err();
        assert!(err.to_string().contains("expected 2"), "{err}");
    }

    #[test]
    fn responsive_accessors_follow_request_order() {
        let requests = make_requests(&["a", "b", "c"]);
        let analysis = make_responsiveness("m1", &requests, &[false, true, true]);
        assert_eq!(analysis.responsive(), vec![false, true, true]);
        assert_eq!(analysis.responsive_requests(), vec![1, 2]);
        assert!(analysis.is_responsive_to_any());
        assert_eq!(analysis.requests(), &["a", "b", "c"]);
    }

    #[test]
    fn not_responsive_to_any() {
        let requests = make_requests(&["a"]);
        let analysis = make_responsiveness("m1", &requests, &[false]);
        assert!(!analysis.is_responsive_to_any());
        assert!(analysis.responsive_requests().is_empty());
    }

    #[test]
    fn applicable_exemptions_in_category_order() {
        let analysis = make_exemptions("m1", true, false, true);
        assert_eq!(
            analysis.applicable(),
            vec![ExemptionCategory::AttorneyClient, ExemptionCategory::Deliberative]
        );
        assert_eq!(
            analysis.finding(ExemptionCategory::Deliberative).reasoning,
            "deliberative reasoning"
        );
    }
}
