use serde_json::{Map, Value};

use super::types::{ExemptionFinding, ExemptionFindings, RequestDetermination};
use crate::models::{ConfidenceLevel, ExemptionCategory};
use crate::pipeline::query::{ResultValidator, ValidationError};

/// Checks the parallel-array responsiveness payload and zips it into
/// one determination per request.
pub struct ResponsivenessValidator {
    expected: usize,
}

impl ResponsivenessValidator {
    pub fn new(request_count: usize) -> Self {
        Self {
            expected: request_count,
        }
    }
}

impl ResultValidator for ResponsivenessValidator {
    type Output = Vec<RequestDetermination>;

    fn validate(&self, payload: &Value) -> Result<Self::Output, ValidationError> {
        let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;

        let responsive = sized_array(object, "responsive", self.expected)?;
        let confidence = sized_array(object, "confidence", self.expected)?;
        let reasoning = sized_array(object, "reasoning", self.expected)?;

        responsive
            .iter()
            .zip(confidence)
            .zip(reasoning)
            .enumerate()
            .map(|(i, ((r, c), why))| -> Result<RequestDetermination, ValidationError> {
                Ok(RequestDetermination {
                    responsive: as_bool(r, &format!("responsive[{i}]"))?,
                    confidence: as_confidence(c, &format!("confidence[{i}]"))?,
                    reasoning: as_string(why, &format!("reasoning[{i}]"))?,
                })
            })
            .collect()
    }
}

/// Requires `exemptions` with exactly the three known categories.
pub struct ExemptionValidator;

impl ResultValidator for ExemptionValidator {
    type Output = ExemptionFindings;

    fn validate(&self, payload: &Value) -> Result<Self::Output, ValidationError> {
        let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;
        let exemptions = object
            .get("exemptions")
            .ok_or_else(|| ValidationError::MissingField("exemptions".into()))?
            .as_object()
            .ok_or_else(|| ValidationError::WrongType {
                field: "exemptions".into(),
                expected: "object",
            })?;

        for key in exemptions.keys() {
            if key.parse::<ExemptionCategory>().is_err() {
                return Err(ValidationError::UnexpectedKey(format!("exemptions.{key}")));
            }
        }

        Ok(ExemptionFindings {
            attorney_client: finding(exemptions, ExemptionCategory::AttorneyClient)?,
            personnel: finding(exemptions, ExemptionCategory::Personnel)?,
            deliberative: finding(exemptions, ExemptionCategory::Deliberative)?,
        })
    }
}

fn finding(
    exemptions: &Map<String, Value>,
    category: ExemptionCategory,
) -> Result<ExemptionFinding, ValidationError> {
    let path = format!("exemptions.{}", category.as_str());
    let entry = exemptions
        .get(category.as_str())
        .ok_or_else(|| ValidationError::MissingField(path.clone()))?
        .as_object()
        .ok_or_else(|| ValidationError::WrongType {
            field: path.clone(),
            expected: "object",
        })?;

    let field = |name: &str| {
        let full = format!("{path}.{name}");
        match entry.get(name) {
            Some(v) => Ok((v, full)),
            None => Err(ValidationError::MissingField(full)),
        }
    };

    let (applies, applies_path) = field("applies")?;
    let (confidence, confidence_path) = field("confidence")?;
    let (reasoning, reasoning_path) = field("reasoning")?;

    Ok(ExemptionFinding {
        applies: as_bool(applies, &applies_path)?,
        confidence: as_confidence(confidence, &confidence_path)?,
        reasoning: as_string(reasoning, &reasoning_path)?,
    })
}

fn sized_array<'a>(
    object: &'a Map<String, Value>,
    field: &str,
    expected: usize,
) -> Result<&'a Vec<Value>, ValidationError> {
    let array = object
        .get(field)
        .ok_or_else(|| ValidationError::MissingField(field.into()))?
        .as_array()
        .ok_or_else(|| ValidationError::WrongType {
            field: field.into(),
            expected: "array",
        })?;
    if array.len() != expected {
        return Err(ValidationError::LengthMismatch {
            field: field.into(),
            expected,
            actual: array.len(),
        });
    }
    Ok(array)
}

fn as_bool(value: &Value, field: &str) -> Result<bool, ValidationError> {
    value.as_bool().ok_or_else(|| ValidationError::WrongType {
        field: field.into(),
        expected: "boolean",
    })
}

fn as_string(value: &Value, field: &str) -> Result<String, ValidationError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::WrongType {
            field: field.into(),
            expected: "string",
        })
}

fn as_confidence(value: &Value, field: &str) -> Result<ConfidenceLevel, ValidationError> {
    let raw = value.as_str().ok_or_else(|| ValidationError::WrongType {
        field: field.into(),
        expected: "string",
    })?;
    ConfidenceLevel::parse_loose(raw).ok_or_else(|| ValidationError::UnknownConfidence {
        field: field.into(),
        value: raw.to_string(),
    })
}
