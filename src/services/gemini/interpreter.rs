// Turns a delivered generateContent reply into a PipelineOutcome
//
// The model is asked for bare JSON but regularly wraps it in prose or code
// fences, so the object is located by scanning for the outermost braces.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::errors::{FailureReason, InterpretationError};
use crate::core::types::{
    DiagnosisResult, PipelineOutcome, RawResponse, TokenUsage, DEFAULT_MEDICINES,
    NO_CROP_SENTINEL,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

/// Outcome plus whatever token accounting the reply carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub outcome: PipelineOutcome,
    pub usage: TokenUsage,
}

pub struct ResponseInterpreter;

impl ResponseInterpreter {
    pub fn interpret(raw: &RawResponse) -> PipelineOutcome {
        Self::interpret_with_usage(raw).outcome
    }

    pub fn interpret_with_usage(raw: &RawResponse) -> Interpretation {
        let envelope: GenerateContentResponse = match serde_json::from_str(&raw.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Reply body is not a generateContent envelope: {}", e);
                return Interpretation {
                    outcome: failure(InterpretationError::UnreadableResponse(e.to_string())),
                    usage: TokenUsage::default(),
                };
            }
        };

        let usage = envelope
            .usage_metadata
            .as_ref()
            .map(|u| TokenUsage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        let text = envelope
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.as_deref())
            .unwrap_or("");

        Interpretation {
            outcome: Self::interpret_text(text),
            usage,
        }
    }

    /// Interpret the candidate text alone
    pub fn interpret_text(text: &str) -> PipelineOutcome {
        if text.is_empty() {
            return failure(InterpretationError::EmptyResponse);
        }

        let Some(json_text) = extract_json_object(text) else {
            debug!("No JSON object in {} chars of model text", text.len());
            return failure(InterpretationError::NoJsonFound);
        };

        let object = match serde_json::from_str::<Value>(json_text) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                return failure(InterpretationError::MalformedJson {
                    raw_text: json_text.to_string(),
                    reason: format!("expected a JSON object, found {}", json_kind(&other)),
                })
            }
            Err(e) => {
                warn!("Model returned malformed JSON: {}", e);
                return failure(InterpretationError::MalformedJson {
                    raw_text: json_text.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let disease_name = field_text(&object, "diseaseName");
        if disease_name.contains(NO_CROP_SENTINEL) {
            return PipelineOutcome::NoCropDetected;
        }

        let treatment_steps = field_text(&object, "treatmentSteps");
        if disease_name.is_empty() || treatment_steps.is_empty() {
            debug!("Reply is missing diseaseName or treatmentSteps");
            return PipelineOutcome::Incomplete(text.to_string());
        }

        let suggested_medicines = match field_text(&object, "suggestedMedicines") {
            m if m.is_empty() => DEFAULT_MEDICINES.to_string(),
            m => m,
        };

        PipelineOutcome::Success(DiagnosisResult {
            disease_name,
            treatment_steps,
            suggested_medicines,
            future_prevention_tips: field_text(&object, "futurePreventionTips"),
        })
    }
}

/// Slice from the first `{` to the last `}` inclusive, if they form a range
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// String value of a field; arrays of strings are joined with spaces
fn field_text(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn failure(e: InterpretationError) -> PipelineOutcome {
    PipelineOutcome::Failure(FailureReason::Interpretation(e))
}
