// Request assembly for the Gemini generateContent endpoint

use base64::{engine::general_purpose, Engine};
use serde::Serialize;

use crate::core::types::{AnalysisRequest, SourceImage};

pub const SYSTEM_PROMPT: &str = r#"You are an expert botanist and plant pathologist named AgriDoc.
Analyze the provided image of a crop.
1. Identify the most likely disease affecting the plant.
2. Provide a concise, step-by-step treatment plan.
3. Suggest specific medicines, fungicides, or pesticides. If none, say "N/A".
4. Provide actionable, step-by-step tips for future prevention.

Format your response strictly as a JSON object with four keys: "diseaseName", "treatmentSteps", "suggestedMedicines", and "futurePreventionTips".
Do not include any other text or markdown formatting like ```json.
Example: {"diseaseName": "Powdery Mildew", "treatmentSteps": "1. Prune affected areas. 2. Apply a fungicide.", "suggestedMedicines": "Neem oil, Sulfur fungicide", "futurePreventionTips": "1. Ensure proper plant spacing. 2. Water at the base of the plant."}
Important: If the reference image doesn't contain any crop, return: {"diseaseName": "Error: No crops found.", "treatmentSteps": "N/A", "suggestedMedicines": "N/A", "futurePreventionTips": "N/A"}"#;

pub const DEFAULT_USER_PROMPT: &str = "Please identify the disease in this image, suggest a treatment, list appropriate medicines, and provide prevention tips in the required JSON format.";

// Generation parameters are fixed
pub const RESPONSE_MIME_TYPE: &str = "application/json";
pub const TEMPERATURE: f64 = 0.4;
pub const TOP_K: u32 = 32;
pub const TOP_P: f64 = 1.0;
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: Vec<Content<'a>>,
    pub system_instruction: SystemInstruction,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content<'a> {
    pub parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Part<'a> {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: &'static str,
    pub temperature: f64,
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            response_mime_type: RESPONSE_MIME_TYPE,
            temperature: TEMPERATURE,
            top_k: TOP_K,
            top_p: TOP_P,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

/// Builds `AnalysisRequest`s and their wire bodies
pub struct RequestBuilder;

impl RequestBuilder {
    /// Encode the image and pair it with the note. Cannot fail.
    pub fn build(image: &SourceImage, note: &str) -> AnalysisRequest {
        let image_base64 = general_purpose::STANDARD.encode(image.bytes());
        Self::from_encoded(image_base64, image.mime_type(), note)
    }

    /// Same as `build` when the base64 payload was produced elsewhere
    pub fn from_encoded(image_base64: String, mime_type: &str, note: &str) -> AnalysisRequest {
        AnalysisRequest {
            image_base64,
            mime_type: mime_type.to_string(),
            user_note: note.to_string(),
        }
    }

    pub fn user_prompt(note: &str) -> String {
        if note.is_empty() {
            DEFAULT_USER_PROMPT.to_string()
        } else {
            format!(
                "User's additional context: \"{}\".\n\nPlease analyze the image based on this context and return the JSON report.",
                note
            )
        }
    }

    pub fn body(request: &AnalysisRequest) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: Self::user_prompt(&request.user_note),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &request.mime_type,
                            data: &request.image_base64,
                        },
                    },
                ],
            }],
            system_instruction: SystemInstruction {
                parts: vec![TextPart {
                    text: SYSTEM_PROMPT,
                }],
            },
            generation_config: GenerationConfig::default(),
        }
    }

    /// The wire body as a JSON value, ready for the transport
    pub fn body_json(request: &AnalysisRequest) -> serde_json::Value {
        // Serializing plain structs of strings and numbers cannot fail
        serde_json::to_value(Self::body(request)).unwrap_or(serde_json::Value::Null)
    }
}
