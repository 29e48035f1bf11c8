// Value types shared by the pipeline stages

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::errors::FailureReason;

/// Upload limit for a single image (10 MiB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default shown when the model gives no medicine list
pub const DEFAULT_MEDICINES: &str = "N/A (See treatment plan)";

/// Phrase the model is instructed to put in `diseaseName` when no crop is visible
pub const NO_CROP_SENTINEL: &str = "Error: No crops found";

/// A file as handed over by the UI layer, before validation
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: Option<String>,
    pub mime_type: String,
    pub bytes: Arc<Vec<u8>>,
}

impl IncomingFile {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            mime_type: mime_type.into(),
            bytes: Arc::new(bytes),
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A validated image. Only `ImageIngestor` constructs these.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub(crate) bytes: Arc<Vec<u8>>,
    pub(crate) mime_type: String,
    pub(crate) size_bytes: usize,
    pub(crate) file_name: Option<String>,
}

impl SourceImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes, used to move them into a blocking task
    pub fn shared_bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }
}

/// Everything needed to produce one `generateContent` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub image_base64: String,
    pub mime_type: String,
    pub user_note: String,
}

/// A delivered (2xx) HTTP reply, body not yet interpreted
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub attempts: u32,
}

/// Token counts reported in `usageMetadata`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Structured diagnosis parsed from the model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub disease_name: String,
    pub treatment_steps: String,
    pub suggested_medicines: String,
    pub future_prevention_tips: String,
}

/// The only value the pipeline hands to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Success(DiagnosisResult),
    NoCropDetected,
    /// JSON parsed but required fields were missing; carries the model text
    Incomplete(String),
    Failure(FailureReason),
}

impl PipelineOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            PipelineOutcome::Success(_) => OutcomeKind::Success,
            PipelineOutcome::NoCropDetected => OutcomeKind::NoCropDetected,
            PipelineOutcome::Incomplete(_) => OutcomeKind::Incomplete,
            PipelineOutcome::Failure(_) => OutcomeKind::Failure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NoCropDetected,
    Incomplete,
    Failure,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::NoCropDetected => "no_crop_detected",
            OutcomeKind::Incomplete => "incomplete",
            OutcomeKind::Failure => "failure",
        }
    }
}
