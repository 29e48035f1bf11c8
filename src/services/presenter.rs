// Maps pipeline outcomes onto renderable views
//
// Pure functions only. The view is serializable so the HTTP layer can hand it to
// a browser, and renders to Markdown-style text for terminals.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::errors::{FailureReason, InterpretationError, SessionError, TransportError};
use crate::core::types::{DiagnosisResult, PipelineOutcome};

static NUMBERED_MARKER: Lazy<Regex> = Lazy::new(|| {
    // Literal pattern, always valid
    Regex::new(r"(\d+\.)").unwrap()
});

static LEADING_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\n").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeTone {
    /// Domain-level negative result, not an error
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSection {
    pub icon: &'static str,
    pub title: &'static str,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedView {
    Diagnosis {
        sections: Vec<ViewSection>,
    },
    Notice {
        tone: NoticeTone,
        title: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl RenderedView {
    fn notice(tone: NoticeTone, title: &str, message: impl Into<String>) -> Self {
        RenderedView::Notice {
            tone,
            title: title.to_string(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            RenderedView::Notice {
                tone: NoticeTone::Error,
                ..
            }
        )
    }

    /// Formatted text: headings, bold markers, one numbered item per line
    pub fn to_text(&self) -> String {
        match self {
            RenderedView::Diagnosis { sections } => sections
                .iter()
                .map(|s| format!("### {} {}\n{}", s.icon, s.title, s.body))
                .collect::<Vec<_>>()
                .join("\n\n"),
            RenderedView::Notice {
                title,
                message,
                detail,
                ..
            } => {
                let mut text = format!("**{}:** {}", title, message);
                if let Some(detail) = detail {
                    text.push_str("\n\n");
                    text.push_str(detail);
                }
                text
            }
        }
    }
}

pub struct ResultPresenter;

impl ResultPresenter {
    pub fn present(outcome: &PipelineOutcome) -> RenderedView {
        match outcome {
            PipelineOutcome::Success(diagnosis) => Self::diagnosis(diagnosis),
            PipelineOutcome::NoCropDetected => RenderedView::notice(
                NoticeTone::Warning,
                "No Crop Found",
                "The AI reported it could not find a crop in the image. Please try a clearer picture of a plant.",
            ),
            PipelineOutcome::Incomplete(_) => RenderedView::notice(
                NoticeTone::Warning,
                "Inconclusive",
                "Could not determine the disease from the image. The AI's response was incomplete. Please try a clearer picture.",
            ),
            PipelineOutcome::Failure(reason) => Self::failure(reason),
        }
    }

    /// Error view for a form-level problem (bad file, no file, busy)
    pub fn present_session_error(error: &SessionError) -> RenderedView {
        RenderedView::notice(NoticeTone::Error, "Error", error.to_string())
    }

    fn diagnosis(d: &DiagnosisResult) -> RenderedView {
        RenderedView::Diagnosis {
            sections: vec![
                ViewSection {
                    icon: "🌿",
                    title: "Disease Identified",
                    body: format!("**{}**", d.disease_name),
                },
                ViewSection {
                    icon: "💊",
                    title: "Recommended Treatment",
                    body: format_numbered_list(&d.treatment_steps),
                },
                ViewSection {
                    icon: "🧪",
                    title: "Suggested Medicines",
                    body: d.suggested_medicines.clone(),
                },
                ViewSection {
                    icon: "🛡️",
                    title: "Future Prevention Tips",
                    body: format_numbered_list(&d.future_prevention_tips),
                },
            ],
        }
    }

    fn failure(reason: &FailureReason) -> RenderedView {
        match reason {
            FailureReason::Interpretation(InterpretationError::MalformedJson { raw_text, .. }) => {
                RenderedView::Notice {
                    tone: NoticeTone::Error,
                    title: "Error".to_string(),
                    message: "Failed to parse AI response. Raw text:".to_string(),
                    detail: Some(raw_text.clone()),
                }
            }
            FailureReason::Transport(TransportError::Exhausted { .. }) => RenderedView::notice(
                NoticeTone::Error,
                "Error",
                "Failed to get a response from the AI after several attempts. Please try again later.",
            ),
            FailureReason::Transport(TransportError::Rejected { message, .. }) => {
                RenderedView::notice(
                    NoticeTone::Error,
                    "Error",
                    format!("API request failed: {}", message),
                )
            }
            FailureReason::Interpretation(InterpretationError::UnreadableResponse(_)) => {
                RenderedView::notice(
                    NoticeTone::Error,
                    "Error",
                    "Received an unexpected response from the AI. Check the logs for details.",
                )
            }
            other => RenderedView::notice(NoticeTone::Error, "Error", other.to_string()),
        }
    }
}

/// Put each numbered marker (`1.`, `12.`) on its own line with the number in bold.
/// Empty input renders as "N/A".
pub fn format_numbered_list(text: &str) -> String {
    if text.trim().is_empty() {
        return "N/A".to_string();
    }

    let broken = NUMBERED_MARKER.replace_all(text, "\n**$1**");
    let stripped = LEADING_BREAK.replace(&broken, "");

    stripped
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}
