// Diagnosis pipeline: ingest -> encode -> send -> interpret -> present

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::config::Config;
use crate::core::errors::{FailureReason, ValidationResult};
use crate::core::types::{IncomingFile, PipelineOutcome, SourceImage};
use crate::services::gemini::{
    HttpSender, ReqwestSender, RequestBuilder, ResponseInterpreter, RetryingTransport,
};
use crate::services::ingest::ImageIngestor;
use crate::services::presenter::{RenderedView, ResultPresenter};
use crate::utils::image_ops::encode_base64_async;
use crate::utils::Metrics;

/// Runs one image + note through every stage and always yields an outcome
pub struct DiagnosisPipeline<S: HttpSender = ReqwestSender> {
    config: Arc<Config>,
    ingestor: ImageIngestor,
    transport: RetryingTransport<S>,
    metrics: Option<Metrics>,
}

impl DiagnosisPipeline<ReqwestSender> {
    #[instrument(skip(config, metrics))]
    pub fn from_config(config: Arc<Config>, metrics: Option<Metrics>) -> Result<Self> {
        let transport = RetryingTransport::from_config(&config, metrics.clone())?;
        info!(
            "✓ Pipeline ready (model: {}, attempts: {}, timeout: {}s)",
            config.model(),
            transport.max_retries(),
            config.api_timeout().as_secs()
        );
        Ok(Self::assemble(config, transport, metrics))
    }
}

impl<S: HttpSender> DiagnosisPipeline<S> {
    /// Pipeline over a caller-supplied HTTP sender
    pub fn with_sender(config: Arc<Config>, sender: S, metrics: Option<Metrics>) -> Self {
        let transport = RetryingTransport::with_sender(&config, sender, metrics.clone());
        Self::assemble(config, transport, metrics)
    }

    fn assemble(
        config: Arc<Config>,
        transport: RetryingTransport<S>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            config,
            ingestor: ImageIngestor::new(),
            transport,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn transport(&self) -> &RetryingTransport<S> {
        &self.transport
    }

    /// Validate an upload, counting rejections
    pub fn ingest(&self, file: IncomingFile) -> ValidationResult<SourceImage> {
        let result = self.ingestor.ingest(file);
        if let (Err(e), Some(m)) = (&result, &self.metrics) {
            debug!("Upload rejected: {}", e);
            m.record_ingest_rejection();
        }
        result
    }

    /// Analyze a validated image. Every failure is folded into the outcome.
    #[instrument(skip(self, image, note), fields(mime = %image.mime_type(), bytes = image.size_bytes(), has_note = !note.is_empty()))]
    pub async fn run(&self, image: &SourceImage, note: &str) -> PipelineOutcome {
        let start = Instant::now();
        let outcome = self.run_stages(image, note).await;
        let elapsed = start.elapsed();

        if let Some(ref m) = self.metrics {
            m.record_outcome(outcome.kind(), elapsed);
        }
        info!(
            "Diagnosis finished: {} in {:.2}s",
            outcome.kind().as_str(),
            elapsed.as_secs_f64()
        );

        outcome
    }

    async fn run_stages(&self, image: &SourceImage, note: &str) -> PipelineOutcome {
        let image_base64 = match encode_base64_async(image.shared_bytes()).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Image encoding failed: {:#}", e);
                return PipelineOutcome::Failure(FailureReason::ReadFailed(e.to_string()));
            }
        };
        debug!("Encoded image to {} base64 chars", image_base64.len());

        let request = RequestBuilder::from_encoded(image_base64, image.mime_type(), note);

        let raw = match self.transport.send(&request).await {
            Ok(raw) => raw,
            Err(e) => return PipelineOutcome::Failure(e.into()),
        };
        debug!("Reply received after {} attempt(s)", raw.attempts);

        let interpretation = ResponseInterpreter::interpret_with_usage(&raw);
        if let Some(ref m) = self.metrics {
            m.record_token_usage(interpretation.usage);
        }
        interpretation.outcome
    }

    /// `run` followed by presentation
    pub async fn analyze(&self, image: &SourceImage, note: &str) -> RenderedView {
        ResultPresenter::present(&self.run(image, note).await)
    }
}
