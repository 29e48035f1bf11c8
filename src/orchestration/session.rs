// Form-level state for one user: selected image, note, last rendered view

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::errors::SessionError;
use crate::core::types::{IncomingFile, SourceImage};
use crate::services::gemini::{HttpSender, ReqwestSender};
use crate::services::presenter::{RenderedView, ResultPresenter};

use super::pipeline::DiagnosisPipeline;

#[derive(Default)]
struct FormState {
    image: Option<SourceImage>,
    note: String,
    last_view: Option<RenderedView>,
}

/// Clears the in-flight flag when a generate call ends, however it ends
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives the pipeline from UI commands.
///
/// Only one `on_generate` runs at a time; a second call while one is in
/// flight gets a busy notice and does not touch the network.
pub struct DiagnosisSession<S: HttpSender = ReqwestSender> {
    pipeline: Arc<DiagnosisPipeline<S>>,
    form: Mutex<FormState>,
    in_flight: AtomicBool,
}

impl<S: HttpSender> DiagnosisSession<S> {
    pub fn new(pipeline: Arc<DiagnosisPipeline<S>>) -> Self {
        Self {
            pipeline,
            form: Mutex::new(FormState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn pipeline(&self) -> &DiagnosisPipeline<S> {
        &self.pipeline
    }

    /// Validate and keep a newly selected file.
    ///
    /// Returns an error view on rejection; the previously selected image stays.
    pub fn on_file_selected(&self, file: IncomingFile) -> Option<RenderedView> {
        match self.pipeline.ingest(file) {
            Ok(image) => {
                debug!(
                    "Image selected: {} ({} bytes)",
                    image.file_name().unwrap_or("<unnamed>"),
                    image.size_bytes()
                );
                self.form.lock().image = Some(image);
                None
            }
            Err(e) => Some(self.show_error(SessionError::from(e))),
        }
    }

    pub fn set_note(&self, note: impl Into<String>) {
        self.form.lock().note = note.into();
    }

    pub fn has_image(&self) -> bool {
        self.form.lock().image.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run the pipeline on the current image and note
    pub async fn on_generate(&self) -> RenderedView {
        let selected = {
            let form = self.form.lock();
            form.image.clone().map(|image| (image, form.note.clone()))
        };
        let Some((image, note)) = selected else {
            return self.show_error(SessionError::NoImage);
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("Generate ignored: an analysis is already running");
            return ResultPresenter::present_session_error(&SessionError::Busy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let view = self.pipeline.analyze(&image, &note).await;
        self.form.lock().last_view = Some(view.clone());
        view
    }

    /// Drop image, note and last view
    pub fn on_clear(&self) {
        *self.form.lock() = FormState::default();
    }

    pub fn last_view(&self) -> Option<RenderedView> {
        self.form.lock().last_view.clone()
    }

    fn show_error(&self, error: SessionError) -> RenderedView {
        let view = ResultPresenter::present_session_error(&error);
        self.form.lock().last_view = Some(view.clone());
        view
    }
}
