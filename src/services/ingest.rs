// Image intake: type and size checks on user-selected files

use tracing::debug;

use crate::core::errors::{ValidationError, ValidationResult};
use crate::core::types::{IncomingFile, SourceImage, MAX_IMAGE_BYTES};

/// Validates uploads before anything is encoded or sent
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageIngestor;

impl ImageIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Accept a file as a `SourceImage` if it is an `image/*` type of at most 10 MiB
    pub fn ingest(&self, file: IncomingFile) -> ValidationResult<SourceImage> {
        if !file.mime_type.starts_with("image/") {
            debug!("Rejecting upload with type '{}'", file.mime_type);
            return Err(ValidationError::UnsupportedType {
                mime_type: file.mime_type,
            });
        }

        let size_bytes = file.bytes.len();
        if size_bytes > MAX_IMAGE_BYTES {
            debug!("Rejecting upload of {} bytes", size_bytes);
            return Err(ValidationError::TooLarge {
                size_bytes,
                limit: MAX_IMAGE_BYTES,
            });
        }

        Ok(SourceImage {
            bytes: file.bytes,
            mime_type: file.mime_type,
            size_bytes,
            file_name: file.file_name,
        })
    }
}
