use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use image::ImageFormat;
use std::path::Path;
use std::sync::Arc;

use crate::core::types::IncomingFile;

/// Asynchronously base64-encode image bytes using spawn_blocking.
///
/// A 10 MB upload takes long enough to encode that it should not run on the
/// async worker threads.
pub async fn encode_base64_async(bytes: Arc<Vec<u8>>) -> Result<String> {
    tokio::task::spawn_blocking(move || general_purpose::STANDARD.encode(bytes.as_slice()))
        .await
        .context("Failed to spawn blocking task for base64 encoding")
}

/// MIME type from the image's magic bytes, falling back to the file extension.
pub fn sniff_mime_type(bytes: &[u8], path: Option<&Path>) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .or_else(|| path.and_then(|p| ImageFormat::from_path(p).ok()))
        .map(|format| format.to_mime_type())
}

/// Read a file from disk into an `IncomingFile`.
///
/// Unknown formats get `application/octet-stream`, which ingestion rejects.
pub async fn read_image_file(path: &Path) -> Result<IncomingFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mime_type = sniff_mime_type(&bytes, Some(path)).unwrap_or("application/octet-stream");

    let mut file = IncomingFile::new(mime_type, bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        file = file.with_file_name(name);
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid PNG signature + IHDR start is enough for format sniffing
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 16, b'J', b'F', b'I', b'F'];

    #[tokio::test]
    async fn test_encode_base64_async() {
        let encoded = encode_base64_async(Arc::new(b"leaf".to_vec())).await.unwrap();
        assert_eq!(encoded, "bGVhZg==");
    }

    #[test]
    fn test_sniff_from_magic_bytes() {
        assert_eq!(sniff_mime_type(PNG_MAGIC, None), Some("image/png"));
        assert_eq!(sniff_mime_type(JPEG_MAGIC, None), Some("image/jpeg"));
    }

    #[test]
    fn test_sniff_falls_back_to_extension() {
        assert_eq!(
            sniff_mime_type(b"not really", Some(Path::new("leaf.JPG"))),
            Some("image/jpeg")
        );
        assert_eq!(sniff_mime_type(b"plain text", Some(Path::new("notes.txt"))), None);
    }
}
