//! Conversions between raw image bytes and `data:` URLs.
//!
//! A `data:` URL is the single representation used for staged uploads,
//! request payloads and history records, so a result can be fed straight
//! back in as the source of the next operation.

use std::path::Path;
use std::sync::LazyLock;

use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use regex::Regex;

use crate::error::EncodingError;

static DATA_URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/[a-z]+;base64,").expect("data URL prefix pattern is valid")
});

/// Builds a `data:` URL from raw bytes and a MIME type.
pub fn to_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Builds a `data:` URL, detecting the MIME type from the bytes.
pub fn encode_image(bytes: &[u8]) -> Result<String, EncodingError> {
    if bytes.is_empty() {
        return Err(EncodingError::Empty);
    }
    let mime_type = sniff_mime_type(bytes).ok_or(EncodingError::UnknownFormat)?;
    Ok(to_data_url(bytes, mime_type))
}

/// Reads a picked file and returns it as a `data:` URL.
///
/// The content decides the MIME type; the extension is only consulted when
/// the bytes are not recognized.
pub async fn encode_file(path: impl AsRef<Path>) -> Result<String, EncodingError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(EncodingError::Empty);
    }
    let mime_type = sniff_mime_type(&bytes)
        .or_else(|| ImageFormat::from_path(path).ok().and_then(mime_type_of))
        .ok_or(EncodingError::UnknownFormat)?;
    Ok(to_data_url(&bytes, mime_type))
}

/// Removes a leading `data:image/<subtype>;base64,` prefix.
///
/// Input without a matching prefix is returned unchanged.
pub fn strip_data_url_prefix(data_url: &str) -> &str {
    match DATA_URL_PREFIX.find(data_url) {
        Some(prefix) => &data_url[prefix.end()..],
        None => data_url,
    }
}

/// Recovers the raw bytes behind a `data:` URL.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, EncodingError> {
    let payload = strip_data_url_prefix(data_url);
    Ok(general_purpose::STANDARD.decode(payload)?)
}

/// Detects the image MIME type from magic bytes.
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().and_then(mime_type_of)
}

fn mime_type_of(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
    ];
    const JPEG_HEADER: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1];

    #[test]
    fn test_sniff_mime_type() {
        assert_eq!(sniff_mime_type(&PNG_HEADER), Some("image/png"));
        assert_eq!(sniff_mime_type(&JPEG_HEADER), Some("image/jpeg"));
        assert_eq!(sniff_mime_type(b"plain text"), None);
    }

    #[test]
    fn test_encode_image_builds_data_url() {
        let url = encode_image(&PNG_HEADER).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_encode_image_rejects_empty_and_unknown() {
        assert!(matches!(encode_image(&[]), Err(EncodingError::Empty)));
        assert!(matches!(
            encode_image(b"not an image"),
            Err(EncodingError::UnknownFormat)
        ));
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,AQID"), "AQID");
        assert_eq!(strip_data_url_prefix("data:image/jpeg;base64,AQID"), "AQID");
        // The pattern only knows plain lowercase subtypes.
        assert_eq!(
            strip_data_url_prefix("data:image/svg+xml;base64,AQID"),
            "data:image/svg+xml;base64,AQID"
        );
        assert_eq!(strip_data_url_prefix("AQID"), "AQID");
    }

    #[test]
    fn test_decode_recovers_original_bytes() {
        let url = to_data_url(&JPEG_HEADER, "image/jpeg");
        assert_eq!(decode_data_url(&url).unwrap(), JPEG_HEADER.to_vec());
    }

    #[test]
    fn test_decode_accepts_bare_base64() {
        assert_eq!(decode_data_url("AQID").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,@@@"),
            Err(EncodingError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_encode_file_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        std::fs::write(&path, PNG_HEADER).unwrap();

        let url = encode_file(&path).await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_encode_file_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.webp");
        std::fs::write(&path, b"truncated").unwrap();

        let url = encode_file(&path).await.unwrap();
        assert!(url.starts_with("data:image/webp;base64,"));
    }

    #[tokio::test]
    async fn test_encode_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = encode_file(dir.path().join("missing.png")).await;
        assert!(matches!(result, Err(EncodingError::Io(_))));
    }
}
