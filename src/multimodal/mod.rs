//! Image resolution: turns a file path, raw byte buffer or already-encoded
//! reference into a URL that can be embedded in an `image_url` content part.

use base64::Engine as _;
use std::path::{Path, PathBuf};

use crate::{Error, ErrorContext, Result};

/// Image accepted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Image file on disk.
    Path(PathBuf),
    /// Raw encoded image bytes (PNG, JPEG, GIF or WebP).
    Bytes(Vec<u8>),
    /// An http(s) URL, a `data:` URL, or bare base64.
    Encoded(String),
}

impl From<PathBuf> for ImageInput {
    fn from(p: PathBuf) -> Self {
        ImageInput::Path(p)
    }
}

impl From<&Path> for ImageInput {
    fn from(p: &Path) -> Self {
        ImageInput::Path(p.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(b: Vec<u8>) -> Self {
        ImageInput::Bytes(b)
    }
}

impl From<&[u8]> for ImageInput {
    fn from(b: &[u8]) -> Self {
        ImageInput::Bytes(b.to_vec())
    }
}

impl From<String> for ImageInput {
    fn from(s: String) -> Self {
        ImageInput::Encoded(s)
    }
}

impl From<&str> for ImageInput {
    fn from(s: &str) -> Self {
        ImageInput::Encoded(s.to_string())
    }
}

/// A ready-to-embed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub media_type: Option<String>,
}

/// Resolves image inputs into embeddable references.
pub trait ImageResolver: Send + Sync {
    fn resolve(&self, input: &ImageInput) -> Result<ResolvedImage>;
}

/// Encodes local images as base64 `data:` URLs and passes remote URLs through.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataUrlResolver;

impl ImageResolver for DataUrlResolver {
    fn resolve(&self, input: &ImageInput) -> Result<ResolvedImage> {
        match input {
            ImageInput::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    Error::invalid_input_with_context(
                        format!("cannot read image file: {}", e),
                        context("image.path").with_details(path.display().to_string()),
                    )
                })?;
                let media_type = sniff_media_type(&bytes)
                    .or_else(|| guess_media_type(path))
                    .ok_or_else(|| {
                        Error::invalid_input_with_context(
                            "unsupported image format",
                            context("image.path").with_details(path.display().to_string()),
                        )
                    })?;
                Ok(encode(&bytes, media_type))
            }
            ImageInput::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::invalid_input_with_context(
                        "image buffer is empty",
                        context("image.bytes"),
                    ));
                }
                let media_type = sniff_media_type(bytes).ok_or_else(|| {
                    Error::invalid_input_with_context(
                        "unsupported image format",
                        context("image.bytes"),
                    )
                })?;
                Ok(encode(bytes, media_type))
            }
            ImageInput::Encoded(s) => resolve_encoded(s.trim()),
        }
    }
}

fn resolve_encoded(s: &str) -> Result<ResolvedImage> {
    if s.is_empty() {
        return Err(Error::invalid_input_with_context(
            "image reference is empty",
            context("image.encoded"),
        ));
    }
    if s.starts_with("http://") || s.starts_with("https://") {
        return Ok(ResolvedImage {
            url: s.to_string(),
            media_type: None,
        });
    }
    if let Some(rest) = s.strip_prefix("data:") {
        let (media_type, payload) = rest.split_once(";base64,").ok_or_else(|| {
            Error::invalid_input_with_context(
                "data URL must be base64 encoded",
                context("image.encoded"),
            )
        })?;
        if payload.is_empty() {
            return Err(Error::invalid_input_with_context(
                "data URL has no payload",
                context("image.encoded"),
            ));
        }
        return Ok(ResolvedImage {
            url: s.to_string(),
            media_type: Some(media_type.to_string()),
        });
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| {
            Error::invalid_input_with_context(
                "image reference is neither a URL nor valid base64",
                context("image.encoded").with_details(e.to_string()),
            )
        })?;
    let media_type = sniff_media_type(&bytes).ok_or_else(|| {
        Error::invalid_input_with_context("unsupported image format", context("image.encoded"))
    })?;
    Ok(ResolvedImage {
        url: format!("data:{};base64,{}", media_type, s),
        media_type: Some(media_type.to_string()),
    })
}

fn context(field: &str) -> ErrorContext {
    ErrorContext::new()
        .with_field_path(field)
        .with_source("image_resolver")
}

fn encode(bytes: &[u8], media_type: &str) -> ResolvedImage {
    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
    ResolvedImage {
        url: format!("data:{};base64,{}", media_type, data),
        media_type: Some(media_type.to_string()),
    }
}

/// Detect the image type from its magic bytes.
fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn guess_media_type(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    let mt = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_bytes_become_data_url() {
        let img = DataUrlResolver.resolve(&PNG_HEADER.into()).unwrap();
        assert!(img.url.starts_with("data:image/png;base64,"));
        assert_eq!(img.media_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_http_url_passes_through() {
        let img = DataUrlResolver
            .resolve(&"https://example.com/cat.jpg".into())
            .unwrap();
        assert_eq!(img.url, "https://example.com/cat.jpg");
        assert!(img.media_type.is_none());
    }

    #[test]
    fn test_data_url_passes_through() {
        let url = "data:image/jpeg;base64,/9j/4AAQ";
        let img = DataUrlResolver.resolve(&url.into()).unwrap();
        assert_eq!(img.url, url);
        assert_eq!(img.media_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_bare_base64_is_wrapped() {
        let b64 = base64::engine::general_purpose::STANDARD.encode(PNG_HEADER);
        let img = DataUrlResolver.resolve(&b64.clone().into()).unwrap();
        assert_eq!(img.url, format!("data:image/png;base64,{}", b64));
    }

    #[test]
    fn test_unsupported_inputs_are_invalid_input() {
        for input in [
            ImageInput::Bytes(vec![]),
            ImageInput::Bytes(b"plain text".to_vec()),
            ImageInput::Encoded("not base64 at all!".into()),
            ImageInput::Encoded("data:image/png,raw".into()),
            ImageInput::Encoded("   ".into()),
            ImageInput::Path(PathBuf::from("/definitely/not/here.png")),
        ] {
            let err = DataUrlResolver.resolve(&input).unwrap_err();
            assert!(
                matches!(err, Error::InvalidInput { .. }),
                "{:?} should be InvalidInput, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_file_path_is_read_and_encoded() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(PNG_HEADER).unwrap();
        let img = DataUrlResolver
            .resolve(&ImageInput::from(file.path()))
            .unwrap();
        assert!(img.url.starts_with("data:image/png;base64,"));
    }
}
