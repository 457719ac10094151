//! Upload classification and per-format extraction helpers

pub mod pdf;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Image,
    PlainText,
    Unsupported,
}

impl DocumentKind {
    /// Classify an upload by its leading bytes, using the declared MIME type
    /// only to recognize plain text
    pub fn detect(data: &[u8], content_type: Option<&str>) -> Self {
        if data.starts_with(b"%PDF-") {
            return Self::Pdf;
        }

        let mime = content_type
            .map(|m| m.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .unwrap_or_default();
        // Some image magics ("BM", "P1".."P7") are also plausible text openings
        if mime.starts_with("text/") && looks_like_text(data) {
            return Self::PlainText;
        }
        if image::guess_format(data).is_ok() {
            return Self::Image;
        }

        let undeclared = mime.is_empty() || mime == "application/octet-stream";
        if undeclared && looks_like_text(data) {
            Self::PlainText
        } else {
            Self::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Formats accepted for recognition or extraction
pub fn supported_formats() -> Vec<String> {
    [
        "application/pdf",
        "image/png",
        "image/jpeg",
        "image/gif",
        "image/bmp",
        "image/webp",
        "image/tiff",
        "text/plain",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn looks_like_text(data: &[u8]) -> bool {
    !data.is_empty() && !data.contains(&0) && std::str::from_utf8(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{self, PixelBuffer};
    use image::ImageFormat;

    #[test]
    fn test_detects_pdf_by_magic() {
        assert_eq!(
            DocumentKind::detect(b"%PDF-1.7\n...", Some("application/octet-stream")),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn test_detects_image_regardless_of_mime() {
        let png = buffer::encode(&PixelBuffer::filled(4, 4, 200), ImageFormat::Png).unwrap();
        assert_eq!(DocumentKind::detect(&png, Some("text/plain")), DocumentKind::Image);
    }

    #[test]
    fn test_plain_text_needs_text_or_missing_mime() {
        let text = "مرحبا hello".as_bytes();
        assert_eq!(DocumentKind::detect(text, Some("text/plain; charset=utf-8")), DocumentKind::PlainText);
        assert_eq!(DocumentKind::detect(text, None), DocumentKind::PlainText);
        assert_eq!(
            DocumentKind::detect(text, Some("application/vnd.ms-excel")),
            DocumentKind::Unsupported
        );
    }

    #[test]
    fn test_declared_text_wins_over_image_magic() {
        assert_eq!(
            DocumentKind::detect(b"BMW service record", Some("text/plain")),
            DocumentKind::PlainText
        );
    }

    #[test]
    fn test_docx_is_unsupported() {
        let zip = b"PK\x03\x04\x14\x00\x06\x00\x08\x00\x00\x00!\x00";
        let mime = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
        assert_eq!(DocumentKind::detect(zip, Some(mime)), DocumentKind::Unsupported);
    }

    #[test]
    fn test_empty_upload_is_unsupported() {
        assert_eq!(DocumentKind::detect(b"", None), DocumentKind::Unsupported);
    }
}
