//! Document ingestion shim — the one trivial `(bytes, content_type)` case a
//! core library can own without pulling in a PDF/Office parser.
//!
//! `detect_document` takes already-extracted `text` at the core boundary;
//! document parsing proper (PDF, `.docx`, OCR) is out of scope and is the
//! embedding application's job. This module supplies only the `text/plain`
//! case — interpreting raw bytes as UTF-8 (lossy) — since that much requires
//! no parser at all.

use thiserror::Error;

/// A content type this shim does not know how to turn into text.
///
/// Private to this shim, not part of the core §7 error taxonomy: an
/// embedding application is expected to pre-extract text for anything beyond
/// plain text and call `detect_document`'s text-accepting entry point
/// directly.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported document content type: {content_type:?}")]
pub struct UnsupportedContentType {
    /// The content type that was rejected.
    pub content_type: String,
}

/// Extract text from `bytes` declared as `content_type`.
///
/// Only `text/plain` (and `text/plain; charset=...` variants) is supported
/// here; bytes are decoded UTF-8-lossy, matching how an edge layer would
/// hand raw uploaded text through. Any other content type is rejected —
/// the embedding application must pre-extract text for PDF/Office/image
/// uploads before calling `detect_document`.
///
/// # Errors
///
/// Returns [`UnsupportedContentType`] for any content type other than
/// `text/plain`.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, UnsupportedContentType> {
    let mime = content_type.split(';').next().unwrap_or(content_type).trim();
    if mime.eq_ignore_ascii_case("text/plain") {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    } else {
        Err(UnsupportedContentType {
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_decodes() {
        let text = extract_text("hello world".as_bytes(), "text/plain").unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn charset_suffix_is_tolerated() {
        let text = extract_text("hello".as_bytes(), "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn invalid_utf8_is_replaced_lossily_not_rejected() {
        let bytes = [0x68, 0x65, 0xFF, 0x6C, 0x6F];
        let text = extract_text(&bytes, "text/plain").unwrap();
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn unsupported_content_type_is_rejected() {
        let err = extract_text(b"%PDF-1.4", "application/pdf").unwrap_err();
        assert_eq!(err.content_type, "application/pdf");
    }
}
