use std::path::Path;

use crate::error::{Error, Result};

/// The raw material the rest of the pipeline works from.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    /// Concatenated text of every page.
    pub full_text: String,
    /// Text of each page, in order. May be a single element when the
    /// backend cannot split pages.
    pub pages: Vec<String>,
    /// Title candidate from embedded document metadata, when available.
    pub title_hint: Option<String>,
    /// Author candidates from embedded document metadata, when available.
    pub author_hints: Vec<String>,
    /// Subject line from embedded document metadata, when available.
    pub subject_hint: Option<String>,
}

/// Turns raw file bytes into text. Implementations are opaque to the
/// pipeline; failures surface as [`Error::ExtractionFailed`] and are
/// attributed to the offending file only.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedDocument>;

    /// File extensions (lower-case, no dot) this extractor accepts.
    /// Discovery filters the input directory against this list.
    fn extensions(&self) -> &[&str];
}

/// PDF text extraction via `pdf-extract`.
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        // pdf-extract separates pages with form feeds.
        let pages: Vec<String> = text
            .split('\x0C')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.is_empty() {
            return Err(Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: "document contains no extractable text".into(),
            });
        }

        let full_text = pages.join("\n\n");

        Ok(ExtractedDocument {
            full_text,
            pages,
            title_hint: None,
            author_hints: Vec::new(),
            subject_hint: None,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

/// Strict UTF-8 plain-text extraction, for text corpora and offline tests.
///
/// Rejects non-UTF-8 input, so a corrupt blob renamed to `.txt` still
/// classifies as `ExtractionFailed` instead of poisoning the graph.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedDocument> {
        let text =
            std::str::from_utf8(bytes).map_err(|e| Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: format!("not valid UTF-8: {e}"),
            })?;

        if text.trim().is_empty() {
            return Err(Error::ExtractionFailed {
                path: path.to_path_buf(),
                reason: "document contains no extractable text".into(),
            });
        }

        Ok(ExtractedDocument {
            full_text: text.to_string(),
            pages: vec![text.to_string()],
            title_hint: None,
            author_hints: Vec::new(),
            subject_hint: None,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["txt"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_roundtrip() {
        let doc = PlainTextExtractor
            .extract(Path::new("a.txt"), b"Attention Is All You Need\n")
            .unwrap();
        assert!(doc.full_text.contains("Attention"));
        assert_eq!(doc.pages.len(), 1);
    }

    #[test]
    fn plain_text_rejects_invalid_utf8() {
        let err = PlainTextExtractor
            .extract(Path::new("bad.txt"), &[0xff, 0xfe, 0x00, 0x41])
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn plain_text_rejects_empty() {
        let err = PlainTextExtractor
            .extract(Path::new("empty.txt"), b"   \n  ")
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn pdf_rejects_garbage() {
        let err = PdfExtractor
            .extract(Path::new("bad.pdf"), b"this is not a pdf")
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }
}
