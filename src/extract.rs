//! PDF text extraction.
//!
//! Extraction is CPU-bound and synchronous; callers on the async runtime
//! should run it under `spawn_blocking`.

use anyhow::Result;

/// Raw text and page count of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

/// Turns document bytes into raw text.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText>;
}

/// Extraction error. Never a panic; the caller decides whether to abort.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF text extraction failed: {0}")]
    Text(String),
    #[error("PDF structure could not be read: {0}")]
    Structure(String),
}

/// `pdf-extract` for text, `lopdf` for the page count.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Text(e.to_string()))?;
        let page_count = lopdf::Document::load_mem(bytes)
            .map_err(|e| ExtractError::Structure(e.to_string()))?
            .get_pages()
            .len();
        Ok(ExtractedText { text, page_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One-page PDF whose content stream draws `phrase` in Helvetica.
    fn single_page_pdf(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        let mut offsets = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        offsets.push(out.len());
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                stream.len(),
                stream
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in &offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn test_extracts_text_and_page_count() {
        let extracted = PdfExtractor
            .extract(&single_page_pdf("Prime the fluidics"))
            .unwrap();
        assert!(extracted.text.contains("Prime"));
        assert!(extracted.text.contains("fluidics"));
        assert_eq!(extracted.page_count, 1);
    }

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        let err = PdfExtractor.extract(b"definitely not a pdf").unwrap_err();
        assert!(err.to_string().contains("PDF"));
    }
}
