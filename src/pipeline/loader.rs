//! Source text extraction from input files.
//!
//! The batch runner only sees [`TextExtractor`]; the shipped
//! [`PlainTextLoader`] handles `.txt` sources. Extractors for container
//! formats (PDF, RTF) implement the same trait and slot in without
//! touching the runner.

use std::path::Path;

use thiserror::Error;

use super::types::{RawDocument, SourceFormat};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Input file not found: {0}")]
    NotFound(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("Cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Turns one input file into a [`RawDocument`].
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<RawDocument, ExtractError>;
}

/// Extractor for plain-text sources. UTF-8 only; anything that does not
/// decode is reported rather than silently transcoded.
pub struct PlainTextLoader;

impl PlainTextLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for PlainTextLoader {
    fn extract(&self, path: &Path) -> Result<RawDocument, ExtractError> {
        let display = path.display().to_string();

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = SourceFormat::from_extension(ext)
            .ok_or_else(|| ExtractError::UnsupportedFormat(display.clone()))?;
        if format != SourceFormat::Txt {
            return Err(ExtractError::UnsupportedFormat(display));
        }

        if !path.exists() {
            return Err(ExtractError::NotFound(display));
        }

        let bytes = std::fs::read(path).map_err(|e| ExtractError::Decode {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let content = String::from_utf8(bytes).map_err(|e| ExtractError::Decode {
            path: display,
            reason: e.to_string(),
        })?;

        Ok(RawDocument::new(content, SourceFormat::Txt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_utf8_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Выписной эпикриз пациента.").unwrap();

        let doc = PlainTextLoader::new().extract(&path).unwrap();
        assert_eq!(doc.format, SourceFormat::Txt);
        assert_eq!(doc.content, "Выписной эпикриз пациента.");
        assert_eq!(doc.content_hash.len(), 64);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlainTextLoader::new()
            .extract(&dir.path().join("absent.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        std::fs::write(&path, "x").unwrap();
        let err = PlainTextLoader::new().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn container_formats_need_their_own_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, "%PDF-1.4").unwrap();
        let err = PlainTextLoader::new().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, [0xffu8, 0xfe, 0x41]).unwrap();
        let err = PlainTextLoader::new().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Decode { .. }));
    }
}
