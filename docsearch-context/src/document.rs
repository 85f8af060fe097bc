//! Text extraction from PDF and DOCX documents.
//!
//! Only two formats are accepted, detected by extension (case-insensitive):
//!
//! - **PDF**: page text via `pdf-extract`
//! - **DOCX**: paragraphs of `word/document.xml` read from the zip container
//!
//! Everything else is rejected with [`ContextError::UnsupportedFormat`] so the ingestion loop
//! can log and skip the file.

use crate::error::{ContextError, Result};
use crate::metadata::ChunkMetadata;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Runs of a paragraph's text: `<w:t>` (text) and `<w:tab/>` elements.
static DOCX_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>").expect("valid docx run pattern")
});

/// Paragraph boundaries in `word/document.xml`.
static DOCX_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("valid docx paragraph pattern")
});

/// Document formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Detect the format from the path's extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => Err(ContextError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: if extension.is_empty() {
                    "<none>".to_string()
                } else {
                    format!(".{extension}")
                },
            }),
        }
    }

    /// The `file_type` value recorded in chunk metadata.
    pub fn file_type(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
        }
    }

    /// Whether `path` looks like a document this crate can extract.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }
}

/// Read the document at `path` and return its plain text.
///
/// This is blocking IO plus CPU-bound parsing; async callers should run it on a blocking
/// task.
pub fn extract_text(path: &Path) -> Result<String> {
    let format = DocumentFormat::from_path(path)?;
    let text = match format {
        DocumentFormat::Pdf => extract_pdf(path)?,
        DocumentFormat::Docx => extract_docx(path)?,
    };

    tracing::debug!(
        "Extracted {} characters from {}",
        text.len(),
        path.display()
    );
    Ok(text)
}

/// Document-level metadata shared by every chunk of `path`.
pub fn source_metadata(path: &Path) -> Result<ChunkMetadata> {
    let format = DocumentFormat::from_path(path)?;
    let source_file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ContextError::extraction(path, "path has no file name"))?;

    Ok(ChunkMetadata {
        source_file: Some(source_file),
        file_type: Some(format.file_type().to_string()),
        file_path: Some(path.to_string_lossy().into_owned()),
        ..ChunkMetadata::default()
    })
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| ContextError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_pdf(path: &Path) -> Result<String> {
    let bytes = read_bytes(path)?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ContextError::extraction(path, e))
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|source| ContextError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| ContextError::extraction(path, e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| ContextError::extraction(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| ContextError::extraction(path, e))?;

    Ok(docx_xml_to_text(&xml))
}

/// Flatten WordprocessingML into text, one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> String {
    let mut paragraphs = Vec::new();

    for paragraph in DOCX_PARAGRAPH.captures_iter(xml) {
        let mut line = String::new();
        for run in DOCX_RUN.captures_iter(&paragraph[1]) {
            match run.get(1) {
                Some(text) => line.push_str(&decode_xml_entities(text.as_str())),
                None => line.push('\t'),
            }
        }
        paragraphs.push(line);
    }

    paragraphs.join("\n")
}

fn decode_xml_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let Some(semi) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };

        let entity = &tail[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=semi]),
        }
        rest = &tail[semi + 1..];
    }
    out.push_str(rest);
    out
}
