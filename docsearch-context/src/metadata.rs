//! Per-chunk metadata attached to every indexed passage.

use serde::{Deserialize, Serialize};

/// Metadata describing where a chunk came from.
///
/// The document-level fields (`source_file`, `file_type`, `file_path`) are shared by every
/// chunk of a file; `chunk_index` is the 0-based position of the chunk within that file and,
/// together with `source_file`, identifies the chunk inside a store. `date_year` and
/// `location` are optional attributes used for filtered search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// File name of the source document (e.g. `claims_1898.pdf`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Lower-case extension including the dot (e.g. `.pdf`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    /// Full path the document was read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Position of the chunk within its source file
    #[serde(default)]
    pub chunk_index: usize,
    /// Year mentioned in the chunk, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_year: Option<i32>,
    /// Place mentioned in the chunk, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ChunkMetadata {
    /// Metadata for a chunk of `source_file` at position `chunk_index`.
    pub fn for_source(source_file: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            source_file: Some(source_file.into()),
            chunk_index,
            ..Self::default()
        }
    }

    pub fn with_date_year(mut self, year: i32) -> Self {
        self.date_year = Some(year);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_fields_are_omitted() {
        let metadata = ChunkMetadata::for_source("a.pdf", 3);
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json, serde_json::json!({"source_file": "a.pdf", "chunk_index": 3}));
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let metadata: ChunkMetadata =
            serde_json::from_str(r#"{"source_file": "b.docx", "date_year": 1901}"#).unwrap();

        assert_eq!(metadata.source_file.as_deref(), Some("b.docx"));
        assert_eq!(metadata.chunk_index, 0);
        assert_eq!(metadata.date_year, Some(1901));
        assert_eq!(metadata.location, None);
    }
}
