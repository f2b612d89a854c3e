use serde::{Deserialize, Serialize};

/// One indexed unit of document text with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub text: String,
    /// File name (or other label) of the originating document
    pub source_name: String,
    /// Lowercase extension including the dot, e.g. ".md"; empty when unknown
    pub file_type: String,
    /// Offset in characters of `text` within the source document
    pub char_offset: usize,
}

impl Passage {
    pub fn new(
        text: impl Into<String>,
        source_name: impl Into<String>,
        file_type: impl Into<String>,
        char_offset: usize,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            source_name: source_name.into(),
            file_type: file_type.into(),
            char_offset,
        }
    }
}

/// A search hit. `score` is cosine similarity, higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub passage: Passage,
    pub score: f32,
}

/// Raw document text handed over by a document source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub source_name: String,
    pub file_type: String,
}

impl SourceDocument {
    /// Build a document, deriving `file_type` from the extension of `source_name`.
    pub fn new(text: impl Into<String>, source_name: impl Into<String>) -> Self {
        let source_name = source_name.into();
        let file_type = file_type_of(&source_name);
        Self {
            text: text.into(),
            source_name,
            file_type,
        }
    }
}

pub(crate) fn file_type_of(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_is_lowercase_with_dot() {
        assert_eq!(file_type_of("Handbook.MD"), ".md");
        assert_eq!(file_type_of("notes.txt"), ".txt");
        assert_eq!(file_type_of("README"), "");
    }

    #[test]
    fn passages_get_unique_ids() {
        let a = Passage::new("x", "a.txt", ".txt", 0);
        let b = Passage::new("x", "a.txt", ".txt", 0);
        assert_ne!(a.id, b.id);
    }
}
