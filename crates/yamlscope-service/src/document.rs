//! Open documents tracked by the service.

use crate::types::{Position, Range};
use std::collections::HashMap;
use yamlscope_yaml::LineIndex;

/// A text buffer the host has opened, with its edit version.
#[derive(Debug, Clone)]
pub struct Document {
    uri: String,
    content: String,
    version: i32,
    line_index: LineIndex,
}

impl Document {
    pub fn new(uri: impl Into<String>, content: impl Into<String>, version: i32) -> Self {
        let content = content.into();
        Self {
            uri: uri.into(),
            line_index: LineIndex::new(&content),
            content,
            version,
        }
    }

    /// Get the document's URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Get the document's content.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Replace the content and bump to `version`.
    pub fn set_content(&mut self, content: impl Into<String>, version: i32) {
        self.content = content.into();
        self.line_index = LineIndex::new(&self.content);
        self.version = version;
    }

    /// Byte offset of `position`, clamped to the text.
    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index
            .offset_at(position.line as usize, position.character as usize)
    }

    /// Position of a byte offset, clamped to the text.
    pub fn position_at(&self, offset: usize) -> Position {
        let location = self.line_index.location_at(offset);
        Position::new(location.row as u32, location.column as u32)
    }

    /// Range covering `length` bytes from `offset`.
    pub fn range(&self, offset: usize, length: usize) -> Range {
        Range::new(self.position_at(offset), self.position_at(offset + length))
    }
}

/// In-memory store of open documents keyed by URI.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<String, Document>,
}

impl DocumentStore {
    /// Create a new empty document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or replace a document in the store.
    pub fn open(&mut self, uri: impl Into<String>, content: impl Into<String>, version: i32) {
        let uri = uri.into();
        self.documents
            .insert(uri.clone(), Document::new(uri, content, version));
    }

    /// Update a document's content. Returns false for unknown documents.
    pub fn change(&mut self, uri: &str, content: impl Into<String>, version: i32) -> bool {
        match self.documents.get_mut(uri) {
            Some(doc) => {
                doc.set_content(content, version);
                true
            }
            None => false,
        }
    }

    /// Close a document (remove from store).
    pub fn close(&mut self, uri: &str) -> Option<Document> {
        self.documents.remove(uri)
    }

    /// Get a document by URI.
    pub fn get(&self, uri: &str) -> Option<&Document> {
        self.documents.get(uri)
    }

    /// Get all document URIs.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(|s| s.as_str())
    }

    /// Check if a document is in the store.
    pub fn contains(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_and_offsets() {
        let doc = Document::new("file:///a.yaml", "a: 1\nbb: 22\n", 1);
        assert_eq!(doc.offset_at(Position::new(1, 4)), 9);
        assert_eq!(doc.position_at(9), Position::new(1, 4));
        assert_eq!(
            doc.range(9, 2),
            Range::new(Position::new(1, 4), Position::new(1, 6))
        );
        // Past the end of a line clamps to the line end
        assert_eq!(doc.offset_at(Position::new(0, 40)), 4);
    }

    #[test]
    fn test_store_lifecycle() {
        let mut store = DocumentStore::new();
        assert!(store.is_empty());

        store.open("a.yaml", "x: 1", 1);
        assert!(store.contains("a.yaml"));
        assert!(store.change("a.yaml", "x: 2\ny: 3", 2));
        assert!(!store.change("b.yaml", "", 1));

        let doc = store.get("a.yaml").unwrap();
        assert_eq!(doc.version(), 2);
        assert_eq!(doc.position_at(6), Position::new(1, 1));
        assert_eq!(store.uris().collect::<Vec<_>>(), vec!["a.yaml"]);

        assert!(store.close("a.yaml").is_some());
        assert_eq!(store.len(), 0);
    }
}
