//! Parsed documents and multi-document streams.

use crate::YamlNode;
use serde::{Deserialize, Serialize};

/// Severity of a parser-level problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemSeverity {
    Error,
    Warning,
}

/// A problem found while parsing, anchored at a byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub offset: usize,
    pub length: usize,
    pub message: String,
    pub severity: ProblemSeverity,
}

impl Problem {
    pub fn error(offset: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            message: message.into(),
            severity: ProblemSeverity::Error,
        }
    }

    pub fn warning(offset: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            message: message.into(),
            severity: ProblemSeverity::Warning,
        }
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.length
    }
}

/// One YAML document of a possibly multi-document buffer.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub(crate) root: Option<YamlNode>,
    pub(crate) errors: Vec<Problem>,
    pub(crate) warnings: Vec<Problem>,
}

impl ParsedDocument {
    pub fn new(root: Option<YamlNode>) -> Self {
        Self {
            root,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Root node, `None` for an empty document or one that failed to parse.
    pub fn root(&self) -> Option<&YamlNode> {
        self.root.as_ref()
    }

    /// Syntax errors.
    pub fn errors(&self) -> &[Problem] {
        &self.errors
    }

    /// Non-fatal findings such as unresolved tags.
    pub fn warnings(&self) -> &[Problem] {
        &self.warnings
    }

    pub fn push_error(&mut self, problem: Problem) {
        self.errors.push(problem);
    }

    pub fn push_warning(&mut self, problem: Problem) {
        self.warnings.push(problem);
    }

    /// Innermost node containing `offset`.
    pub fn node_at_offset(&self, offset: usize) -> Option<&YamlNode> {
        self.root.as_ref()?.node_at_offset(offset)
    }

    /// Whether `offset` lies within the root node's range.
    pub fn contains(&self, offset: usize) -> bool {
        self.root.as_ref().is_some_and(|root| root.contains(offset))
    }
}

/// Ordered sequence of the documents in one buffer.
#[derive(Debug, Clone, Default)]
pub struct DocumentStream {
    documents: Vec<ParsedDocument>,
}

impl DocumentStream {
    pub fn new(documents: Vec<ParsedDocument>) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &[ParsedDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParsedDocument> {
        self.documents.iter()
    }

    /// The first document whose root range contains `offset`, with its index.
    pub fn document_at_offset(&self, offset: usize) -> Option<(usize, &ParsedDocument)> {
        self.documents
            .iter()
            .enumerate()
            .find(|(_, doc)| doc.contains(offset))
    }
}

impl<'a> IntoIterator for &'a DocumentStream {
    type Item = &'a ParsedDocument;
    type IntoIter = std::slice::Iter<'a, ParsedDocument>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
