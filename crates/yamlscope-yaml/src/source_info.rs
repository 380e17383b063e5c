//! Source location information for YAML nodes.

use serde::{Deserialize, Serialize};

/// Source location information for a YAML node.
///
/// Tracks the byte range of a YAML element in the original buffer, plus the
/// 0-based row/column of its start for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Byte offset from start of the buffer (0-based)
    pub offset: usize,

    /// Length in bytes
    pub len: usize,

    /// Row of the start position (0-based)
    pub row: usize,

    /// Column of the start position (0-based, in bytes)
    pub column: usize,
}

impl SourceInfo {
    /// Create a new SourceInfo with all fields specified.
    pub fn new(offset: usize, len: usize, row: usize, column: usize) -> Self {
        Self {
            offset,
            len,
            row,
            column,
        }
    }

    /// Get the end offset (exclusive) of this location.
    pub fn end_offset(&self) -> usize {
        self.offset + self.len
    }

    /// Whether `offset` falls inside this range.
    ///
    /// The end is inclusive so that a cursor placed right after a scalar
    /// still counts as being "on" it.
    pub fn contains(&self, offset: usize) -> bool {
        self.offset <= offset && offset <= self.end_offset()
    }

    /// Span from the start of `self` to the end of `other`.
    pub fn to(&self, other: &SourceInfo) -> SourceInfo {
        let end = other.end_offset().max(self.end_offset());
        SourceInfo {
            offset: self.offset,
            len: end - self.offset,
            row: self.row,
            column: self.column,
        }
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self {
            offset: 0,
            len: 0,
            row: 0,
            column: 0,
        }
    }
}
