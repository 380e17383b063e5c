//! Byte offset <-> row/column conversion

use serde::{Deserialize, Serialize};

/// A location in source text (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Row number (0-indexed)
    pub row: usize,
    /// Column number (0-indexed, in bytes)
    pub column: usize,
}

/// Line-break index of a text buffer.
///
/// Stores the byte offset of every newline so that offset to (row, column)
/// conversion is a binary search instead of a rescan of the buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineIndex {
    /// Byte offsets of each newline character
    line_breaks: Vec<usize>,

    /// Total length of the text in bytes
    total_length: usize,
}

impl LineIndex {
    /// Build the index by scanning `content` once.
    ///
    /// # Example
    ///
    /// ```
    /// use yamlscope_yaml::LineIndex;
    ///
    /// let index = LineIndex::new("hello\nworld");
    /// let loc = index.offset_to_location(6).unwrap();
    /// assert_eq!(loc.row, 1);
    /// assert_eq!(loc.column, 0);
    /// ```
    pub fn new(content: &str) -> Self {
        let line_breaks: Vec<usize> = content
            .bytes()
            .enumerate()
            .filter_map(|(idx, b)| if b == b'\n' { Some(idx) } else { None })
            .collect();

        LineIndex {
            line_breaks,
            total_length: content.len(),
        }
    }

    /// Convert a byte offset to a Location with row and column.
    ///
    /// Returns None if the offset is out of bounds.
    pub fn offset_to_location(&self, offset: usize) -> Option<Location> {
        if offset > self.total_length {
            return None;
        }

        // A newline belongs to the line it terminates, so an exact hit keeps
        // the same row index as a miss would.
        let row = match self.line_breaks.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx,
        };

        let column = offset - self.line_start(row);

        Some(Location {
            offset,
            row,
            column,
        })
    }

    /// Like [`offset_to_location`](Self::offset_to_location) but clamps
    /// out-of-range offsets to the end of the text.
    pub fn location_at(&self, offset: usize) -> Location {
        let clamped = offset.min(self.total_length);
        match self.offset_to_location(clamped) {
            Some(loc) => loc,
            None => Location {
                offset: clamped,
                row: 0,
                column: clamped,
            },
        }
    }

    /// Convert a (row, column) pair back to a byte offset.
    ///
    /// Rows past the end clamp to the end of the text, columns past the end
    /// of their line clamp to the line end.
    pub fn offset_at(&self, row: usize, column: usize) -> usize {
        if row > self.line_breaks.len() {
            return self.total_length;
        }
        let start = self.line_start(row);
        let end = self
            .line_breaks
            .get(row)
            .copied()
            .unwrap_or(self.total_length);
        (start + column).min(end)
    }

    /// Get the total length of the text in bytes
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Get the number of lines in the text
    pub fn line_count(&self) -> usize {
        self.line_breaks.len() + 1
    }

    fn line_start(&self, row: usize) -> usize {
        if row == 0 {
            0
        } else {
            self.line_breaks[row - 1] + 1
        }
    }
}
