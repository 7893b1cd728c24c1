use std::fmt;

/// A span of file data read at a known offset.
///
/// Chunks are moved, never cloned, from the reader through the channel into
/// the part builder.
#[derive(Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in the file's chunk sequence (0-based).
    pub sequence_index: u64,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data. Never empty.
    pub data: Vec<u8>,
    /// `true` for the final chunk of the file.
    pub is_last: bool,
}

impl Chunk {
    /// Number of bytes carried by this chunk.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Returns the range covering `len` bytes starting at `start`.
    ///
    /// Returns `None` for an empty span, which has no inclusive end.
    pub fn from_span(start: u64, len: u64) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Some(Self {
            start,
            end: start + len - 1,
        })
    }

    /// Number of bytes covered.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always `false`; a `ByteRange` covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_from_span_is_inclusive() {
        let r = ByteRange::from_span(0, 1024).unwrap();
        assert_eq!(r.start, 0);
        assert_eq!(r.end, 1023);
        assert_eq!(r.len(), 1024);
        assert_eq!(r.to_string(), "0-1023");
    }

    #[test]
    fn single_byte_range() {
        let r = ByteRange::from_span(4, 1).unwrap();
        assert_eq!(r.to_string(), "4-4");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn empty_span_has_no_range() {
        assert!(ByteRange::from_span(10, 0).is_none());
    }

    #[test]
    fn ranges_order_by_start() {
        let mut ranges = [
            ByteRange::from_span(8, 2).unwrap(),
            ByteRange::from_span(0, 4).unwrap(),
            ByteRange::from_span(4, 4).unwrap(),
        ];
        ranges.sort();
        let starts: Vec<u64> = ranges.iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![0, 4, 8]);
    }
}
