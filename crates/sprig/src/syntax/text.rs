use serde::{Deserialize, Serialize};
use std::fmt;

/// Text size in bytes (UTF-8)
///
/// Offsets are 32-bit, so trees address at most 4 GiB of text. Larger
/// offsets saturate at `u32::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextSize(u32);

/// Half-open byte range `[start, end)` in the parsed text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    start: TextSize,
    end: TextSize,
}

impl TextSize {
    #[must_use]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn to_usize(self) -> usize {
        self.0 as usize
    }

    /// Converts a byte offset, saturating at `u32::MAX`.
    ///
    /// Nodes past the 4 GiB limit all report that limit as their offset.
    #[must_use]
    pub fn of(offset: usize) -> Self {
        Self(u32::try_from(offset).unwrap_or(u32::MAX))
    }
}

impl From<u32> for TextSize {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

impl From<TextSize> for u32 {
    fn from(size: TextSize) -> Self {
        size.0
    }
}

impl From<TextSize> for usize {
    fn from(size: TextSize) -> Self {
        size.0 as Self
    }
}

impl std::ops::Add<Self> for TextSize {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign<Self> for TextSize {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub<Self> for TextSize {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for TextSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TextRange {
    #[must_use]
    pub const fn new(start: TextSize, end: TextSize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn at(start: TextSize, len: TextSize) -> Self {
        Self::new(start, TextSize(start.0 + len.0))
    }

    /// Zero-width range at `offset`
    #[must_use]
    pub const fn empty(offset: TextSize) -> Self {
        Self::new(offset, offset)
    }

    /// Builds a range from byte offsets, saturating at `u32::MAX`.
    #[must_use]
    pub fn from_offsets(start: usize, end: usize) -> Self {
        Self::new(TextSize::of(start), TextSize::of(end))
    }

    #[must_use]
    pub const fn start(self) -> TextSize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> TextSize {
        self.end
    }

    #[must_use]
    pub const fn len(self) -> TextSize {
        TextSize(self.end.0 - self.start.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    #[must_use]
    pub const fn contains(self, offset: TextSize) -> bool {
        offset.0 >= self.start.0 && offset.0 < self.end.0
    }

    #[must_use]
    pub const fn contains_range(self, other: Self) -> bool {
        other.start.0 >= self.start.0 && other.end.0 <= self.end.0
    }

    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let start = self.start.0.max(other.start.0);
        let end = self.end.0.min(other.end.0);

        if start < end {
            Some(Self::new(TextSize(start), TextSize(end)))
        } else {
            None
        }
    }

    /// The range as `start..end` byte offsets, for slicing the source.
    #[must_use]
    pub const fn to_range(self) -> std::ops::Range<usize> {
        self.start.0 as usize..self.end.0 as usize
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.0, self.end.0)
    }
}

#[cfg(feature = "diagnostics")]
impl From<TextRange> for miette::SourceSpan {
    fn from(range: TextRange) -> Self {
        use miette::SourceOffset;
        Self::new(
            SourceOffset::from(range.start().to_usize()),
            range.len().to_usize(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_saturate_at_the_limit() {
        assert_eq!(TextSize::of(7).raw(), 7);
        assert_eq!(TextSize::of(u32::MAX as usize).raw(), u32::MAX);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(TextSize::of(u32::MAX as usize + 1).raw(), u32::MAX);
    }

    #[test]
    fn test_text_size_conversions() {
        let size = TextSize::from(42);
        assert_eq!(u32::from(size), 42);
        assert_eq!(usize::from(size), 42);
        assert_eq!(TextSize::of(usize::MAX), TextSize::new(u32::MAX));
    }

    #[test]
    fn test_text_size_arithmetic() {
        let mut a = TextSize::from(10);
        a += TextSize::from(5);
        assert_eq!(a.raw(), 15);
        assert_eq!((a - TextSize::from(3)).raw(), 12);
        assert_eq!((a + TextSize::zero()).raw(), 15);
    }

    #[test]
    fn test_text_range_at_and_len() {
        let range = TextRange::at(TextSize::from(10), TextSize::from(5));
        assert_eq!(range.start().raw(), 10);
        assert_eq!(range.end().raw(), 15);
        assert_eq!(range.len().raw(), 5);
        assert!(!range.is_empty());
        assert!(TextRange::empty(TextSize::from(3)).is_empty());
    }

    #[test]
    fn test_text_range_contains() {
        let range = TextRange::from_offsets(10, 20);
        assert!(range.contains(TextSize::from(10)));
        assert!(range.contains(TextSize::from(19)));
        assert!(!range.contains(TextSize::from(20)));
        assert!(range.contains_range(TextRange::from_offsets(12, 20)));
        assert!(!range.contains_range(TextRange::from_offsets(5, 12)));
    }

    #[test]
    fn test_text_range_intersect() {
        let a = TextRange::from_offsets(10, 20);
        let b = TextRange::from_offsets(15, 25);
        assert_eq!(a.intersect(b), Some(TextRange::from_offsets(15, 20)));
        assert_eq!(a.intersect(TextRange::from_offsets(20, 30)), None);
    }

    #[test]
    fn test_text_range_display_and_slice() {
        let range = TextRange::from_offsets(2, 5);
        assert_eq!(range.to_string(), "2..5");
        assert_eq!(&"abcdefg"[range.to_range()], "cde");
    }
}
