//! Closed element-index intervals.

use std::fmt;

use serde::Serialize;

/// Width of one array element in bytes.
pub const ELEMENT_WIDTH: u64 = std::mem::size_of::<u64>() as u64;

/// Closed range `[lo, hi]` of element indices that may still hold the target.
///
/// An empty range is not representable: narrowing past it yields
/// [`Narrowing::Exhausted`](crate::narrower::Narrowing::Exhausted) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchInterval {
    /// Lowest candidate index.
    pub lo: u64,
    /// Highest candidate index.
    pub hi: u64,
}

impl SearchInterval {
    /// Create an interval. `lo` must not exceed `hi`.
    pub fn new(lo: u64, hi: u64) -> Self {
        debug_assert!(lo <= hi, "empty interval [{lo}, {hi}]");
        Self { lo, hi }
    }

    /// Interval covering an array of `len` elements, or `None` when `len == 0`.
    pub fn full(len: u64) -> Option<Self> {
        len.checked_sub(1).map(|hi| Self::new(0, hi))
    }

    /// Build an interval from possibly crossed bounds.
    pub fn checked(lo: u64, hi: u64) -> Option<Self> {
        (lo <= hi).then_some(Self { lo, hi })
    }

    /// `hi - lo`, the quantity every threshold compares against.
    pub fn span(&self) -> u64 {
        self.hi - self.lo
    }

    /// Number of elements in the interval.
    pub fn len(&self) -> u64 {
        self.span() + 1
    }

    /// Always false; present for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if `index` lies inside the interval.
    pub fn contains(&self, index: u64) -> bool {
        self.lo <= index && index <= self.hi
    }

    /// Byte offset of the first element.
    pub fn byte_start(&self) -> u64 {
        self.lo * ELEMENT_WIDTH
    }

    /// Byte length covered by the interval.
    pub fn byte_len(&self) -> u64 {
        self.len() * ELEMENT_WIDTH
    }
}

impl fmt::Display for SearchInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_interval() {
        assert_eq!(SearchInterval::full(0), None);
        assert_eq!(SearchInterval::full(1), Some(SearchInterval::new(0, 0)));
        assert_eq!(SearchInterval::full(10), Some(SearchInterval::new(0, 9)));
    }

    #[test]
    fn test_checked() {
        assert_eq!(SearchInterval::checked(5, 4), None);
        assert_eq!(SearchInterval::checked(4, 4), Some(SearchInterval::new(4, 4)));
    }

    #[test]
    fn test_span_and_len() {
        let iv = SearchInterval::new(10, 19);
        assert_eq!(iv.span(), 9);
        assert_eq!(iv.len(), 10);
        assert!(!iv.is_empty());
        assert!(iv.contains(10));
        assert!(iv.contains(19));
        assert!(!iv.contains(20));
    }

    #[test]
    fn test_byte_range() {
        let iv = SearchInterval::new(2, 5);
        assert_eq!(iv.byte_start(), 16);
        assert_eq!(iv.byte_len(), 32);
    }

    #[test]
    fn test_display() {
        assert_eq!(SearchInterval::new(1, 7).to_string(), "[1, 7]");
    }
}
