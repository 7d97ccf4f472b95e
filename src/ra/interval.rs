// This module implements LiveInterval, the lifetime of a value over the function-wide
// instruction numbering. An interval is a sorted list of disjoint half-open ranges
// [begin, end); touching or overlapping ranges are merged on insertion so the list is
// always in minimal form. Extending with an already covered range is a no-op and
// unify is commutative, which lets coalescing merge classes in any order.

//! Live intervals as sorted disjoint ranges.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub begin: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveInterval {
    ranges: Vec<Range>,
}

impl LiveInterval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ranges(ranges: &[(u32, u32)]) -> Self {
        let mut li = Self::new();
        for &(b, e) in ranges {
            li.extend(b, e);
        }
        li
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Add `[begin, end)`, merging with any range it touches.
    pub fn extend(&mut self, begin: u32, end: u32) {
        if begin >= end {
            return;
        }
        // First range that ends at or after `begin`.
        let first = self.ranges.partition_point(|r| r.end < begin);
        // First range that starts after `end`.
        let last = self.ranges.partition_point(|r| r.begin <= end);
        if first == last {
            self.ranges.insert(first, Range { begin, end });
            return;
        }
        let merged = Range {
            begin: begin.min(self.ranges[first].begin),
            end: end.max(self.ranges[last - 1].end),
        };
        self.ranges.splice(first..last, std::iter::once(merged));
    }

    /// First covered point, or 0 when empty.
    pub fn begin(&self) -> u32 {
        self.ranges.first().map_or(0, |r| r.begin)
    }

    /// One past the last covered point, or 0 when empty.
    pub fn end(&self) -> u32 {
        self.ranges.last().map_or(0, |r| r.end)
    }

    pub fn contains(&self, point: u32) -> bool {
        let idx = self.ranges.partition_point(|r| r.end <= point);
        self.ranges.get(idx).is_some_and(|r| r.begin <= point)
    }

    pub fn overlaps(&self, other: &LiveInterval) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a, b) = (self.ranges[i], other.ranges[j]);
            if a.begin < b.end && b.begin < a.end {
                return true;
            }
            if a.end <= b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    /// Merge all ranges of `other` into `self`.
    pub fn unify(&mut self, other: &LiveInterval) {
        for r in &other.ranges {
            self.extend(r.begin, r.end);
        }
    }
}

impl fmt::Display for LiveInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return f.write_str("(empty)");
        }
        for (n, r) in self.ranges.iter().enumerate() {
            if n > 0 {
                f.write_str(" ")?;
            }
            write!(f, "[{}, {})", r.begin, r.end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_merges_touching_ranges() {
        let mut li = LiveInterval::new();
        li.extend(10, 12);
        li.extend(0, 5);
        li.extend(5, 8);
        assert_eq!(li.ranges().len(), 2);
        assert_eq!(li.to_string(), "[0, 8) [10, 12)");

        li.extend(7, 11);
        assert_eq!(li.to_string(), "[0, 12)");
        // already covered
        li.extend(2, 3);
        assert_eq!(li.ranges().len(), 1);
        // empty ranges are ignored
        li.extend(20, 20);
        assert_eq!(li.end(), 12);
    }

    #[test]
    fn test_contains_after_extend() {
        let li = LiveInterval::from_ranges(&[(3, 6), (9, 10)]);
        for x in 3..6 {
            assert!(li.contains(x));
        }
        assert!(!li.contains(6));
        assert!(!li.contains(2));
        assert!(li.contains(9));
        assert!(!li.contains(10));
        assert_eq!((li.begin(), li.end()), (3, 10));
    }

    #[test]
    fn test_overlaps_half_open() {
        let a = LiveInterval::from_ranges(&[(0, 5)]);
        let b = LiveInterval::from_ranges(&[(5, 10)]);
        let c = LiveInterval::from_ranges(&[(2, 3), (8, 12)]);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(b.overlaps(&c));
        assert!(!a.overlaps(&LiveInterval::new()));
    }

    #[test]
    fn test_unify_is_commutative() {
        let a = LiveInterval::from_ranges(&[(0, 2), (6, 7)]);
        let b = LiveInterval::from_ranges(&[(1, 4), (9, 11)]);
        let mut ab = a.clone();
        ab.unify(&b);
        let mut ba = b.clone();
        ba.unify(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "[0, 4) [6, 7) [9, 11)");
    }
}
