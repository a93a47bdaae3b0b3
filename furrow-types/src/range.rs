use serde::{Deserialize, Serialize};

/// Absolute position or duration in sample frames.
pub type Frame = u64;

/// Timing record of one placed object.
///
/// `start` is the absolute timeline position, `offset` the trim into the
/// underlying source, `length` the span on the timeline. Point-like objects
/// (control points) use a zero length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Frame,
    pub offset: Frame,
    pub length: Frame,
}

impl Range {
    pub fn new(start: Frame, offset: Frame, length: Frame) -> Self {
        Self {
            start,
            offset,
            length,
        }
    }

    /// A zero-length range at `start`.
    pub fn at(start: Frame) -> Self {
        Self {
            start,
            offset: 0,
            length: 0,
        }
    }

    pub fn end(&self) -> Frame {
        self.start.saturating_add(self.length)
    }

    /// Inclusive on both ends, so ranges that merely touch overlap.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start <= other.end() && other.start <= self.end()
    }

    pub fn contains(&self, frame: Frame) -> bool {
        frame >= self.start && frame <= self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_ranges_overlap() {
        let a = Range::new(0, 0, 100);
        let b = Range::new(100, 0, 50);
        let c = Range::new(151, 0, 10);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!b.overlaps(&c));
    }

    #[test]
    fn point_range_contains_only_itself() {
        let p = Range::at(480);
        assert!(p.contains(480));
        assert!(!p.contains(479));
        assert!(!p.contains(481));
        assert_eq!(p.end(), 480);
    }
}
