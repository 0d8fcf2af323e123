use std::fmt;
use std::ops::Range;

/// A contiguous row range `[begin, end)` of the row-partitioned inputs.
///
/// `index` is the task's position in the partitioner's row order, so tasks
/// compare and sort by where their rows land in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    pub index: usize,
    pub begin: usize,
    pub end: usize,
}

impl Task {
    pub fn new(index: usize, begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { index, begin, end }
    }

    pub fn rows(&self) -> Range<usize> {
        self.begin..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}[{}..{})", self.index, self.begin, self.end)
    }
}
