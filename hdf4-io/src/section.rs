//! Hyperslab sections and their traversal

use hdf4_format::{FormatError, Result};
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Indices along one dimension: `count` values from `start`, `stride` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    /// First index
    pub start: usize,
    /// Number of indices
    pub count: usize,
    /// Step between indices
    pub stride: usize,
}

impl Range {
    /// Every index of a dimension of length `len`.
    pub fn full(len: usize) -> Self {
        Self {
            start: 0,
            count: len,
            stride: 1,
        }
    }

    /// `count` consecutive indices from `start`.
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start,
            count,
            stride: 1,
        }
    }

    /// Strided range.
    pub fn strided(start: usize, count: usize, stride: usize) -> Self {
        Self {
            start,
            count,
            stride,
        }
    }

    /// Last index; `None` when empty or past `usize::MAX`.
    pub fn last(&self) -> Option<usize> {
        let steps = self.count.checked_sub(1)?;
        steps
            .checked_mul(self.stride)
            .and_then(|offset| self.start.checked_add(offset))
    }

    /// Positions `j` (0-based within the range) whose index lies in
    /// `[lo, hi)`.
    pub fn positions_within(&self, lo: usize, hi: usize) -> std::ops::Range<usize> {
        if self.count == 0 || hi <= lo {
            return 0..0;
        }
        let first = if lo <= self.start {
            0
        } else {
            (lo - self.start).div_ceil(self.stride)
        };
        let end = if hi <= self.start {
            0
        } else {
            ((hi - 1 - self.start) / self.stride + 1).min(self.count)
        };
        first.min(end)..end
    }
}

/// Sub-array selection, one [`Range`] per dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    ranges: SmallVec<[Range; 4]>,
}

impl Section {
    /// Section from explicit ranges
    pub fn new(ranges: impl IntoIterator<Item = Range>) -> Self {
        Self {
            ranges: ranges.into_iter().collect(),
        }
    }

    /// Whole-variable section
    pub fn full(shape: &[usize]) -> Self {
        Self::new(shape.iter().map(|&n| Range::full(n)))
    }

    /// Parse `start:end[:stride]` per dimension, comma separated.
    ///
    /// `end` is inclusive; a bare index selects one element and `:` selects
    /// the whole dimension.
    pub fn parse(spec: &str, shape: &[usize]) -> Result<Self> {
        let parts: Vec<&str> = if spec.trim().is_empty() {
            Vec::new()
        } else {
            spec.split(',').map(str::trim).collect()
        };
        if parts.len() != shape.len() {
            return Err(FormatError::InvalidSection(format!(
                "'{}' has {} ranges for rank {}",
                spec,
                parts.len(),
                shape.len()
            )));
        }
        let number = |s: &str| {
            s.parse::<usize>()
                .map_err(|_| FormatError::InvalidSection(format!("bad index '{s}' in '{spec}'")))
        };
        let count = |steps: usize| {
            steps
                .checked_add(1)
                .ok_or_else(|| FormatError::InvalidSection(format!("range overflows in '{spec}'")))
        };
        let mut ranges = SmallVec::new();
        for (part, &len) in parts.iter().zip(shape) {
            let fields: Vec<&str> = part.split(':').collect();
            let range = match fields.as_slice() {
                [""] | ["", ""] => Range::full(len),
                [single] => Range::new(number(single)?, 1),
                [start, end] | [start, end, ""] => {
                    let (start, end) = (number(start)?, number(end)?);
                    if end < start {
                        return Err(FormatError::InvalidSection(format!(
                            "end {end} before start {start}"
                        )));
                    }
                    Range::new(start, count(end - start)?)
                }
                [start, end, stride] => {
                    let (start, end, stride) = (number(start)?, number(end)?, number(stride)?);
                    if end < start || stride == 0 {
                        return Err(FormatError::InvalidSection(format!(
                            "bad range '{part}'"
                        )));
                    }
                    Range::strided(start, count((end - start) / stride)?, stride)
                }
                _ => {
                    return Err(FormatError::InvalidSection(format!(
                        "bad range '{part}'"
                    )))
                }
            };
            ranges.push(range);
        }
        Ok(Self { ranges })
    }

    /// Ranges, outermost first.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Rank.
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Lengths of the selected sub-array.
    pub fn shape(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.count).collect()
    }

    /// Number of selected elements.
    pub fn element_count(&self) -> usize {
        self.ranges.iter().fold(1, |acc, r| acc.saturating_mul(r.count))
    }

    /// Check the section against a variable shape.
    pub fn validate(&self, shape: &[usize]) -> Result<()> {
        if self.rank() != shape.len() {
            return Err(FormatError::InvalidSection(format!(
                "section rank {} does not match variable rank {}",
                self.rank(),
                shape.len()
            )));
        }
        for (d, (range, &len)) in self.ranges.iter().zip(shape).enumerate() {
            if range.stride == 0 {
                return Err(FormatError::InvalidSection(format!(
                    "zero stride in dimension {d}"
                )));
            }
            if range.count == 0 {
                continue;
            }
            let last = range.last().ok_or_else(|| {
                FormatError::InvalidSection(format!("range in dimension {d} overflows"))
            })?;
            if last >= len {
                return Err(FormatError::InvalidSection(format!(
                    "index {last} out of bounds for dimension {d} of length {len}"
                )));
            }
        }
        Ok(())
    }

    /// Runs of consecutive elements in row-major order, as
    /// `(first linear index, element count)` within `shape`.
    pub fn runs<'a>(&'a self, shape: &'a [usize]) -> Runs<'a> {
        Runs::new(self, shape)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|r| match r.last() {
                Some(last) if r.stride == 1 => format!("{}:{}", r.start, last),
                Some(last) => format!("{}:{}:{}", r.start, last, r.stride),
                None => format!("{}:empty", r.start),
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Row-major pitch (elements per step) of each dimension.
pub fn pitches(shape: &[usize]) -> SmallVec<[usize; 4]> {
    let mut pitch: SmallVec<[usize; 4]> = SmallVec::from_elem(1, shape.len());
    for d in (0..shape.len().saturating_sub(1)).rev() {
        pitch[d] = pitch[d + 1] * shape[d + 1];
    }
    pitch
}

/// Iterator over the contiguous runs of a section
pub struct Runs<'a> {
    ranges: &'a [Range],
    pitch: SmallVec<[usize; 4]>,
    outer: usize,
    base: usize,
    run: usize,
    counter: SmallVec<[usize; 4]>,
    done: bool,
}

impl<'a> Runs<'a> {
    fn new(section: &'a Section, shape: &'a [usize]) -> Self {
        let ranges = section.ranges();
        let pitch = pitches(shape);

        // fold trailing unit-stride dimensions into one run while they are
        // fully selected
        let mut outer = ranges.len();
        let mut run = 1usize;
        while outer > 0 {
            let r = &ranges[outer - 1];
            if r.stride != 1 {
                break;
            }
            run *= r.count;
            outer -= 1;
            if !(r.start == 0 && r.count == shape[outer]) {
                break;
            }
        }
        let base = ranges[outer..]
            .iter()
            .zip(&pitch[outer..])
            .map(|(r, p)| r.start * p)
            .sum();

        Self {
            ranges,
            pitch,
            outer,
            base,
            run,
            counter: SmallVec::from_elem(0, outer),
            done: ranges.iter().any(|r| r.count == 0),
        }
    }
}

impl Iterator for Runs<'_> {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.base
            + (0..self.outer)
                .map(|d| {
                    let r = &self.ranges[d];
                    (r.start + self.counter[d] * r.stride) * self.pitch[d]
                })
                .sum::<usize>();

        // odometer over the outer dimensions
        let mut d = self.outer;
        loop {
            if d == 0 {
                self.done = true;
                break;
            }
            d -= 1;
            self.counter[d] += 1;
            if self.counter[d] < self.ranges[d].count {
                break;
            }
            self.counter[d] = 0;
        }
        Some((start, self.run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_section_is_one_run() {
        let shape = [3, 4, 5];
        let section = Section::full(&shape);
        let runs: Vec<_> = section.runs(&shape).collect();
        assert_eq!(runs, vec![(0, 60)]);
    }

    #[test]
    fn test_partial_last_dimension() {
        let shape = [3, 4];
        let section = Section::new([Range::new(1, 2), Range::new(1, 2)]);
        let runs: Vec<_> = section.runs(&shape).collect();
        assert_eq!(runs, vec![(5, 2), (9, 2)]);
    }

    #[test]
    fn test_strided_last_dimension() {
        let shape = [2, 6];
        let section = Section::new([Range::full(2), Range::strided(0, 3, 2)]);
        let runs: Vec<_> = section.runs(&shape).collect();
        assert_eq!(runs, vec![(0, 1), (2, 1), (4, 1), (6, 1), (8, 1), (10, 1)]);
    }

    #[test]
    fn test_scalar_and_empty() {
        let scalar = Section::full(&[]);
        assert_eq!(scalar.runs(&[]).collect::<Vec<_>>(), vec![(0, 1)]);
        let empty = Section::new([Range::new(0, 0)]);
        assert_eq!(empty.runs(&[4]).count(), 0);
    }

    #[test]
    fn test_validate_bounds() {
        let shape = [4, 4];
        assert!(Section::new([Range::new(0, 4), Range::new(3, 1)])
            .validate(&shape)
            .is_ok());
        assert!(Section::new([Range::new(0, 5), Range::new(0, 1)])
            .validate(&shape)
            .is_err());
        assert!(Section::new([Range::new(0, 1)]).validate(&shape).is_err());
        assert!(Section::new([Range::strided(0, 2, 0), Range::new(0, 1)])
            .validate(&shape)
            .is_err());
    }

    #[test]
    fn test_huge_ranges_are_rejected() {
        let far = Range::strided(usize::MAX - 1, 3, usize::MAX / 2);
        assert_eq!(far.last(), None);
        assert!(matches!(
            Section::new([far]).validate(&[8]),
            Err(FormatError::InvalidSection(_))
        ));
        assert!(matches!(
            Section::new([Range::new(usize::MAX, 2)]).validate(&[8]),
            Err(FormatError::InvalidSection(_))
        ));
        assert!(Section::parse(&format!("0:{}", usize::MAX), &[8]).is_err());
    }

    #[test]
    fn test_parse() {
        let section = Section::parse("1:2, 0:5:2, :, 3", &[4, 6, 3, 5]).unwrap();
        assert_eq!(
            section.ranges(),
            &[
                Range::new(1, 2),
                Range::strided(0, 3, 2),
                Range::full(3),
                Range::new(3, 1)
            ]
        );
        assert!(Section::parse("1:0", &[4]).is_err());
        assert!(Section::parse("0:1", &[4, 4]).is_err());
        assert_eq!(section.to_string(), "1:2,0:4:2,0:2,3:3");
    }

    #[test]
    fn test_positions_within() {
        let r = Range::strided(1, 5, 2); // 1 3 5 7 9
        assert_eq!(r.positions_within(0, 4), 0..2);
        assert_eq!(r.positions_within(4, 8), 2..4);
        assert_eq!(r.positions_within(8, 20), 4..5);
        assert_eq!(r.positions_within(10, 20), 5..5);
    }
}
