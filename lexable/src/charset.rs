// Inclusive Unicode scalar-value range sets, grounded on tree-sitter's
// `nfa::CharacterSet` (examples/other_examples/12f6156b_...token_conflicts.rs.rs),
// adapted from UTF-8 byte ranges to whole scalar-value ranges since our DFA
// edges are character-range edges per spec.md 4.4.

use std::fmt;

pub const MAX_CHAR: u32 = 0x10FFFF;
const SURROGATE_LO: u32 = 0xD800;
const SURROGATE_HI: u32 = 0xDFFF;

#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct CharSet {
    // Sorted, non-overlapping, non-adjacent inclusive ranges.
    ranges: Vec<(u32, u32)>,
}

impl CharSet {
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn single(ch: char) -> Self {
        Self::empty().add_range(ch, ch)
    }

    pub fn add_char(self, ch: char) -> Self {
        self.add_range(ch, ch)
    }

    pub fn add_range(mut self, lo: char, hi: char) -> Self {
        self.insert_range(lo as u32, hi as u32);
        self
    }

    fn insert_range(&mut self, lo: u32, hi: u32) {
        debug_assert!(lo <= hi);
        let mut merged = (lo, hi);
        let mut result = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;
        for &(a, b) in self.ranges.iter() {
            if b + 1 < merged.0 {
                result.push((a, b));
            } else if merged.1 + 1 < a {
                if !inserted {
                    result.push(merged);
                    inserted = true;
                }
                result.push((a, b));
            } else {
                merged = (merged.0.min(a), merged.1.max(b));
            }
        }
        if !inserted {
            result.push(merged);
        }
        result.sort();
        self.ranges = result;
    }

    pub fn add(mut self, other: &CharSet) -> Self {
        for &(lo, hi) in other.ranges.iter() {
            self.insert_range(lo, hi);
        }
        self
    }

    pub fn union(a: &CharSet, b: &CharSet) -> CharSet {
        a.clone().add(b)
    }

    pub fn contains_u32(&self, cp: u32) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if cp < lo {
                    std::cmp::Ordering::Greater
                } else if cp > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn contains(&self, ch: char) -> bool {
        self.contains_u32(ch as u32)
    }

    pub fn does_intersect(&self, other: &CharSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            if a_hi < b_lo {
                i += 1;
            } else if b_hi < a_lo {
                j += 1;
            } else {
                return true;
            }
        }
        false
    }

    /// Invert within [0, MAX_CHAR], skipping the surrogate range (never a
    /// valid scalar value, so it is never a member of either a set or its
    /// complement).
    pub fn negate(&self) -> CharSet {
        let mut result = CharSet::empty();
        let mut cursor = 0u32;
        for &(lo, hi) in self.ranges.iter() {
            if cursor < lo {
                result.push_raw(cursor, lo - 1);
            }
            cursor = hi + 1;
        }
        if cursor <= MAX_CHAR {
            result.push_raw(cursor, MAX_CHAR);
        }
        result.strip_surrogates()
    }

    fn push_raw(&mut self, lo: u32, hi: u32) {
        if lo <= hi {
            self.ranges.push((lo, hi));
        }
    }

    fn strip_surrogates(mut self) -> Self {
        let mut out = Vec::with_capacity(self.ranges.len());
        for (lo, hi) in self.ranges.drain(..) {
            if hi < SURROGATE_LO || lo > SURROGATE_HI {
                out.push((lo, hi));
                continue;
            }
            if lo < SURROGATE_LO {
                out.push((lo, SURROGATE_LO - 1));
            }
            if hi > SURROGATE_HI {
                out.push((SURROGATE_HI + 1, hi));
            }
        }
        out.sort();
        Self { ranges: out }
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// Does this set require representation beyond the Basic Multilingual
    /// Plane (i.e. does it hold any astral code point)?
    pub fn is_astral(&self) -> bool {
        self.ranges.iter().any(|&(_, hi)| hi > 0xFFFF)
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (index, (lo, hi)) in self.ranges.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            if lo == hi {
                write!(f, "{:04X}", lo)?;
            } else {
                write!(f, "{:04X}-{:04X}", lo, hi)?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_ranges() {
        let set = CharSet::empty().add_range('a', 'c').add_range('d', 'f');
        assert_eq!(set.ranges(), &[('a' as u32, 'f' as u32)]);
    }

    #[test]
    fn negate_excludes_surrogates() {
        // [^ -] must accept 0x80..=MAX_CHAR, minus surrogates.
        let ascii = CharSet::empty().add_range('\u{0}', '\u{7f}');
        let inverted = ascii.negate();
        assert!(!inverted.contains_u32(0x41)); // 'A' excluded
        assert!(inverted.contains_u32(0x80));
        assert!(inverted.contains_u32(0x10FFFF));
        assert!(!inverted.contains_u32(SURROGATE_LO));
        assert!(!inverted.contains_u32(SURROGATE_HI));
        assert!(inverted.is_astral());
    }

    #[test]
    fn does_intersect_detects_overlap() {
        let a = CharSet::empty().add_range('a', 'm');
        let b = CharSet::empty().add_range('k', 'z');
        let c = CharSet::empty().add_range('n', 'z');
        assert!(a.does_intersect(&b));
        assert!(!a.does_intersect(&c));
    }
}
