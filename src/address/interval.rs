//! Interval allocation over sorted address ranges.
//!
//! Pure functions used by the policy engine: merging occupied blocks into a
//! minimal disjoint set and finding the lowest free run of addresses.
//! Branches are small, so the merged set is recomputed on every bulk call.

use std::fmt;

/// Inclusive address range `[start, end]` occupied by one device block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressInterval {
    pub start: u16,
    pub end: u16,
}

impl AddressInterval {
    pub fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end, "interval start {} after end {}", start, end);
        AddressInterval { start, end }
    }

    /// Block of `slots` addresses beginning at `start`
    pub fn block(start: u16, slots: u8) -> Self {
        let slots = u16::from(slots.max(1));
        Self::new(start, start.saturating_add(slots - 1))
    }

    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn contains(&self, address: u16) -> bool {
        self.start <= address && address <= self.end
    }

    pub fn overlaps(&self, other: &AddressInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Overlapping or directly adjacent (`end + 1 == other.start`)
    pub fn touches(&self, other: &AddressInterval) -> bool {
        u32::from(self.end) + 1 >= u32::from(other.start)
            && u32::from(other.end) + 1 >= u32::from(self.start)
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl fmt::Display for AddressInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Merge overlapping or adjacent intervals into a sorted disjoint set
pub fn merge_intervals(mut intervals: Vec<AddressInterval>) -> Vec<AddressInterval> {
    intervals.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<AddressInterval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if u32::from(last.end) + 1 >= u32::from(iv.start) => {
                last.end = last.end.max(iv.end);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

/// Lowest address at or after `start` where `slots_needed` contiguous
/// addresses avoid every interval in `occupied`.
///
/// `occupied` must be sorted and disjoint (see [`merge_intervals`]). The
/// result is not bounded by any circuit maximum; callers check range.
/// This is lowest-address first fit, not best fit.
pub fn find_first_fit(start: u16, slots_needed: u8, occupied: &[AddressInterval]) -> u32 {
    let slots = u32::from(slots_needed.max(1));
    let mut candidate = u32::from(start.max(1));

    for iv in occupied {
        let (iv_start, iv_end) = (u32::from(iv.start), u32::from(iv.end));
        if iv_end < candidate {
            continue;
        }
        if candidate + slots - 1 < iv_start {
            return candidate;
        }
        candidate = candidate.max(iv_end + 1);
    }
    candidate
}

/// Insert a new block and re-merge the occupied set
pub fn extend_occupied(occupied: &mut Vec<AddressInterval>, block: AddressInterval) {
    let mut all = std::mem::take(occupied);
    all.push(block);
    *occupied = merge_intervals(all);
}
