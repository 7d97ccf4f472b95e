// This module implements RegisterSet, the occupancy bitmap the linear scan allocates
// from. Each register file holds up to 256 allocation units as eight 32-bit words;
// a set bit means the unit is taken. Values are sized in units using the target's
// per-file unit granularity. Allocation picks the lowest free block aligned to its own
// (power of two rounded) size, so 64-bit pairs land on even units and vec3/vec4 groups
// on multiples of four. A per-file fill mark remembers the highest unit ever taken.
// periodic_mask and intersect support the vector pre-pass: each channel keeps only
// the conflicts at its own lane positions and the channels are then OR-ed together.

//! Per-file register occupancy bitmap.

use crate::core::target::TargetDesc;
use crate::ir::{PerRegFile, RegFile};

/// Maximum number of allocation units per file.
pub const MAX_FILE_UNITS: usize = 256;
const WORDS: usize = MAX_FILE_UNITS / 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSet {
    bits: PerRegFile<[u32; WORDS]>,
    unit: PerRegFile<u8>,
    /// Highest valid unit index, `-1` for an empty file.
    last: PerRegFile<i32>,
    /// Highest unit index ever occupied, `-1` if none.
    fill: PerRegFile<i32>,
}

impl RegisterSet {
    pub fn new(target: &TargetDesc) -> Self {
        Self {
            bits: PerRegFile::default(),
            unit: PerRegFile::new_with(|f| target.unit_log2(f)),
            last: PerRegFile::new_with(|f| {
                target.file_size(f).min(MAX_FILE_UNITS as u32) as i32 - 1
            }),
            fill: PerRegFile::new_with(|_| -1),
        }
    }

    pub fn reset(&mut self) {
        for file in RegFile::REGISTER_FILES {
            self.bits[file] = [0; WORDS];
            self.fill[file] = -1;
        }
    }

    /// Number of units a value of `size` bytes occupies in `file`.
    pub fn units(&self, file: RegFile, size: u32) -> u32 {
        let unit = self.unit[file];
        let mask = (1u32 << unit) - 1;
        ((size + mask) >> unit).max(1)
    }

    pub fn unit_log2(&self, file: RegFile) -> u8 {
        self.unit[file]
    }

    pub fn last(&self, file: RegFile) -> i32 {
        self.last[file]
    }

    /// Highest unit index ever occupied in `file`.
    pub fn fill(&self, file: RegFile) -> i32 {
        self.fill[file]
    }

    fn test_unit(&self, file: RegFile, u: usize) -> bool {
        self.bits[file][u / 32] & (1 << (u % 32)) != 0
    }

    fn unit_range(reg: i32, units: u32) -> std::ops::Range<usize> {
        let start = reg.max(0) as usize;
        start..(start + units as usize).min(MAX_FILE_UNITS)
    }

    pub fn is_free(&self, file: RegFile, reg: i32, units: u32) -> bool {
        Self::unit_range(reg, units).all(|u| !self.test_unit(file, u))
    }

    /// Mark `units` units starting at `reg` as taken.
    ///
    /// Returns `false` if any of them was already taken; the units are marked
    /// regardless.
    pub fn occupy(&mut self, file: RegFile, reg: i32, units: u32) -> bool {
        if reg < 0 {
            return true;
        }
        let mut was_free = true;
        for u in Self::unit_range(reg, units) {
            let bit = 1 << (u % 32);
            was_free &= self.bits[file][u / 32] & bit == 0;
            self.bits[file][u / 32] |= bit;
        }
        self.fill[file] = self.fill[file].max(reg + units as i32 - 1);
        was_free
    }

    /// Occupy the units only if all of them are free.
    pub fn test_occupy(&mut self, file: RegFile, reg: i32, units: u32) -> bool {
        if !self.is_free(file, reg, units) {
            return false;
        }
        self.occupy(file, reg, units)
    }

    /// Free the units of an assignment; no-op for unassigned (`reg < 0`).
    pub fn release(&mut self, file: RegFile, reg: i32, units: u32) {
        if reg < 0 {
            return;
        }
        for u in Self::unit_range(reg, units) {
            self.bits[file][u / 32] &= !(1 << (u % 32));
        }
    }

    /// Find and occupy the lowest free block of `units` units aligned to the
    /// block size rounded up to a power of two.
    pub fn assign(&mut self, file: RegFile, units: u32) -> Option<i32> {
        let align = units.next_power_of_two().max(1) as i32;
        let last = self.last[file];
        let mut id = 0;
        while id + units as i32 - 1 <= last {
            if self.is_free(file, id, units) {
                self.occupy(file, id, units);
                log::trace!("assign {file}: {units} units at {id}");
                return Some(id);
            }
            id += align;
        }
        None
    }

    /// Apply `bits = (bits | lock) & !unlock` to every word of the file.
    pub fn periodic_mask(&mut self, file: RegFile, lock: u32, unlock: u32) {
        for word in self.bits[file].iter_mut() {
            *word = (*word | lock) & !unlock;
        }
    }

    /// Add the occupancy of `other` in `file` to this set.
    pub fn intersect(&mut self, file: RegFile, other: &RegisterSet) {
        for (a, b) in self.bits[file].iter_mut().zip(other.bits[file].iter()) {
            *a |= *b;
        }
    }
}
