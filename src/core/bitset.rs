// This module implements BitSet, a growable set of small integer indices backed by
// 64-bit words. The liveness analysis keeps one per block (live-in) keyed by value
// index, sized from the value pool's slot capacity, and relies on cheap word-wise
// union and equality to detect when the backward dataflow has stopped changing.

//! Dense bitset keyed by value index.

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Create an empty set able to hold indices below `bits` without growing.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.words
            .get(idx / 64)
            .is_some_and(|w| w & (1u64 << (idx % 64)) != 0)
    }

    /// Insert an index; returns whether it was newly added.
    pub fn insert(&mut self, idx: usize) -> bool {
        let w = idx / 64;
        if w >= self.words.len() {
            self.words.resize(w + 1, 0);
        }
        let bit = 1u64 << (idx % 64);
        let fresh = self.words[w] & bit == 0;
        self.words[w] |= bit;
        fresh
    }

    /// Remove an index; returns whether it was present.
    pub fn remove(&mut self, idx: usize) -> bool {
        match self.words.get_mut(idx / 64) {
            Some(w) => {
                let bit = 1u64 << (idx % 64);
                let present = *w & bit != 0;
                *w &= !bit;
                present
            }
            None => false,
        }
    }

    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Set members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            let mut w = w;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(i * 64 + bit)
            })
        })
    }

    /// Equality ignoring trailing zero words.
    pub fn same_members(&self, other: &BitSet) -> bool {
        let n = self.words.len().max(other.words.len());
        (0..n).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_iter() {
        let mut set = BitSet::with_capacity(10);
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.insert(130));
        assert!(set.contains(130));
        assert!(!set.contains(4));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 130]);
        assert!(set.remove(3));
        assert!(!set.remove(3));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn test_union_and_compare() {
        let mut a = BitSet::with_capacity(64);
        let mut b = BitSet::with_capacity(256);
        a.insert(1);
        b.insert(200);
        a.union_with(&b);
        assert!(a.contains(1) && a.contains(200));

        let mut c = BitSet::with_capacity(512);
        c.insert(1);
        c.insert(200);
        assert!(a.same_members(&c));
        c.clear();
        assert!(c.is_empty());
    }
}
