// This module implements JoinForest, the union-find structure behind value coalescing.
// Every value index starts as its own class. Joining records, besides the parent link,
// the byte offset of a node relative to its parent, so a class can hold both a wide
// value and the narrower parts that split or merge it: a part's register is the
// class register plus its offset. Roots track the byte extent of their class, which
// is the size the allocator reserves for it. Lookups compress paths while folding
// offsets so repeated finds stay near constant time.

//! Weighted union-find over value indices.

use crate::ir::{Function, ValueId};

#[derive(Debug, Clone)]
pub struct JoinForest {
    parent: Vec<u32>,
    /// Byte offset relative to the parent.
    offset: Vec<i32>,
    /// Byte extent of the class, meaningful at roots.
    extent: Vec<u32>,
}

impl JoinForest {
    /// One singleton class per value slot of `func`.
    pub fn new(func: &Function) -> Self {
        let n = func.num_value_slots();
        let mut extent = vec![0; n];
        for (id, v) in func.values() {
            extent[id.index()] = v.size as u32;
        }
        Self {
            parent: (0..n as u32).collect(),
            offset: vec![0; n],
            extent,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `v` and the byte offset of `v` within the root's class.
    pub fn find(&mut self, v: ValueId) -> (ValueId, i32) {
        let mut path = Vec::new();
        let mut cur = v.0;
        while self.parent[cur as usize] != cur {
            path.push(cur);
            cur = self.parent[cur as usize];
        }
        let root = cur;
        // Fold offsets from the node nearest the root outwards.
        let mut acc = 0;
        for &node in path.iter().rev() {
            acc += self.offset[node as usize];
            self.offset[node as usize] = acc;
            self.parent[node as usize] = root;
        }
        let off = if v.0 == root { 0 } else { self.offset[v.index()] };
        (ValueId(root), off)
    }

    /// Like [`find`](Self::find) without path compression.
    pub fn find_const(&self, v: ValueId) -> (ValueId, i32) {
        let mut cur = v.0;
        let mut off = 0;
        while self.parent[cur as usize] != cur {
            off += self.offset[cur as usize];
            cur = self.parent[cur as usize];
        }
        (ValueId(cur), off)
    }

    pub fn rep(&mut self, v: ValueId) -> ValueId {
        self.find(v).0
    }

    pub fn is_rep(&self, v: ValueId) -> bool {
        self.parent[v.index()] == v.0
    }

    /// Byte extent of the class rooted at `root`.
    pub fn extent(&self, root: ValueId) -> u32 {
        self.extent[root.index()]
    }

    /// Place the class of `b` so that `b` sits `delta` bytes after `a`.
    ///
    /// Returns the new root, or `None` if both are already in one class at a
    /// different relative position. The root is chosen so that all offsets in
    /// the merged class stay non-negative; `prefer` breaks ties towards a
    /// given root when the relative position is zero.
    pub fn union(&mut self, a: ValueId, b: ValueId, delta: i32, prefer: Option<ValueId>) -> Option<ValueId> {
        let (ra, oa) = self.find(a);
        let (rb, ob) = self.find(b);
        // Position of rb relative to ra.
        let d = oa + delta - ob;
        if ra == rb {
            return (d == 0).then_some(ra);
        }
        let rb_under_ra = d > 0 || (d == 0 && prefer != Some(rb));
        let (root, child, off) = if rb_under_ra { (ra, rb, d) } else { (rb, ra, -d) };
        self.parent[child.index()] = root.0;
        self.offset[child.index()] = off;
        let child_end = off as u32 + self.extent[child.index()];
        self.extent[root.index()] = self.extent[root.index()].max(child_end);
        Some(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{RegFile, Value};

    fn forest(sizes: &[u8]) -> (Function, JoinForest) {
        let mut func = Function::new("f");
        for &s in sizes {
            func.new_value(Value::new(RegFile::Gpr, s));
        }
        let forest = JoinForest::new(&func);
        (func, forest)
    }

    #[test]
    fn test_union_find_roots() {
        let (_, mut jf) = forest(&[4, 4, 4]);
        let (a, b, c) = (ValueId(0), ValueId(1), ValueId(2));
        assert_eq!(jf.union(a, b, 0, None), Some(a));
        assert_eq!(jf.union(c, b, 0, None), Some(c));
        assert_eq!(jf.rep(a), c);
        assert_eq!(jf.rep(b), c);
        assert!(jf.is_rep(c));
        // idempotent
        assert_eq!(jf.union(a, c, 0, None), Some(c));
        assert_eq!(jf.extent(c), 4);
    }

    #[test]
    fn test_offsets_for_parts() {
        // whole 64-bit value with two 32-bit halves
        let (_, mut jf) = forest(&[8, 4, 4]);
        let (whole, lo, hi) = (ValueId(0), ValueId(1), ValueId(2));
        assert_eq!(jf.union(whole, lo, 0, None), Some(whole));
        assert_eq!(jf.union(whole, hi, 4, None), Some(whole));
        assert_eq!(jf.find(hi), (whole, 4));
        assert_eq!(jf.find_const(lo), (whole, 0));
        // conflicting position inside the same class
        assert_eq!(jf.union(whole, hi, 0, None), None);
        assert_eq!(jf.extent(whole), 8);
    }

    #[test]
    fn test_root_stays_lowest() {
        let (_, mut jf) = forest(&[4, 4, 8]);
        let (hi, x, pair) = (ValueId(0), ValueId(1), ValueId(2));
        jf.union(hi, x, 0, None);
        // hi is the upper half of pair: the pair must become the root
        assert_eq!(jf.union(hi, pair, -4, None), Some(pair));
        assert_eq!(jf.find(x), (pair, 4));
        assert_eq!(jf.extent(pair), 8);
    }

    #[test]
    fn test_path_compression_keeps_offsets() {
        let (_, mut jf) = forest(&[16, 8, 4, 4]);
        let (v, h, q, r) = (ValueId(0), ValueId(1), ValueId(2), ValueId(3));
        jf.union(h, q, 4, None);
        jf.union(v, h, 8, None);
        jf.union(q, r, 0, None);
        assert_eq!(jf.find(r), (v, 12));
        assert_eq!(jf.find(q), (v, 12));
        assert_eq!(jf.find(r), (v, 12));
        assert_eq!(jf.find(v), (v, 0));
    }
}
