// This module implements the control-flow analyses the register allocator relies on:
// a depth-first walk that yields reverse post-order (the instruction numbering order)
// and classifies every edge as tree, forward, back or cross; iterative dominators over
// reverse post-order used to pick reusable constraint bundles; the loop nesting bound
// that sizes the liveness fixed point; and critical edge splitting for phi moves.
// The walk is iterative with an explicit stack so deep CFGs cannot overflow.

//! CFG traversal, dominators and edge splitting.

use super::function::{Edge, EdgeKind, Function};
use super::instruction::{FlowTarget, Instruction, Op};
use super::BlockId;

const UNVISITED: u32 = u32::MAX;

/// Result of a depth-first walk from the entry block.
struct Dfs {
    post_order: Vec<BlockId>,
    /// `(block, successor index, kind)` for every reachable edge.
    edges: Vec<(BlockId, usize, EdgeKind)>,
}

fn dfs(func: &Function) -> Dfs {
    let n = func.num_blocks();
    let mut pre = vec![UNVISITED; n];
    let mut post = vec![UNVISITED; n];
    let mut pre_counter = 0;
    let mut post_counter = 0;
    let mut out = Dfs {
        post_order: Vec::with_capacity(n),
        edges: Vec::new(),
    };

    let mut stack: Vec<(BlockId, usize)> = vec![(func.entry, 0)];
    pre[func.entry.index()] = pre_counter;
    pre_counter += 1;

    while let Some(&(b, next)) = stack.last() {
        let succs = func.block(b).succ_edges();
        if next < succs.len() {
            let top = stack.len() - 1;
            stack[top].1 += 1;
            let t = succs[next].target;
            let kind = if pre[t.index()] == UNVISITED {
                pre[t.index()] = pre_counter;
                pre_counter += 1;
                stack.push((t, 0));
                EdgeKind::Tree
            } else if post[t.index()] == UNVISITED {
                EdgeKind::Back
            } else if pre[t.index()] > pre[b.index()] {
                EdgeKind::Forward
            } else {
                EdgeKind::Cross
            };
            out.edges.push((b, next, kind));
        } else {
            post[b.index()] = post_counter;
            post_counter += 1;
            out.post_order.push(b);
            stack.pop();
        }
    }
    out
}

/// Blocks reachable from the entry, in reverse post-order.
pub fn reverse_post_order(func: &Function) -> Vec<BlockId> {
    let mut order = dfs(func).post_order;
    order.reverse();
    order
}

/// Assign an [`EdgeKind`] to every reachable edge.
pub fn classify_edges(func: &mut Function) {
    for (b, idx, kind) in dfs(func).edges {
        func.block_mut(b).succs[idx].kind = kind;
    }
}

/// Immediate dominator tree.
#[derive(Debug, Clone)]
pub struct DomTree {
    idom: Vec<Option<BlockId>>,
    rpo_index: Vec<u32>,
}

impl DomTree {
    pub fn compute(func: &Function) -> Self {
        let rpo = reverse_post_order(func);
        let n = func.num_blocks();
        let mut rpo_index = vec![UNVISITED; n];
        for (i, b) in rpo.iter().enumerate() {
            rpo_index[b.index()] = i as u32;
        }
        let mut idom: Vec<Option<BlockId>> = vec![None; n];
        idom[func.entry.index()] = Some(func.entry);

        let intersect = |idom: &[Option<BlockId>], mut a: BlockId, mut b: BlockId| {
            while a != b {
                while rpo_index[a.index()] > rpo_index[b.index()] {
                    a = idom[a.index()].unwrap_or(func.entry);
                }
                while rpo_index[b.index()] > rpo_index[a.index()] {
                    b = idom[b.index()].unwrap_or(func.entry);
                }
            }
            a
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &b in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for &p in func.block(b).preds() {
                    if idom[p.index()].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(cur) => intersect(&idom, p, cur),
                    });
                }
                if new_idom.is_some() && idom[b.index()] != new_idom {
                    idom[b.index()] = new_idom;
                    changed = true;
                }
            }
        }
        Self { idom, rpo_index }
    }

    /// Immediate dominator; the entry block is its own.
    pub fn idom(&self, b: BlockId) -> Option<BlockId> {
        self.idom[b.index()]
    }

    pub fn is_reachable(&self, b: BlockId) -> bool {
        self.rpo_index[b.index()] != UNVISITED
    }

    /// Whether `a` dominates `b` (reflexive).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom[cur.index()] {
                Some(up) if up != cur => cur = up,
                _ => return false,
            }
        }
    }
}

/// Maximum number of natural loops enclosing any block.
pub fn loop_nesting_bound(func: &Function) -> u32 {
    let walk = dfs(func);
    let n = func.num_blocks();
    let mut headers: Vec<BlockId> = Vec::new();
    let mut bodies: Vec<Vec<bool>> = Vec::new();

    for (b, idx, kind) in walk.edges {
        if kind != EdgeKind::Back {
            continue;
        }
        let header = func.block(b).succ_edges()[idx].target;
        let slot = match headers.iter().position(|&h| h == header) {
            Some(s) => s,
            None => {
                headers.push(header);
                let mut body = vec![false; n];
                body[header.index()] = true;
                bodies.push(body);
                headers.len() - 1
            }
        };
        let body = &mut bodies[slot];
        let mut work = vec![b];
        while let Some(x) = work.pop() {
            if body[x.index()] {
                continue;
            }
            body[x.index()] = true;
            work.extend(func.block(x).preds().iter().copied());
        }
    }

    (0..n)
        .map(|i| bodies.iter().filter(|body| body[i]).count() as u32)
        .max()
        .unwrap_or(0)
}

/// Insert an empty block on the edge `pred -> succ`.
///
/// The predecessor's branch and the successor's phi provenance are redirected
/// to the new block, which ends in an unconditional branch to `succ`.
pub fn split_edge(func: &mut Function, pred: BlockId, succ: BlockId) -> BlockId {
    let name = format!("{}.{}", func.block(pred).name, func.block(succ).name);
    let mid = func.add_block(name);
    func.retarget_edge(pred, succ, mid, EdgeKind::Tree);
    func.block_mut(mid).succs.push(Edge {
        target: succ,
        kind: EdgeKind::Forward,
    });
    func.block_mut(succ).preds.push(mid);
    func.retarget_branch(pred, succ, mid);

    for phi in func.phis(succ) {
        if let Some(preds) = func.inst_mut(phi).phi_preds_mut() {
            for p in preds.iter_mut().filter(|p| **p == pred) {
                *p = mid;
            }
        }
    }

    let bra = func.new_inst(Instruction::new_flow(Op::Bra, FlowTarget::Block(succ)));
    func.append_inst(mid, bra);
    log::debug!(
        "{}: split edge {} -> {} with {}",
        func.name,
        func.block(pred).name,
        func.block(succ).name,
        func.block(mid).name
    );
    mid
}

#[cfg(test)]
mod tests {
    use super::*;

    /// entry -> a, b; a -> join; b -> join
    fn diamond() -> (Function, [BlockId; 4]) {
        let mut func = Function::new("diamond");
        let entry = func.entry;
        let a = func.add_block("a");
        let b = func.add_block("b");
        let join = func.add_block("join");
        func.add_edge(entry, a);
        func.add_edge(entry, b);
        func.add_edge(a, join);
        func.add_edge(b, join);
        (func, [entry, a, b, join])
    }

    #[test]
    fn test_rpo_and_edge_kinds() {
        let (mut func, [entry, a, b, join]) = diamond();
        let rpo = reverse_post_order(&func);
        assert_eq!(rpo[0], entry);
        assert_eq!(rpo.len(), 4);
        assert!(rpo.iter().position(|&x| x == join) > rpo.iter().position(|&x| x == a));
        assert!(rpo.iter().position(|&x| x == join) > rpo.iter().position(|&x| x == b));

        classify_edges(&mut func);
        let kinds: Vec<EdgeKind> = func.block(entry).succ_edges().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Tree, EdgeKind::Tree]);
        let into_join = [func.block(a).succ_edges()[0].kind, func.block(b).succ_edges()[0].kind];
        assert!(into_join.contains(&EdgeKind::Tree));
        assert!(into_join.contains(&EdgeKind::Cross));
    }

    #[test]
    fn test_dominators() {
        let (func, [entry, a, b, join]) = diamond();
        let dom = DomTree::compute(&func);
        assert!(dom.dominates(entry, join));
        assert!(dom.dominates(join, join));
        assert!(!dom.dominates(a, join));
        assert!(!dom.dominates(b, a));
        assert_eq!(dom.idom(join), Some(entry));
    }

    #[test]
    fn test_loop_nesting_bound() {
        // entry -> outer -> inner -> inner (self loop) -> outer_latch -> outer, exit
        let mut func = Function::new("loops");
        let entry = func.entry;
        let outer = func.add_block("outer");
        let inner = func.add_block("inner");
        let latch = func.add_block("latch");
        let exit = func.add_block("exit");
        func.add_edge(entry, outer);
        func.add_edge(outer, inner);
        func.add_edge(inner, inner);
        func.add_edge(inner, latch);
        func.add_edge(latch, outer);
        func.add_edge(latch, exit);
        assert_eq!(loop_nesting_bound(&func), 2);

        let (straight, _) = diamond();
        assert_eq!(loop_nesting_bound(&straight), 0);
    }

    #[test]
    fn test_split_edge_redirects_branch_and_phi() {
        let (mut func, [entry, a, _b, join]) = diamond();
        let bra = func.new_inst(Instruction::new_flow(Op::Bra, FlowTarget::Block(join)));
        func.append_inst(entry, bra);
        func.add_edge(entry, join);

        let phi = func.new_inst(Instruction::new(Op::Phi, crate::ir::DataType::U32));
        func.inst_mut(phi).phi_preds_mut().unwrap().extend([a, entry]);
        func.append_inst(join, phi);

        let mid = split_edge(&mut func, entry, join);
        assert!(!func.block(entry).succs().any(|s| s == join));
        assert!(func.block(entry).succs().any(|s| s == mid));
        assert_eq!(func.block(mid).succs().collect::<Vec<_>>(), vec![join]);
        assert_eq!(func.inst(bra).flow_target(), Some(FlowTarget::Block(mid)));
        assert_eq!(func.inst(phi).phi_preds().unwrap(), &[a, mid]);
        assert!(func.block(join).preds().contains(&mid));
        assert!(!func.block(join).preds().contains(&entry));
        assert!(func.is_terminated(mid));
    }
}
