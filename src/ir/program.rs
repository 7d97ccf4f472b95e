// This module implements Program, the container of all functions compiled together
// for one target. The allocator processes functions callee-first so that every call
// site can bind its arguments to the registers the callee's inputs and outputs were
// given; call_order computes that order as a depth-first post-order of the call graph
// starting at the entry function, with functions unreachable from it appended last.

//! Whole-program container and call graph order.

use hashbrown::HashMap;

use super::function::Function;
use super::instruction::FlowTarget;
use super::FuncId;
use crate::core::target::TargetDesc;

#[derive(Debug, Clone)]
pub struct Program {
    pub functions: Vec<Function>,
    pub entry: FuncId,
    pub target: TargetDesc,
    names: HashMap<String, FuncId>,
}

impl Program {
    pub fn new(target: TargetDesc) -> Self {
        Self {
            functions: Vec::new(),
            entry: FuncId(0),
            target,
            names: HashMap::new(),
        }
    }

    pub fn add_function(&mut self, func: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.names.insert(func.name.clone(), id);
        self.functions.push(func);
        id
    }

    pub fn function(&self, f: FuncId) -> &Function {
        &self.functions[f.index()]
    }

    pub fn function_mut(&mut self, f: FuncId) -> &mut Function {
        &mut self.functions[f.index()]
    }

    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.names.get(name).copied()
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.find_function(name).map(|f| self.function(f))
    }

    fn callees(&self, f: FuncId) -> Vec<FuncId> {
        let mut out = Vec::new();
        for (_, inst) in self.function(f).insts() {
            if let Some(FlowTarget::Func(callee)) = inst.flow_target() {
                if !out.contains(&callee) {
                    out.push(callee);
                }
            }
        }
        out
    }

    /// Functions ordered so that every callee precedes its callers.
    pub fn call_order(&self) -> Vec<FuncId> {
        let n = self.functions.len();
        let mut visited = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let roots = std::iter::once(self.entry).chain((0..n as u32).map(FuncId));

        for root in roots {
            if root.index() >= n || visited[root.index()] {
                continue;
            }
            visited[root.index()] = true;
            let mut stack = vec![(root, self.callees(root), 0usize)];
            while let Some((f, callees, next)) = stack.last_mut() {
                if let Some(&c) = callees.get(*next) {
                    *next += 1;
                    if !visited[c.index()] {
                        visited[c.index()] = true;
                        let cc = self.callees(c);
                        stack.push((c, cc, 0));
                    }
                } else {
                    order.push(*f);
                    stack.pop();
                }
            }
        }
        order
    }
}
