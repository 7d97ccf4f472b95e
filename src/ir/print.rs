// This module renders functions and programs in the textual IR syntax accepted by the
// test_ir parser, with assigned physical registers appended to every register value as
// `%name($rN)`. Conditional branches are printed back in their two-target form using
// the block's successor list. The output is meant for logs, the ra_dump tool and
// test failure messages, so it favours readability over compactness.

//! Textual dump of functions and programs.

use std::fmt::{self, Write};

use super::function::Function;
use super::instruction::{FlowTarget, InstKind, Op};
use super::program::Program;
use super::value::{Modifier, RegFile, ValueData};
use super::{InstId, ValueId};

impl Function {
    /// Printable name of a value: its debug name or `%N`.
    pub fn value_label(&self, v: ValueId) -> String {
        match &self.value(v).name {
            Some(name) => format!("%{name}"),
            None => format!("{v}"),
        }
    }

    fn write_value(&self, out: &mut String, v: ValueId) -> fmt::Result {
        let val = self.value(v);
        match (val.file, val.data) {
            (RegFile::Immediate, ValueData::Imm(bits)) => {
                if val.ty.is_float() && val.size == 4 {
                    write!(out, "${:?}", f32::from_bits(bits as u32))
                } else {
                    write!(out, "${}", bits as i64)
                }
            }
            (file, ValueData::Offset(off)) if file.is_memory() => {
                write!(out, "{}[{}]", file.name(), off)
            }
            _ => {
                out.push_str(&self.value_label(v));
                if val.is_assigned() {
                    write!(out, "({}{})", val.file.reg_prefix(), val.reg)?;
                }
                Ok(())
            }
        }
    }

    fn write_src(&self, out: &mut String, i: InstId, s: usize) -> fmt::Result {
        let Some(src) = self.inst(i).src_ref(s) else {
            return Ok(());
        };
        let Some(v) = src.value else {
            return out.write_str("_");
        };
        let val = self.value(v);
        if val.file.is_memory() {
            let off = match val.data {
                ValueData::Offset(o) => o,
                _ => 0,
            };
            write!(out, "{}[", val.file.name())?;
            match src.indirect[0] {
                Some(ind) => {
                    self.write_value(out, ind)?;
                    if off != 0 {
                        write!(out, "{off:+}")?;
                    }
                }
                None => write!(out, "{off}")?,
            }
            return out.write_str("]");
        }
        if src.modifier.contains(Modifier::NEG) {
            out.push('-');
        }
        if src.modifier.contains(Modifier::NOT) {
            out.push('~');
        }
        let abs = src.modifier.contains(Modifier::ABS);
        if abs {
            out.push('|');
        }
        self.write_value(out, v)?;
        if abs {
            out.push('|');
        }
        Ok(())
    }

    fn write_inst(&self, out: &mut String, i: InstId) -> fmt::Result {
        let inst = self.inst(i);
        let defs: Vec<ValueId> = inst.defs().collect();
        for (n, d) in defs.iter().enumerate() {
            if n > 0 {
                out.push_str(", ");
            }
            self.write_value(out, *d)?;
        }
        if !defs.is_empty() {
            out.push_str(" = ");
        }

        let cond_else = match (inst.op, inst.predicate(), inst.flow_target(), inst.block()) {
            (Op::Bra, Some(_), Some(FlowTarget::Block(t)), Some(b)) => {
                self.block(b).succs().find(|&s| s != t)
            }
            _ => None,
        };
        if let (Some(p), Some(FlowTarget::Block(t)), Some(f)) =
            (inst.predicate(), inst.flow_target(), cond_else)
        {
            out.push_str("condbr ");
            self.write_value(out, p)?;
            return write!(out, ", ^{}, ^{}", self.block(t).name, self.block(f).name);
        }

        out.push_str(inst.op.name());
        if let InstKind::Compare(cc) = inst.kind {
            write!(out, ".{}", cc.name())?;
        }
        if !inst.ty.name().is_empty() && !inst.op.is_flow() && inst.op != Op::Phi {
            write!(out, ".{}", inst.ty.name())?;
        }
        match &inst.kind {
            InstKind::Tex(info) => {
                write!(out, ".{}", info.target.name())?;
                if info.mask != 0xf {
                    write!(out, ".m{}", info.mask)?;
                }
            }
            InstKind::Flow(FlowTarget::Block(b)) => {
                write!(out, " ^{}", self.block(*b).name)?;
            }
            InstKind::Flow(FlowTarget::Func(f)) => write!(out, " fn{}", f.0)?,
            _ => {}
        }

        if let InstKind::Phi(preds) = &inst.kind {
            for (s, b) in preds.iter().enumerate() {
                out.push_str(if s == 0 { " " } else { ", " });
                write!(out, "[^{}, ", self.block(*b).name)?;
                self.write_src(out, i, s)?;
                out.push(']');
            }
        } else {
            let open = if inst.op == Op::Call { "(" } else { " " };
            let n = inst.srcs.len();
            for s in 0..n {
                out.push_str(if s == 0 { open } else { ", " });
                self.write_src(out, i, s)?;
            }
            if inst.op == Op::Call {
                out.push_str(if n == 0 { "()" } else { ")" });
            }
        }

        if let Some(p) = inst.predicate() {
            out.push_str(" if ");
            self.write_value(out, p)?;
        }
        Ok(())
    }

    /// Render the function in textual IR form.
    pub fn print(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut String) -> fmt::Result {
        write!(out, "func {}(", self.name)?;
        for (n, v) in self.ins.iter().enumerate() {
            if n > 0 {
                out.push_str(", ");
            }
            self.write_value(out, *v)?;
        }
        out.push_str(") -> (");
        for (n, v) in self.outs.iter().enumerate() {
            if n > 0 {
                out.push_str(", ");
            }
            self.write_value(out, *v)?;
        }
        out.push_str(") {\n");
        for b in self.block_ids() {
            writeln!(out, "{}:", self.block(b).name)?;
            for i in self.block_insts(b) {
                out.push_str("  ");
                self.write_inst(out, i)?;
                out.push('\n');
            }
        }
        out.push_str("}\n");
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, func) in self.functions.iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DataType, Instruction, Value};

    #[test]
    fn test_print_assigned_registers() {
        let mut func = Function::new("f");
        let b = func.entry;
        let a = func.new_value(Value::new(RegFile::Gpr, 4).with_name("a"));
        let c = func.new_value(Value::new(RegFile::Gpr, 4).with_name("c"));
        let one = func.new_value(Value::immediate(1, DataType::U32));
        func.ins.push(a);
        func.value_mut(a).reg = 0;
        func.value_mut(c).reg = 1;

        let add = func.new_inst(Instruction::new(Op::Add, DataType::U32));
        func.set_def(add, 0, Some(c));
        func.set_src(add, 0, Some(a));
        func.set_src(add, 1, Some(one));
        func.set_modifier(add, 0, Modifier::NEG);
        func.append_inst(b, add);
        let ret = func.new_inst(Instruction::new_flow(Op::Ret, FlowTarget::None));
        func.append_inst(b, ret);

        let text = func.print();
        assert!(text.starts_with("func f(%a($r0)) -> () {"));
        assert!(text.contains("%c($r1) = add.u32 -%a($r0), $1"));
        assert!(text.contains("  ret\n"));
    }
}
