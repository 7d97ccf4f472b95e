// This module parses the textual test IR into a Program. The parser is a hand-written
// character scanner: instructions are line oriented, value names are resolved per
// function with forward references allowed (a value may be read before the line that
// defines it, as phi operands in loops are), and call targets are resolved once all
// functions are known. CFG edges are taken from the terminators: `br ^t` adds one
// edge, `condbr %p, ^t, ^f` becomes a predicated branch to ^t with edges to both
// targets. The block that returns is the function's exit block.

//! Test IR parser.

use hashbrown::HashMap;
use thiserror::Error;

use crate::core::target::TargetDesc;
use crate::ir::{
    BlockId, CondCode, DataType, FlowTarget, FuncId, Function, InstId, InstKind, Instruction,
    Modifier, Op, Program, RegFile, TexInfo, TexTarget, Value, ValueId,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a whole program for `target`.
///
/// The function named `main`, if any, becomes the program entry; otherwise
/// the first function does.
pub fn parse_program(text: &str, target: TargetDesc) -> ParseResult<Program> {
    Parser::new(text, target).parse()
}

/// Parse a single function.
pub fn parse_function(text: &str) -> ParseResult<Function> {
    let mut prog = parse_program(text, TargetDesc::nvc0())?;
    if prog.functions.len() != 1 {
        return Err(ParseError {
            line: 1,
            reason: format!("expected one function, found {}", prog.functions.len()),
        });
    }
    prog.functions.pop().ok_or_else(|| ParseError {
        line: 1,
        reason: "empty program".into(),
    })
}

struct CallResolve<'a> {
    func: FuncId,
    inst: InstId,
    name: &'a str,
    pos: usize,
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    prog: Program,
    call_resolves: Vec<CallResolve<'a>>,

    // Per-function state
    values: HashMap<&'a str, ValueId>,
    blocks: HashMap<&'a str, BlockId>,
    /// First position each value was referenced at, for error reporting.
    value_refs: HashMap<&'a str, usize>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, target: TargetDesc) -> Self {
        Self {
            text,
            pos: 0,
            prog: Program::new(target),
            call_resolves: Vec::new(),
            values: HashMap::new(),
            blocks: HashMap::new(),
            value_refs: HashMap::new(),
        }
    }

    fn parse(mut self) -> ParseResult<Program> {
        self.skip_whitespace(true);
        while !self.is_eof() {
            self.parse_function()?;
            self.skip_whitespace(true);
        }
        for r in std::mem::take(&mut self.call_resolves) {
            let Some(callee) = self.prog.find_function(r.name) else {
                return Err(self.error_at(r.pos, format!("unknown function {}", r.name)));
            };
            self.prog.function_mut(r.func).inst_mut(r.inst).kind =
                InstKind::Flow(FlowTarget::Func(callee));
        }
        if let Some(main) = self.prog.find_function("main") {
            self.prog.entry = main;
        }
        Ok(self.prog)
    }

    // ---------------------------------------------------------------------
    // Scanning
    // ---------------------------------------------------------------------

    fn error_at(&self, pos: usize, reason: impl Into<String>) -> ParseError {
        let line = self.text[..pos.min(self.text.len())].matches('\n').count() + 1;
        ParseError {
            line,
            reason: reason.into(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        self.error_at(self.pos, reason)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Comment runs to the end of the line
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn at_line_end(&mut self) -> bool {
        self.skip_whitespace(false);
        matches!(self.current_char(), None | Some('\n') | Some('}'))
    }

    /// Consume `ch` on the current line.
    fn try_read(&mut self, ch: char) -> bool {
        self.skip_whitespace(false);
        if self.current_char() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> ParseResult<()> {
        if self.try_read(ch) {
            Ok(())
        } else {
            let found = self.current_char().map_or("end of input".to_string(), |c| format!("'{c}'"));
            Err(self.error(format!("expected '{ch}', found {found}")))
        }
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let text = self.text;
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
        &text[start..self.pos]
    }

    fn read_identifier(&mut self) -> ParseResult<&'a str> {
        self.skip_whitespace(false);
        let ident = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if ident.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(ident)
    }

    fn read_keyword(&mut self, kw: &str) -> bool {
        self.skip_whitespace(false);
        let rest = &self.text[self.pos..];
        let Some(after) = rest.strip_prefix(kw) else {
            return false;
        };
        if matches!(after.chars().next(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        self.pos += kw.len();
        true
    }

    fn read_number(&mut self) -> ParseResult<i64> {
        self.skip_whitespace(false);
        let start = self.pos;
        let neg = self.try_read('-');
        let text = self.read_while(|c| c.is_ascii_hexdigit() || c == 'x' || c == 'X');
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => text.parse::<i64>(),
        };
        match parsed {
            Ok(n) => Ok(if neg { -n } else { n }),
            Err(_) => Err(self.error_at(start, format!("invalid number '{text}'"))),
        }
    }

    // ---------------------------------------------------------------------
    // Names
    // ---------------------------------------------------------------------

    fn read_value_name(&mut self) -> ParseResult<&'a str> {
        self.expect('%')?;
        let name = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if name.is_empty() {
            return Err(self.error("expected value name after '%'"));
        }
        Ok(name)
    }

    fn read_block_name(&mut self) -> ParseResult<&'a str> {
        self.expect('^')?;
        let name = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if name.is_empty() {
            return Err(self.error("expected block name after '^'"));
        }
        Ok(name)
    }

    fn value(&mut self, func: &mut Function, name: &'a str) -> ValueId {
        if let Some(&v) = self.values.get(name) {
            return v;
        }
        let v = func.new_value(Value::new(RegFile::Gpr, 4).with_name(name));
        self.values.insert(name, v);
        self.value_refs.insert(name, self.pos);
        v
    }

    fn block(&mut self, func: &mut Function, name: &'a str) -> BlockId {
        if let Some(&b) = self.blocks.get(name) {
            return b;
        }
        let b = func.add_block(name);
        self.blocks.insert(name, b);
        b
    }

    /// `%name[:attr][@N]`
    fn read_value_decl(&mut self, func: &mut Function) -> ParseResult<ValueId> {
        let name = self.read_value_name()?;
        let v = self.value(func, name);
        if self.current_char() == Some(':') {
            self.advance();
            let attr = self.read_while(|c| c.is_ascii_alphanumeric());
            let (file, size) = match attr {
                "gpr" => (RegFile::Gpr, 4),
                "gpr64" => (RegFile::Gpr, 8),
                "gpr96" => (RegFile::Gpr, 12),
                "gpr128" => (RegFile::Gpr, 16),
                "pred" => (RegFile::Predicate, 1),
                "flags" => (RegFile::Flags, 1),
                "addr" => (RegFile::Address, 4),
                _ => return Err(self.error(format!("unknown value attribute '{attr}'"))),
            };
            let val = func.value_mut(v);
            val.file = file;
            val.size = size;
            val.ty = DataType::of_size(size);
        }
        if self.current_char() == Some('@') {
            self.advance();
            let reg = self.read_number()?;
            func.value_mut(v).reg = reg as i32;
        }
        Ok(v)
    }

    // ---------------------------------------------------------------------
    // Functions and blocks
    // ---------------------------------------------------------------------

    fn parse_function(&mut self) -> ParseResult<()> {
        if !self.read_keyword("func") {
            return Err(self.error("expected 'func'"));
        }
        let name = self.read_identifier()?;
        if self.prog.find_function(name).is_some() {
            return Err(self.error(format!("function {name} defined twice")));
        }
        let mut func = Function::new(name);
        self.values.clear();
        self.blocks.clear();
        self.value_refs.clear();

        self.expect('(')?;
        if !self.try_read(')') {
            loop {
                let v = self.read_value_decl(&mut func)?;
                func.ins.push(v);
                if !self.try_read(',') {
                    break;
                }
            }
            self.expect(')')?;
        }
        if self.try_read('-') {
            self.expect('>')?;
            self.expect('(')?;
            if !self.try_read(')') {
                loop {
                    let v = self.read_value_decl(&mut func)?;
                    func.outs.push(v);
                    if !self.try_read(',') {
                        break;
                    }
                }
                self.expect(')')?;
            }
        }
        self.expect('{')?;

        let mut current = func.entry;
        let mut labelled = false;
        loop {
            self.skip_whitespace(true);
            if self.is_eof() {
                return Err(self.error(format!("unterminated function {name}")));
            }
            if self.current_char() == Some('}') {
                self.advance();
                break;
            }
            if let Some(label) = self.try_label() {
                // A leading label names the entry block
                let fresh = !labelled
                    && func.first_inst(func.entry).is_none()
                    && !self.blocks.contains_key(label);
                current = if fresh {
                    let entry = func.entry;
                    func.block_mut(entry).name = label.to_string();
                    self.blocks.insert(label, entry);
                    entry
                } else {
                    self.block(&mut func, label)
                };
                labelled = true;
                continue;
            }
            self.parse_instruction(&mut func, current)?;
            if !self.at_line_end() {
                return Err(self.error("unexpected trailing input"));
            }
        }

        for (name, &v) in &self.values {
            let val = func.value(v);
            if val.defs().is_empty() && !func.ins.contains(&v) {
                let pos = self.value_refs.get(name).copied().unwrap_or(self.pos);
                return Err(self.error_at(pos, format!("value %{name} is never defined")));
            }
        }
        log::trace!("parsed {}: {} blocks", func.name, func.num_blocks());
        self.prog.add_function(func);
        Ok(())
    }

    /// `name:` at the start of a line.
    fn try_label(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let name = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !name.is_empty() && self.current_char() == Some(':') {
            self.advance();
            return Some(name);
        }
        self.pos = start;
        None
    }

    // ---------------------------------------------------------------------
    // Instructions
    // ---------------------------------------------------------------------

    fn parse_instruction(&mut self, func: &mut Function, b: BlockId) -> ParseResult<()> {
        let mut defs = Vec::new();
        self.skip_whitespace(false);
        if self.current_char() == Some('%') {
            loop {
                defs.push(self.read_value_decl(func)?);
                if !self.try_read(',') {
                    break;
                }
            }
            self.expect('=')?;
        }

        self.skip_whitespace(false);
        let op_pos = self.pos;
        let mnemonic = self.read_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        let mut parts = mnemonic.split('.');
        let op_name = parts.next().unwrap_or("");
        if op_name == "condbr" {
            return self.parse_condbr(func, b);
        }
        let Some(op) = Op::from_name(op_name) else {
            return Err(self.error_at(op_pos, format!("unknown opcode '{op_name}'")));
        };

        let mut ty = None;
        let mut tex = TexInfo::new(TexTarget::Tex2D);
        let mut cond = None;
        for part in parts {
            if let Some(t) = DataType::from_name(part) {
                ty = Some(t);
            } else if let (true, Some(t)) = (op.is_tex(), TexTarget::from_name(part)) {
                tex.target = t;
            } else if let (true, Some(mask)) = (op.is_tex(), part.strip_prefix('m')) {
                tex.mask = mask
                    .parse::<u8>()
                    .map_err(|_| self.error_at(op_pos, format!("invalid mask '{part}'")))?;
            } else if op.is_tex() && part == "offsets" {
                tex.use_offsets = true;
            } else if let (Op::Set, Some(cc)) = (op, CondCode::from_name(part)) {
                cond = Some(cc);
            } else {
                return Err(self.error_at(op_pos, format!("unknown suffix '.{part}' on {op_name}")));
            }
        }
        let ty = ty.unwrap_or_else(|| match (op.is_tex(), defs.first()) {
            (true, _) => DataType::F32,
            (false, Some(&d)) => func.value(d).ty,
            (false, None) => DataType::None,
        });

        let mut inst = if op.is_tex() {
            Instruction::new_tex(op, ty, tex)
        } else {
            Instruction::new(op, ty)
        };
        if let Some(cc) = cond {
            inst.kind = InstKind::Compare(cc);
        }
        let i = func.new_inst(inst);
        for (d, &v) in defs.iter().enumerate() {
            func.set_def(i, d, Some(v));
        }

        match op {
            Op::Bra => {
                let target = self.read_block_name()?;
                let t = self.block(func, target);
                func.inst_mut(i).kind = InstKind::Flow(FlowTarget::Block(t));
                func.add_edge(b, t);
            }
            Op::Call => {
                let name = self.read_identifier()?;
                self.call_resolves.push(CallResolve {
                    func: FuncId(self.prog.functions.len() as u32),
                    inst: i,
                    name,
                    pos: op_pos,
                });
                self.expect('(')?;
                if !self.try_read(')') {
                    let mut s = 0;
                    loop {
                        self.parse_src(func, i, s, ty)?;
                        s += 1;
                        if !self.try_read(',') {
                            break;
                        }
                    }
                    self.expect(')')?;
                }
            }
            Op::Ret | Op::Exit => {
                func.exit = Some(b);
            }
            Op::Phi => {
                let mut s = 0;
                while self.try_read('[') {
                    let pred = self.read_block_name()?;
                    let pb = self.block(func, pred);
                    self.expect(',')?;
                    self.parse_src(func, i, s, ty)?;
                    self.expect(']')?;
                    if let Some(preds) = func.inst_mut(i).phi_preds_mut() {
                        preds.push(pb);
                    }
                    s += 1;
                    if !self.try_read(',') {
                        break;
                    }
                }
            }
            _ => {
                let mut s = 0;
                while !self.at_line_end() && !self.peek_keyword("if") {
                    self.parse_src(func, i, s, ty)?;
                    s += 1;
                    if !self.try_read(',') {
                        break;
                    }
                }
            }
        }

        if self.read_keyword("if") {
            let name = self.read_value_name()?;
            let p = self.value(func, name);
            func.set_predicate(i, Some(p));
        }
        func.append_inst(b, i);
        Ok(())
    }

    fn peek_keyword(&mut self, kw: &str) -> bool {
        let start = self.pos;
        let found = self.read_keyword(kw);
        self.pos = start;
        found
    }

    /// `condbr %p, ^t, ^f`
    fn parse_condbr(&mut self, func: &mut Function, b: BlockId) -> ParseResult<()> {
        let name = self.read_value_name()?;
        let p = self.value(func, name);
        self.expect(',')?;
        let t = self.read_block_name()?;
        self.expect(',')?;
        let f = self.read_block_name()?;
        let (t, f) = (self.block(func, t), self.block(func, f));
        let bra = func.new_inst(Instruction::new_flow(Op::Bra, FlowTarget::Block(t)));
        func.set_predicate(bra, Some(p));
        func.append_inst(b, bra);
        func.add_edge(b, t);
        func.add_edge(b, f);
        Ok(())
    }

    /// One source operand: a value with optional modifiers, an immediate or a
    /// memory reference.
    fn parse_src(&mut self, func: &mut Function, i: InstId, s: usize, ty: DataType) -> ParseResult<()> {
        self.skip_whitespace(false);
        let mut modifier = Modifier::NONE;
        if self.try_read('-') {
            modifier = modifier.union(Modifier::NEG);
        }
        if self.try_read('~') {
            modifier = modifier.union(Modifier::NOT);
        }
        let abs = self.try_read('|');
        if abs {
            modifier = modifier.union(Modifier::ABS);
        }

        self.skip_whitespace(false);
        match self.current_char() {
            Some('%') => {
                let name = self.read_value_name()?;
                let v = self.value(func, name);
                func.set_src(i, s, Some(v));
            }
            Some('$') => {
                self.advance();
                let v = self.read_immediate(func)?;
                func.set_src(i, s, Some(v));
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                let bank = self.read_while(|c| c.is_ascii_alphanumeric());
                let file = match bank.trim_end_matches(|c: char| c.is_ascii_digit()) {
                    "c" => RegFile::MemConst,
                    "g" => RegFile::MemGlobal,
                    "s" => RegFile::MemShared,
                    "l" => RegFile::MemLocal,
                    "o" => RegFile::ShaderOut,
                    _ => return Err(self.error_at(start, format!("unknown memory space '{bank}'"))),
                };
                self.expect('[')?;
                let mut indirect = None;
                let mut offset = 0;
                self.skip_whitespace(false);
                if self.current_char() == Some('%') {
                    let name = self.read_value_name()?;
                    indirect = Some(self.value(func, name));
                    self.skip_whitespace(false);
                    if self.try_read('+') {
                        offset = self.read_number()?;
                    } else if self.current_char() == Some('-') {
                        offset = self.read_number()?;
                    }
                } else {
                    offset = self.read_number()?;
                }
                self.expect(']')?;
                let sym_ty = if ty == DataType::None { DataType::U32 } else { ty };
                let sym = func.new_value(Value::symbol(file, offset as i32, sym_ty));
                func.set_src(i, s, Some(sym));
                func.set_indirect(i, s, 0, indirect);
            }
            _ => return Err(self.error("expected operand")),
        }

        if abs {
            self.expect('|')?;
        }
        if !modifier.is_none() {
            func.set_modifier(i, s, modifier);
        }
        Ok(())
    }

    fn read_immediate(&mut self, func: &mut Function) -> ParseResult<ValueId> {
        let start = self.pos;
        let text = self.read_while(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'));
        let is_hex = text.contains("0x") || text.contains("0X");
        let value = if !is_hex && (text.contains('.') || text.contains('e')) {
            text.parse::<f32>()
                .map(|f| Value::immediate(f.to_bits() as u64, DataType::F32))
                .ok()
        } else {
            let (neg, digits) = match text.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, text),
            };
            let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16),
                None => digits.parse::<i64>(),
            };
            parsed.ok().map(|n| {
                let n = if neg { -n } else { n };
                let ty = if neg { DataType::S32 } else { DataType::U32 };
                Value::immediate(n as u64, ty)
            })
        };
        match value {
            Some(v) => Ok(func.new_value(v)),
            None => Err(self.error_at(start, format!("invalid immediate '${text}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::EdgeKind;

    const DIAMOND: &str = r#"
; diamond with a phi
func main(%in0, %in1) -> (%out0) {
entry:
  %a = add.f32 %in0, $1.0
  %p:pred = set.lt.f32 %a, %in0
  condbr %p, ^then, ^else
then:
  br ^join
else:
  br ^join
join:
  %x = phi [^then, %a], [^else, %in0]
  %r0, %r1, %r2, %r3 = tex.2d %x, %a
  %w:gpr64 = ld.u64 g[%in1+16]
  st.u64 g[%in1], %r0, %r1
  %out0 = mov -%r2
  ret
}
"#;

    #[test]
    fn test_parse_diamond() {
        let _ = env_logger::builder().is_test(true).try_init();
        let func = parse_function(DIAMOND).unwrap();
        assert_eq!(func.name, "main");
        assert_eq!(func.num_blocks(), 4);
        assert_eq!(func.block(func.entry).name, "entry");
        assert_eq!(func.ins.len(), 2);
        assert_eq!(func.outs.len(), 1);

        let join = func.find_block("join").unwrap();
        assert_eq!(func.exit, Some(join));
        assert_eq!(func.block(func.entry).succ_edges().len(), 2);
        assert!(func
            .block(func.entry)
            .succ_edges()
            .iter()
            .all(|e| e.kind == EdgeKind::Dummy));

        let p = func.find_value("p").unwrap();
        assert_eq!(func.value(p).file, RegFile::Predicate);
        let w = func.find_value("w").unwrap();
        assert_eq!(func.value(w).size, 8);

        let phi = func.phis(join)[0];
        let then = func.find_block("then").unwrap();
        let els = func.find_block("else").unwrap();
        assert_eq!(func.inst(phi).phi_preds().unwrap(), &[then, els]);

        let text = func.print();
        assert!(text.contains("condbr %p, ^then, ^else"), "{text}");
        assert!(text.contains("%p = set.lt.f32 %a, %in0"), "{text}");
        assert!(text.contains("ld.u64 g[%in1+16]"), "{text}");
        assert!(text.contains("%out0 = mov.u32 -%r2"), "{text}");
    }

    #[test]
    fn test_forward_reference_in_loop() {
        let text = r#"
func loop(%n) -> (%i) {
entry:
  %zero = mov $0
  br ^head
head:
  %i = phi [^entry, %zero], [^body, %next]
  %c:pred = set.lt.u32 %i, %n
  condbr %c, ^body, ^done
body:
  %next = add %i, $1
  br ^head
done:
  ret
}
"#;
        let func = parse_function(text).unwrap();
        let next = func.find_value("next").unwrap();
        assert_eq!(func.value(next).defs().len(), 1);
        let head = func.find_block("head").unwrap();
        assert_eq!(func.block(head).preds().len(), 2);
    }

    #[test]
    fn test_calls_resolve_after_parse() {
        let text = r#"
func main(%a) -> (%r) {
entry:
  %r = call helper(%a)
  ret
}
func helper(%x) -> (%y) {
entry:
  %y = add %x, %x
  ret
}
"#;
        let prog = parse_program(text, TargetDesc::nvc0()).unwrap();
        let main = prog.function_by_name("main").unwrap();
        let call = main.first_inst(main.entry).unwrap();
        assert_eq!(
            main.inst(call).flow_target(),
            Some(FlowTarget::Func(prog.find_function("helper").unwrap()))
        );
        assert_eq!(prog.call_order(), vec![FuncId(1), FuncId(0)]);
    }

    #[test]
    fn test_fixed_ids_and_predicates() {
        let text = r#"
func f(%a@3, %p:pred) -> (%b:gpr64@0) {
entry:
  %b = mov %a if %p
  ret
}
"#;
        let func = parse_function(text).unwrap();
        let a = func.find_value("a").unwrap();
        let b = func.find_value("b").unwrap();
        assert_eq!(func.value(a).reg, 3);
        assert_eq!((func.value(b).reg, func.value(b).size), (0, 8));
        let mov = func.first_inst(func.entry).unwrap();
        assert_eq!(func.inst(mov).predicate(), func.find_value("p"));
    }

    #[test]
    fn test_errors_report_line() {
        let err = parse_function("func f() {\nentry:\n  %a = frob %b\n  ret\n}\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.reason.contains("frob"));

        let err = parse_function("func f() -> (%a) {\nentry:\n  ret\n}\n").unwrap_err();
        assert!(err.reason.contains("never defined"));
    }
}
