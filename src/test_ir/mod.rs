// This module hosts the textual test IR used by unit tests, integration tests and the
// ra_dump tool. Programs are written as a list of functions with named blocks and
// values; the parser builds the same Function and Program structures the allocator
// consumes, so a test can state its input as text and inspect registers afterwards by
// value name.

//! Test IR (TIR) parser.
//!
//! # TIR Format
//!
//! ```text
//! ; Comments start with a semicolon
//! func name(%in0, %in1:pred) -> (%out0@0) {
//! entry:
//!   %a = add.f32 %in0, $1.0
//!   %p:pred = set.lt.f32 %a, %in0
//!   condbr %p, ^then, ^join
//! then:
//!   br ^join
//! join:
//!   %x = phi [^entry, %in0], [^then, %a]
//!   %r0, %r1, %r2, %r3 = tex.2d %x, %a
//!   %out0 = mov %r0
//!   ret
//! }
//! ```
//!
//! - Value attributes: `:gpr`, `:gpr64`, `:gpr96`, `:gpr128`, `:pred`,
//!   `:flags`, `:addr`; `@N` pins the value to register `N`.
//! - Operands: `%v`, `-%v`, `~%v`, `|%v|`, `$imm` and memory references
//!   `c0[..]`, `g[..]`, `s[..]`, `l[..]`, `o[..]` with an optional indirect
//!   value and offset.
//! - Tex suffixes: `1d`, `2d`, `3d`, `cube`, `2d_array`, `shadow`, `.mN`
//!   write mask and `offsets`.
//! - `call name(args)` may name a function defined later in the file.
//! - A trailing `if %p` predicates an instruction.

pub mod parser;

pub use parser::{parse_function, parse_program, ParseError, ParseResult};
