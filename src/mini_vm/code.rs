//! The operand universe shared by the assemblers, the linker and the
//! runtime. A program is a flat `Vec<Code>`; an opcode cell is followed by
//! exactly `arity` operand cells.

use std::fmt::{Display, Formatter};

/// Syscall numbers dispatched on `r0`.
pub const SYS_EXIT: i64 = 0;
pub const SYS_WRITE: i64 = 1;
pub const SYS_READ: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Mov,
    Push,
    Pop,
    Alloc,
    Store,
    Load,
    Call,
    Ret,
    Jmp,
    Jz,
    Jnz,
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Syscall,
}

impl Opcode {
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Mov => "mov",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Alloc => "alloc",
            Opcode::Store => "store",
            Opcode::Load => "load",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Jmp => "jmp",
            Opcode::Jz => "jz",
            Opcode::Jnz => "jnz",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Eq => "eq",
            Opcode::Ne => "ne",
            Opcode::Lt => "lt",
            Opcode::Le => "le",
            Opcode::Syscall => "syscall",
        }
    }

    /// Number of operand cells the opcode consumes. Total over all opcodes.
    pub const fn arity(self) -> usize {
        match self {
            Opcode::Nop | Opcode::Ret | Opcode::Syscall => 0,
            Opcode::Push | Opcode::Pop | Opcode::Alloc => 1,
            Opcode::Call | Opcode::Jmp | Opcode::Jz | Opcode::Jnz => 1,
            Opcode::Mov | Opcode::Store | Opcode::Load => 2,
            Opcode::Add | Opcode::Sub => 2,
            Opcode::Eq | Opcode::Ne | Opcode::Lt | Opcode::Le => 2,
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        let op = match name {
            "nop" => Opcode::Nop,
            "mov" => Opcode::Mov,
            "push" => Opcode::Push,
            "pop" => Opcode::Pop,
            "alloc" => Opcode::Alloc,
            "store" => Opcode::Store,
            "load" => Opcode::Load,
            "call" => Opcode::Call,
            "ret" => Opcode::Ret,
            "jmp" => Opcode::Jmp,
            "jz" => Opcode::Jz,
            "jnz" => Opcode::Jnz,
            "add" => Opcode::Add,
            "sub" => Opcode::Sub,
            "eq" => Opcode::Eq,
            "ne" => Opcode::Ne,
            "lt" => Opcode::Lt,
            "le" => Opcode::Le,
            "syscall" => Opcode::Syscall,
            _ => return None,
        };
        Some(op)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialRegister {
    Pc,
    Sp,
    Bp,
    Hp,
}

pub const SPECIAL_REGISTER_COUNT: usize = 4;

impl SpecialRegister {
    pub const fn name(self) -> &'static str {
        match self {
            SpecialRegister::Pc => "pc",
            SpecialRegister::Sp => "sp",
            SpecialRegister::Bp => "bp",
            SpecialRegister::Hp => "hp",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneralRegister {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
}

pub const GENERAL_REGISTER_COUNT: usize = 11;

impl GeneralRegister {
    pub const fn name(self) -> &'static str {
        match self {
            GeneralRegister::R0 => "r0",
            GeneralRegister::R1 => "r1",
            GeneralRegister::R2 => "r2",
            GeneralRegister::R3 => "r3",
            GeneralRegister::R4 => "r4",
            GeneralRegister::R5 => "r5",
            GeneralRegister::R6 => "r6",
            GeneralRegister::R7 => "r7",
            GeneralRegister::R8 => "r8",
            GeneralRegister::R9 => "r9",
            GeneralRegister::R10 => "r10",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagRegister {
    Zf,
}

impl FlagRegister {
    pub const fn name(self) -> &'static str {
        match self {
            FlagRegister::Zf => "zf",
        }
    }
}

/// One of the three register classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Special(SpecialRegister),
    General(GeneralRegister),
    Flag(FlagRegister),
}

impl Register {
    pub const fn name(self) -> &'static str {
        match self {
            Register::Special(r) => r.name(),
            Register::General(r) => r.name(),
            Register::Flag(r) => r.name(),
        }
    }

    pub fn from_name(name: &str) -> Option<Register> {
        let reg = match name {
            "pc" => Register::Special(SpecialRegister::Pc),
            "sp" => Register::Special(SpecialRegister::Sp),
            "bp" => Register::Special(SpecialRegister::Bp),
            "hp" => Register::Special(SpecialRegister::Hp),
            "r0" => Register::General(GeneralRegister::R0),
            "r1" => Register::General(GeneralRegister::R1),
            "r2" => Register::General(GeneralRegister::R2),
            "r3" => Register::General(GeneralRegister::R3),
            "r4" => Register::General(GeneralRegister::R4),
            "r5" => Register::General(GeneralRegister::R5),
            "r6" => Register::General(GeneralRegister::R6),
            "r7" => Register::General(GeneralRegister::R7),
            "r8" => Register::General(GeneralRegister::R8),
            "r9" => Register::General(GeneralRegister::R9),
            "r10" => Register::General(GeneralRegister::R10),
            "zf" => Register::Flag(FlagRegister::Zf),
            _ => return None,
        };
        Some(reg)
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed value held in a register, a stack cell or a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    Int(i64),
    Bool(bool),
    Char(char),
}

impl Immediate {
    /// The integer reading every immediate answers: integers as
    /// themselves, booleans as 0/1, characters as their Unicode scalar.
    pub const fn value(self) -> i64 {
        match self {
            Immediate::Int(v) => v,
            Immediate::Bool(true) => 1,
            Immediate::Bool(false) => 0,
            Immediate::Char(c) => c as i64,
        }
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            Immediate::Int(_) => "integer",
            Immediate::Bool(_) => "boolean",
            Immediate::Char(_) => "character",
        }
    }
}

impl Display for Immediate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Immediate::Int(v) => write!(f, "{v}"),
            Immediate::Bool(b) => write!(f, "{b}"),
            Immediate::Char(c) => write!(f, "{}", quote_char(*c)),
        }
    }
}

/// Renders a character the way the assembler reads it back.
pub(crate) fn quote_char(c: char) -> String {
    match c {
        '\n' => "'\\n'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\'' => "'\\''".to_string(),
        '\0' => "'\\0'".to_string(),
        c => format!("'{c}'"),
    }
}

/// A signed displacement. Stack offsets index the stack relative to `bp`
/// or `sp`; PC offsets are control-transfer targets relative to the
/// opcode cell that owns the operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Offset {
    Bp(i64),
    Sp(i64),
    Pc(i64),
}

impl Display for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Offset::Bp(d) => write!(f, "[bp{d:+}]"),
            Offset::Sp(d) => write!(f, "[sp{d:+}]"),
            Offset::Pc(d) => write!(f, "({d:+})"),
        }
    }
}

/// A single program cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Op(Opcode),
    Reg(Register),
    Off(Offset),
    Imm(Immediate),
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Code::Op(op) => write!(f, "{op}"),
            Code::Reg(reg) => write!(f, "{reg}"),
            Code::Off(off) => write!(f, "{off}"),
            Code::Imm(imm) => write!(f, "{imm}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_round_trip() {
        let all = [
            Opcode::Nop,
            Opcode::Mov,
            Opcode::Push,
            Opcode::Pop,
            Opcode::Alloc,
            Opcode::Store,
            Opcode::Load,
            Opcode::Call,
            Opcode::Ret,
            Opcode::Jmp,
            Opcode::Jz,
            Opcode::Jnz,
            Opcode::Add,
            Opcode::Sub,
            Opcode::Eq,
            Opcode::Ne,
            Opcode::Lt,
            Opcode::Le,
            Opcode::Syscall,
        ];
        for op in all {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("halt"), None);
    }

    #[test]
    fn register_name_round_trip() {
        for name in [
            "pc", "sp", "bp", "hp", "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9",
            "r10", "zf",
        ] {
            let reg = Register::from_name(name).unwrap();
            assert_eq!(reg.name(), name);
        }
        assert_eq!(Register::from_name("rax"), None);
    }

    #[test]
    fn immediate_values() {
        assert_eq!(Immediate::Int(-3).value(), -3);
        assert_eq!(Immediate::Bool(true).value(), 1);
        assert_eq!(Immediate::Bool(false).value(), 0);
        assert_eq!(Immediate::Char('a').value(), 97);
        assert_eq!(Immediate::Char('\0').value(), 0);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Code::Op(Opcode::Mov).to_string(), "mov");
        assert_eq!(Code::Off(Offset::Sp(-2)).to_string(), "[sp-2]");
        assert_eq!(Code::Off(Offset::Bp(1)).to_string(), "[bp+1]");
        assert_eq!(Code::Off(Offset::Pc(3)).to_string(), "(+3)");
        assert_eq!(Code::Imm(Immediate::Char('\n')).to_string(), "'\\n'");
        assert_eq!(Code::Imm(Immediate::Bool(true)).to_string(), "true");
        assert_eq!(
            Code::Reg(Register::General(GeneralRegister::R10)).to_string(),
            "r10"
        );
    }
}
