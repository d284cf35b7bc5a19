use miette::Diagnostic;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Fatal execution failures. The runtime never recovers; the first error
/// terminates the fetch/decode/execute loop.
#[derive(Error, Diagnostic, Debug)]
pub enum RuntimeError {
    #[error("program counter out of bounds: {0}")]
    OutOfBoundsProgram(i64),

    #[error("expected an opcode at pc {pc}, found {found}")]
    DecodeError { pc: i64, found: String },

    #[error("opcode at {at} expects {operands} operands, but the program ends early")]
    TruncatedProgram { at: usize, operands: usize },

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("stack index out of bounds: {0}")]
    StackOutOfBounds(i64),

    #[error("read of uninitialized stack slot {0}")]
    UninitializedStackSlot(i64),

    #[error("heap address out of bounds: {0}")]
    HeapOutOfBounds(i64),

    #[error("read of uninitialized heap cell {0}")]
    UninitializedHeapCell(i64),

    #[error("out of heap memory: requested {requested} cells, {available} available")]
    OutOfMemory { requested: i64, available: usize },

    #[error("alloc: invalid size {0}")]
    InvalidAllocSize(i64),

    #[error("{op}: unsupported operand {operand}")]
    UnsupportedOperand { op: &'static str, operand: String },

    #[error("read of unset register {0}")]
    UnsetRegister(&'static str),

    #[error("special register {register} only holds integers, got {value}")]
    SpecialRegisterType { register: &'static str, value: String },

    #[error("flag register {register} only holds booleans, got {value}")]
    FlagRegisterType { register: &'static str, value: String },

    #[error("{op}: incompatible operand types {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("syscall: unsupported syscall number {0}")]
    UnsupportedSyscall(i64),

    #[error("{syscall}: unsupported fd {fd}")]
    UnsupportedFd { syscall: &'static str, fd: i64 },

    #[error("{syscall}: io failure: {source}")]
    Io {
        syscall: &'static str,
        source: std::io::Error,
    },
}
