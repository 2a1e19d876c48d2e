//! Interpreter error types

use crate::value::ValueKind;
use thiserror::Error;

/// Errors raised while turning source text into a [`Program`](crate::Program)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Input bytes are not UTF-8 text
    #[error("program is not valid UTF-8 text (first bad byte at offset {offset})")]
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence
        offset: usize,
    },

    /// Same label declared twice
    #[error("line {line}: label {label:?} already declared on line {first}")]
    DuplicateLabel {
        /// Label name without the trailing colon
        label: String,
        /// 1-based line of the first declaration
        first: usize,
        /// 1-based line of the duplicate
        line: usize,
    },

    /// A lone `:`
    #[error("line {line}: empty label name")]
    EmptyLabel {
        /// 1-based line number
        line: usize,
    },
}

/// Reason a program panicked
///
/// Every opcode precondition violation maps to one of these. The interpreter
/// attaches the offending line number when it turns a fault into a
/// [`VmError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Integer result at or above 2^64
    #[error("Overflow")]
    Overflow,

    /// Integer or big-integer result below zero
    #[error("Underflow")]
    Underflow,

    /// Zero divisor
    #[error("Division by zero")]
    DivisionByZero,

    /// Wide division whose quotient does not fit 64 bits
    #[error("Division overflow")]
    DivisionOverflow,

    /// Mathematically undefined input such as `0 exp 0`
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Operand has the wrong variant
    #[error("Invalid type: expected {expected}, found {found}")]
    InvalidType {
        /// Variant the opcode requires
        expected: ValueKind,
        /// Variant actually popped
        found: ValueKind,
    },

    /// Operands of a comparison or byte-math opcode have different variants
    #[error("Type mismatch: {left} vs {right}")]
    TypeMismatch {
        /// Variant of the deeper operand
        left: ValueKind,
        /// Variant of the top operand
        right: ValueKind,
    },

    /// Big-integer operand longer than the permitted width
    #[error("Bytes overflow: {len} bytes exceeds {max}")]
    BytesOverflow {
        /// Operand length
        len: usize,
        /// Permitted length
        max: usize,
    },

    /// Produced byte string longer than the maximum string size
    #[error("Produced byte array of {len} bytes exceeds {max}")]
    StringTooLong {
        /// Length that would have been produced
        len: usize,
        /// Maximum string size
        max: usize,
    },

    /// `btoi` input longer than 8 bytes
    #[error("btoi requires bytes of length 8 or less (actual={0})")]
    BtoiTooLong(usize),

    /// Slice or index outside a byte string or integer
    #[error("Out of bounds: {start}..{end} with length {len}")]
    OutOfBounds {
        /// First index accessed
        start: u64,
        /// One past the last index accessed
        end: u64,
        /// Length of the accessed value
        len: u64,
    },

    /// Shift amount of 64 or more
    #[error("Shift amount {0} too large")]
    ShiftTooLarge(u64),

    /// `setbyte` or `setbit` value outside its domain
    #[error("Invalid {what} value {value}")]
    InvalidSetValue {
        /// `byte` or `bit`
        what: &'static str,
        /// Rejected value
        value: u64,
    },

    /// `int` immediate outside [0, 2^64)
    #[error("int expects non-negative integer smaller than 2^64 (actual={0})")]
    IntOutOfRange(String),

    /// Immediate argument missing
    #[error("{op} expects immediate argument {index}")]
    MissingImmediate {
        /// Mnemonic
        op: &'static str,
        /// 0-based argument position
        index: usize,
    },

    /// Immediate argument that does not parse
    #[error("Invalid immediate {arg:?} for {op}")]
    InvalidImmediate {
        /// Mnemonic
        op: &'static str,
        /// Raw argument text
        arg: String,
    },

    /// `byte` literal in none of the accepted forms
    #[error("byte requires string, hex or base64 value: {0}")]
    InvalidByteLiteral(String),

    /// `addr` literal that is not a valid checksummed address
    #[error("Invalid address literal: {0}")]
    InvalidAddress(String),

    /// Branch target missing from the label table
    #[error("Unknown label {0:?}")]
    UnknownLabel(String),

    /// Scratch index outside [0, 256)
    #[error("Scratch slot {0} out of range")]
    ScratchOutOfBounds(u64),

    /// Pop or peek past the bottom of the operand stack
    #[error("Stack underflow")]
    StackUnderflow,

    /// `cover`, `uncover`, `dig` or `bury` deeper than the stack
    #[error("{op} {depth} with stack size {len}")]
    StackTooShallow {
        /// Mnemonic
        op: &'static str,
        /// Requested depth
        depth: usize,
        /// Stack size at the time
        len: usize,
    },

    /// `return` asked for the top value of an empty stack
    #[error("return with empty stack")]
    ReturnEmptyStack,

    /// `retsub` (or a frame opcode) without an active call
    #[error("{0} with empty call stack")]
    EmptyCallStack(&'static str),

    /// `proto` not directly after `callsub`
    #[error("proto must only be used after callsub")]
    ProtoNotAfterCallsub,

    /// `proto` declared more arguments than the caller pushed
    #[error("proto with stack size {available} but expected at least {argc}")]
    ProtoArguments {
        /// Declared argument count
        argc: usize,
        /// Values below the frame height
        available: usize,
    },

    /// `frame_dig`/`frame_bury` past the declared arguments
    #[error("frame access at offset {offset} but argc {argc}")]
    FrameArgument {
        /// Requested offset
        offset: i64,
        /// Declared argument count
        argc: usize,
    },

    /// Frame-relative index outside the operand stack
    #[error("frame index {index} out of stack bounds [0,{len})")]
    FrameIndex {
        /// Absolute index computed from the frame height
        index: i64,
        /// Stack size at the time
        len: usize,
    },

    /// `frame_bury` targeting the value it is about to pop
    #[error("frame_bury with index on top of stack")]
    FrameBuryTop,

    /// `retsub` with fewer values than the declared returns
    #[error("retsub with stack size {len} but expected at least {expected}")]
    MissingReturnValues {
        /// Stack size at the time
        len: usize,
        /// Frame height plus return count
        expected: usize,
    },

    /// Global store already holds the maximum number of keys
    #[error("Global state size exceeded (max {0} keys)")]
    GlobalStateFull(usize),

    /// Local store already holds the maximum number of keys
    #[error("Local state size exceeded (max {0} keys)")]
    LocalStateFull(usize),

    /// Too many `log` calls
    #[error("log calls limit exceeded (max {0})")]
    LogCallsExceeded(usize),

    /// Too many logged bytes
    #[error("log size limit exceeded (max {0} bytes)")]
    LogSizeExceeded(usize),

    /// `txna ApplicationArgs` index past the argument list
    #[error("ApplicationArgs index {index} out of bounds ({count} args)")]
    AppArgOutOfBounds {
        /// Requested index
        index: u64,
        /// Number of arguments
        count: usize,
    },

    /// The `err` opcode
    #[error("Encountered error opcode")]
    ErrOpcode,
}

impl Fault {
    /// Attach the 1-based line number of the instruction that faulted
    pub fn at(self, line: usize) -> VmError {
        match self {
            Fault::StackUnderflow => VmError::StackUnderflow { line },
            fault => VmError::Panic { fault, line },
        }
    }
}

/// Result type for operations that fault without line information
pub type FaultResult<T> = Result<T, Fault>;

/// Broad classification of a [`VmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The simulated program violated an opcode precondition
    Panic,
    /// `assert` popped zero
    AssertionFailed,
    /// The harness set the interpreter up incompletely
    Usage,
    /// Interpreter popped an empty stack
    StackUnderflow,
    /// Program text could not be loaded
    Load,
}

/// Interpreter errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Program panic (wrong types, overflow, bounds, ceilings, labels)
    #[error("panic at line {line}: {fault}")]
    Panic {
        /// Reason
        fault: Fault,
        /// 1-based line number
        line: usize,
    },

    /// `assert` on zero
    #[error("assertion failed at line {line}")]
    AssertionFailed {
        /// 1-based line number
        line: usize,
    },

    /// Incomplete harness setup or unsupported opcode
    #[error("usage error at line {line}: {message}")]
    Usage {
        /// Description
        message: String,
        /// 1-based line number
        line: usize,
    },

    /// Operand stack exhausted
    #[error("stack underflow at line {line}")]
    StackUnderflow {
        /// 1-based line number
        line: usize,
    },

    /// Program could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl VmError {
    /// Build a usage error
    pub fn usage(message: impl Into<String>, line: usize) -> Self {
        VmError::Usage {
            message: message.into(),
            line,
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::Panic { .. } => ErrorKind::Panic,
            VmError::AssertionFailed { .. } => ErrorKind::AssertionFailed,
            VmError::Usage { .. } => ErrorKind::Usage,
            VmError::StackUnderflow { .. } => ErrorKind::StackUnderflow,
            VmError::Load(_) => ErrorKind::Load,
        }
    }

    /// Whether the program itself failed (assertion failures included)
    pub fn is_panic(&self) -> bool {
        matches!(self, VmError::Panic { .. } | VmError::AssertionFailed { .. })
    }

    /// The fault behind a panic, if any
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            VmError::Panic { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// 1-based line number, absent for load errors
    pub fn line(&self) -> Option<usize> {
        match self {
            VmError::Panic { line, .. }
            | VmError::AssertionFailed { line }
            | VmError::Usage { line, .. }
            | VmError::StackUnderflow { line } => Some(*line),
            VmError::Load(_) => None,
        }
    }

    /// Human-readable message without the line prefix
    pub fn message(&self) -> String {
        match self {
            VmError::Panic { fault, .. } => fault.to_string(),
            VmError::AssertionFailed { .. } => "Assert failed".to_string(),
            VmError::Usage { message, .. } => message.clone(),
            VmError::StackUnderflow { .. } => Fault::StackUnderflow.to_string(),
            VmError::Load(e) => e.to_string(),
        }
    }
}

/// Result type for interpreter operations
pub type VmResult<T> = Result<T, VmError>;
