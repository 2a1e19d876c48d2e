//! # teal-vm
//!
//! Stack-machine interpreter for TEAL assembly listings.
//!
//! This crate provides:
//! - Program loading with a label table
//! - Operand stack, scratch space and call frames
//! - Opcode execution with overflow, type and bounds traps
//! - A simulated application environment (state, logs, calling transaction)
//!
//! ```
//! use teal_vm::{run, Program, Value};
//!
//! let program = Program::parse("int 5\nint 3\n+\nreturn").unwrap();
//! let execution = run(&program, true, None, None).unwrap();
//! assert_eq!(execution.stack, vec![Value::Uint(8)]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod literal;
pub mod opcode;
pub mod program;
pub mod scratch;
pub mod stack;
pub mod value;

pub use config::{ExecutionConfig, Limits};
pub use context::{AppCallTxn, ExecutionContext, OnComplete};
pub use error::{ErrorKind, Fault, LoadError, VmError, VmResult};
pub use interpreter::{Execution, Halt, Interpreter};
pub use opcode::Opcode;
pub use program::{Instruction, Line, Program};
pub use scratch::{ScratchSpace, SCRATCH_SLOTS};
pub use stack::Stack;
pub use value::{Value, ValueKind};

use std::io::Write;

/// Execute `program` once with default ceilings
///
/// `return_full_stack` selects whether `return` yields the whole stack or
/// only its top value. State, log and `txn` opcodes need `context`; each
/// executed line is reported to `trace` when given.
pub fn run<'a>(
    program: &'a Program,
    return_full_stack: bool,
    context: Option<&'a mut ExecutionContext>,
    trace: Option<&'a mut dyn Write>,
) -> VmResult<Execution> {
    let config = ExecutionConfig {
        return_full_stack,
        ..ExecutionConfig::default()
    };
    let mut interpreter = Interpreter::new(program, config);
    if let Some(context) = context {
        interpreter = interpreter.with_context(context);
    }
    if let Some(trace) = trace {
        interpreter = interpreter.with_trace(trace);
    }
    interpreter.run()
}
