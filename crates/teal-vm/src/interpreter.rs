//! Instruction interpreter

use crate::config::{ExecutionConfig, Limits, HARD_MAX_STRING_SIZE};
use crate::context::ExecutionContext;
use crate::error::{Fault, FaultResult, VmError, VmResult};
use crate::frame::CallStack;
use crate::literal;
use crate::opcode::Opcode;
use crate::program::{Instruction, Line, Program};
use crate::scratch::ScratchSpace;
use crate::stack::Stack;
use crate::value::{self, Value, ValueKind};
use num_bigint::BigUint;
use num_traits::Zero;
use std::io::Write;
use tracing::{debug, trace};

/// Why execution stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The `return` opcode
    Return,
    /// Ran past the last line
    EndOfProgram,
}

/// Observable result of one invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Execution {
    /// Final operand stack, bottom first (only the top value when `return`
    /// ran with `return_full_stack` off)
    pub stack: Vec<Value>,
    /// All 256 scratch slots
    pub scratch: ScratchSpace,
    /// Halt reason
    pub halt: Halt,
    /// Instructions executed
    pub steps: u64,
}

impl Execution {
    /// Top of the final stack
    pub fn top(&self) -> Option<&Value> {
        self.stack.last()
    }
}

/// What the program counter does after an instruction
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

/// Failure raised while executing one instruction, before the line is known
enum Trap {
    Fault(Fault),
    Assert,
    Usage(String),
}

impl From<Fault> for Trap {
    fn from(fault: Fault) -> Self {
        Trap::Fault(fault)
    }
}

impl Trap {
    fn at(self, line: usize) -> VmError {
        match self {
            Trap::Fault(fault) => fault.at(line),
            Trap::Assert => VmError::AssertionFailed { line },
            Trap::Usage(message) => VmError::usage(message, line),
        }
    }
}

type StepResult<T> = Result<T, Trap>;

/// Interpreter state for one invocation
pub struct Interpreter<'a> {
    /// Program being executed
    program: &'a Program,
    /// Settings
    config: ExecutionConfig,
    /// Operand stack
    stack: Stack,
    /// Scratch space
    scratch: ScratchSpace,
    /// Active subroutine calls
    frames: CallStack,
    /// Index of the next line to execute
    pc: usize,
    /// Instructions executed
    steps: u64,
    /// Previously executed opcode (labels and comments do not count)
    prev_op: Option<Opcode>,
    /// Caller-owned environment
    context: Option<&'a mut ExecutionContext>,
    /// Diagnostic trace sink
    trace: Option<&'a mut dyn Write>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter positioned at the first line
    pub fn new(program: &'a Program, config: ExecutionConfig) -> Self {
        Self {
            program,
            config,
            stack: Stack::new(),
            scratch: ScratchSpace::new(),
            frames: CallStack::new(),
            pc: 0,
            steps: 0,
            prev_op: None,
            context: None,
            trace: None,
        }
    }

    /// Supply the execution environment for state, log and `txn` opcodes
    pub fn with_context(mut self, context: &'a mut ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Write `"<line>: <text> | <stack>"` to `sink` before each line runs
    pub fn with_trace(mut self, sink: &'a mut dyn Write) -> Self {
        self.trace = Some(sink);
        self
    }

    /// Current operand stack
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Current scratch space
    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    /// Index of the next line to execute
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Execute until `return` or the end of the program
    pub fn run(mut self) -> VmResult<Execution> {
        debug!(
            lines = self.program.len(),
            labels = self.program.labels().len(),
            return_full_stack = self.config.return_full_stack,
            bounds_checking = self.config.bounds_checking,
            "starting execution"
        );
        let halt = loop {
            if let Some(halt) = self.step()? {
                break halt;
            }
        };
        debug!(?halt, steps = self.steps, depth = self.stack.len(), "execution halted");
        Ok(Execution {
            stack: self.stack.into_vec(),
            scratch: self.scratch,
            halt,
            steps: self.steps,
        })
    }

    /// Execute one source line
    ///
    /// Returns the halt reason once execution is over.
    pub fn step(&mut self) -> VmResult<Option<Halt>> {
        let program = self.program;
        let index = self.pc;
        let Some(line) = program.line(index) else {
            return Ok(Some(Halt::EndOfProgram));
        };
        let line_no = index + 1;
        self.pc += 1;

        match line {
            Line::Blank | Line::Comment => Ok(None),
            Line::Label(_) => {
                self.write_trace(line_no)?;
                Ok(None)
            }
            Line::Unsupported(text) => {
                self.write_trace(line_no)?;
                Err(VmError::usage(
                    format!("Operation '{}' is not supported by the simulator", text),
                    line_no,
                ))
            }
            Line::Instruction(ins) => {
                self.write_trace(line_no)?;
                self.steps += 1;
                trace!(line = line_no, op = %ins.opcode, depth = self.stack.len(), "step");
                let flow = self.execute(ins).map_err(|t| t.at(line_no))?;
                self.prev_op = Some(ins.opcode);
                match flow {
                    Flow::Next => Ok(None),
                    Flow::Jump(target) => {
                        self.pc = target;
                        Ok(None)
                    }
                    Flow::Halt => Ok(Some(Halt::Return)),
                }
            }
        }
    }

    fn write_trace(&mut self, line_no: usize) -> VmResult<()> {
        if let Some(sink) = self.trace.as_mut() {
            writeln!(
                sink,
                "{}: {} | {}",
                line_no,
                self.program.source(line_no - 1),
                self.stack
            )
            .map_err(|e| VmError::usage(format!("trace sink write failed: {}", e), line_no))?;
        }
        Ok(())
    }

    /// Execute an instruction
    fn execute(&mut self, ins: &Instruction) -> StepResult<Flow> {
        let limits = self.config.active_limits().copied();
        let op = ins.opcode;

        match op {
            // Flow
            Opcode::Err => return Err(Fault::ErrOpcode.into()),
            Opcode::Assert => {
                if self.stack.pop_uint()? == 0 {
                    return Err(Trap::Assert);
                }
            }
            Opcode::Return => {
                if !self.config.return_full_stack {
                    let top = self.stack.pop().map_err(|_| Fault::ReturnEmptyStack)?;
                    self.stack.clear();
                    self.stack.push(top);
                }
                return Ok(Flow::Halt);
            }
            Opcode::Branch => {
                return Ok(Flow::Jump(self.program.resolve(ins.arg(0)?)?));
            }
            Opcode::Bnz | Opcode::Bz => {
                let cond = self.stack.pop_uint()?;
                if (cond != 0) == (op == Opcode::Bnz) {
                    return Ok(Flow::Jump(self.program.resolve(ins.arg(0)?)?));
                }
            }
            Opcode::Callsub => {
                let target = self.program.resolve(ins.arg(0)?)?;
                self.frames.call(self.pc, self.stack.len());
                return Ok(Flow::Jump(target));
            }
            Opcode::Retsub => {
                let line = self.frames.return_from_call(&mut self.stack)?;
                return Ok(Flow::Jump(line));
            }
            Opcode::Proto => {
                if self.prev_op != Some(Opcode::Callsub) {
                    return Err(Fault::ProtoNotAfterCallsub.into());
                }
                let argc = ins.parse_arg::<usize>(0)?;
                let retc = ins.parse_arg::<usize>(1)?;
                self.frames.declare_signature(argc, retc)?;
            }
            Opcode::FrameDig => {
                let value = self.frames.frame_ref(frame_offset(ins)?, &self.stack)?;
                self.stack.push(value);
            }
            Opcode::FrameBury => {
                self.frames.frame_set(frame_offset(ins)?, &mut self.stack)?;
            }

            // Integer arithmetic
            Opcode::Add => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a.checked_add(b).ok_or(Fault::Overflow)?);
            }
            Opcode::Sub => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a.checked_sub(b).ok_or(Fault::Underflow)?);
            }
            Opcode::Mul => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a.checked_mul(b).ok_or(Fault::Overflow)?);
            }
            Opcode::Div => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a.checked_div(b).ok_or(Fault::DivisionByZero)?);
            }
            Opcode::Mod => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a.checked_rem(b).ok_or(Fault::DivisionByZero)?);
            }
            Opcode::Exp => {
                let (a, b) = self.pop_uint_pair()?;
                check_exp_input(a, b)?;
                let result = a.checked_pow(clamp_exponent(b)).ok_or(Fault::Overflow)?;
                self.stack.push(result);
            }
            Opcode::Expw => {
                let (a, b) = self.pop_uint_pair()?;
                check_exp_input(a, b)?;
                let result = (a as u128)
                    .checked_pow(clamp_exponent(b))
                    .ok_or(Fault::Overflow)?;
                self.push_wide(result);
            }
            Opcode::Sqrt => {
                let a = self.stack.pop_uint()?;
                self.stack.push(value::isqrt(a));
            }
            Opcode::Mulw => {
                let (a, b) = self.pop_uint_pair()?;
                self.push_wide(a as u128 * b as u128);
            }
            Opcode::Addw => {
                let (a, b) = self.pop_uint_pair()?;
                self.push_wide(a as u128 + b as u128);
            }
            Opcode::Divw => {
                let divisor = self.stack.pop_uint()?;
                let (hi, lo) = self.pop_uint_pair()?;
                if divisor == 0 {
                    return Err(Fault::DivisionByZero.into());
                }
                let quotient = join_wide(hi, lo) / divisor as u128;
                let quotient = u64::try_from(quotient).map_err(|_| Fault::DivisionOverflow)?;
                self.stack.push(quotient);
            }
            Opcode::Divmodw => {
                let (divisor_hi, divisor_lo) = self.pop_uint_pair()?;
                let (dividend_hi, dividend_lo) = self.pop_uint_pair()?;
                let divisor = join_wide(divisor_hi, divisor_lo);
                if divisor == 0 {
                    return Err(Fault::DivisionByZero.into());
                }
                let dividend = join_wide(dividend_hi, dividend_lo);
                self.push_wide(dividend / divisor);
                self.push_wide(dividend % divisor);
            }
            Opcode::Bitlen => {
                let bits = match self.stack.pop()? {
                    Value::Uint(n) => (u64::BITS - n.leading_zeros()) as u64,
                    Value::Bytes(b) => bitlen_bytes(&b),
                };
                self.stack.push(bits);
            }
            Opcode::BitAnd => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a & b);
            }
            Opcode::BitOr => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a | b);
            }
            Opcode::BitXor => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a ^ b);
            }
            Opcode::BitNot => {
                let a = self.stack.pop_uint()?;
                self.stack.push(!a);
            }
            Opcode::Shl | Opcode::Shr => {
                let (a, b) = self.pop_uint_pair()?;
                if b >= u64::BITS as u64 {
                    return Err(Fault::ShiftTooLarge(b).into());
                }
                self.stack.push(if op == Opcode::Shl { a << b } else { a >> b });
            }

            // Comparison and boolean logic
            Opcode::Not => {
                let a = self.stack.pop_uint()?;
                self.stack.push(a == 0);
            }
            Opcode::Gt => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a > b);
            }
            Opcode::Ge => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a >= b);
            }
            Opcode::Lt => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a < b);
            }
            Opcode::Le => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a <= b);
            }
            Opcode::Eq | Opcode::Ne => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                if a.kind() != b.kind() {
                    return Err(Fault::TypeMismatch {
                        left: a.kind(),
                        right: b.kind(),
                    }
                    .into());
                }
                self.stack.push((a == b) == (op == Opcode::Eq));
            }
            Opcode::And => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a != 0 && b != 0);
            }
            Opcode::Or => {
                let (a, b) = self.pop_uint_pair()?;
                self.stack.push(a != 0 || b != 0);
            }

            // Big-integer byte math
            Opcode::BAdd => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(value::encode_biguint(&(a + b)));
            }
            Opcode::BSub => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                if a < b {
                    return Err(Fault::Underflow.into());
                }
                self.stack.push(value::encode_biguint(&(a - b)));
            }
            Opcode::BMul => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(value::encode_biguint(&(a * b)));
            }
            Opcode::BDiv | Opcode::BMod => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                if b.is_zero() {
                    return Err(Fault::DivisionByZero.into());
                }
                let result = if op == Opcode::BDiv { a / b } else { a % b };
                self.stack.push(value::encode_biguint(&result));
            }
            Opcode::BEq => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a == b);
            }
            Opcode::BNe => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a != b);
            }
            Opcode::BLt => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a < b);
            }
            Opcode::BLe => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a <= b);
            }
            Opcode::BGt => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a > b);
            }
            Opcode::BGe => {
                let (a, b) = self.pop_bigint_pair(&limits)?;
                self.stack.push(a >= b);
            }
            Opcode::BSqrt => {
                let a = self.stack.pop_bytes()?;
                let a = value::decode_biguint(&a, bigint_width(&limits))?;
                self.stack.push(value::encode_biguint(&a.sqrt()));
            }
            Opcode::BOr | Opcode::BAnd | Opcode::BXor => {
                let (a, b) = self.pop_bytes_pair()?;
                check_width(&a, &limits)?;
                check_width(&b, &limits)?;
                let result = match op {
                    Opcode::BOr => bytewise(&a, &b, |x, y| x | y),
                    Opcode::BAnd => bytewise(&a, &b, |x, y| x & y),
                    _ => bytewise(&a, &b, |x, y| x ^ y),
                };
                self.stack.push(result);
            }
            Opcode::BNot => {
                let a = self.stack.pop_bytes()?;
                check_width(&a, &limits)?;
                self.stack.push(a.iter().map(|x| !x).collect::<Vec<u8>>());
            }

            // Conversion
            Opcode::Itob => {
                let a = self.stack.pop_uint()?;
                self.stack.push(value::itob(a));
            }
            Opcode::Btoi => {
                let a = self.stack.pop_bytes()?;
                self.stack.push(value::btoi(&a)?);
            }

            // Byte strings
            Opcode::Concat => {
                let (mut a, b) = self.pop_bytes_pair()?;
                check_string(a.len() + b.len(), &limits)?;
                a.extend_from_slice(&b);
                self.stack.push(a);
            }
            Opcode::Len => {
                let a = self.stack.pop_bytes()?;
                self.stack.push(a.len() as u64);
            }
            Opcode::Bzero => {
                let n = self.stack.pop_uint()?;
                let len = usize::try_from(n).unwrap_or(usize::MAX);
                check_string(len, &limits)?;
                self.stack.push(vec![0u8; len]);
            }
            Opcode::Extract => {
                let start = ins.parse_arg::<u64>(0)?;
                let length = ins.parse_arg::<u64>(1)?;
                let a = self.stack.pop_bytes()?;
                let end = if length == 0 {
                    (a.len() as u64).max(start)
                } else {
                    start.saturating_add(length)
                };
                let slice = byte_range(&a, start, end)?.to_vec();
                self.stack.push(slice);
            }
            Opcode::Extract3 => {
                let length = self.stack.pop_uint()?;
                let start = self.stack.pop_uint()?;
                let a = self.stack.pop_bytes()?;
                let slice = byte_range(&a, start, start.saturating_add(length))?.to_vec();
                self.stack.push(slice);
            }
            Opcode::ExtractUint16 | Opcode::ExtractUint32 | Opcode::ExtractUint64 => {
                let width = match op {
                    Opcode::ExtractUint16 => 2,
                    Opcode::ExtractUint32 => 4,
                    _ => 8,
                };
                let start = self.stack.pop_uint()?;
                let a = self.stack.pop_bytes()?;
                let slice = byte_range(&a, start, start.saturating_add(width))?;
                self.stack.push(value::btoi(slice)?);
            }
            Opcode::Substring => {
                let start = ins.parse_arg::<u64>(0)?;
                let end = ins.parse_arg::<u64>(1)?;
                let a = self.stack.pop_bytes()?;
                let slice = byte_range(&a, start, end)?.to_vec();
                self.stack.push(slice);
            }
            Opcode::Substring3 => {
                let end = self.stack.pop_uint()?;
                let start = self.stack.pop_uint()?;
                let a = self.stack.pop_bytes()?;
                let slice = byte_range(&a, start, end)?.to_vec();
                self.stack.push(slice);
            }
            Opcode::Replace2 => {
                let start = ins.parse_arg::<u64>(0)?;
                let (a, b) = self.pop_bytes_pair()?;
                self.stack.push(replace(a, start, &b)?);
            }
            Opcode::Replace3 => {
                let b = self.stack.pop_bytes()?;
                let start = self.stack.pop_uint()?;
                let a = self.stack.pop_bytes()?;
                self.stack.push(replace(a, start, &b)?);
            }
            Opcode::GetByte => {
                let index = self.stack.pop_uint()?;
                let a = self.stack.pop_bytes()?;
                let byte = byte_range(&a, index, index.saturating_add(1))?[0];
                self.stack.push(byte as u64);
            }
            Opcode::SetByte => {
                let byte = self.stack.pop_uint()?;
                let index = self.stack.pop_uint()?;
                let mut a = self.stack.pop_bytes()?;
                let byte = u8::try_from(byte).map_err(|_| Fault::InvalidSetValue {
                    what: "byte",
                    value: byte,
                })?;
                byte_range(&a, index, index.saturating_add(1))?;
                a[index as usize] = byte;
                self.stack.push(a);
            }
            Opcode::GetBit => {
                let index = self.stack.pop_uint()?;
                let target = self.stack.pop()?;
                self.stack.push(get_bit(&target, index)?);
            }
            Opcode::SetBit => {
                let bit = self.stack.pop_uint()?;
                let index = self.stack.pop_uint()?;
                let target = self.stack.pop()?;
                if bit > 1 {
                    return Err(Fault::InvalidSetValue {
                        what: "bit",
                        value: bit,
                    }
                    .into());
                }
                self.stack.push(set_bit(target, index, bit == 1)?);
            }

            // Stack shaping
            Opcode::Dup => self.stack.dup()?,
            Opcode::Dup2 => self.stack.dup2()?,
            Opcode::Dupn => self.stack.dupn(depth_arg(ins)?)?,
            Opcode::Pop => {
                self.stack.pop()?;
            }
            Opcode::Popn => self.stack.popn(depth_arg(ins)?)?,
            Opcode::Swap => self.stack.swap()?,
            Opcode::Select => {
                let cond = self.stack.pop_uint()?;
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(if cond != 0 { b } else { a });
            }
            Opcode::Cover => self.stack.cover(depth_arg(ins)?)?,
            Opcode::Uncover => self.stack.uncover(depth_arg(ins)?)?,
            Opcode::Dig => self.stack.dig(depth_arg(ins)?)?,
            Opcode::Bury => self.stack.bury(depth_arg(ins)?)?,

            // Scratch space
            Opcode::Store => {
                let slot = ins.parse_arg::<u64>(0)?;
                let value = self.stack.pop()?;
                self.scratch.store(slot, value)?;
            }
            Opcode::Load => {
                let slot = ins.parse_arg::<u64>(0)?;
                let value = self.scratch.load(slot)?.clone();
                self.stack.push(value);
            }
            Opcode::Stores => {
                let value = self.stack.pop()?;
                let slot = self.stack.pop_uint()?;
                self.scratch.store(slot, value)?;
            }
            Opcode::Loads => {
                let slot = self.stack.pop_uint()?;
                let value = self.scratch.load(slot)?.clone();
                self.stack.push(value);
            }

            // Application state and logs
            Opcode::AppGlobalGet => {
                let key = self.stack.pop()?;
                let ctx = self.context(op)?;
                let value = ctx.global_get(key.as_bytes()?).cloned();
                self.stack.push(value.unwrap_or(Value::ZERO));
            }
            Opcode::AppGlobalGetEx => {
                let key = self.stack.pop()?;
                let app = self.stack.pop()?;
                let ctx = self.context(op)?;
                if app != Value::ZERO {
                    return Err(Trap::Usage(
                        "Accessing other app's global state is unsupported".to_string(),
                    ));
                }
                let value = ctx.global_get(key.as_bytes()?).cloned();
                self.push_maybe(value);
            }
            Opcode::AppGlobalPut => {
                let value = self.stack.pop()?;
                let key = self.stack.pop()?;
                let ctx = self.context(op)?;
                ctx.global_put(key.into_bytes()?, value, limits.as_ref())?;
            }
            Opcode::AppGlobalDel => {
                let key = self.stack.pop()?;
                let ctx = self.context(op)?;
                ctx.global_del(key.as_bytes()?);
            }
            Opcode::AppLocalGet => {
                let key = self.stack.pop()?;
                let account = self.stack.pop()?;
                let ctx = self.local_context(op, &account, None)?;
                let value = ctx.local_get(key.as_bytes()?).cloned();
                self.stack.push(value.unwrap_or(Value::ZERO));
            }
            Opcode::AppLocalGetEx => {
                let key = self.stack.pop()?;
                let app = self.stack.pop()?;
                let account = self.stack.pop()?;
                let ctx = self.local_context(op, &account, Some(&app))?;
                let value = ctx.local_get(key.as_bytes()?).cloned();
                self.push_maybe(value);
            }
            Opcode::AppLocalPut => {
                let value = self.stack.pop()?;
                let key = self.stack.pop()?;
                let account = self.stack.pop()?;
                let ctx = self.local_context(op, &account, None)?;
                ctx.local_put(key.into_bytes()?, value, limits.as_ref())?;
            }
            Opcode::AppLocalDel => {
                let key = self.stack.pop()?;
                let account = self.stack.pop()?;
                let ctx = self.local_context(op, &account, None)?;
                ctx.local_del(key.as_bytes()?);
            }
            Opcode::Log => {
                let message = self.stack.pop()?;
                let ctx = self.context(op)?;
                ctx.log(message.into_bytes()?, limits.as_ref())?;
            }

            // Transaction fields
            Opcode::Txn => {
                let field = ins.arg(0)?;
                let index = match field {
                    "ApplicationArgs" => Some(ins.parse_arg::<u64>(1)?),
                    _ => None,
                };
                let value = self.txn_field(op, field, index)?;
                self.stack.push(value);
            }
            Opcode::Txna => {
                let field = ins.arg(0)?;
                let index = ins.parse_arg::<u64>(1)?;
                let value = self.txn_array(op, field, index)?;
                self.stack.push(value);
            }
            Opcode::Txnas => {
                let field = ins.arg(0)?;
                let index = self.stack.pop_uint()?;
                let value = self.txn_array(op, field, index)?;
                self.stack.push(value);
            }

            // Constant loads
            Opcode::Int | Opcode::PushInt => {
                self.stack.push(literal::parse_int(ins.arg(0)?)?);
            }
            Opcode::Byte | Opcode::PushBytes => {
                ins.arg(0)?;
                self.stack.push(literal::parse_bytes(&ins.operand)?);
            }
            Opcode::Addr => {
                self.stack.push(literal::parse_addr(ins.arg(0)?)?);
            }
        }

        Ok(Flow::Next)
    }

    fn pop_uint_pair(&mut self) -> FaultResult<(u64, u64)> {
        let b = self.stack.pop_uint()?;
        let a = self.stack.pop_uint()?;
        Ok((a, b))
    }

    fn pop_bytes_pair(&mut self) -> FaultResult<(Vec<u8>, Vec<u8>)> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        match (a, b) {
            (Value::Bytes(a), Value::Bytes(b)) => Ok((a, b)),
            (a, b) if a.kind() != b.kind() => Err(Fault::TypeMismatch {
                left: a.kind(),
                right: b.kind(),
            }),
            _ => Err(Fault::InvalidType {
                expected: ValueKind::Bytes,
                found: ValueKind::Uint,
            }),
        }
    }

    fn pop_bigint_pair(&mut self, limits: &Option<Limits>) -> FaultResult<(BigUint, BigUint)> {
        let (a, b) = self.pop_bytes_pair()?;
        let width = bigint_width(limits);
        Ok((
            value::decode_biguint(&a, width)?,
            value::decode_biguint(&b, width)?,
        ))
    }

    /// Push a 128-bit value as high then low 64-bit halves
    fn push_wide(&mut self, value: u128) {
        self.stack.push((value >> 64) as u64);
        self.stack.push(value as u64);
    }

    /// Push a looked-up value (zero when absent) and the existence flag
    fn push_maybe(&mut self, value: Option<Value>) {
        let exists = value.is_some();
        self.stack.push(value.unwrap_or(Value::ZERO));
        self.stack.push(exists);
    }

    fn context(&mut self, op: Opcode) -> StepResult<&mut ExecutionContext> {
        self.context.as_deref_mut().ok_or_else(|| {
            Trap::Usage(format!("{} requires execution environment context", op))
        })
    }

    /// Context for local-state opcodes, which only address the sender and
    /// the current application
    fn local_context(
        &mut self,
        op: Opcode,
        account: &Value,
        app: Option<&Value>,
    ) -> StepResult<&mut ExecutionContext> {
        let ctx = self.context(op)?;
        if *account != Value::ZERO || app.is_some_and(|a| *a != Value::ZERO) {
            let params = if app.is_some() {
                "account and application parameters"
            } else {
                "account parameter"
            };
            return Err(Trap::Usage(format!(
                "{} is only supported with 0 as the {}",
                op, params
            )));
        }
        Ok(ctx)
    }

    fn txn_field(&self, op: Opcode, field: &str, index: Option<u64>) -> StepResult<Value> {
        let ctx = self.context.as_deref().ok_or_else(|| {
            Trap::Usage(format!("{} requires execution environment context", op))
        })?;
        let txn = ctx.txn().ok_or_else(|| {
            Trap::Usage(format!(
                "{} requires an app call transaction in the execution context",
                op
            ))
        })?;
        let value = match (field, index) {
            ("Sender", None) => Value::Bytes(txn.sender.to_vec()),
            ("ApplicationID", None) => Value::Uint(txn.application_id),
            ("OnCompletion", None) => Value::Uint(txn.on_completion.as_u64()),
            ("NumAppArgs", None) => Value::Uint(txn.app_args.len() as u64),
            ("TypeEnum", None) => Value::Uint(literal::APPL_TYPE_ENUM),
            ("ApplicationArgs", Some(i)) => Value::from(txn.app_arg(i)?),
            _ => return Err(Trap::Usage(format!("Unsupported {} field {}", op, field))),
        };
        Ok(value)
    }

    fn txn_array(&self, op: Opcode, field: &str, index: u64) -> StepResult<Value> {
        if field != "ApplicationArgs" {
            return Err(Trap::Usage(format!("Unsupported {} field {}", op, field)));
        }
        self.txn_field(op, field, Some(index))
    }
}

fn check_exp_input(a: u64, b: u64) -> FaultResult<()> {
    if a == 0 && b == 0 {
        return Err(Fault::InvalidInput("0 exp 0"));
    }
    Ok(())
}

/// Exponents past `u32::MAX` only matter for bases 0 and 1, whose powers are
/// unchanged by clamping
fn clamp_exponent(b: u64) -> u32 {
    u32::try_from(b).unwrap_or(u32::MAX)
}

fn join_wide(hi: u64, lo: u64) -> u128 {
    (hi as u128) << 64 | lo as u128
}

fn bitlen_bytes(bytes: &[u8]) -> u64 {
    match bytes.iter().position(|&b| b != 0) {
        Some(i) => ((bytes.len() - i - 1) * 8) as u64 + (8 - bytes[i].leading_zeros()) as u64,
        None => 0,
    }
}

fn bigint_width(limits: &Option<Limits>) -> Option<usize> {
    limits.as_ref().map(|l| l.max_bigint_bytes)
}

fn check_width(bytes: &[u8], limits: &Option<Limits>) -> FaultResult<()> {
    match bigint_width(limits) {
        Some(max) if bytes.len() > max => Err(Fault::BytesOverflow {
            len: bytes.len(),
            max,
        }),
        _ => Ok(()),
    }
}

fn check_string(len: usize, limits: &Option<Limits>) -> FaultResult<()> {
    let max = limits
        .as_ref()
        .map_or(HARD_MAX_STRING_SIZE, |l| l.max_string_size);
    if len > max {
        return Err(Fault::StringTooLong { len, max });
    }
    Ok(())
}

/// Stack-depth immediate of `dupn`, `popn`, `cover`, `uncover`, `dig`, `bury`
fn depth_arg(ins: &Instruction) -> FaultResult<usize> {
    ins.parse_arg::<u8>(0).map(usize::from)
}

/// Signed frame offset immediate of `frame_dig` and `frame_bury`
fn frame_offset(ins: &Instruction) -> FaultResult<i64> {
    ins.parse_arg::<i8>(0).map(i64::from)
}

/// Bounds-checked `bytes[start..end]`
fn byte_range(bytes: &[u8], start: u64, end: u64) -> FaultResult<&[u8]> {
    let len = bytes.len() as u64;
    if start > end || end > len {
        return Err(Fault::OutOfBounds { start, end, len });
    }
    Ok(&bytes[start as usize..end as usize])
}

fn replace(mut target: Vec<u8>, start: u64, with: &[u8]) -> FaultResult<Vec<u8>> {
    let end = start.saturating_add(with.len() as u64);
    byte_range(&target, start, end)?;
    target[start as usize..end as usize].copy_from_slice(with);
    Ok(target)
}

/// Apply `f` byte by byte after left-padding the shorter operand with zeros
fn bytewise(a: &[u8], b: &[u8], f: impl Fn(u8, u8) -> u8) -> Vec<u8> {
    let len = a.len().max(b.len());
    let padded = |s: &[u8]| {
        let mut v = vec![0u8; len - s.len()];
        v.extend_from_slice(s);
        v
    };
    padded(a)
        .into_iter()
        .zip(padded(b))
        .map(|(x, y)| f(x, y))
        .collect()
}

/// Bit 0 is the least significant bit of an integer but the most
/// significant bit of the first byte of a byte string
fn get_bit(target: &Value, index: u64) -> FaultResult<u64> {
    match target {
        Value::Uint(n) => {
            uint_bit_index(index)?;
            Ok((n >> index) & 1)
        }
        Value::Bytes(b) => {
            let (byte, mask) = byte_bit_index(b, index)?;
            Ok((b[byte] & mask != 0) as u64)
        }
    }
}

fn set_bit(target: Value, index: u64, on: bool) -> FaultResult<Value> {
    match target {
        Value::Uint(n) => {
            uint_bit_index(index)?;
            let mask = 1u64 << index;
            Ok(Value::Uint(if on { n | mask } else { n & !mask }))
        }
        Value::Bytes(mut b) => {
            let (byte, mask) = byte_bit_index(&b, index)?;
            if on {
                b[byte] |= mask;
            } else {
                b[byte] &= !mask;
            }
            Ok(Value::Bytes(b))
        }
    }
}

fn uint_bit_index(index: u64) -> FaultResult<()> {
    if index >= u64::BITS as u64 {
        return Err(Fault::OutOfBounds {
            start: index,
            end: index.saturating_add(1),
            len: u64::BITS as u64,
        });
    }
    Ok(())
}

fn byte_bit_index(bytes: &[u8], index: u64) -> FaultResult<(usize, u8)> {
    let bits = bytes.len() as u64 * 8;
    if index >= bits {
        return Err(Fault::OutOfBounds {
            start: index,
            end: index.saturating_add(1),
            len: bits,
        });
    }
    Ok(((index / 8) as usize, 0x80 >> (index % 8)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn exec(lines: &[&str]) -> VmResult<Execution> {
        let program = Program::from_lines(lines.iter().copied())?;
        Interpreter::new(&program, ExecutionConfig::default()).run()
    }

    fn exec_stack(lines: &[&str]) -> Vec<Value> {
        exec(lines).unwrap().stack
    }

    fn fault_of(lines: &[&str]) -> Fault {
        match exec(lines) {
            Err(VmError::Panic { fault, .. }) => fault,
            other => panic!("expected panic, got {:?}", other),
        }
    }

    fn uint(n: u64) -> Value {
        Value::Uint(n)
    }

    fn bytes(b: &[u8]) -> Value {
        Value::from(b)
    }

    // ==================== Control flow ====================

    #[test]
    fn test_return_full_and_top_only() {
        let program = Program::from_lines(["int 1", "int 2", "return", "int 3"]).unwrap();
        let full = Interpreter::new(&program, ExecutionConfig::default()).run().unwrap();
        assert_eq!(full.stack, vec![uint(1), uint(2)]);
        assert_eq!(full.halt, Halt::Return);
        assert_eq!(full.steps, 3);

        let top = Interpreter::new(&program, ExecutionConfig::top_only()).run().unwrap();
        assert_eq!(top.stack, vec![uint(2)]);
    }

    #[test]
    fn test_return_top_of_empty_stack() {
        let program = Program::from_lines(["return"]).unwrap();
        let err = Interpreter::new(&program, ExecutionConfig::top_only()).run().unwrap_err();
        assert_eq!(err, Fault::ReturnEmptyStack.at(1));
    }

    #[test]
    fn test_end_of_program() {
        let execution = exec(&["int 4", "", "# note"]).unwrap();
        assert_eq!(execution.halt, Halt::EndOfProgram);
        assert_eq!(execution.stack, vec![uint(4)]);
        assert_eq!(execution.steps, 1);
    }

    #[test]
    fn test_branches() {
        let stack = exec_stack(&[
            "int 0", "bnz skip", "int 0", "bz skip", "int 99", "skip:", "int 7", "b end", "int 98",
            "end:",
        ]);
        assert_eq!(stack, vec![uint(7)]);
    }

    #[test]
    fn test_loop_with_scratch() {
        // Sum 1..=5 into slot 0
        let execution = exec(&[
            "int 5", "store 1", "loop:", "load 0", "load 1", "+", "store 0", "load 1", "int 1",
            "-", "dup", "store 1", "bnz loop",
        ])
        .unwrap();
        assert_eq!(execution.scratch[0], uint(15));
        assert!(execution.stack.is_empty());
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(fault_of(&["b nowhere"]), Fault::UnknownLabel("nowhere".into()));
        // Branch not taken: the label is never resolved
        assert_eq!(exec_stack(&["int 0", "bnz nowhere", "int 1"]), vec![uint(1)]);
    }

    #[test]
    fn test_branch_requires_uint() {
        assert!(matches!(
            fault_of(&["byte \"x\"", "bnz a", "a:"]),
            Fault::InvalidType { .. }
        ));
    }

    #[test]
    fn test_err_and_assert() {
        assert_eq!(fault_of(&["err"]), Fault::ErrOpcode);
        assert_eq!(exec(&["int 0", "assert"]).unwrap_err(), VmError::AssertionFailed { line: 2 });
        assert_eq!(exec_stack(&["int 3", "assert", "int 1"]), vec![uint(1)]);
    }

    #[test]
    fn test_unsupported_opcode_is_usage() {
        let err = exec(&["int 1", "sha256"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_pop_empty_is_stack_underflow() {
        assert_eq!(exec(&["pop"]).unwrap_err(), VmError::StackUnderflow { line: 1 });
    }

    // ==================== Integer arithmetic ====================

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(exec_stack(&["int 7", "int 3", "-"]), vec![uint(4)]);
        assert_eq!(exec_stack(&["int 7", "int 3", "*"]), vec![uint(21)]);
        assert_eq!(exec_stack(&["int 7", "int 3", "/"]), vec![uint(2)]);
        assert_eq!(exec_stack(&["int 7", "int 3", "%"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 2", "int 10", "exp"]), vec![uint(1024)]);
        assert_eq!(exec_stack(&["int 17", "sqrt"]), vec![uint(4)]);
    }

    #[test]
    fn test_arithmetic_traps() {
        assert_eq!(fault_of(&["int 1", "int 2", "-"]), Fault::Underflow);
        assert_eq!(fault_of(&["int 4294967296", "int 4294967296", "*"]), Fault::Overflow);
        assert_eq!(fault_of(&["int 1", "int 0", "/"]), Fault::DivisionByZero);
        assert_eq!(fault_of(&["int 1", "int 0", "%"]), Fault::DivisionByZero);
        assert_eq!(fault_of(&["int 2", "int 64", "exp"]), Fault::Overflow);
        assert!(matches!(fault_of(&["int 0", "int 0", "exp"]), Fault::InvalidInput(_)));
        assert!(matches!(
            fault_of(&["byte \"a\"", "int 1", "+"]),
            Fault::InvalidType { expected: ValueKind::Uint, found: ValueKind::Bytes }
        ));
    }

    #[test]
    fn test_exp_edge_bases() {
        assert_eq!(exec_stack(&["int 1", "int 18446744073709551615", "exp"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 0", "int 5", "exp"]), vec![uint(0)]);
        assert_eq!(exec_stack(&["int 7", "int 0", "exp"]), vec![uint(1)]);
    }

    #[test]
    fn test_wide_arithmetic() {
        assert_eq!(
            exec_stack(&["int 18446744073709551615", "int 2", "mulw"]),
            vec![uint(1), uint(u64::MAX - 1)]
        );
        assert_eq!(
            exec_stack(&["int 18446744073709551615", "int 1", "addw"]),
            vec![uint(1), uint(0)]
        );
        assert_eq!(exec_stack(&["int 2", "int 64", "expw"]), vec![uint(1), uint(0)]);
        assert_eq!(fault_of(&["int 2", "int 128", "expw"]), Fault::Overflow);
    }

    #[test]
    fn test_divw() {
        // (1 * 2^64 + 0) / 4 = 2^62
        assert_eq!(exec_stack(&["int 1", "int 0", "int 4", "divw"]), vec![uint(1 << 62)]);
        assert_eq!(fault_of(&["int 1", "int 0", "int 1", "divw"]), Fault::DivisionOverflow);
        assert_eq!(fault_of(&["int 0", "int 1", "int 0", "divw"]), Fault::DivisionByZero);
    }

    #[test]
    fn test_divmodw() {
        // (2^64 + 5) divmod 2 = (2^63 + 2, 1)
        assert_eq!(
            exec_stack(&["int 1", "int 5", "int 0", "int 2", "divmodw"]),
            vec![uint(0), uint((1 << 63) + 2), uint(0), uint(1)]
        );
        assert_eq!(
            fault_of(&["int 1", "int 5", "int 0", "int 0", "divmodw"]),
            Fault::DivisionByZero
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(exec_stack(&["int 12", "int 10", "&"]), vec![uint(8)]);
        assert_eq!(exec_stack(&["int 12", "int 10", "|"]), vec![uint(14)]);
        assert_eq!(exec_stack(&["int 12", "int 10", "^"]), vec![uint(6)]);
        assert_eq!(exec_stack(&["int 0", "~"]), vec![uint(u64::MAX)]);
        assert_eq!(exec_stack(&["int 1", "int 63", "shl"]), vec![uint(1 << 63)]);
        assert_eq!(exec_stack(&["int 3", "int 63", "shl"]), vec![uint(1 << 63)]);
        assert_eq!(exec_stack(&["int 256", "int 4", "shr"]), vec![uint(16)]);
        assert_eq!(fault_of(&["int 1", "int 64", "shl"]), Fault::ShiftTooLarge(64));
    }

    #[test]
    fn test_bitlen() {
        assert_eq!(exec_stack(&["int 0", "bitlen"]), vec![uint(0)]);
        assert_eq!(exec_stack(&["int 255", "bitlen"]), vec![uint(8)]);
        assert_eq!(exec_stack(&["byte 0x000100", "bitlen"]), vec![uint(9)]);
        assert_eq!(exec_stack(&["byte 0x", "bitlen"]), vec![uint(0)]);
    }

    // ==================== Logic ====================

    #[test]
    fn test_comparisons() {
        assert_eq!(exec_stack(&["int 2", "int 1", ">"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 2", "int 2", ">="]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 2", "int 1", "<"]), vec![uint(0)]);
        assert_eq!(exec_stack(&["int 1", "int 1", "<="]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 0", "!"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 3", "int 0", "&&"]), vec![uint(0)]);
        assert_eq!(exec_stack(&["int 3", "int 0", "||"]), vec![uint(1)]);
    }

    #[test]
    fn test_equality_requires_same_variant() {
        assert_eq!(exec_stack(&["byte \"a\"", "byte 0x61", "=="]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "!="]), vec![uint(1)]);
        assert_eq!(
            fault_of(&["int 1", "byte \"a\"", "=="]),
            Fault::TypeMismatch { left: ValueKind::Uint, right: ValueKind::Bytes }
        );
    }

    // ==================== Byte math ====================

    #[test]
    fn test_byte_math() {
        assert_eq!(exec_stack(&["byte 0xff", "byte 0x01", "b+"]), vec![bytes(&[1, 0])]);
        assert_eq!(exec_stack(&["byte 0x0100", "byte 0x01", "b-"]), vec![bytes(&[0xff])]);
        assert_eq!(exec_stack(&["byte 0x05", "byte 0x05", "b-"]), vec![bytes(&[0])]);
        assert_eq!(exec_stack(&["byte 0x10", "byte 0x10", "b*"]), vec![bytes(&[1, 0])]);
        assert_eq!(exec_stack(&["byte 0x07", "byte 0x02", "b/"]), vec![bytes(&[3])]);
        assert_eq!(exec_stack(&["byte 0x07", "byte 0x02", "b%"]), vec![bytes(&[1])]);
        assert_eq!(exec_stack(&["byte 0x0010", "bsqrt"]), vec![bytes(&[4])]);
    }

    #[test]
    fn test_byte_compare_ignores_leading_zeros() {
        assert_eq!(exec_stack(&["byte 0x0001", "byte 0x01", "b=="]), vec![uint(1)]);
        assert_eq!(exec_stack(&["byte 0x02", "byte 0x01", "b>"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["byte 0x02", "byte 0x01", "b<="]), vec![uint(0)]);
    }

    #[test]
    fn test_byte_math_traps() {
        assert_eq!(fault_of(&["byte 0x01", "byte 0x02", "b-"]), Fault::Underflow);
        assert_eq!(fault_of(&["byte 0x01", "byte 0x00", "b/"]), Fault::DivisionByZero);
        assert_eq!(
            fault_of(&["byte 0x01", "int 1", "b+"]),
            Fault::TypeMismatch { left: ValueKind::Bytes, right: ValueKind::Uint }
        );
        assert!(matches!(fault_of(&["int 1", "int 1", "b+"]), Fault::InvalidType { .. }));
        let wide = format!("byte 0x{}", "ff".repeat(65));
        assert_eq!(
            fault_of(&[wide.as_str(), "byte 0x01", "b+"]),
            Fault::BytesOverflow { len: 65, max: 64 }
        );
    }

    #[test]
    fn test_bytewise_logic() {
        assert_eq!(exec_stack(&["byte 0x0f0f", "byte 0xf0", "b|"]), vec![bytes(&[0x0f, 0xff])]);
        assert_eq!(exec_stack(&["byte 0x0f0f", "byte 0xff", "b&"]), vec![bytes(&[0x00, 0x0f])]);
        assert_eq!(exec_stack(&["byte 0xff", "byte 0x0f", "b^"]), vec![bytes(&[0xf0])]);
        assert_eq!(exec_stack(&["byte 0x00ff", "b~"]), vec![bytes(&[0xff, 0x00])]);
    }

    // ==================== Byte strings ====================

    #[test]
    fn test_conversion() {
        assert_eq!(exec_stack(&["int 1", "itob"]), vec![bytes(&[0, 0, 0, 0, 0, 0, 0, 1])]);
        assert_eq!(exec_stack(&["byte 0x0102", "btoi"]), vec![uint(258)]);
        assert_eq!(fault_of(&["byte 0x000000000000000001", "btoi"]), Fault::BtoiTooLong(9));
    }

    #[test]
    fn test_concat_len_bzero() {
        assert_eq!(exec_stack(&["byte \"ab\"", "byte \"cd\"", "concat"]), vec![bytes(b"abcd")]);
        assert_eq!(exec_stack(&["byte \"abc\"", "len"]), vec![uint(3)]);
        assert_eq!(exec_stack(&["int 3", "bzero"]), vec![bytes(&[0, 0, 0])]);
        assert_eq!(
            fault_of(&["int 4097", "bzero"]),
            Fault::StringTooLong { len: 4097, max: 4096 }
        );
        assert_eq!(
            fault_of(&["int 4096", "bzero", "byte 0x00", "concat"]),
            Fault::StringTooLong { len: 4097, max: 4096 }
        );
    }

    #[test]
    fn test_extract_family() {
        assert_eq!(exec_stack(&["byte \"hello\"", "extract 1 3"]), vec![bytes(b"ell")]);
        assert_eq!(exec_stack(&["byte \"hello\"", "extract 2 0"]), vec![bytes(b"llo")]);
        assert_eq!(exec_stack(&["byte \"hello\"", "int 1", "int 2", "extract3"]), vec![bytes(b"el")]);
        assert_eq!(
            fault_of(&["byte \"hello\"", "extract 4 2"]),
            Fault::OutOfBounds { start: 4, end: 6, len: 5 }
        );
        assert_eq!(
            fault_of(&["byte \"hello\"", "int 4", "int 2", "extract3"]),
            Fault::OutOfBounds { start: 4, end: 6, len: 5 }
        );
        assert!(matches!(fault_of(&["byte \"hi\"", "extract 3 0"]), Fault::OutOfBounds { .. }));
    }

    #[test]
    fn test_extract_uints() {
        let data = "byte 0x0102030405060708ff";
        assert_eq!(exec_stack(&[data, "int 0", "extract_uint16"]), vec![uint(0x0102)]);
        assert_eq!(exec_stack(&[data, "int 1", "extract_uint32"]), vec![uint(0x02030405)]);
        assert_eq!(
            exec_stack(&[data, "int 1", "extract_uint64"]),
            vec![uint(0x02030405060708ff)]
        );
        assert!(matches!(fault_of(&[data, "int 2", "extract_uint64"]), Fault::OutOfBounds { .. }));
    }

    #[test]
    fn test_substring() {
        assert_eq!(exec_stack(&["byte \"hello\"", "substring 1 3"]), vec![bytes(b"el")]);
        assert_eq!(exec_stack(&["byte \"hello\"", "int 0", "int 5", "substring3"]), vec![bytes(b"hello")]);
        assert!(matches!(fault_of(&["byte \"hello\"", "substring 3 1"]), Fault::OutOfBounds { .. }));
    }

    #[test]
    fn test_replace() {
        assert_eq!(exec_stack(&["byte \"hello\"", "byte \"EL\"", "replace2 1"]), vec![bytes(b"hELlo")]);
        assert_eq!(
            exec_stack(&["byte \"hello\"", "int 3", "byte \"LO\"", "replace3"]),
            vec![bytes(b"helLO")]
        );
        assert!(matches!(
            fault_of(&["byte \"hello\"", "int 4", "byte \"LO\"", "replace3"]),
            Fault::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_byte_and_bit_access() {
        assert_eq!(exec_stack(&["byte 0x0a0b", "int 1", "getbyte"]), vec![uint(0x0b)]);
        assert_eq!(exec_stack(&["byte 0x0a0b", "int 0", "int 255", "setbyte"]), vec![bytes(&[0xff, 0x0b])]);
        assert_eq!(
            fault_of(&["byte 0x0a", "int 0", "int 256", "setbyte"]),
            Fault::InvalidSetValue { what: "byte", value: 256 }
        );
        assert_eq!(exec_stack(&["int 4", "int 2", "getbit"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["byte 0x80", "int 0", "getbit"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 0", "int 3", "int 1", "setbit"]), vec![uint(8)]);
        assert_eq!(exec_stack(&["byte 0x00", "int 7", "int 1", "setbit"]), vec![bytes(&[1])]);
        assert!(matches!(fault_of(&["int 0", "int 64", "getbit"]), Fault::OutOfBounds { .. }));
    }

    // ==================== Stack and scratch ====================

    #[test]
    fn test_stack_opcodes() {
        assert_eq!(exec_stack(&["int 1", "int 2", "swap"]), vec![uint(2), uint(1)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "int 1", "select"]), vec![uint(2)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "int 0", "select"]), vec![uint(1)]);
        assert_eq!(
            exec_stack(&["int 1", "int 2", "int 3", "cover 2"]),
            vec![uint(3), uint(1), uint(2)]
        );
        assert_eq!(
            exec_stack(&["int 1", "int 2", "int 3", "uncover 2"]),
            vec![uint(2), uint(3), uint(1)]
        );
        assert_eq!(exec_stack(&["int 1", "int 2", "dig 1"]), vec![uint(1), uint(2), uint(1)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "int 3", "bury 2"]), vec![uint(3), uint(2)]);
        assert_eq!(exec_stack(&["int 1", "dupn 2"]), vec![uint(1), uint(1), uint(1)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "int 3", "popn 2"]), vec![uint(1)]);
        assert_eq!(exec_stack(&["int 1", "int 2", "dup2"]), vec![uint(1), uint(2), uint(1), uint(2)]);
    }

    #[test]
    fn test_cover_too_deep() {
        assert_eq!(
            fault_of(&["int 1", "cover 1"]),
            Fault::StackTooShallow { op: "cover", depth: 1, len: 1 }
        );
    }

    #[test]
    fn test_scratch_opcodes() {
        let execution = exec(&["int 9", "store 3", "int 4", "byte \"v\"", "stores", "load 3", "int 4", "loads"]).unwrap();
        assert_eq!(execution.stack, vec![uint(9), bytes(b"v")]);
        assert_eq!(execution.scratch[4], bytes(b"v"));
        assert_eq!(fault_of(&["int 1", "store 256"]), Fault::ScratchOutOfBounds(256));
    }

    #[test]
    fn test_missing_and_invalid_immediates() {
        assert_eq!(fault_of(&["int"]), Fault::MissingImmediate { op: "int", index: 0 });
        assert_eq!(fault_of(&["byte"]), Fault::MissingImmediate { op: "byte", index: 0 });
        assert_eq!(
            fault_of(&["int 1", "store x"]),
            Fault::InvalidImmediate { op: "store", arg: "x".into() }
        );
    }

    // ==================== Immediates ====================

    #[test]
    fn test_int_literals() {
        assert_eq!(exec_stack(&["int 0x10", "pushint 3", "int OptIn"]), vec![uint(16), uint(3), uint(1)]);
        assert!(matches!(fault_of(&["int 18446744073709551616"]), Fault::IntOutOfRange(_)));
    }

    #[test]
    fn test_byte_literals() {
        assert_eq!(
            exec_stack(&["byte \"a b\"", "pushbytes 0x01", "byte base64(aGk=)"]),
            vec![bytes(b"a b"), bytes(&[1]), bytes(b"hi")]
        );
        assert!(matches!(fault_of(&["byte nope"]), Fault::InvalidByteLiteral(_)));
    }

    #[test]
    fn test_addr_literal() {
        let line = format!("addr {}", teal_primitives::Address::ZERO);
        assert_eq!(exec_stack(&[line.as_str()]), vec![bytes(&[0u8; 32])]);
        assert!(matches!(fault_of(&["addr XYZ"]), Fault::InvalidAddress(_)));
    }

    // ==================== Trace ====================

    #[test]
    fn test_trace_lines() {
        let program = Program::from_lines(["int 5", "", "lbl:", "int 3", "+"]).unwrap();
        let mut sink = Vec::new();
        Interpreter::new(&program, ExecutionConfig::default())
            .with_trace(&mut sink)
            .run()
            .unwrap();
        let trace = String::from_utf8(sink).unwrap();
        assert_eq!(trace, "1: int 5 | []\n3: lbl: | [5]\n4: int 3 | [5]\n5: + | [5, 3]\n");
    }

    #[test]
    fn test_trace_write_failure_is_usage() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let program = Program::from_lines(["int 1"]).unwrap();
        let mut sink = Broken;
        let err = Interpreter::new(&program, ExecutionConfig::default())
            .with_trace(&mut sink)
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_step_by_step() {
        let program = Program::from_lines(["int 1", "int 2"]).unwrap();
        let mut interpreter = Interpreter::new(&program, ExecutionConfig::default());
        assert_eq!(interpreter.step(), Ok(None));
        assert_eq!(interpreter.pc(), 1);
        assert_eq!(interpreter.stack().len(), 1);
        assert_eq!(interpreter.step(), Ok(None));
        assert_eq!(interpreter.step(), Ok(Some(Halt::EndOfProgram)));
        assert!(interpreter.scratch().non_zero().next().is_none());
    }
}
